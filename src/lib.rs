//! Copyright © 2025-2026 Wenze Wei. All Rights Reserved.
//!
//! This file is part of Ladle.
//! The Ladle project belongs to the Dunimd Team.
//!
//! Licensed under the Apache License, Version 2.0 (the "License");
//! You may not use this file except in compliance with the License.
//! You may obtain a copy of the License at
//!
//!     http://www.apache.org/licenses/LICENSE-2.0
//!
//! Unless required by applicable law or agreed to in writing, software
//! distributed under the License is distributed on an "AS IS" BASIS,
//! WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//! See the License for the specific language governing permissions and
//! limitations under the License.

//! # Ladle Core Library
//!
//! Ladle runs declarative recipes over tabular data. A recipe reads a
//! dataset from a connector, applies an ordered list of wrangles and writes
//! the result to one or more destinations.
//!
//! ## Module Overview
//!
//! - **errors**: the error type and the suggestions attached to step failures
//! - **dataset**: the column-ordered table every step works on
//! - **variables**: `${name}` placeholder resolution
//! - **select**: column selectors (wildcards, regex, positions, negation)
//! - **where_clause**: the SQL-like row predicate behind `where`
//! - **batch**: chunked remote calls with retry and backoff
//! - **custom**: user functions and how their arguments are bound
//! - **matrix**: variable permutations and the bounded worker pool
//! - **context**: the execution context shared by nested and matrix runs
//! - **operator** / **operators**: the wrangle trait, registry and built-ins
//! - **connectors**: read and write endpoints
//! - **recipe**: recipe loading and the interpreter
//!
//! ## Quick Start
//!
//! ```rust
//! use ladle::{run, LdBindings, LdContext};
//!
//! let recipe = r#"
//! read:
//!   - test:
//!       rows: 3
//!       values:
//!         header1: value1
//! wrangles:
//!   - convert.case:
//!       input: header1
//!       case: upper
//! "#;
//!
//! let dataset = run(recipe, &LdBindings::new(), None, &LdContext::new()).unwrap();
//! assert_eq!(dataset.cell("header1", 0), Some(&serde_json::json!("VALUE1")));
//! ```
//!
//! ## Error Handling
//!
//! Every operation returns `Result<T, LdError>`. Errors raised inside a
//! step carry the step's location and a suggestion for fixing the recipe.

#![allow(non_snake_case)]

pub mod batch;
pub mod connectors;
pub mod context;
pub mod custom;
pub mod dataset;
pub mod errors;
pub mod matrix;
pub mod operator;
pub mod operators;
pub mod recipe;
pub mod select;
pub mod variables;
pub mod where_clause;

pub use batch::{
    LdBatchClient, LdBatchRequest, LdBatchResult, LdHttpResponse, LdHttpTransport, LdSleeper,
    LdThreadSleeper, LdTransport,
};
pub use connectors::{LdConnector, LdConnectorRegistry};
pub use context::{LdContext, LdContextConfig};
pub use custom::{
    LdCustomArgs, LdCustomFunction, LdCustomOutput, LdFunctionRegistry, LdFunctionSignature,
};
pub use dataset::{LdDataset, LdJoinHow, LdRow};
pub use errors::{LdError, LdErrorKind, Result};
pub use matrix::{LdMatrixExecutor, LdMatrixStrategy};
pub use operator::{execute_wrangle, LdWrangle, LdWrangleFactory, LdWrangleRegistry};
pub use recipe::{LdModelSource, LdRecipeInput, LdRecipeRunner, LdRunReport};
pub use variables::LdBindings;
pub use where_clause::LdWhereClause;

/// Runs a recipe with the given variables. `dataframe` is the starting
/// dataset for recipes without a `read` section.
pub fn run(
    recipe: impl Into<LdRecipeInput>,
    variables: &LdBindings,
    dataframe: Option<LdDataset>,
    context: &LdContext,
) -> Result<LdDataset> {
    LdRecipeRunner::new(context.clone()).run(recipe, variables, dataframe)
}
