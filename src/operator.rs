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

//! # Ladle Wrangle Module
//!
//! This module defines the wrangle trait implemented by every built-in step
//! and the registry that builds wrangles from recipe parameters.
//!
//! ## Wrangle Design
//!
//! A wrangle receives the whole dataset and returns the transformed dataset.
//! Wrangles are built per step by a factory from the step's parameter
//! mapping, so a wrangle instance only ever holds its own configuration.
//!
//! ## Implementing Wrangles
//!
//! ```rust
//! use ladle::context::LdContext;
//! use ladle::dataset::LdDataset;
//! use ladle::errors::Result;
//! use ladle::operator::LdWrangle;
//!
//! #[derive(Debug)]
//! struct Identity;
//!
//! impl LdWrangle for Identity {
//!     fn name(&self) -> &'static str {
//!         "identity"
//!     }
//!
//!     fn apply(&self, dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
//!         Ok(dataset)
//!     }
//! }
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::context::LdContext;
use crate::dataset::LdDataset;
use crate::errors::{LdError, LdErrorKind, Result};
use crate::select::{expand, selectors_from_value};

/// Contract every built-in step fulfils.
pub trait LdWrangle: std::fmt::Debug {
    /// Registry key of the wrangle, used in logs.
    fn name(&self) -> &'static str;

    /// Transforms the dataset.
    fn apply(&self, dataset: LdDataset, context: &LdContext) -> Result<LdDataset>;

    /// Whether the wrangle evaluates `where`/`where_params` on its own.
    fn consumes_where(&self) -> bool {
        false
    }
}

pub type LdWrangleFactory = fn(&Value) -> Result<Box<dyn LdWrangle + Send + Sync>>;

/// Runs a wrangle, logging the row count on each side.
pub fn execute_wrangle(
    wrangle: &dyn LdWrangle,
    dataset: LdDataset,
    context: &LdContext,
) -> Result<LdDataset> {
    let before = dataset.len();
    let output = wrangle.apply(dataset, context)?;
    log::debug!(
        "{}: {} rows in, {} rows out",
        wrangle.name(),
        before,
        output.len()
    );
    Ok(output)
}

/// Dotted key → factory map of the built-in wrangles.
#[derive(Clone, Debug, Default)]
pub struct LdWrangleRegistry {
    factories: HashMap<String, LdWrangleFactory>,
}

impl LdWrangleRegistry {
    /// Creates an empty registry.
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-loaded with the bundled wrangles.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, factory: LdWrangleFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Builds the wrangle registered under `name` from its parameters.
    pub fn build(&self, name: &str, params: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            LdError::new(LdErrorKind::UnknownWrangle {
                name: name.to_string(),
            })
        })?;
        factory(params)
    }

    fn register_defaults(&mut self) {
        use crate::operators::{convert, field, filter, merge, request};

        // conversion
        self.register("convert.case", convert::convert_case_factory as LdWrangleFactory);
        self.register(
            "convert.data_type",
            convert::convert_data_type_factory as LdWrangleFactory,
        );

        // column management
        self.register("copy", field::copy_factory as LdWrangleFactory);
        self.register("drop", field::drop_factory as LdWrangleFactory);
        self.register("rename", field::rename_factory as LdWrangleFactory);
        self.register("select.columns", field::select_columns_factory as LdWrangleFactory);
        self.register("select.head", field::select_head_factory as LdWrangleFactory);
        self.register("reindex", field::reindex_factory as LdWrangleFactory);

        // filtering
        self.register("filter", filter::filter_factory as LdWrangleFactory);

        // merging
        self.register(
            "merge.concatenate",
            merge::merge_concatenate_factory as LdWrangleFactory,
        );

        // remote calls
        self.register("request.batch", request::request_batch_factory as LdWrangleFactory);
        self.register("request.row", request::request_row_factory as LdWrangleFactory);
    }
}

/// Parameter mapping of a step; `null` counts as empty.
pub fn params_object<'a>(config: &'a Value, name: &str) -> Result<&'a Map<String, Value>> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    match config {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(EMPTY.get_or_init(Map::new)),
        _ => Err(LdError::validation(format!("{name} parameters must be a mapping"))),
    }
}

/// Selector list from a parameter; absent means none.
pub fn selector_param(params: &Map<String, Value>, key: &str) -> Result<Vec<String>> {
    params
        .get(key)
        .map(selectors_from_value)
        .transpose()
        .map(Option::unwrap_or_default)
}

pub fn string_param(params: &Map<String, Value>, key: &str, name: &str) -> Result<String> {
    match params.get(key) {
        Some(Value::String(text)) => Ok(text.clone()),
        Some(Value::Number(number)) => Ok(number.to_string()),
        Some(other) => Err(LdError::validation(format!(
            "{name}: '{key}' must be a string, got {other}"
        ))),
        None => Err(LdError::validation(format!("{name} requires '{key}'"))),
    }
}

/// Pairs expanded `input` columns with `output` names.
///
/// Without an `output` the inputs are replaced in place. Lists must have the
/// same length; a single output is only valid for a single input.
pub fn input_output_pairs(
    dataset: &LdDataset,
    input: &[String],
    output: &[String],
    name: &str,
) -> Result<Vec<(String, String)>> {
    let inputs = expand(dataset.columns(), input)?;
    if output.is_empty() {
        return Ok(inputs.iter().map(|column| (column.clone(), column.clone())).collect());
    }
    if inputs.len() != output.len() {
        return Err(LdError::ambiguous_output(format!(
            "{name} was given {} input column(s) {:?} and {} output column(s) {:?}",
            inputs.len(),
            inputs,
            output.len(),
            output
        )));
    }
    Ok(inputs.into_iter().zip(output.iter().cloned()).collect())
}
