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

//! # Ladle Custom Function Module
//!
//! Host programs register their own callables and recipes reach them through
//! the `custom.<name>` namespace. Each function is registered together with
//! an [`LdFunctionSignature`] describing how arguments are bound.
//!
//! ## Binding Modes
//!
//! - **Dataset mode** (`accepts_dataset`): the function receives the whole
//!   dataset plus the step parameters and must return a dataset
//! - **Row mode**: the function is called once per row with that row's
//!   column values and the step parameters as keyword arguments
//!
//! ## Usage Example
//!
//! ```rust
//! use ladle::custom::{LdCustomOutput, LdFunctionRegistry, LdFunctionSignature};
//! use serde_json::json;
//!
//! let mut registry = LdFunctionRegistry::new();
//! registry.register("shout", LdFunctionSignature::row(&["text"]), |args| {
//!     let text = args.kwargs.get("text").and_then(|v| v.as_str()).unwrap_or_default();
//!     Ok(LdCustomOutput::Value(json!(text.to_uppercase())))
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::dataset::LdDataset;
use crate::errors::{LdError, LdErrorKind, Result};
use crate::select::{expand, selectors_from_value};

/// Step parameters the engine consumes itself.
pub const LD_RESERVED_PARAMS: &[&str] = &["input", "output", "where", "where_params"];

/// Declared shape of a custom function's parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LdFunctionSignature {
    pub accepts_dataset: bool,
    pub params: Vec<String>,
    pub open_params: bool,
}

impl LdFunctionSignature {
    /// Whole-dataset function.
    pub fn dataset() -> Self {
        Self {
            accepts_dataset: true,
            params: Vec::new(),
            open_params: true,
        }
    }

    /// Row-wise function declaring the given parameter names.
    pub fn row(params: &[&str]) -> Self {
        Self {
            accepts_dataset: false,
            params: params.iter().map(|name| name.to_string()).collect(),
            open_params: false,
        }
    }

    /// Accepts any keyword, in addition to the declared ones.
    pub fn open(mut self) -> Self {
        self.open_params = true;
        self
    }

    pub fn declares(&self, name: &str) -> bool {
        self.params.iter().any(|param| param == name)
    }

    fn admits(&self, name: &str) -> bool {
        self.open_params || self.declares(name)
    }
}

/// Arguments handed to a custom function.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LdCustomArgs {
    pub dataset: Option<LdDataset>,
    pub kwargs: Map<String, Value>,
}

/// Value returned by a custom function.
#[derive(Clone, Debug, PartialEq)]
pub enum LdCustomOutput {
    Dataset(LdDataset),
    Value(Value),
}

pub type LdCustomCallable = dyn Fn(LdCustomArgs) -> Result<LdCustomOutput> + Send + Sync;

#[derive(Clone)]
pub struct LdCustomFunction {
    name: String,
    signature: LdFunctionSignature,
    callable: Arc<LdCustomCallable>,
}

impl LdCustomFunction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> &LdFunctionSignature {
        &self.signature
    }

    pub fn call(&self, args: LdCustomArgs) -> Result<LdCustomOutput> {
        (self.callable)(args)
    }
}

impl std::fmt::Debug for LdCustomFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdCustomFunction")
            .field("name", &self.name)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Name → function map, read-only once a run starts.
#[derive(Clone, Debug, Default)]
pub struct LdFunctionRegistry {
    functions: HashMap<String, LdCustomFunction>,
}

impl LdFunctionRegistry {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, signature: LdFunctionSignature, callable: F)
    where
        F: Fn(LdCustomArgs) -> Result<LdCustomOutput> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.to_string(),
            LdCustomFunction {
                name: name.to_string(),
                signature,
                callable: Arc::new(callable),
            },
        );
    }

    pub fn get(&self, name: &str) -> Result<&LdCustomFunction> {
        self.functions.get(name).ok_or_else(|| {
            LdError::new(LdErrorKind::UnknownFunction {
                name: name.to_string(),
            })
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Applies a custom function as a wrangle step.
pub fn invoke(
    function: &LdCustomFunction,
    dataset: &LdDataset,
    step_params: &Map<String, Value>,
) -> Result<LdDataset> {
    if function.signature.accepts_dataset {
        invoke_dataset(function, dataset, step_params)
    } else {
        invoke_rows(function, dataset, step_params)
    }
}

/// Calls a function with no dataset, only the given keyword arguments.
pub fn call_with_params(function: &LdCustomFunction, params: &Map<String, Value>) -> Result<Value> {
    let kwargs = params
        .iter()
        .filter(|(name, _)| function.signature.admits(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    match function.call(LdCustomArgs {
        dataset: None,
        kwargs,
    })? {
        LdCustomOutput::Value(value) => Ok(value),
        LdCustomOutput::Dataset(dataset) => Ok(Value::Array(
            dataset.rows().into_iter().map(Value::Object).collect(),
        )),
    }
}

fn invoke_dataset(
    function: &LdCustomFunction,
    dataset: &LdDataset,
    step_params: &Map<String, Value>,
) -> Result<LdDataset> {
    let kwargs = step_params
        .iter()
        .filter(|(name, _)| !matches!(name.as_str(), "where" | "where_params"))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    match function.call(LdCustomArgs {
        dataset: Some(dataset.clone()),
        kwargs,
    })? {
        LdCustomOutput::Dataset(result) => Ok(result),
        LdCustomOutput::Value(value) => Err(LdError::contract_violation(
            &function.name,
            format!("expected a dataset to be returned, got {value}"),
        )),
    }
}

fn invoke_rows(
    function: &LdCustomFunction,
    dataset: &LdDataset,
    step_params: &Map<String, Value>,
) -> Result<LdDataset> {
    let signature = &function.signature;
    let input = match step_params.get("input") {
        Some(selectors) => Some(expand(dataset.columns(), &selectors_from_value(selectors)?)?),
        None => None,
    };
    let output = match (step_params.get("output"), &input) {
        (Some(names), _) => selectors_from_value(names)?,
        (None, Some(input)) => input.clone(),
        (None, None) => {
            return Err(LdError::validation(format!(
                "custom.{} needs an 'output' when no 'input' is given",
                function.name
            )))
        }
    };
    if output.is_empty() {
        return Err(LdError::validation("'output' must name at least one column"));
    }
    let columns = input.unwrap_or_else(|| dataset.columns().to_vec());

    // keyword each column is passed under, if any
    let bindings: Vec<(String, Option<String>)> = columns
        .iter()
        .map(|column| {
            let alias = column.replace(' ', "_");
            let keyword = if column.contains(' ') && signature.declares(&alias) {
                alias
            } else {
                column.clone()
            };
            let admitted = signature.admits(&keyword).then_some(keyword);
            (column.clone(), admitted)
        })
        .collect();

    let params: Map<String, Value> = step_params
        .iter()
        .filter(|(name, _)| !LD_RESERVED_PARAMS.contains(&name.as_str()))
        .filter(|(name, _)| signature.admits(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let mut produced: Vec<Vec<Value>> = vec![Vec::with_capacity(dataset.len()); output.len()];
    for row in 0..dataset.len() {
        let mut kwargs = Map::new();
        for (column, keyword) in &bindings {
            if let Some(keyword) = keyword {
                let value = dataset.cell(column, row).cloned().unwrap_or(Value::Null);
                kwargs.insert(keyword.clone(), value);
            }
        }
        for (name, value) in &params {
            kwargs.insert(name.clone(), value.clone());
        }

        let result = match function.call(LdCustomArgs {
            dataset: None,
            kwargs,
        }) {
            Ok(result) => result,
            Err(row_error) => {
                log::debug!(
                    "custom.{} failed on row {} ({}); retrying with step parameters only",
                    function.name,
                    row,
                    row_error
                );
                function
                    .call(LdCustomArgs {
                        dataset: None,
                        kwargs: params.clone(),
                    })
                    .map_err(|fallback_error| {
                        log::warn!(
                            "custom.{} parameter-only retry on row {} also failed: {}",
                            function.name,
                            row,
                            fallback_error
                        );
                        row_error
                    })?
            }
        };

        let value = match result {
            LdCustomOutput::Value(value) => value,
            LdCustomOutput::Dataset(_) => {
                return Err(LdError::contract_violation(
                    &function.name,
                    "a row-wise function must return a value, not a dataset",
                ))
            }
        };

        if output.len() == 1 {
            produced[0].push(value);
        } else {
            match value {
                Value::Array(items) if items.len() == output.len() => {
                    for (slot, item) in items.into_iter().enumerate() {
                        produced[slot].push(item);
                    }
                }
                other => {
                    return Err(LdError::contract_violation(
                        &function.name,
                        format!(
                            "expected a list of {} values for outputs {:?}, got {}",
                            output.len(),
                            output,
                            other
                        ),
                    ))
                }
            }
        }
    }

    let mut result = dataset.clone();
    for (name, values) in output.iter().zip(produced) {
        result.set_column(name, values)?;
    }
    Ok(result)
}
