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

//! # Ladle Matrix Module
//!
//! Expansion of a `matrix` block into concrete variable bindings, and the
//! bounded worker pool that runs one job per binding.
//!
//! ## Candidate Values
//!
//! | Value | Candidates |
//! |-------|------------|
//! | list | the list itself |
//! | `set(column)` | distinct values of the column, first occurrence first |
//! | `dir(path)` | sorted directory entries, each prefixed with the path |
//! | `custom.name` | what the registered function returns |
//! | anything else | a one-element list |
//!
//! ## Strategies
//!
//! - **loop** (default): position `i` of every list, shorter lists cycling
//! - **permutations**: the full cross product, first variable slowest

use std::path::Path;
use std::sync::OnceLock;

use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::custom::{call_with_params, LdFunctionRegistry};
use crate::dataset::LdDataset;
use crate::errors::{LdError, Result};
use crate::variables::LdBindings;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LdMatrixStrategy {
    #[default]
    Loop,
    Permutations,
}

impl LdMatrixStrategy {
    pub fn parse(value: Option<&Value>) -> Result<Self> {
        match value {
            None | Some(Value::Null) => Ok(Self::Loop),
            Some(Value::String(text)) => match text.to_ascii_lowercase().as_str() {
                "loop" => Ok(Self::Loop),
                "permutations" => Ok(Self::Permutations),
                other => Err(LdError::validation(format!(
                    "matrix strategy must be 'loop' or 'permutations', got '{other}'"
                ))),
            },
            Some(other) => Err(LdError::validation(format!(
                "matrix strategy must be a string, got {other}"
            ))),
        }
    }
}

fn expression_regex() -> &'static Regex {
    static EXPRESSION: OnceLock<Regex> = OnceLock::new();
    EXPRESSION
        .get_or_init(|| Regex::new(r"^\s*(set|dir)\((.*)\)\s*$").expect("expression pattern"))
}

/// Candidate values of one matrix variable.
pub fn candidate_values(
    value: &Value,
    dataset: Option<&LdDataset>,
    functions: &LdFunctionRegistry,
) -> Result<Vec<Value>> {
    let text = match value {
        Value::Array(items) => return Ok(items.clone()),
        Value::String(text) => text,
        other => return Ok(vec![other.clone()]),
    };

    if let Some(captures) = expression_regex().captures(text) {
        let argument = captures[2].trim().trim_matches(|c| c == '"' || c == '\'');
        return match &captures[1] {
            "set" => {
                let dataset = dataset.ok_or_else(|| {
                    LdError::validation(format!("'{text}' needs a dataset to draw values from"))
                })?;
                dataset.unique_values(argument)
            }
            _ => directory_entries(argument),
        };
    }

    if let Some(name) = text.strip_prefix("custom.") {
        let function = functions.get(name)?;
        return match call_with_params(function, &Map::new())? {
            Value::Array(items) => Ok(items),
            other => Ok(vec![other]),
        };
    }

    Ok(vec![value.clone()])
}

fn directory_entries(path: &str) -> Result<Vec<Value>> {
    let mut names = std::fs::read_dir(path)?
        .map(|entry| entry.map(|entry| entry.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.sort();
    Ok(names
        .into_iter()
        .map(|name| Value::String(Path::new(path).join(name).to_string_lossy().into_owned()))
        .collect())
}

/// Combines named candidate lists into bindings.
pub fn combine(variables: &[(String, Vec<Value>)], strategy: LdMatrixStrategy) -> Vec<LdBindings> {
    if variables.is_empty() || variables.iter().any(|(_, values)| values.is_empty()) {
        return Vec::new();
    }
    match strategy {
        LdMatrixStrategy::Loop => {
            let longest = variables.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
            (0..longest)
                .map(|position| {
                    variables
                        .iter()
                        .map(|(name, values)| (name.clone(), values[position % values.len()].clone()))
                        .collect()
                })
                .collect()
        }
        LdMatrixStrategy::Permutations => {
            let mut bindings = vec![LdBindings::new()];
            for (name, values) in variables {
                bindings = bindings
                    .into_iter()
                    .flat_map(|binding| {
                        values.iter().map(move |value| {
                            let mut next = binding.clone();
                            next.insert(name.clone(), value.clone());
                            next
                        })
                    })
                    .collect();
            }
            bindings
        }
    }
}

/// Expands a `variables` mapping into bindings.
pub fn expand(
    declared: &Map<String, Value>,
    strategy: LdMatrixStrategy,
    dataset: Option<&LdDataset>,
    functions: &LdFunctionRegistry,
) -> Result<Vec<LdBindings>> {
    let variables = declared
        .iter()
        .map(|(name, value)| Ok((name.clone(), candidate_values(value, dataset, functions)?)))
        .collect::<Result<Vec<_>>>()?;
    Ok(combine(&variables, strategy))
}

/// Bounded pool running one job per binding.
#[derive(Clone, Copy, Debug)]
pub struct LdMatrixExecutor {
    workers: usize,
}

impl LdMatrixExecutor {
    #[allow(non_snake_case)]
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every job and waits for all of them. Results are in binding
    /// order; the first failure in that order is returned.
    pub fn run<T, F>(&self, bindings: Vec<LdBindings>, job: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(LdBindings) -> Result<T> + Send + Sync,
    {
        if bindings.is_empty() {
            return Ok(Vec::new());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers.min(bindings.len()))
            .build()
            .map_err(|e| LdError::internal(format!("unable to start matrix pool: {e}")))?;
        log::info!(
            "Running matrix of {} binding(s) on {} worker(s)",
            bindings.len(),
            self.workers.min(bindings.len())
        );
        let outcomes: Vec<Result<T>> =
            pool.install(|| bindings.into_par_iter().map(&job).collect());
        outcomes.into_iter().collect()
    }
}
