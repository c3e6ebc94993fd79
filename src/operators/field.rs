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

use serde_json::Value;

use crate::context::LdContext;
use crate::dataset::LdDataset;
use crate::errors::{LdError, Result};
use crate::operator::{input_output_pairs, params_object, selector_param, LdWrangle};
use crate::select::{expand, expand_renames};

/// Copies columns under new names.
#[derive(Debug)]
pub struct LdCopy {
    input: Vec<String>,
    output: Vec<String>,
}

impl LdWrangle for LdCopy {
    fn name(&self) -> &'static str {
        "copy"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        for (source, target) in input_output_pairs(&dataset, &self.input, &self.output, self.name())? {
            let values = dataset.require_column(&source)?.to_vec();
            dataset.set_column(&target, values)?;
        }
        Ok(dataset)
    }
}

pub fn copy_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "copy")?;
    let input = selector_param(params, "input")?;
    let output = selector_param(params, "output")?;
    if input.is_empty() || output.is_empty() {
        return Err(LdError::validation("copy requires 'input' and 'output'"));
    }
    Ok(Box::new(LdCopy { input, output }))
}

/// Removes the selected columns.
#[derive(Debug)]
pub struct LdDrop {
    columns: Vec<String>,
}

impl LdWrangle for LdDrop {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let columns = expand(dataset.columns(), &self.columns)?;
        dataset.drop_columns(&columns)?;
        Ok(dataset)
    }
}

pub fn drop_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "drop")?;
    let mut columns = selector_param(params, "columns")?;
    if columns.is_empty() {
        columns = selector_param(params, "input")?;
    }
    if columns.is_empty() {
        return Err(LdError::validation("drop requires 'columns'"));
    }
    Ok(Box::new(LdDrop { columns }))
}

/// Renames columns, either from `input`/`output` lists or from a
/// `selector: new name` mapping.
#[derive(Debug)]
pub struct LdRename {
    input: Vec<String>,
    output: Vec<String>,
    mapping: Vec<(String, String)>,
}

impl LdWrangle for LdRename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let renames = if self.mapping.is_empty() {
            input_output_pairs(&dataset, &self.input, &self.output, self.name())?
        } else {
            expand_renames(dataset.columns(), &self.mapping)?
        };
        for (from, to) in renames {
            dataset.rename_column(&from, &to)?;
        }
        Ok(dataset)
    }
}

pub fn rename_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "rename")?;
    let input = selector_param(params, "input")?;
    let output = selector_param(params, "output")?;
    let mapping = params
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "input" | "output" | "where" | "where_params"))
        .map(|(key, value)| match value {
            Value::String(name) => Ok((key.clone(), name.clone())),
            other => Err(LdError::validation(format!(
                "rename: new name for '{key}' must be a string, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    if mapping.is_empty() && (input.is_empty() || output.is_empty()) {
        return Err(LdError::validation(
            "rename requires 'input' and 'output', or a mapping of column to new name",
        ));
    }
    Ok(Box::new(LdRename {
        input,
        output,
        mapping,
    }))
}

/// Keeps only the selected columns, in selector order.
#[derive(Debug)]
pub struct LdSelectColumns {
    input: Vec<String>,
}

impl LdWrangle for LdSelectColumns {
    fn name(&self) -> &'static str {
        "select.columns"
    }

    fn apply(&self, dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let columns = expand(dataset.columns(), &self.input)?;
        dataset.select(&columns)
    }
}

pub fn select_columns_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "select.columns")?;
    let input = selector_param(params, "input")?;
    if input.is_empty() {
        return Err(LdError::validation("select.columns requires 'input'"));
    }
    Ok(Box::new(LdSelectColumns { input }))
}

/// Keeps the first `n` rows.
#[derive(Debug)]
pub struct LdSelectHead {
    n: usize,
}

impl LdWrangle for LdSelectHead {
    fn name(&self) -> &'static str {
        "select.head"
    }

    fn apply(&self, dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let positions: Vec<usize> = (0..dataset.len().min(self.n)).collect();
        Ok(dataset.take_rows(&positions))
    }
}

pub fn select_head_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "select.head")?;
    let n = params
        .get("n")
        .and_then(Value::as_u64)
        .ok_or_else(|| LdError::validation("select.head requires a whole number 'n'"))?;
    Ok(Box::new(LdSelectHead { n: n as usize }))
}

/// Renumbers the row index from zero.
#[derive(Debug)]
pub struct LdReindex;

impl LdWrangle for LdReindex {
    fn name(&self) -> &'static str {
        "reindex"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        dataset.reset_index();
        Ok(dataset)
    }
}

pub fn reindex_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    params_object(config, "reindex")?;
    Ok(Box::new(LdReindex))
}
