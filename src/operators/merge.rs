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
use crate::dataset::{value_to_string, LdDataset};
use crate::errors::{LdError, Result};
use crate::operator::{params_object, selector_param, string_param, LdWrangle};
use crate::select::expand;

/// Joins the text of several columns into one.
#[derive(Debug)]
pub struct LdMergeConcatenate {
    input: Vec<String>,
    output: String,
    separator: String,
}

impl LdWrangle for LdMergeConcatenate {
    fn name(&self) -> &'static str {
        "merge.concatenate"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let columns = expand(dataset.columns(), &self.input)?;
        let sources = columns
            .iter()
            .map(|column| dataset.require_column(column))
            .collect::<Result<Vec<_>>>()?;
        let merged = (0..dataset.len())
            .map(|row| {
                let parts: Vec<String> = sources
                    .iter()
                    .map(|values| match &values[row] {
                        Value::Array(items) => items
                            .iter()
                            .map(value_to_string)
                            .collect::<Vec<_>>()
                            .join(&self.separator),
                        other => value_to_string(other),
                    })
                    .collect();
                Value::String(parts.join(&self.separator))
            })
            .collect();
        dataset.set_column(&self.output, merged)?;
        Ok(dataset)
    }
}

pub fn merge_concatenate_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "merge.concatenate")?;
    let input = selector_param(params, "input")?;
    if input.is_empty() {
        return Err(LdError::validation("merge.concatenate requires 'input'"));
    }
    let output = selector_param(params, "output")?;
    let output = match output.as_slice() {
        [single] => single.clone(),
        _ => {
            return Err(LdError::ambiguous_output(
                "merge.concatenate writes exactly one 'output' column",
            ))
        }
    };
    let separator = match params.get("char") {
        Some(_) => string_param(params, "char", "merge.concatenate")?,
        None => " ".to_string(),
    };
    Ok(Box::new(LdMergeConcatenate {
        input,
        output,
        separator,
    }))
}
