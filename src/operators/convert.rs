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

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::LdContext;
use crate::dataset::{value_to_string, LdDataset};
use crate::errors::{LdError, Result};
use crate::operator::{input_output_pairs, params_object, selector_param, string_param, LdWrangle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LdCase {
    Lower,
    Upper,
    Title,
    Sentence,
}

impl LdCase {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "lower" => Ok(Self::Lower),
            "upper" => Ok(Self::Upper),
            "title" => Ok(Self::Title),
            "sentence" => Ok(Self::Sentence),
            other => Err(LdError::validation(format!(
                "convert.case: unknown case '{other}', expected lower, upper, title or sentence"
            ))),
        }
    }

    fn convert(self, text: &str) -> String {
        match self {
            Self::Lower => text.to_lowercase(),
            Self::Upper => text.to_uppercase(),
            Self::Title => {
                let mut output = String::with_capacity(text.len());
                let mut start_of_word = true;
                for character in text.chars() {
                    if character.is_alphanumeric() {
                        if start_of_word {
                            output.extend(character.to_uppercase());
                        } else {
                            output.extend(character.to_lowercase());
                        }
                        start_of_word = false;
                    } else {
                        output.push(character);
                        start_of_word = true;
                    }
                }
                output
            }
            Self::Sentence => {
                let lower = text.to_lowercase();
                match lower.char_indices().find(|(_, c)| c.is_alphabetic()) {
                    Some((position, first)) => {
                        let mut output = lower[..position].to_string();
                        output.extend(first.to_uppercase());
                        output.push_str(&lower[position + first.len_utf8()..]);
                        output
                    }
                    None => lower,
                }
            }
        }
    }
}

/// Changes the letter case of text columns.
#[derive(Debug)]
pub struct LdConvertCase {
    input: Vec<String>,
    output: Vec<String>,
    case: LdCase,
}

impl LdWrangle for LdConvertCase {
    fn name(&self) -> &'static str {
        "convert.case"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        for (source, target) in input_output_pairs(&dataset, &self.input, &self.output, self.name())? {
            let converted = dataset
                .require_column(&source)?
                .iter()
                .map(|value| match value {
                    Value::String(text) => Value::String(self.case.convert(text)),
                    other => other.clone(),
                })
                .collect();
            dataset.set_column(&target, converted)?;
        }
        Ok(dataset)
    }
}

pub fn convert_case_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "convert.case")?;
    let input = selector_param(params, "input")?;
    if input.is_empty() {
        return Err(LdError::validation("convert.case requires 'input'"));
    }
    let case = match params.get("case") {
        Some(_) => LdCase::parse(&string_param(params, "case", "convert.case")?)?,
        None => LdCase::Lower,
    };
    Ok(Box::new(LdConvertCase {
        input,
        output: selector_param(params, "output")?,
        case,
    }))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LdDataType {
    Str,
    Int,
    Float,
    Bool,
    Datetime,
}

impl LdDataType {
    fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "str" | "string" => Ok(Self::Str),
            "int" | "integer" => Ok(Self::Int),
            "float" | "number" => Ok(Self::Float),
            "bool" | "boolean" => Ok(Self::Bool),
            "datetime" | "date" => Ok(Self::Datetime),
            other => Err(LdError::validation(format!(
                "convert.data_type: unknown data type '{other}'"
            ))),
        }
    }

    fn convert(self, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let text = value_to_string(value);
        let invalid = || {
            LdError::validation(format!(
                "convert.data_type: cannot convert '{text}' to {self:?}"
            ))
        };
        match self {
            Self::Str => Ok(Value::String(text.clone())),
            Self::Int => match value {
                Value::Number(number) if number.is_i64() => Ok(value.clone()),
                Value::Bool(flag) => Ok(Value::from(i64::from(*flag))),
                _ => text
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|number| number.is_finite())
                    .map(|number| Value::from(number.trunc() as i64))
                    .ok_or_else(invalid),
            },
            Self::Float => text
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(invalid),
            Self::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "n" | "" => Ok(Value::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Datetime => {
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                parse_datetime(text.trim())
                    .map(|moment| Value::String(moment.format("%Y-%m-%dT%H:%M:%S").to_string()))
                    .ok_or_else(invalid)
            }
        }
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(moment) = NaiveDateTime::parse_from_str(text, format) {
            return Some(moment);
        }
    }
    for format in ["%Y-%m-%d", "%m/%d/%Y", "%d.%m.%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Casts column values to a target type.
#[derive(Debug)]
pub struct LdConvertDataType {
    input: Vec<String>,
    output: Vec<String>,
    data_type: LdDataType,
}

impl LdWrangle for LdConvertDataType {
    fn name(&self) -> &'static str {
        "convert.data_type"
    }

    fn apply(&self, mut dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        for (source, target) in input_output_pairs(&dataset, &self.input, &self.output, self.name())? {
            let converted = dataset
                .require_column(&source)?
                .iter()
                .map(|value| self.data_type.convert(value))
                .collect::<Result<Vec<_>>>()?;
            dataset.set_column(&target, converted)?;
            if self.data_type == LdDataType::Datetime {
                dataset.mark_date_column(&target);
            }
        }
        Ok(dataset)
    }
}

pub fn convert_data_type_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "convert.data_type")?;
    let input = selector_param(params, "input")?;
    if input.is_empty() {
        return Err(LdError::validation("convert.data_type requires 'input'"));
    }
    let data_type = LdDataType::parse(&string_param(params, "data_type", "convert.data_type")?)?;
    Ok(Box::new(LdConvertDataType {
        input,
        output: selector_param(params, "output")?,
        data_type,
    }))
}
