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
use crate::dataset::{value_key, value_to_string, LdDataset};
use crate::errors::{LdError, Result};
use crate::operator::{params_object, selector_param, LdWrangle};
use crate::select::expand;
use crate::where_clause::LdWhereClause;

/// Row test applied to a single column.
#[derive(Clone, Debug, PartialEq)]
pub enum LdColumnTest {
    Equal(Vec<Value>),
    NotEqual(Vec<Value>),
    Contains(String),
    IsIn(Vec<Value>),
}

impl LdColumnTest {
    fn keep(&self, value: &Value) -> bool {
        let matches_any = |candidates: &[Value]| {
            let key = value_key(value);
            candidates.iter().any(|candidate| value_key(candidate) == key)
        };
        match self {
            Self::Equal(candidates) | Self::IsIn(candidates) => matches_any(candidates),
            Self::NotEqual(candidates) => !matches_any(candidates),
            Self::Contains(needle) => value_to_string(value).contains(needle.as_str()),
        }
    }
}

/// Keeps rows matching a where clause and/or a column test. The surviving
/// rows keep their index labels.
#[derive(Debug)]
pub struct LdFilter {
    clause: Option<LdWhereClause>,
    where_params: Value,
    input: Vec<String>,
    test: Option<LdColumnTest>,
}

impl LdWrangle for LdFilter {
    fn name(&self) -> &'static str {
        "filter"
    }

    fn apply(&self, dataset: LdDataset, _context: &LdContext) -> Result<LdDataset> {
        let mut mask = match &self.clause {
            Some(clause) => clause.evaluate(&dataset, &self.where_params)?,
            None => vec![true; dataset.len()],
        };

        if let Some(test) = &self.test {
            let columns = expand(dataset.columns(), &self.input)?;
            for column in columns {
                let values = dataset.require_column(&column)?;
                for (keep, value) in mask.iter_mut().zip(values) {
                    *keep = *keep && test.keep(value);
                }
            }
        }
        Ok(dataset.filter_mask(&mask))
    }

    fn consumes_where(&self) -> bool {
        true
    }
}

fn as_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

pub fn filter_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "filter")?;
    let clause = match params.get("where") {
        Some(Value::String(text)) => Some(LdWhereClause::parse(text)?),
        Some(other) => {
            return Err(LdError::validation(format!(
                "filter: 'where' must be a string, got {other}"
            )))
        }
        None => None,
    };

    let test = if let Some(value) = params.get("equal") {
        Some(LdColumnTest::Equal(as_list(value)))
    } else if let Some(value) = params.get("not_equal") {
        Some(LdColumnTest::NotEqual(as_list(value)))
    } else if let Some(value) = params.get("contains") {
        Some(LdColumnTest::Contains(value_to_string(value)))
    } else {
        params
            .get("is_in")
            .map(|value| LdColumnTest::IsIn(as_list(value)))
    };

    let input = selector_param(params, "input")?;
    if test.is_some() && input.is_empty() {
        return Err(LdError::validation("filter requires 'input' with a column test"));
    }
    if clause.is_none() && test.is_none() {
        return Err(LdError::validation(
            "filter requires 'where' or one of equal, not_equal, contains, is_in",
        ));
    }

    Ok(Box::new(LdFilter {
        clause,
        where_params: params.get("where_params").cloned().unwrap_or(Value::Null),
        input,
        test,
    }))
}
