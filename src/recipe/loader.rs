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

//! Obtaining and parsing recipe documents.
//!
//! A recipe given as text is, in order of precedence:
//!
//! 1. a literal document, when it spans several lines
//! 2. a model id (`XXXXXXXX-XXXX-XXXX`) fetched from the [`LdModelSource`]
//! 3. an `http://` or `https://` URL
//! 4. a local file path, when the file exists
//! 5. otherwise a single-line literal document

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde_json::{Map, Value};

use crate::context::LdContext;
use crate::errors::{LdError, Result};

/// Resolves model ids to recipe text.
pub trait LdModelSource: Send + Sync {
    fn fetch(&self, model_id: &str) -> Result<String>;
}

/// A recipe as handed to the runner.
#[derive(Clone, Debug, PartialEq)]
pub enum LdRecipeInput {
    Text(String),
    Document(Value),
}

impl From<&str> for LdRecipeInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for LdRecipeInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&String> for LdRecipeInput {
    fn from(text: &String) -> Self {
        Self::Text(text.clone())
    }
}

impl From<Value> for LdRecipeInput {
    fn from(document: Value) -> Self {
        Self::Document(document)
    }
}

fn model_id_regex() -> &'static Regex {
    static MODEL_ID: OnceLock<Regex> = OnceLock::new();
    MODEL_ID.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9]{8}-[A-Za-z0-9]{4}-[A-Za-z0-9]{4}$").expect("model id pattern")
    })
}

pub fn is_model_id(text: &str) -> bool {
    model_id_regex().is_match(text.trim())
}

/// Loads and normalizes a recipe into a mapping.
pub fn load(input: &LdRecipeInput, context: &LdContext) -> Result<Value> {
    match input {
        LdRecipeInput::Document(document) => normalize(document.clone()),
        LdRecipeInput::Text(text) => parse_recipe(&recipe_text(text, context)?),
    }
}

fn recipe_text(text: &str, context: &LdContext) -> Result<String> {
    if text.contains('\n') {
        return Ok(text.to_string());
    }
    let trimmed = text.trim();

    if is_model_id(trimmed) {
        let source = context.model_source().ok_or_else(|| {
            LdError::recipe_load(format!(
                "'{trimmed}' looks like a model id but no model source is configured"
            ))
        })?;
        log::info!("Fetching recipe for model {trimmed}");
        return source.fetch(trimmed);
    }

    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        log::info!("Fetching recipe from {trimmed}");
        let timeout = Duration::from_secs(context.config().request_timeout_secs);
        let response = context
            .transport()
            .get(trimmed, timeout)
            .map_err(|message| LdError::recipe_load(format!("{trimmed}: {message}")))?;
        if !response.is_success() {
            return Err(LdError::recipe_load(format!(
                "{trimmed} returned {} {}",
                response.status, response.reason
            )));
        }
        return Ok(response.body);
    }

    if Path::new(trimmed).is_file() {
        return std::fs::read_to_string(trimmed)
            .map_err(|e| LdError::recipe_load(format!("{trimmed}: {e}")));
    }

    Ok(text.to_string())
}

/// Parses recipe text. YAML is accepted, which covers JSON too.
pub fn parse_recipe(text: &str) -> Result<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text)
        .map_err(|e| LdError::recipe_load(format!("invalid recipe document: {e}")))?;
    normalize(yaml_to_json(&yaml))
}

/// Checks the document is a mapping and folds `wrangle` into `wrangles`.
pub fn normalize(document: Value) -> Result<Value> {
    let mut recipe = match document {
        Value::Object(recipe) => recipe,
        Value::Null => Map::new(),
        Value::String(text) => {
            return Err(LdError::recipe_load(format!(
                "'{text}' is not a recipe, a known file or a URL"
            )))
        }
        other => {
            return Err(LdError::recipe_load(format!(
                "a recipe must be a mapping, got {other}"
            )))
        }
    };
    if let Some(steps) = recipe.remove("wrangle") {
        if recipe.contains_key("wrangles") {
            return Err(LdError::recipe_load(
                "a recipe cannot have both 'wrangle' and 'wrangles'",
            ));
        }
        recipe.insert("wrangles".to_string(), steps);
    }
    Ok(Value::Object(recipe))
}

/// Converts a YAML tree into JSON. Non-string keys are stringified.
pub fn yaml_to_json(yaml: &serde_yaml::Value) -> Value {
    match yaml {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(*b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            } else {
                Value::Null
            }
        }
        serde_yaml::Value::String(s) => Value::String(s.clone()),
        serde_yaml::Value::Sequence(seq) => Value::Array(seq.iter().map(yaml_to_json).collect()),
        serde_yaml::Value::Mapping(map) => {
            let mut obj = Map::new();
            for (k, v) in map {
                obj.insert(key_to_string(k), yaml_to_json(v));
            }
            Value::Object(obj)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_to_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}
