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

//! # Ladle Variable Module
//!
//! Substitution of `${name}` placeholders throughout a recipe tree.
//!
//! A string that is exactly one placeholder is replaced by the bound value
//! itself, keeping its type. If that value is a string holding a structured
//! document it is parsed and resolved recursively. A placeholder embedded in
//! surrounding text is stringified.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::dataset::value_to_string;
use crate::errors::{LdError, Result};
use crate::recipe::loader::yaml_to_json;

/// Ordered name → value bindings.
pub type LdBindings = Map<String, Value>;

/// Step keys whose parameters are resolved again at run time.
pub const LD_DEFERRED_STEPS: &[&str] = &["matrix", "recipe"];

/// Recipe sections holding step entries.
const STEP_SECTIONS: &[&str] = &["read", "wrangles", "wrangle", "write"];

/// Read entries whose `sources` are themselves read entries.
const COMBINED_READS: &[&str] = &["join", "union", "concatenate"];

fn placeholder_regex() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| Regex::new(r"\$\{([^{}]+)\}").expect("placeholder pattern"))
}

fn whole_placeholder_regex() -> &'static Regex {
    static WHOLE: OnceLock<Regex> = OnceLock::new();
    WHOLE.get_or_init(|| Regex::new(r"^\$\{([^{}]+)\}$").expect("placeholder pattern"))
}

/// Bindings seeded from the process environment.
pub fn environment_bindings() -> LdBindings {
    std::env::vars()
        .map(|(name, value)| (name, Value::String(value)))
        .collect()
}

/// Resolves every placeholder in `node`. Unknown names fail with
/// `UnknownVariable` unless `ignore_unknown` is set, in which case the
/// placeholder text is left in place.
pub fn resolve(node: &Value, bindings: &LdBindings, ignore_unknown: bool) -> Result<Value> {
    LdResolver::new(bindings).node(node, ignore_unknown)
}

/// Resolves a whole recipe. The `run` section and the parameters of
/// [`LD_DEFERRED_STEPS`] entries tolerate unknown names because they are
/// resolved again at run time.
pub fn resolve_recipe(recipe: &Value, bindings: &LdBindings) -> Result<Value> {
    let Value::Object(sections) = recipe else {
        return resolve(recipe, bindings, false);
    };
    let mut resolver = LdResolver::new(bindings);
    let mut resolved = Map::with_capacity(sections.len());
    for (key, value) in sections {
        let value = match key.as_str() {
            "run" => resolver.node(value, true)?,
            section if STEP_SECTIONS.contains(&section) => resolver.steps(value)?,
            _ => resolver.node(value, false)?,
        };
        resolved.insert(key.clone(), value);
    }
    Ok(Value::Object(resolved))
}

/// Resolves a list of step entries, or a single entry, such as a matrix
/// body or a hook phase.
pub fn resolve_steps(steps: &Value, bindings: &LdBindings) -> Result<Value> {
    LdResolver::new(bindings).steps(steps)
}

struct LdResolver<'a> {
    bindings: &'a LdBindings,
    // names whose structured values are being expanded
    expanding: Vec<String>,
}

impl<'a> LdResolver<'a> {
    fn new(bindings: &'a LdBindings) -> Self {
        Self {
            bindings,
            expanding: Vec::new(),
        }
    }

    fn steps(&mut self, steps: &Value) -> Result<Value> {
        match steps {
            Value::Array(entries) => entries
                .iter()
                .map(|entry| self.steps(entry))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(entry) => {
                let mut resolved = Map::with_capacity(entry.len());
                for (key, params) in entry {
                    let value = if LD_DEFERRED_STEPS.contains(&key.as_str()) {
                        self.node(params, true)?
                    } else if COMBINED_READS.contains(&key.as_str()) {
                        self.combined(params)?
                    } else {
                        self.node(params, false)?
                    };
                    resolved.insert(key.clone(), value);
                }
                Ok(Value::Object(resolved))
            }
            other => self.node(other, false),
        }
    }

    fn combined(&mut self, params: &Value) -> Result<Value> {
        let Value::Object(params) = params else {
            return self.node(params, false);
        };
        let mut resolved = Map::with_capacity(params.len());
        for (key, value) in params {
            let value = if key == "sources" {
                self.steps(value)?
            } else {
                self.node(value, false)?
            };
            resolved.insert(key.clone(), value);
        }
        Ok(Value::Object(resolved))
    }

    fn node(&mut self, node: &Value, ignore_unknown: bool) -> Result<Value> {
        match node {
            Value::String(text) => self.string(text, ignore_unknown),
            Value::Array(items) => items
                .iter()
                .map(|item| self.node(item, ignore_unknown))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, value) in map {
                    resolved.insert(key.clone(), self.node(value, ignore_unknown)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    fn string(&mut self, text: &str, ignore_unknown: bool) -> Result<Value> {
        let bindings = self.bindings;
        if let Some(captures) = whole_placeholder_regex().captures(text) {
            let name = &captures[1];
            return match bindings.get(name) {
                Some(Value::String(inner)) if looks_structured(inner) => {
                    match parse_structured(inner) {
                        Some(parsed) => self.expand(name, &parsed, ignore_unknown),
                        None => Ok(Value::String(inner.clone())),
                    }
                }
                Some(value) => Ok(value.clone()),
                None if ignore_unknown => Ok(Value::String(text.to_string())),
                None => Err(LdError::unknown_variable(name)),
            };
        }

        if !text.contains("${") {
            return Ok(Value::String(text.to_string()));
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for captures in placeholder_regex().captures_iter(text) {
            let token = captures.get(0).map(|m| (m.start(), m.end()));
            let Some((start, end)) = token else { continue };
            output.push_str(&text[last..start]);
            let name = &captures[1];
            match bindings.get(name) {
                Some(value) => output.push_str(&value_to_string(value)),
                None if ignore_unknown => output.push_str(&text[start..end]),
                None => return Err(LdError::unknown_variable(name)),
            }
            last = end;
        }
        output.push_str(&text[last..]);
        Ok(Value::String(output))
    }

    /// Resolves the parsed value of `name`, refusing cycles.
    fn expand(&mut self, name: &str, parsed: &Value, ignore_unknown: bool) -> Result<Value> {
        if self.expanding.iter().any(|open| open == name) {
            let mut chain = self.expanding.clone();
            chain.push(name.to_string());
            return Err(LdError::validation(format!(
                "variable '{name}' refers to itself: {}",
                chain.join(" -> ")
            )));
        }
        self.expanding.push(name.to_string());
        let resolved = self.node(parsed, ignore_unknown);
        self.expanding.pop();
        resolved
    }
}

fn looks_structured(text: &str) -> bool {
    let trimmed = text.trim_start();
    trimmed.starts_with('{')
        || trimmed.starts_with('[')
        || (text.contains(':') && text.contains('\n'))
}

/// Parses a structured document, keeping only mapping or sequence results.
fn parse_structured(text: &str) -> Option<Value> {
    let parsed: serde_yaml::Value = serde_yaml::from_str(text).ok()?;
    match yaml_to_json(&parsed) {
        value @ (Value::Object(_) | Value::Array(_)) => Some(value),
        _ => None,
    }
}
