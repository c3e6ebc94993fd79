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

//! # Ladle Column Selector Module
//!
//! Expansion of user-written column selectors against the columns a dataset
//! actually has.
//!
//! ## Selector Grammar
//!
//! | Form | Meaning |
//! |------|---------|
//! | `name` | exact column name |
//! | `2`, `-1` | column at a position |
//! | `1:3`, `::2` | slice of the column list |
//! | `col_*` | wildcard, full match |
//! | `regex:^a.+$` | regular expression, full match |
//! | `-sel` | remove what `sel` matches |
//! | `sel?` | optional, silently ignored when nothing matches |
//!
//! Results keep the order in which selectors first matched a column.

use regex::Regex;
use serde_json::Value;

use crate::errors::{LdError, Result};

/// Reads a selector list from a step parameter: a single string, a number
/// or a list of either.
pub fn selectors_from_value(value: &Value) -> Result<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(text) => Ok(vec![text.clone()]),
        Value::Number(number) => Ok(vec![number.to_string()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => Ok(text.clone()),
                Value::Number(number) => Ok(number.to_string()),
                other => Err(LdError::validation(format!(
                    "column selectors must be strings or integers, got {other}"
                ))),
            })
            .collect(),
        other => Err(LdError::validation(format!(
            "column selectors must be a string or a list, got {other}"
        ))),
    }
}

/// Expands `selectors` against `all_columns`.
///
/// When every selector is negated, none is itself a column name and none
/// contains `:`, matching starts from the full column list.
pub fn expand(all_columns: &[String], selectors: &[String]) -> Result<Vec<String>> {
    let mut selected: Vec<String> = Vec::new();

    let all_negated = !selectors.is_empty()
        && selectors
            .iter()
            .all(|selector| is_negated(selector))
        && !selectors.iter().any(|selector| all_columns.contains(selector))
        && !selectors.iter().any(|selector| selector.contains(':'));
    if all_negated {
        selected.extend(all_columns.iter().cloned());
    }

    for raw in selectors {
        if all_columns.contains(raw) {
            push_unique(&mut selected, raw);
            continue;
        }

        let parsed = LdSelector::parse(raw)?;
        let matched = parsed.matches(all_columns)?;
        if matched.is_empty() {
            if parsed.optional {
                continue;
            }
            return Err(LdError::unknown_column(parsed.body.clone()));
        }

        if parsed.negated {
            selected.retain(|column| !matched.contains(column));
        } else {
            for column in &matched {
                push_unique(&mut selected, column);
            }
        }
    }

    Ok(selected)
}

/// Expands `selector → replacement` pairs into `column → new name` pairs.
///
/// Each `*` in the replacement is filled with the text the corresponding `*`
/// of the selector captured; `regex:` selectors may use `$1` or `\1`
/// references in the replacement.
pub fn expand_renames(
    all_columns: &[String],
    pairs: &[(String, String)],
) -> Result<Vec<(String, String)>> {
    let mut renames: Vec<(String, String)> = Vec::new();
    for (raw, replacement) in pairs {
        if all_columns.contains(raw) {
            push_rename(&mut renames, raw, replacement.clone());
            continue;
        }

        let parsed = LdSelector::parse(raw)?;
        let pattern = match &parsed.kind {
            LdSelectorKind::Wildcard(pattern) => Some((pattern, wildcard_references(replacement))),
            LdSelectorKind::Pattern(pattern) => Some((pattern, regex_references(replacement))),
            _ => None,
        };

        let matched = parsed.matches(all_columns)?;
        if matched.is_empty() {
            if parsed.optional {
                continue;
            }
            return Err(LdError::unknown_column(parsed.body.clone()));
        }

        for column in matched {
            let target = match &pattern {
                Some((regex, template)) => regex.replace(&column, template.as_str()).into_owned(),
                None => replacement.clone(),
            };
            push_rename(&mut renames, &column, target);
        }
    }
    Ok(renames)
}

fn push_unique(selected: &mut Vec<String>, column: &str) {
    if !selected.iter().any(|existing| existing == column) {
        selected.push(column.to_string());
    }
}

fn push_rename(renames: &mut Vec<(String, String)>, column: &str, target: String) {
    match renames.iter_mut().find(|(existing, _)| existing == column) {
        Some(entry) => entry.1 = target,
        None => renames.push((column.to_string(), target)),
    }
}

/// Rewrites each `*` of a replacement as the next positional group reference.
fn wildcard_references(replacement: &str) -> String {
    let mut group = 0;
    let mut output = String::with_capacity(replacement.len());
    for character in replacement.chars() {
        match character {
            '*' => {
                group += 1;
                output.push_str(&format!("${{{group}}}"));
            }
            '$' => output.push_str("$$"),
            other => output.push(other),
        }
    }
    output
}

/// Accepts `\1` style group references alongside the native `$1` form.
fn regex_references(replacement: &str) -> String {
    let mut output = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();
    while let Some(character) = chars.next() {
        if character == '\\' && chars.peek().is_some_and(|next| next.is_ascii_digit()) {
            let mut digits = String::new();
            while let Some(digit) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(digit);
                chars.next();
            }
            output.push_str(&format!("${{{digits}}}"));
        } else {
            output.push(character);
        }
    }
    output
}

#[derive(Debug)]
enum LdSelectorKind {
    Literal,
    Position(i64),
    Slice(Option<i64>, Option<i64>, Option<i64>),
    Wildcard(Regex),
    Pattern(Regex),
}

#[derive(Debug)]
struct LdSelector {
    body: String,
    negated: bool,
    optional: bool,
    kind: LdSelectorKind,
}

impl LdSelector {
    fn parse(raw: &str) -> Result<Self> {
        let mut body = raw;
        let negated = is_negated(body);
        if negated {
            body = &body[1..];
        }
        let optional = body.ends_with('?');
        if optional {
            body = &body[..body.len() - 1];
        }

        let kind = if let Some(pattern) = body.strip_prefix("regex:") {
            LdSelectorKind::Pattern(full_match(pattern).map_err(|e| {
                LdError::validation(format!("invalid selector pattern '{raw}': {e}"))
            })?)
        } else if body.contains('*') {
            let pattern = body
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join("(.*)");
            LdSelectorKind::Wildcard(full_match(&pattern).map_err(|e| {
                LdError::validation(format!("invalid wildcard selector '{raw}': {e}"))
            })?)
        } else if let Ok(position) = body.parse::<i64>() {
            LdSelectorKind::Position(position)
        } else if let Some((start, stop, step)) = parse_slice(body) {
            LdSelectorKind::Slice(start, stop, step)
        } else {
            LdSelectorKind::Literal
        };

        Ok(Self {
            body: body.to_string(),
            negated,
            optional,
            kind,
        })
    }

    fn matches(&self, all_columns: &[String]) -> Result<Vec<String>> {
        let len = all_columns.len() as i64;
        let matched = match &self.kind {
            LdSelectorKind::Literal => all_columns
                .iter()
                .filter(|column| **column == self.body)
                .cloned()
                .collect(),
            LdSelectorKind::Wildcard(regex) | LdSelectorKind::Pattern(regex) => all_columns
                .iter()
                .filter(|column| regex.is_match(column))
                .cloned()
                .collect(),
            LdSelectorKind::Position(position) => {
                let resolved = if *position < 0 { len + position } else { *position };
                if (0..len).contains(&resolved) {
                    vec![all_columns[resolved as usize].clone()]
                } else if self.optional {
                    Vec::new()
                } else {
                    return Err(LdError::unknown_column(format!(
                        "{} (position out of range for {} columns)",
                        self.body, len
                    )));
                }
            }
            LdSelectorKind::Slice(start, stop, step) => slice_positions(len, *start, *stop, *step)?
                .into_iter()
                .map(|position| all_columns[position].clone())
                .collect(),
        };
        Ok(matched)
    }
}

fn full_match(pattern: &str) -> std::result::Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

fn is_negated(text: &str) -> bool {
    text.starts_with('-') && !is_position(text) && !is_slice(text)
}

fn is_position(text: &str) -> bool {
    text.parse::<i64>().is_ok()
}

fn is_slice(text: &str) -> bool {
    parse_slice(text).is_some()
}

fn parse_slice(text: &str) -> Option<(Option<i64>, Option<i64>, Option<i64>)> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() < 2 || parts.len() > 3 {
        return None;
    }
    let mut bounds = parts.iter().map(|part| {
        let part = part.trim();
        if part.is_empty() {
            Some(None)
        } else {
            part.parse::<i64>().ok().map(Some)
        }
    });
    let start = bounds.next()??;
    let stop = bounds.next()??;
    let step = match bounds.next() {
        Some(step) => step?,
        None => None,
    };
    Some((start, stop, step))
}

/// Positions selected by a slice over `len` items.
fn slice_positions(
    len: i64,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Vec<usize>> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return Err(LdError::validation("slice step cannot be zero"));
    }
    let clamp = |bound: i64, low: i64, high: i64| {
        let bound = if bound < 0 { bound + len } else { bound };
        bound.clamp(low, high)
    };

    let mut positions = Vec::new();
    if step > 0 {
        let start = start.map_or(0, |bound| clamp(bound, 0, len));
        let stop = stop.map_or(len, |bound| clamp(bound, 0, len));
        let mut position = start;
        while position < stop {
            positions.push(position as usize);
            position += step;
        }
    } else {
        let start = start.map_or(len - 1, |bound| clamp(bound, -1, len - 1));
        let stop = stop.map_or(-1, |bound| clamp(bound, -1, len - 1));
        let mut position = start;
        while position > stop {
            positions.push(position as usize);
            position += step;
        }
    }
    Ok(positions)
}
