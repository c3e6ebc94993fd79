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

//! # Ladle Dataset Module
//!
//! [`LdDataset`] is the in-memory table every recipe step reads and writes.
//!
//! ## Design Principles
//!
//! - **Ordered columns**: column order is insertion order and is never
//!   rearranged implicitly; replacing a column keeps its position
//! - **Stable index**: every row carries an index label that survives
//!   filtering, so a filtered subset can be merged back into its source
//! - **Flexible cells**: cells are `serde_json::Value`, matching the values
//!   recipes and variables are written in
//!
//! ## Usage Example
//!
//! ```rust
//! use ladle::dataset::LdDataset;
//! use serde_json::json;
//!
//! let mut dataset = LdDataset::from_columns(vec![
//!     ("name".to_string(), vec![json!("a"), json!("b")]),
//! ]).unwrap();
//! dataset.set_column("score", vec![json!(1), json!(2)]).unwrap();
//! assert_eq!(dataset.columns(), &["name".to_string(), "score".to_string()]);
//! ```

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{LdError, Result};

/// One row as an ordered column → value mapping.
pub type LdRow = Map<String, Value>;

/// Timestamp used in place of missing date-like values.
pub const LD_EPOCH_TIMESTAMP: &str = "1970-01-01T00:00:00";

/// Relational join strategies supported by [`LdDataset::join`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LdJoinHow {
    Inner,
    Left,
    Right,
    Outer,
}

impl LdJoinHow {
    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "inner" => Ok(Self::Inner),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "outer" | "full" => Ok(Self::Outer),
            other => Err(LdError::validation(format!(
                "join 'how' must be one of inner, left, right, outer (got '{other}')"
            ))),
        }
    }
}

/// Ordered, named-column, row-indexed table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LdDataset {
    columns: Vec<String>,
    data: Vec<Vec<Value>>,
    index: Vec<usize>,
    #[serde(default)]
    date_columns: BTreeSet<String>,
}

impl LdDataset {
    /// Creates an empty dataset with no rows and no columns.
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from ordered `(name, values)` pairs.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut dataset = Self::new();
        for (name, values) in columns {
            if dataset.has_column(&name) {
                return Err(LdError::validation(format!("duplicate column '{name}'")));
            }
            dataset.set_column(&name, values)?;
        }
        Ok(dataset)
    }

    /// Builds a dataset from row mappings. Columns appear in first-seen order
    /// and absent cells are null.
    pub fn from_rows(rows: &[LdRow]) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for row in rows {
            for key in row.keys() {
                if !positions.contains_key(key) {
                    positions.insert(key.clone(), columns.len());
                    columns.push(key.clone());
                }
            }
        }

        let mut data = vec![Vec::with_capacity(rows.len()); columns.len()];
        for row in rows {
            for (position, name) in columns.iter().enumerate() {
                data[position].push(row.get(name).cloned().unwrap_or(Value::Null));
            }
        }

        Self {
            columns,
            data,
            index: (0..rows.len()).collect(),
            date_columns: BTreeSet::new(),
        }
    }

    /// Builds an empty dataset that only carries the given index labels.
    pub fn with_index(index: Vec<usize>) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[usize] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_position(name).is_some()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.column_position(name).map(|position| self.data[position].as_slice())
    }

    /// Column values, failing with `UnknownColumn` when absent.
    pub fn require_column(&self, name: &str) -> Result<&[Value]> {
        self.column(name).ok_or_else(|| LdError::unknown_column(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Vec<Value>> {
        let position = self.column_position(name)?;
        Some(&mut self.data[position])
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Value> {
        self.column(column).and_then(|values| values.get(row))
    }

    /// Inserts or replaces a column. Replacing keeps the column's position.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.columns.is_empty() && self.index.is_empty() {
            self.index = (0..values.len()).collect();
        }
        if values.len() != self.len() {
            return Err(LdError::validation(format!(
                "column '{name}' has {} values but the dataset has {} rows",
                values.len(),
                self.len()
            )));
        }
        match self.column_position(name) {
            Some(position) => self.data[position] = values,
            None => {
                self.columns.push(name.to_string());
                self.data.push(values);
            }
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> Result<Vec<Value>> {
        let position = self
            .column_position(name)
            .ok_or_else(|| LdError::unknown_column(name))?;
        self.columns.remove(position);
        self.date_columns.remove(name);
        Ok(self.data.remove(position))
    }

    /// Drops every named column, failing before any change if one is absent.
    pub fn drop_columns(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            self.require_column(name)?;
        }
        for name in names {
            self.drop_column(name)?;
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(LdError::validation(format!(
                "cannot rename '{from}' to '{to}': column already exists"
            )));
        }
        let position = self
            .column_position(from)
            .ok_or_else(|| LdError::unknown_column(from))?;
        self.columns[position] = to.to_string();
        if self.date_columns.remove(from) {
            self.date_columns.insert(to.to_string());
        }
        Ok(())
    }

    /// Projects the given columns in the given order.
    pub fn select(&self, columns: &[String]) -> Result<LdDataset> {
        let mut data = Vec::with_capacity(columns.len());
        for name in columns {
            data.push(self.require_column(name)?.to_vec());
        }
        Ok(LdDataset {
            columns: columns.to_vec(),
            data,
            index: self.index.clone(),
            date_columns: self
                .date_columns
                .iter()
                .filter(|name| columns.contains(name))
                .cloned()
                .collect(),
        })
    }

    /// Keeps the rows at the given positions, carrying their index labels.
    pub fn take_rows(&self, positions: &[usize]) -> LdDataset {
        LdDataset {
            columns: self.columns.clone(),
            data: self
                .data
                .iter()
                .map(|values| positions.iter().map(|&row| values[row].clone()).collect())
                .collect(),
            index: positions.iter().map(|&row| self.index[row]).collect(),
            date_columns: self.date_columns.clone(),
        }
    }

    /// Keeps rows whose mask entry is true.
    pub fn filter_mask(&self, mask: &[bool]) -> LdDataset {
        let positions: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(row, keep)| keep.then_some(row))
            .collect();
        self.take_rows(&positions)
    }

    pub fn row(&self, position: usize) -> LdRow {
        self.columns
            .iter()
            .zip(&self.data)
            .map(|(name, values)| (name.clone(), values[position].clone()))
            .collect()
    }

    pub fn rows(&self) -> Vec<LdRow> {
        (0..self.len()).map(|position| self.row(position)).collect()
    }

    /// Maps index labels to row positions.
    pub fn index_positions(&self) -> HashMap<usize, usize> {
        self.index
            .iter()
            .enumerate()
            .map(|(position, &label)| (label, position))
            .collect()
    }

    pub fn position_of_index(&self, label: usize) -> Option<usize> {
        self.index.iter().position(|&candidate| candidate == label)
    }

    pub fn reset_index(&mut self) {
        self.index = (0..self.len()).collect();
    }

    pub fn mark_date_column(&mut self, name: &str) {
        if self.has_column(name) {
            self.date_columns.insert(name.to_string());
        }
    }

    pub fn is_date_column(&self, name: &str) -> bool {
        self.date_columns.contains(name)
    }

    /// Distinct values of a column in order of first occurrence.
    pub fn unique_values(&self, name: &str) -> Result<Vec<Value>> {
        let mut seen = BTreeSet::new();
        let mut unique = Vec::new();
        for value in self.require_column(name)? {
            if seen.insert(value_key(value)) {
                unique.push(value.clone());
            }
        }
        Ok(unique)
    }

    /// Replaces every missing cell: date-like columns get the epoch
    /// timestamp, everything else the empty string.
    pub fn normalize_missing(&mut self) {
        for (name, values) in self.columns.iter().zip(self.data.iter_mut()) {
            let filler = if self.date_columns.contains(name) {
                Value::String(epoch_timestamp())
            } else {
                Value::String(String::new())
            };
            for value in values.iter_mut().filter(|value| value.is_null()) {
                *value = filler.clone();
            }
        }
    }

    /// Row-wise append. Columns are unioned in first-seen order, cells a
    /// source lacks are null, and the result gets a fresh index.
    pub fn union(&self, other: &LdDataset) -> LdDataset {
        let mut rows = self.rows();
        rows.extend(other.rows());
        let mut combined = LdDataset::from_rows(&rows);
        if rows.is_empty() {
            combined.columns = self.columns.clone();
            combined.data = vec![Vec::new(); combined.columns.len()];
            for name in &other.columns {
                if !combined.has_column(name) {
                    combined.columns.push(name.clone());
                    combined.data.push(Vec::new());
                }
            }
        }
        combined.date_columns = self
            .date_columns
            .union(&other.date_columns)
            .cloned()
            .collect();
        combined
    }

    /// Column-wise append, aligning rows by position. The shorter side is
    /// padded with nulls.
    pub fn concatenate(&self, other: &LdDataset) -> Result<LdDataset> {
        let rows = self.len().max(other.len());
        let mut combined = LdDataset::with_index((0..rows).collect());
        for source in [self, other] {
            for (name, values) in source.columns.iter().zip(&source.data) {
                if combined.has_column(name) {
                    return Err(LdError::validation(format!(
                        "cannot concatenate: column '{name}' appears in more than one source"
                    )));
                }
                let mut padded = values.clone();
                padded.resize(rows, Value::Null);
                combined.set_column(name, padded)?;
                if source.is_date_column(name) {
                    combined.mark_date_column(name);
                }
            }
        }
        Ok(combined)
    }

    /// Relational join on key columns. Key columns sharing a name on both
    /// sides are emitted once; other name collisions get `_x`/`_y` suffixes.
    pub fn join(
        &self,
        other: &LdDataset,
        left_on: &[String],
        right_on: &[String],
        how: LdJoinHow,
    ) -> Result<LdDataset> {
        if left_on.is_empty() || left_on.len() != right_on.len() {
            return Err(LdError::validation(
                "join requires left_on and right_on with the same, non-zero number of columns",
            ));
        }
        for name in left_on {
            self.require_column(name)?;
        }
        for name in right_on {
            other.require_column(name)?;
        }

        let shared_keys: Vec<(usize, usize)> = left_on
            .iter()
            .zip(right_on)
            .filter(|(left, right)| left == right)
            .filter_map(|(left, right)| {
                Some((self.column_position(left)?, other.column_position(right)?))
            })
            .collect();
        let skipped_right: BTreeSet<usize> = shared_keys.iter().map(|(_, right)| *right).collect();

        let mut output_names: Vec<String> = Vec::new();
        for name in &self.columns {
            let collides = other
                .columns
                .iter()
                .enumerate()
                .any(|(position, other_name)| other_name == name && !skipped_right.contains(&position));
            output_names.push(if collides { format!("{name}_x") } else { name.clone() });
        }
        let mut right_positions = Vec::new();
        for (position, name) in other.columns.iter().enumerate() {
            if skipped_right.contains(&position) {
                continue;
            }
            right_positions.push(position);
            output_names.push(if self.has_column(name) {
                format!("{name}_y")
            } else {
                name.clone()
            });
        }

        let left_keys = key_rows(self, left_on)?;
        let right_keys = key_rows(other, right_on)?;
        let mut right_lookup: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, key) in right_keys.iter().enumerate() {
            right_lookup.entry(key.as_str()).or_default().push(row);
        }
        let mut left_lookup: HashMap<&str, Vec<usize>> = HashMap::new();
        for (row, key) in left_keys.iter().enumerate() {
            left_lookup.entry(key.as_str()).or_default().push(row);
        }

        let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
        match how {
            LdJoinHow::Right => {
                for (right_row, key) in right_keys.iter().enumerate() {
                    match left_lookup.get(key.as_str()) {
                        Some(matches) => {
                            pairs.extend(matches.iter().map(|&left| (Some(left), Some(right_row))))
                        }
                        None => pairs.push((None, Some(right_row))),
                    }
                }
            }
            _ => {
                let mut matched_right = BTreeSet::new();
                for (left_row, key) in left_keys.iter().enumerate() {
                    match right_lookup.get(key.as_str()) {
                        Some(matches) => {
                            for &right_row in matches {
                                matched_right.insert(right_row);
                                pairs.push((Some(left_row), Some(right_row)));
                            }
                        }
                        None if how != LdJoinHow::Inner => pairs.push((Some(left_row), None)),
                        None => {}
                    }
                }
                if how == LdJoinHow::Outer {
                    pairs.extend(
                        (0..other.len())
                            .filter(|row| !matched_right.contains(row))
                            .map(|row| (None, Some(row))),
                    );
                }
            }
        }

        let mut data: Vec<Vec<Value>> = vec![Vec::with_capacity(pairs.len()); output_names.len()];
        for (left_row, right_row) in &pairs {
            for (position, values) in self.data.iter().enumerate() {
                let value = match left_row {
                    Some(row) => values[*row].clone(),
                    None => shared_keys
                        .iter()
                        .find(|(left, _)| *left == position)
                        .and_then(|(_, right)| right_row.map(|row| other.data[*right][row].clone()))
                        .unwrap_or(Value::Null),
                };
                data[position].push(value);
            }
            for (offset, &position) in right_positions.iter().enumerate() {
                let value = right_row
                    .map(|row| other.data[position][row].clone())
                    .unwrap_or(Value::Null);
                data[self.width() + offset].push(value);
            }
        }

        Ok(LdDataset {
            columns: output_names,
            data,
            index: (0..pairs.len()).collect(),
            date_columns: self
                .date_columns
                .union(&other.date_columns)
                .cloned()
                .collect(),
        })
    }
}

fn key_rows(dataset: &LdDataset, keys: &[String]) -> Result<Vec<String>> {
    let columns = keys
        .iter()
        .map(|name| dataset.require_column(name))
        .collect::<Result<Vec<_>>>()?;
    Ok((0..dataset.len())
        .map(|row| {
            columns
                .iter()
                .map(|values| value_key(&values[row]))
                .collect::<Vec<_>>()
                .join("\u{1f}")
        })
        .collect())
}

/// Stable textual key for hashing and de-duplicating cell values.
pub fn value_key(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

/// Renders a cell the way it is interpolated into text: strings verbatim,
/// null as empty, everything else as JSON.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    }
}

fn epoch_timestamp() -> String {
    chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|moment| moment.format("%Y-%m-%dT%H:%M:%S").to_string())
        .unwrap_or_else(|| LD_EPOCH_TIMESTAMP.to_string())
}
