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

//! Local file connector. The format follows the file extension:
//! `.csv`, `.json` (a list of row objects) or `.jsonl`/`.ndjson`.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde_json::{Map, Value};

use crate::connectors::LdConnector;
use crate::context::LdContext;
use crate::dataset::{value_to_string, LdDataset, LdRow};
use crate::errors::{LdError, Result};
use crate::operator::string_param;

/// Formats understood by the file connector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LdFileFormat {
    Csv,
    Json,
    Jsonl,
}

impl LdFileFormat {
    /// Infers the format from the file extension.
    pub fn detect(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path
            .as_ref()
            .extension()?
            .to_string_lossy()
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LdFileConnector;

impl LdFileConnector {
    fn format(path: &str) -> Result<LdFileFormat> {
        LdFileFormat::detect(path).ok_or_else(|| {
            LdError::validation(format!(
                "file: unable to detect the format of '{path}' from its extension"
            ))
        })
    }
}

impl LdConnector for LdFileConnector {
    fn name(&self) -> &'static str {
        "file"
    }

    fn read(&self, params: &Map<String, Value>, _context: &LdContext) -> Result<LdDataset> {
        let path = string_param(params, "name", "file")?;
        log::info!("Reading {path}");
        match Self::format(&path)? {
            LdFileFormat::Csv => load_csv(&path),
            LdFileFormat::Json => load_json(&path),
            LdFileFormat::Jsonl => load_jsonl(&path),
        }
    }

    fn write(
        &self,
        dataset: &LdDataset,
        params: &Map<String, Value>,
        _context: &LdContext,
    ) -> Result<()> {
        let path = string_param(params, "name", "file")?;
        log::info!("Writing {} rows to {path}", dataset.len());
        match Self::format(&path)? {
            LdFileFormat::Csv => write_csv(&path, dataset),
            LdFileFormat::Json => write_json(&path, dataset),
            LdFileFormat::Jsonl => write_jsonl(&path, dataset),
        }
    }
}

/// Loads a CSV file with a header row. Every cell is read as text.
#[cfg(feature = "csv")]
pub fn load_csv(path: impl AsRef<Path>) -> Result<LdDataset> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path.as_ref())?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (position, values) in columns.iter_mut().enumerate() {
            let cell = record.get(position).unwrap_or_default();
            values.push(Value::String(cell.to_string()));
        }
    }
    LdDataset::from_columns(headers.into_iter().zip(columns).collect())
}

#[cfg(not(feature = "csv"))]
pub fn load_csv(_path: impl AsRef<Path>) -> Result<LdDataset> {
    Err(LdError::validation("CSV support requires the 'csv' feature"))
}

#[cfg(feature = "csv")]
pub fn write_csv(path: impl AsRef<Path>, dataset: &LdDataset) -> Result<()> {
    let mut writer = csv::WriterBuilder::new().from_path(path.as_ref())?;
    writer.write_record(dataset.columns())?;
    for row in 0..dataset.len() {
        let cells: Vec<String> = dataset
            .columns()
            .iter()
            .map(|column| dataset.cell(column, row).map(value_to_string).unwrap_or_default())
            .collect();
        writer.write_record(&cells)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(not(feature = "csv"))]
pub fn write_csv(_path: impl AsRef<Path>, _dataset: &LdDataset) -> Result<()> {
    Err(LdError::validation("CSV support requires the 'csv' feature"))
}

/// Loads a JSON document holding a list of row objects.
pub fn load_json(path: impl AsRef<Path>) -> Result<LdDataset> {
    let file = File::open(path)?;
    let document: Value = serde_json::from_reader(BufReader::new(file))?;
    let rows = match document {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(position, item)| row_object(item, position + 1))
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(LdError::validation("JSON file must hold a list of row objects")),
    };
    Ok(LdDataset::from_rows(&rows))
}

pub fn write_json(path: impl AsRef<Path>, dataset: &LdDataset) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let rows: Vec<Value> = dataset.rows().into_iter().map(Value::Object).collect();
    serde_json::to_writer_pretty(&mut writer, &rows)?;
    writer.flush()?;
    Ok(())
}

/// Loads one row object per non-empty line.
pub fn load_jsonl(path: impl AsRef<Path>) -> Result<LdDataset> {
    let file = File::open(path)?;
    let rows = BufReader::new(file)
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| match line {
            Ok(content) if content.trim().is_empty() => None,
            Ok(content) => Some(
                serde_json::from_str::<Value>(&content)
                    .map_err(LdError::from)
                    .and_then(|value| row_object(value, idx + 1)),
            ),
            Err(err) => Some(Err(err.into())),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LdDataset::from_rows(&rows))
}

pub fn write_jsonl(path: impl AsRef<Path>, dataset: &LdDataset) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in dataset.rows() {
        serde_json::to_writer(&mut writer, &Value::Object(row))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn row_object(value: Value, line: usize) -> Result<LdRow> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(LdError::validation(format!(
            "row {line} must be an object, got {other}"
        ))),
    }
}
