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

//! Wrangles backed by a remote service.
//!
//! `request.batch` sends a whole column through the batching client, one
//! chunk at a time. `request.row` sends one request per row on a bounded
//! worker pool and puts the answers back in row order. The pool is as wide
//! as `threads`, or the CPU count capped at the matrix width.

use rayon::prelude::*;
use serde_json::{Map, Value};

use crate::batch::LdBatchRequest;
use crate::context::LdContext;
use crate::dataset::{value_to_string, LdDataset};
use crate::errors::{LdError, Result};
use crate::operator::{params_object, selector_param, string_param, LdWrangle};
use crate::select::expand;

fn build_request(params: &Map<String, Value>, name: &str) -> Result<LdBatchRequest> {
    let mut request = LdBatchRequest::new(string_param(params, "url", name)?);
    for (entry, value) in string_pairs(params, "params", name)? {
        request = request.query(entry, value);
    }
    for (entry, value) in string_pairs(params, "headers", name)? {
        request = request.header(entry, value);
    }
    Ok(request)
}

/// Entries of an optional mapping parameter, values stringified.
fn string_pairs(params: &Map<String, Value>, key: &str, name: &str) -> Result<Vec<(String, String)>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Object(entries)) => Ok(entries
            .iter()
            .map(|(entry, value)| (entry.clone(), value_to_string(value)))
            .collect()),
        Some(other) => Err(LdError::validation(format!(
            "{name}: '{key}' must be a mapping, got {other}"
        ))),
    }
}

/// Writes remote results into the output columns. With several outputs each
/// result must be an object and each column takes the field of its name.
fn write_results(
    dataset: &mut LdDataset,
    output: &[String],
    results: Vec<Value>,
    name: &str,
) -> Result<()> {
    if results.len() != dataset.len() {
        return Err(LdError::unexpected_response(format!(
            "{name} received {} results for {} rows",
            results.len(),
            dataset.len()
        )));
    }
    if let [single] = output {
        return dataset.set_column(single, results);
    }
    for column in output {
        let values = results
            .iter()
            .map(|result| match result {
                Value::Object(fields) => Ok(fields.get(column).cloned().unwrap_or(Value::Null)),
                other => Err(LdError::unexpected_response(format!(
                    "{name} expected objects to fill {output:?}, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>>>()?;
        dataset.set_column(column, values)?;
    }
    Ok(())
}

#[derive(Debug)]
pub struct LdRequestBatch {
    request: LdBatchRequest,
    input: Vec<String>,
    output: Vec<String>,
    batch_size: Option<usize>,
}

impl LdWrangle for LdRequestBatch {
    fn name(&self) -> &'static str {
        "request.batch"
    }

    fn apply(&self, mut dataset: LdDataset, context: &LdContext) -> Result<LdDataset> {
        let columns = expand(dataset.columns(), &self.input)?;
        let [column] = columns.as_slice() else {
            return Err(LdError::ambiguous_output(format!(
                "request.batch sends exactly one 'input' column, got {columns:?}"
            )));
        };
        let items = dataset.require_column(column)?.to_vec();
        let chunk_size = self.batch_size.unwrap_or(context.config().batch_size);
        let results = context
            .batch_client()
            .call(&self.request, &items, chunk_size)?
            .into_values();
        write_results(&mut dataset, &self.output, results, self.name())?;
        Ok(dataset)
    }
}

pub fn request_batch_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "request.batch")?;
    let input = selector_param(params, "input")?;
    let output = selector_param(params, "output")?;
    if input.is_empty() || output.is_empty() {
        return Err(LdError::validation("request.batch requires 'input' and 'output'"));
    }
    Ok(Box::new(LdRequestBatch {
        request: build_request(params, "request.batch")?,
        input,
        output,
        batch_size: params
            .get("batch_size")
            .and_then(Value::as_u64)
            .map(|size| size.max(1) as usize),
    }))
}

#[derive(Debug)]
pub struct LdRequestRow {
    request: LdBatchRequest,
    input: Vec<String>,
    output: Vec<String>,
    threads: Option<usize>,
}

impl LdWrangle for LdRequestRow {
    fn name(&self) -> &'static str {
        "request.row"
    }

    fn apply(&self, mut dataset: LdDataset, context: &LdContext) -> Result<LdDataset> {
        let columns = expand(dataset.columns(), &self.input)?;
        let payloads: Vec<Value> = (0..dataset.len())
            .map(|row| {
                let fields: Map<String, Value> = columns
                    .iter()
                    .map(|column| {
                        let value = dataset.cell(column, row).cloned().unwrap_or(Value::Null);
                        (column.clone(), value)
                    })
                    .collect();
                Value::Object(fields)
            })
            .collect();

        let threads = self
            .threads
            .unwrap_or_else(|| num_cpus::get().min(context.config().matrix_workers))
            .max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| LdError::internal(format!("unable to start worker pool: {e}")))?;
        let client = context.batch_client();
        log::debug!(
            "request.row: {} requests on {} worker(s)",
            payloads.len(),
            threads
        );

        // results stay in row order regardless of completion order
        let answers: Vec<Result<Value>> = pool.install(|| {
            payloads
                .par_iter()
                .map(|payload| client.send(&self.request, payload))
                .collect()
        });
        let results = answers.into_iter().collect::<Result<Vec<_>>>()?;
        write_results(&mut dataset, &self.output, results, self.name())?;
        Ok(dataset)
    }
}

pub fn request_row_factory(config: &Value) -> Result<Box<dyn LdWrangle + Send + Sync>> {
    let params = params_object(config, "request.row")?;
    let input = selector_param(params, "input")?;
    let output = selector_param(params, "output")?;
    if input.is_empty() || output.is_empty() {
        return Err(LdError::validation("request.row requires 'input' and 'output'"));
    }
    Ok(Box::new(LdRequestRow {
        request: build_request(params, "request.row")?,
        input,
        output,
        threads: params
            .get("threads")
            .and_then(Value::as_u64)
            .map(|threads| threads as usize),
    }))
}
