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

//! # Ladle Batch Module
//!
//! Chunked remote calls with bounded retry and exponential backoff.
//!
//! ## Retry Policy
//!
//! - Transport failures and 5xx responses are retried, waiting 1, 2, 4, …
//!   backoff units between attempts
//! - Any other non-2xx status fails immediately
//! - Chunks are sent strictly in order; a chunk is fully resolved before the
//!   next one starts
//!
//! ## Response Shapes
//!
//! A chunk response is either a flat JSON list or a `{columns, data}`
//! object. The first successful chunk decides which shape the whole call
//! accumulates.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::errors::{LdError, LdErrorKind, Result};

/// Raw result of one HTTP exchange.
#[derive(Clone, Debug, PartialEq)]
pub struct LdHttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: String,
}

impl LdHttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            reason: reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or_default()
                .to_string(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

/// Network boundary. `Err` means the exchange failed below HTTP.
pub trait LdTransport: Send + Sync {
    fn post_json(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &[(String, String)],
        payload: &Value,
        timeout: Duration,
    ) -> std::result::Result<LdHttpResponse, String>;

    fn get(&self, url: &str, timeout: Duration) -> std::result::Result<LdHttpResponse, String>;
}

/// Blocking reqwest transport.
#[derive(Clone, Debug, Default)]
pub struct LdHttpTransport {
    client: reqwest::blocking::Client,
}

impl LdHttpTransport {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    fn finish(
        response: reqwest::blocking::Response,
    ) -> std::result::Result<LdHttpResponse, String> {
        let status = response.status();
        let body = response.text().map_err(|e| e.to_string())?;
        Ok(LdHttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}

impl LdTransport for LdHttpTransport {
    fn post_json(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &[(String, String)],
        payload: &Value,
        timeout: Duration,
    ) -> std::result::Result<LdHttpResponse, String> {
        let mut request = self
            .client
            .post(url)
            .query(query)
            .json(payload)
            .timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().map_err(|e| e.to_string())?;
        Self::finish(response)
    }

    fn get(&self, url: &str, timeout: Duration) -> std::result::Result<LdHttpResponse, String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| e.to_string())?;
        Self::finish(response)
    }
}

/// Waits between retry attempts.
pub trait LdSleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LdThreadSleeper;

impl LdSleeper for LdThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Accumulated result of a batched call.
#[derive(Clone, Debug, PartialEq)]
pub enum LdBatchResult {
    Empty,
    Flat(Vec<Value>),
    Columnar {
        columns: Vec<String>,
        data: Vec<Vec<Value>>,
    },
}

impl LdBatchResult {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Flat(values) => values.len(),
            Self::Columnar { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// One value per input item. Columnar rows become objects keyed by the
    /// remembered columns.
    pub fn into_values(self) -> Vec<Value> {
        match self {
            Self::Empty => Vec::new(),
            Self::Flat(values) => values,
            Self::Columnar { columns, data } => data
                .into_iter()
                .map(|row| {
                    Value::Object(
                        columns
                            .iter()
                            .cloned()
                            .zip(row)
                            .collect::<Map<String, Value>>(),
                    )
                })
                .collect(),
        }
    }

    fn absorb(&mut self, payload: Value) -> Result<()> {
        match payload {
            Value::Array(items) => match self {
                Self::Empty => *self = Self::Flat(items),
                Self::Flat(values) => values.extend(items),
                Self::Columnar { .. } => return Err(mixed_shapes()),
            },
            Value::Object(object) => {
                let (columns, rows) = columnar_parts(&object)?;
                match self {
                    Self::Empty => {
                        *self = Self::Columnar {
                            columns,
                            data: rows,
                        }
                    }
                    Self::Columnar {
                        columns: known,
                        data,
                    } => {
                        *known = columns;
                        data.extend(rows);
                    }
                    Self::Flat(_) => return Err(mixed_shapes()),
                }
            }
            other => {
                return Err(LdError::unexpected_response(format!(
                    "expected a list or a columns/data object, got {}",
                    kind_name(&other)
                )))
            }
        }
        Ok(())
    }
}

fn mixed_shapes() -> LdError {
    LdError::unexpected_response("chunk responses mixed flat lists and columnar objects")
}

fn columnar_parts(object: &Map<String, Value>) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let columns = object
        .get("columns")
        .and_then(Value::as_array)
        .ok_or_else(|| LdError::unexpected_response("object response without a 'columns' list"))?
        .iter()
        .map(|column| match column {
            Value::String(name) => name.clone(),
            other => other.to_string(),
        })
        .collect();
    let rows = object
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| LdError::unexpected_response("object response without a 'data' list"))?
        .iter()
        .map(|row| {
            row.as_array()
                .cloned()
                .ok_or_else(|| LdError::unexpected_response("'data' rows must be lists"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok((columns, rows))
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// Target of a batched call.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LdBatchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl LdBatchRequest {
    #[allow(non_snake_case)]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Sequential chunking client with retry.
#[derive(Clone)]
pub struct LdBatchClient {
    transport: Arc<dyn LdTransport>,
    sleeper: Arc<dyn LdSleeper>,
    retries: u32,
    backoff_unit: Duration,
    timeout: Duration,
}

impl LdBatchClient {
    #[allow(non_snake_case)]
    pub fn new(transport: Arc<dyn LdTransport>) -> Self {
        Self {
            transport,
            sleeper: Arc::new(LdThreadSleeper),
            retries: 5,
            backoff_unit: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn LdSleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Sends `items` in chunks of `chunk_size` and accumulates the responses.
    /// No request is made for an empty input.
    pub fn call(
        &self,
        request: &LdBatchRequest,
        items: &[Value],
        chunk_size: usize,
    ) -> Result<LdBatchResult> {
        let mut result = LdBatchResult::Empty;
        if items.is_empty() {
            return Ok(result);
        }
        let chunk_size = chunk_size.max(1);
        let total = items.len().div_ceil(chunk_size);

        for (number, chunk) in items.chunks(chunk_size).enumerate() {
            log::debug!(
                "Sending chunk {}/{} ({} items) to {}",
                number + 1,
                total,
                chunk.len(),
                request.url
            );
            let payload = self.send(request, &Value::Array(chunk.to_vec()))?;
            result.absorb(payload)?;
        }
        Ok(result)
    }

    /// One POST with the retry policy applied; returns the parsed JSON body.
    pub fn send(&self, request: &LdBatchRequest, payload: &Value) -> Result<Value> {
        let attempts = self.retries + 1;
        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            match self.transport.post_json(
                &request.url,
                &request.query,
                &request.headers,
                payload,
                self.timeout,
            ) {
                Err(message) if last => {
                    return Err(LdError::new(LdErrorKind::TransportError {
                        url: request.url.clone(),
                        message,
                    }))
                }
                Err(message) => {
                    log::warn!(
                        "Request to {} failed ({}), attempt {}/{}",
                        request.url,
                        message,
                        attempt + 1,
                        attempts
                    );
                }
                Ok(response) if response.is_success() => {
                    return serde_json::from_str(&response.body).map_err(|e| {
                        LdError::unexpected_response(format!("response is not valid JSON: {e}"))
                    })
                }
                Ok(response) if response.is_server_error() => {
                    if last {
                        break;
                    }
                    log::warn!(
                        "Request to {} returned {}, attempt {}/{}",
                        request.url,
                        response.status,
                        attempt + 1,
                        attempts
                    );
                }
                Ok(response) => {
                    return Err(LdError::new(LdErrorKind::RemoteClientError {
                        status: response.status,
                        reason: response.reason,
                        body: response.body,
                    }))
                }
            }
            self.sleeper.sleep(self.backoff_unit * 2u32.saturating_pow(attempt));
        }
        Err(LdError::new(LdErrorKind::NoResponse {
            url: request.url.clone(),
            attempts,
        }))
    }
}

impl std::fmt::Debug for LdBatchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdBatchClient")
            .field("retries", &self.retries)
            .field("backoff_unit", &self.backoff_unit)
            .field("timeout", &self.timeout)
            .finish()
    }
}
