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

//! # Connectors Module
//!
//! Sources and destinations named in a recipe's `read`, `write` and `run`
//! sections.
//!
//! ## Bundled Connectors
//!
//! - **test**: generated rows for trying recipes out
//! - **file**: CSV, JSON and JSONL files chosen by extension
//! - **console**: logs a preview of the dataset
//!
//! Further connectors are registered on the [`LdContext`](crate::context::LdContext).

pub mod file;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::context::LdContext;
use crate::dataset::{value_to_string, LdDataset};
use crate::errors::{LdError, LdErrorKind, Result};

/// Connector contract. Connectors implement the directions they support.
pub trait LdConnector: Send + Sync {
    fn name(&self) -> &'static str;

    fn read(&self, params: &Map<String, Value>, context: &LdContext) -> Result<LdDataset> {
        let _ = (params, context);
        Err(LdError::unsupported(format!(
            "connector '{}' cannot be read from",
            self.name()
        )))
    }

    fn write(
        &self,
        dataset: &LdDataset,
        params: &Map<String, Value>,
        context: &LdContext,
    ) -> Result<()> {
        let _ = (dataset, params, context);
        Err(LdError::unsupported(format!(
            "connector '{}' cannot be written to",
            self.name()
        )))
    }

    /// Action executed from a `run` hook.
    fn run(&self, params: &Map<String, Value>, context: &LdContext) -> Result<()> {
        let _ = (params, context);
        Err(LdError::unsupported(format!(
            "connector '{}' has no run action",
            self.name()
        )))
    }
}

#[derive(Clone, Default)]
pub struct LdConnectorRegistry {
    connectors: HashMap<String, Arc<dyn LdConnector>>,
}

impl LdConnectorRegistry {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("test", Arc::new(test::LdTestConnector));
        registry.register("file", Arc::new(file::LdFileConnector));
        registry.register("console", Arc::new(LdConsoleConnector));
        registry
    }

    pub fn register(&mut self, name: &str, connector: Arc<dyn LdConnector>) {
        self.connectors.insert(name.to_string(), connector);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn LdConnector>> {
        self.connectors.get(name).ok_or_else(|| {
            LdError::new(LdErrorKind::UnknownConnector {
                name: name.to_string(),
            })
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }
}

impl std::fmt::Debug for LdConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.connectors.keys().collect();
        names.sort();
        f.debug_struct("LdConnectorRegistry")
            .field("connectors", &names)
            .finish()
    }
}

/// Logs the first rows of a dataset.
#[derive(Clone, Copy, Debug, Default)]
pub struct LdConsoleConnector;

impl LdConnector for LdConsoleConnector {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write(
        &self,
        dataset: &LdDataset,
        params: &Map<String, Value>,
        _context: &LdContext,
    ) -> Result<()> {
        let limit = params
            .get("rows")
            .and_then(Value::as_u64)
            .map(|rows| rows as usize)
            .unwrap_or(10);
        log::info!(
            "{} rows x {} columns: {}",
            dataset.len(),
            dataset.width(),
            dataset.columns().join(" | ")
        );
        for row in 0..dataset.len().min(limit) {
            let cells: Vec<String> = dataset
                .columns()
                .iter()
                .map(|column| dataset.cell(column, row).map(value_to_string).unwrap_or_default())
                .collect();
            log::info!("{}", cells.join(" | "));
        }
        Ok(())
    }

    fn run(&self, params: &Map<String, Value>, _context: &LdContext) -> Result<()> {
        let message = params
            .get("message")
            .map(value_to_string)
            .unwrap_or_default();
        log::info!("{message}");
        Ok(())
    }
}
