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

//! Execution context shared by a recipe run, its nested recipes and its
//! matrix workers. Every member is behind an `Arc`, so cloning is cheap and
//! nothing in the context is mutated once a run starts.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::{LdBatchClient, LdHttpTransport, LdSleeper, LdThreadSleeper, LdTransport};
use crate::connectors::{LdConnector, LdConnectorRegistry};
use crate::custom::LdFunctionRegistry;
use crate::operator::{LdWrangleFactory, LdWrangleRegistry};
use crate::recipe::loader::LdModelSource;

#[derive(Clone)]
pub struct LdContext {
    config: Arc<LdContextConfig>,
    functions: Arc<LdFunctionRegistry>,
    wrangles: Arc<LdWrangleRegistry>,
    connectors: Arc<LdConnectorRegistry>,
    model_source: Option<Arc<dyn LdModelSource>>,
    transport: Arc<dyn LdTransport>,
    sleeper: Arc<dyn LdSleeper>,
}

impl LdContext {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::new_with_config(LdContextConfig::default())
    }

    #[allow(non_snake_case)]
    pub fn new_with_config(config: LdContextConfig) -> Self {
        Self {
            config: Arc::new(config),
            functions: Arc::new(LdFunctionRegistry::new()),
            wrangles: Arc::new(LdWrangleRegistry::with_defaults()),
            connectors: Arc::new(LdConnectorRegistry::with_defaults()),
            model_source: None,
            transport: Arc::new(LdHttpTransport::new()),
            sleeper: Arc::new(LdThreadSleeper),
        }
    }

    pub fn with_functions(mut self, functions: LdFunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn LdTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn LdSleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_model_source(mut self, source: Arc<dyn LdModelSource>) -> Self {
        self.model_source = Some(source);
        self
    }

    pub fn with_connector(mut self, name: &str, connector: Arc<dyn LdConnector>) -> Self {
        Arc::make_mut(&mut self.connectors).register(name, connector);
        self
    }

    pub fn with_wrangle(mut self, name: &str, factory: LdWrangleFactory) -> Self {
        Arc::make_mut(&mut self.wrangles).register(name, factory);
        self
    }

    pub fn config(&self) -> &LdContextConfig {
        &self.config
    }

    pub fn functions(&self) -> &LdFunctionRegistry {
        &self.functions
    }

    pub fn wrangles(&self) -> &LdWrangleRegistry {
        &self.wrangles
    }

    pub fn connectors(&self) -> &LdConnectorRegistry {
        &self.connectors
    }

    pub fn model_source(&self) -> Option<&dyn LdModelSource> {
        self.model_source.as_deref()
    }

    pub fn transport(&self) -> &Arc<dyn LdTransport> {
        &self.transport
    }

    /// Batching client configured from this context.
    pub fn batch_client(&self) -> LdBatchClient {
        LdBatchClient::new(self.transport.clone())
            .with_sleeper(self.sleeper.clone())
            .with_retries(self.config.request_retries)
            .with_backoff_unit(Duration::from_millis(self.config.backoff_unit_ms))
            .with_timeout(Duration::from_secs(self.config.request_timeout_secs))
    }
}

impl Default for LdContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LdContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdContext")
            .field("config", &self.config)
            .field("functions", &self.functions.names())
            .field("has_model_source", &self.model_source.is_some())
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdContextConfig {
    pub matrix_workers: usize,
    pub request_retries: u32,
    pub backoff_unit_ms: u64,
    pub request_timeout_secs: u64,
    pub batch_size: usize,
    pub include_environment: bool,
}

impl Default for LdContextConfig {
    fn default() -> Self {
        Self {
            matrix_workers: 10,
            request_retries: 5,
            backoff_unit_ms: 1000,
            request_timeout_secs: 60,
            batch_size: 1000,
            include_environment: true,
        }
    }
}

impl LdContextConfig {
    #[allow(non_snake_case)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with any `LADLE_*` environment settings.
    pub fn from_env() -> Self {
        fn read<T: std::str::FromStr>(name: &str) -> Option<T> {
            let raw = std::env::var(name).ok()?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring {name}={raw}: not a valid number");
                    None
                }
            }
        }

        let mut config = Self::default();
        if let Some(workers) = read("LADLE_MATRIX_WORKERS") {
            config.matrix_workers = workers;
        }
        if let Some(retries) = read("LADLE_REQUEST_RETRIES") {
            config.request_retries = retries;
        }
        if let Some(unit) = read("LADLE_BACKOFF_UNIT_MS") {
            config.backoff_unit_ms = unit;
        }
        if let Some(timeout) = read("LADLE_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = timeout;
        }
        config
    }

    pub fn matrix_workers(mut self, workers: usize) -> Self {
        self.matrix_workers = workers.max(1);
        self
    }

    pub fn request_retries(mut self, retries: u32) -> Self {
        self.request_retries = retries;
        self
    }

    pub fn backoff_unit_ms(mut self, unit: u64) -> Self {
        self.backoff_unit_ms = unit;
        self
    }

    pub fn request_timeout_secs(mut self, timeout: u64) -> Self {
        self.request_timeout_secs = timeout;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn include_environment(mut self, include: bool) -> Self {
        self.include_environment = include;
        self
    }
}
