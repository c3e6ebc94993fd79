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

//! # Ladle Error Module
//!
//! This module defines the error types used throughout the Ladle recipe
//! engine for consistent error handling and reporting.
//!
//! ## Error Handling Philosophy
//!
//! - **Explicit Error Kinds**: Each [`LdErrorKind`] variant represents one
//!   category of failure, and callers match on [`LdError::kind`]
//! - **Enrichment keeps identity**: when a wrangle fails, the interpreter
//!   attaches a step location and a `Suggestion:` line to the error, but the
//!   kind stays exactly what the failing component raised
//! - **Serde Support**: Errors can be serialized for logging and persistence
//!
//! ## Usage
//!
//! ```rust
//! use ladle::errors::{LdError, LdErrorKind, Result};
//!
//! fn example(columns: &[String]) -> Result<()> {
//!     if columns.is_empty() {
//!         return Err(LdError::validation("no columns"));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Convenience result type used throughout Ladle.
pub type Result<T> = std::result::Result<T, LdError>;

/// The category of a failure.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum LdErrorKind {
    /// A `${name}` placeholder had no binding.
    #[error("variable '{name}' is not defined")]
    UnknownVariable { name: String },

    /// A non-optional column selector matched nothing.
    #[error("column '{column}' does not exist")]
    UnknownColumn { column: String },

    /// Declared inputs and outputs cannot be paired one to one.
    #[error("ambiguous output: {message}")]
    AmbiguousOutput { message: String },

    /// A network call failed at the transport level on its final attempt.
    #[error("transport error calling '{url}': {message}")]
    TransportError { url: String, message: String },

    /// Every attempt of a remote call ended without a successful response.
    #[error("no successful response from '{url}' after {attempts} attempt(s)")]
    NoResponse { url: String, attempts: u32 },

    /// A remote call was rejected with a non-retryable status.
    #[error("remote call failed with status {status} {reason}: {body}")]
    RemoteClientError {
        status: u16,
        reason: String,
        body: String,
    },

    /// A remote payload was neither a flat list nor a columns/data object.
    #[error("unexpected response format: {message}")]
    UnexpectedResponseFormat { message: String },

    /// A whole-dataset custom function returned something else.
    #[error("custom function '{function}' violated its contract: {message}")]
    CustomFunctionContractViolation { function: String, message: String },

    /// The step or merge path cannot be combined with a `where` clause.
    #[error("unsupported operation: {message}")]
    UnsupportedOperation { message: String },

    /// No built-in wrangle is registered under the key.
    #[error("unknown wrangle '{name}'")]
    UnknownWrangle { name: String },

    /// No connector is registered under the key.
    #[error("unknown connector '{name}'")]
    UnknownConnector { name: String },

    /// No custom function is registered under the name.
    #[error("custom function '{name}' is not registered")]
    UnknownFunction { name: String },

    /// Malformed recipe or step parameters.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// The recipe document could not be obtained or parsed.
    #[error("unable to load recipe: {message}")]
    RecipeLoad { message: String },

    /// A `where` predicate could not be parsed.
    #[error("invalid where clause: {message}")]
    WhereSyntax { message: String },

    /// Errors originating from filesystem IO.
    #[error("io error: {0}")]
    Io(String),

    /// Wrapper for serialization issues.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Catch-all variant for unexpected situations.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Canonical error for Ladle: a kind plus optional diagnostic enrichment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LdError {
    kind: LdErrorKind,
    location: Option<String>,
    suggestion: Option<String>,
}

impl LdError {
    pub fn new(kind: LdErrorKind) -> Self {
        Self {
            kind,
            location: None,
            suggestion: None,
        }
    }

    /// The failure category; unaffected by enrichment.
    pub fn kind(&self) -> &LdErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> LdErrorKind {
        self.kind
    }

    pub fn suggestion(&self) -> Option<&str> {
        self.suggestion.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn is_enriched(&self) -> bool {
        self.suggestion.is_some()
    }

    /// Attaches a location and a suggestion. The innermost enrichment wins so
    /// that nested recipes report the step that actually failed.
    pub fn enrich(mut self, location: impl Into<String>, suggestion: impl Into<String>) -> Self {
        if self.suggestion.is_none() {
            self.location = Some(location.into());
            self.suggestion = Some(suggestion.into());
        }
        self
    }

    /// Helper to construct simple validation errors.
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::Validation {
            message: message.into(),
        })
    }

    pub fn unknown_variable<T: Into<String>>(name: T) -> Self {
        Self::new(LdErrorKind::UnknownVariable { name: name.into() })
    }

    pub fn unknown_column<T: Into<String>>(column: T) -> Self {
        Self::new(LdErrorKind::UnknownColumn {
            column: column.into(),
        })
    }

    pub fn ambiguous_output<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::AmbiguousOutput {
            message: message.into(),
        })
    }

    pub fn unsupported<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::UnsupportedOperation {
            message: message.into(),
        })
    }

    pub fn unexpected_response<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::UnexpectedResponseFormat {
            message: message.into(),
        })
    }

    pub fn contract_violation(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LdErrorKind::CustomFunctionContractViolation {
            function: function.into(),
            message: message.into(),
        })
    }

    pub fn recipe_load<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::RecipeLoad {
            message: message.into(),
        })
    }

    pub fn where_syntax<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::WhereSyntax {
            message: message.into(),
        })
    }

    /// Helper to construct internal errors.
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::new(LdErrorKind::Internal(message.into()))
    }
}

impl fmt::Display for LdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{location}: ")?;
        }
        write!(f, "{}", self.kind)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }
        Ok(())
    }
}

impl std::error::Error for LdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<LdErrorKind> for LdError {
    fn from(kind: LdErrorKind) -> Self {
        LdError::new(kind)
    }
}

impl From<io::Error> for LdError {
    fn from(err: io::Error) -> Self {
        LdError::new(LdErrorKind::Io(err.to_string()))
    }
}

impl From<serde_json::Error> for LdError {
    fn from(err: serde_json::Error) -> Self {
        LdError::new(LdErrorKind::Serde(err.to_string()))
    }
}

impl From<serde_yaml::Error> for LdError {
    fn from(err: serde_yaml::Error) -> Self {
        LdError::new(LdErrorKind::Serde(err.to_string()))
    }
}

#[cfg(feature = "csv")]
impl From<csv::Error> for LdError {
    fn from(err: csv::Error) -> Self {
        LdError::new(LdErrorKind::Io(format!("csv error: {err}")))
    }
}

/// Diagnostic guidance for a failed wrangle, keyed by the error kind.
pub fn suggestion_for(kind: &LdErrorKind, wrangle: &str) -> String {
    match kind {
        LdErrorKind::UnknownVariable { name } => format!(
            "Define '{name}' in the variables passed to the recipe or in the environment, \
             or check the spelling of the ${{{name}}} placeholder."
        ),
        LdErrorKind::UnknownColumn { column } => format!(
            "Check that the column '{column}' exists at this point in the recipe. \
             Column names are case-sensitive; append '?' to make a selector optional."
        ),
        LdErrorKind::AmbiguousOutput { .. } => format!(
            "Check the format of the parameters for '{wrangle}'. When both input and output \
             are given as lists they must have the same length, \
             e.g. input: [col1, col2] with output: [col1_out, col2_out]."
        ),
        LdErrorKind::Validation { .. } => format!(
            "Check the parameters given to '{wrangle}' and their types."
        ),
        LdErrorKind::TransportError { .. } | LdErrorKind::NoResponse { .. } => {
            "Check your network connection and that the remote service is reachable, then retry."
                .to_string()
        }
        LdErrorKind::RemoteClientError { status, .. } if *status == 401 || *status == 403 => {
            "Check that your credentials are valid and permitted to use this service.".to_string()
        }
        LdErrorKind::RemoteClientError { .. } => format!(
            "The remote service rejected the request from '{wrangle}'. Check the parameters sent."
        ),
        LdErrorKind::UnexpectedResponseFormat { .. } => {
            "The remote service returned an unrecognised payload. Check the endpoint URL.".to_string()
        }
        LdErrorKind::CustomFunctionContractViolation { function, .. } => format!(
            "A custom function that accepts 'df' must return a dataset. Check the return value of '{function}'."
        ),
        LdErrorKind::UnsupportedOperation { .. } => format!(
            "Remove the 'where' parameter from '{wrangle}' or apply a filter step beforehand."
        ),
        LdErrorKind::UnknownWrangle { name } => format!(
            "'{name}' is not a known wrangle. Custom functions must be referenced as custom.<name>."
        ),
        LdErrorKind::UnknownFunction { name } => format!(
            "Register a function named '{name}' before running the recipe."
        ),
        LdErrorKind::WhereSyntax { .. } => {
            "Check the syntax of the where clause, e.g. where: \"col1 = 'value' AND col2 > 3\"."
                .to_string()
        }
        LdErrorKind::UnknownConnector { .. }
        | LdErrorKind::RecipeLoad { .. }
        | LdErrorKind::Io(_)
        | LdErrorKind::Serde(_)
        | LdErrorKind::Internal(_) => format!("Check the configuration of '{wrangle}'."),
    }
}
