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

//! # Recipe Module
//!
//! Loading recipe documents and running them.
//!
//! - **loader**: literal text, files, URLs and model ids into a normalized
//!   recipe mapping
//! - **interpreter**: the read, wrangle and write stages with their hooks

pub mod interpreter;
pub mod loader;

pub use interpreter::{LdRecipeRunner, LdRunReport, LD_NO_WHERE_STEPS};
pub use loader::{is_model_id, load, parse_recipe, LdModelSource, LdRecipeInput};
