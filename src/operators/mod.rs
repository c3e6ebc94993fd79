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

//! # Operators Module
//!
//! The built-in wrangles, registered by dotted key in
//! [`LdWrangleRegistry`](crate::operator::LdWrangleRegistry).
//!
//! ## Wrangle Categories
//!
//! - **convert**: letter case and data type conversion
//! - **field**: copy, drop, rename, column and row selection, reindex
//! - **filter**: row filtering by where clause or column test
//! - **merge**: joining several columns into one
//! - **request**: remote calls, batched or one per row

pub mod convert;
pub mod field;
pub mod filter;
pub mod merge;
pub mod request;
