// Copyright 2025 Spanql Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Query executor
//!
//! - [`context`] - per-query cancellation
//! - [`evaluator`] - span-level expression evaluation
//! - [`pipeline`] - spanset pipeline stages
//! - [`conditions`] - storage condition extraction
//! - [`pattern_cache`] - query-scoped compiled regex cache
//! - [`engine`] - end-to-end query driver

pub mod conditions;
pub mod context;
pub mod engine;
pub mod evaluator;
pub mod pattern_cache;
pub mod pipeline;

pub use context::{CancellationHandle, ExecutionContext};
pub use engine::{Engine, SearchResponse};
pub use pattern_cache::PatternCache;
