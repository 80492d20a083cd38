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

//! Core types of the query language
//!
//! This module contains the fundamental types used throughout the engine:
//!
//! - [`Static`] - tagged immutable values with coercion semantics
//! - [`Attribute`] - scoped attribute keys and intrinsics
//! - [`Span`] / [`Spanset`] - the records the engine evaluates
//! - [`Op`], [`SpansetOp`], [`AggregateOp`] - operator vocabulary
//! - [`Error`] - error types for parsing and execution

pub mod attribute;
pub mod error;
pub mod span;
pub mod types;
pub mod value;

// Re-export main types for convenience
pub use attribute::{Attribute, AttributeScope, Intrinsic};
pub use error::{Error, Result};
pub use span::{hex_encode, Span, SpanRef, Spanset};
pub use types::{AggregateOp, Op, SpansetOp, StaticType};
pub use value::{format_duration, parse_duration, Kind, Static, Status};
