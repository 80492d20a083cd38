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

//! # Spanql - trace query engine
//!
//! Spanql parses and evaluates a small declarative query language over
//! distributed-tracing spans: boolean predicates against single spans,
//! set operations over spansets, and scalar aggregations with scalar
//! filters, composed into pipelines.
//!
//! ```text
//! { resource.service.name = "api" && duration > 100ms } | avg(duration) >= 250ms
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use spanql::core::{Attribute, Spanset, Static};
//! use spanql::executor::{Engine, ExecutionContext};
//! use spanql::storage::{InMemoryFetcher, InMemorySpan};
//!
//! let spansets = vec![Spanset {
//!     spans: vec![InMemorySpan::new(vec![1])
//!         .with_attribute(Attribute::new("foo"), Static::string("bar"))
//!         .build()],
//!     ..Default::default()
//! }];
//!
//! let fetcher = InMemoryFetcher::new(spansets);
//! let ctx = ExecutionContext::new();
//! let response = Engine::new()
//!     .execute(&ctx, "{ .foo = \"bar\" }", &fetcher)
//!     .unwrap();
//! assert_eq!(response.spansets.len(), 1);
//! ```
//!
//! ## Modules
//!
//! - [`core`] - values ([`Static`]), attributes, spans, errors
//! - [`parser`] - lexer, AST, and Pratt parser
//! - [`executor`] - predicate and pipeline evaluation, condition
//!   extraction, the engine driver
//! - [`storage`] - the fetch contract and an in-memory reference fetcher

pub mod core;
pub mod executor;
pub mod parser;
pub mod storage;

// Re-export main types for convenience
pub use crate::core::{
    AggregateOp, Attribute, AttributeScope, Error, Intrinsic, Kind, Op, Result, Span, SpanRef,
    Spanset, SpansetOp, Static, StaticType, Status,
};

// Re-export parser surface
pub use parser::{parse, ParseError, Pipeline};

// Re-export executor surface
pub use executor::{CancellationHandle, Engine, ExecutionContext, PatternCache, SearchResponse};

// Re-export storage contract
pub use storage::{
    extract_fetch_spans_request, extract_fetch_spans_request_with_metadata,
    search_meta_conditions, search_meta_conditions_without_duration, Condition, FetcherFn,
    FetchSpansRequest, FetchSpansResponse, InMemoryFetcher, InMemorySpan, SecondPassFn,
    SpansetFetcher, SpansetIterator,
};
