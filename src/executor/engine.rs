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

//! Engine driver
//!
//! Ties a query to a storage fetcher: parse, derive the fetch request,
//! install the pipeline as the second-pass callback, then drain the
//! resulting iterator. The storage layer materializes the columns the
//! conditions name, runs the pipeline per spanset via the callback, and
//! fetches only metadata for the survivors.

use std::sync::Arc;

use crate::core::{Result, Spanset};
use crate::parser;
use crate::storage::{search_meta_conditions, FetchSpansRequest, SpansetFetcher};

use super::context::ExecutionContext;

/// Query execution engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Engine;

/// Result of executing a search query
#[derive(Debug)]
pub struct SearchResponse {
    /// Spansets surviving the full pipeline
    pub spansets: Vec<Spanset>,
    /// Bytes the storage layer read servicing the query
    pub bytes_read: u64,
}

impl Engine {
    /// Create a new engine
    pub fn new() -> Self {
        Self
    }

    /// Execute a query against the given fetcher
    ///
    /// Cancellation is checked at every spanset boundary; storage errors
    /// propagate unchanged.
    pub fn execute(
        &self,
        ctx: &ExecutionContext,
        query: &str,
        fetcher: &dyn SpansetFetcher,
    ) -> Result<SearchResponse> {
        let pipeline = parser::parse(query)?;

        let mut request = FetchSpansRequest {
            all_conditions: true,
            ..Default::default()
        };
        pipeline.extract_conditions(&mut request);

        // one pattern cache for the whole query, shared across the
        // per-spanset callback invocations and dropped with the request
        let eval_pipeline = pipeline.clone();
        let patterns = Arc::new(super::PatternCache::new());
        request.second_pass = Some(Arc::new(move |spanset: &Spanset| {
            eval_pipeline.evaluate_with(std::slice::from_ref(spanset), &patterns)
        }));
        request.second_pass_conditions = search_meta_conditions();

        let mut response = fetcher.fetch(ctx, request)?;

        let mut spansets = Vec::new();
        while let Some(spanset) = response.results.next(ctx)? {
            ctx.check_cancelled()?;
            spansets.push(spanset);
        }

        Ok(SearchResponse {
            spansets,
            bytes_read: (response.bytes_read)(),
        })
    }
}
