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

//! In-memory reference implementation of the storage contract
//!
//! Holds fully materialized spansets, so conditions need no handling
//! beyond the time-range bounds; every attribute is already present.
//! The second-pass callback is honored per spanset exactly as the
//! contract describes, which makes this the fixture of choice for engine
//! tests and the CLI.

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::core::{Attribute, Result, Span, SpanRef, Spanset, Static};
use crate::executor::ExecutionContext;

use super::{FetchSpansRequest, FetchSpansResponse, SecondPassFn, SpansetFetcher, SpansetIterator};

/// A span owning its data
#[derive(Debug, Clone, Default)]
pub struct InMemorySpan {
    id: Vec<u8>,
    attributes: FxHashMap<Attribute, Static>,
    start_time_unix_nanos: u64,
    duration_nanos: u64,
}

impl InMemorySpan {
    /// Create a span with the given id
    pub fn new(id: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Attach an attribute
    pub fn with_attribute(mut self, attribute: Attribute, value: Static) -> Self {
        self.attributes.insert(attribute, value);
        self
    }

    /// Set the start time
    pub fn with_start_time(mut self, unix_nanos: u64) -> Self {
        self.start_time_unix_nanos = unix_nanos;
        self
    }

    /// Set the duration
    pub fn with_duration(mut self, nanos: u64) -> Self {
        self.duration_nanos = nanos;
        self
    }

    /// Finish into a shareable span reference
    pub fn build(self) -> SpanRef {
        Arc::new(self)
    }
}

impl Span for InMemorySpan {
    fn attributes(&self) -> &FxHashMap<Attribute, Static> {
        &self.attributes
    }

    fn id(&self) -> &[u8] {
        &self.id
    }

    fn start_time_unix_nanos(&self) -> u64 {
        self.start_time_unix_nanos
    }

    fn duration_nanos(&self) -> u64 {
        self.duration_nanos
    }
}

/// Fetcher serving prepared spansets from memory
#[derive(Default)]
pub struct InMemoryFetcher {
    spansets: Vec<Spanset>,
}

impl InMemoryFetcher {
    /// Create a fetcher over the given spansets
    pub fn new(spansets: Vec<Spanset>) -> Self {
        Self { spansets }
    }
}

impl SpansetFetcher for InMemoryFetcher {
    fn fetch(
        &self,
        _ctx: &ExecutionContext,
        request: FetchSpansRequest,
    ) -> Result<FetchSpansResponse> {
        let bounded = (request.start_time_unix_nanos, request.end_time_unix_nanos) != (0, 0);
        let pending: Vec<Spanset> = self
            .spansets
            .iter()
            .filter(|ss| {
                !bounded
                    || (ss.start_time_unix_nanos >= request.start_time_unix_nanos
                        && ss.start_time_unix_nanos < request.end_time_unix_nanos)
            })
            .cloned()
            .collect();

        let bytes = Arc::new(AtomicU64::new(0));
        let iterator = InMemoryIterator {
            pending: pending.into_iter().collect(),
            ready: Vec::new(),
            second_pass: request.second_pass.clone(),
            bytes: bytes.clone(),
        };

        Ok(FetchSpansResponse {
            results: Box::new(iterator),
            bytes_read: Box::new(move || bytes.load(Ordering::Relaxed)),
        })
    }
}

struct InMemoryIterator {
    /// First-pass spansets not yet surfaced
    pending: std::collections::VecDeque<Spanset>,
    /// Second-pass output waiting to be drained, in order
    ready: Vec<Spanset>,
    second_pass: Option<SecondPassFn>,
    bytes: Arc<AtomicU64>,
}

impl InMemoryIterator {
    fn account(&self, spanset: &Spanset) {
        // rough cost model: id bytes plus one value slot per attribute
        let mut bytes = spanset.trace_id.len() as u64;
        for span in &spanset.spans {
            bytes += span.id().len() as u64;
            bytes += (span.attributes().len() * mem::size_of::<Static>()) as u64;
        }
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }
}

impl SpansetIterator for InMemoryIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> Result<Option<Spanset>> {
        loop {
            ctx.check_cancelled()?;

            if !self.ready.is_empty() {
                return Ok(Some(self.ready.remove(0)));
            }

            let Some(spanset) = self.pending.pop_front() else {
                return Ok(None);
            };
            self.account(&spanset);

            match &self.second_pass {
                Some(second_pass) => {
                    self.ready = second_pass(&spanset)?;
                }
                None => return Ok(Some(spanset)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    fn fixture() -> Vec<Spanset> {
        let make = |trace: u8, start: u64| Spanset {
            trace_id: vec![trace],
            start_time_unix_nanos: start,
            spans: vec![InMemorySpan::new(vec![trace, 0])
                .with_attribute(Attribute::new("foo"), Static::string("bar"))
                .build()],
            ..Default::default()
        };
        vec![make(1, 100), make(2, 200), make(3, 300)]
    }

    fn drain(fetcher: &InMemoryFetcher, request: FetchSpansRequest) -> Vec<Spanset> {
        let ctx = ExecutionContext::new();
        let mut response = fetcher.fetch(&ctx, request).unwrap();
        let mut out = Vec::new();
        while let Some(ss) = response.results.next(&ctx).unwrap() {
            out.push(ss);
        }
        out
    }

    #[test]
    fn test_fetch_all() {
        let fetcher = InMemoryFetcher::new(fixture());
        let results = drain(&fetcher, FetchSpansRequest::default());
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].trace_id, vec![1]);
    }

    #[test]
    fn test_time_range_bounds() {
        let fetcher = InMemoryFetcher::new(fixture());
        let request = FetchSpansRequest {
            start_time_unix_nanos: 150,
            end_time_unix_nanos: 300,
            ..Default::default()
        };
        let results = drain(&fetcher, request);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].trace_id, vec![2]);
    }

    #[test]
    fn test_second_pass_filters_and_fans_out() {
        let fetcher = InMemoryFetcher::new(fixture());
        let request = FetchSpansRequest {
            // drop trace 2, pass everything else through
            second_pass: Some(Arc::new(|ss: &Spanset| {
                if ss.trace_id == vec![2] {
                    Ok(vec![])
                } else {
                    Ok(vec![ss.clone()])
                }
            })),
            ..Default::default()
        };
        let results = drain(&fetcher, request);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].trace_id, vec![1]);
        assert_eq!(results[1].trace_id, vec![3]);
    }

    #[test]
    fn test_second_pass_error_propagates() {
        let fetcher = InMemoryFetcher::new(fixture());
        let request = FetchSpansRequest {
            second_pass: Some(Arc::new(|_: &Spanset| {
                Err(Error::unsupported("spanset operation (>>)"))
            })),
            ..Default::default()
        };
        let ctx = ExecutionContext::new();
        let mut response = fetcher.fetch(&ctx, request).unwrap();
        assert!(matches!(
            response.results.next(&ctx),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_cancellation_stops_iteration() {
        let fetcher = InMemoryFetcher::new(fixture());
        let ctx = ExecutionContext::new();
        let mut response = fetcher.fetch(&ctx, FetchSpansRequest::default()).unwrap();
        assert!(response.results.next(&ctx).unwrap().is_some());
        ctx.cancel();
        assert!(matches!(
            response.results.next(&ctx),
            Err(Error::QueryCancelled)
        ));
    }

    #[test]
    fn test_bytes_read_accumulates() {
        let fetcher = InMemoryFetcher::new(fixture());
        let ctx = ExecutionContext::new();
        let mut response = fetcher.fetch(&ctx, FetchSpansRequest::default()).unwrap();
        assert_eq!((response.bytes_read)(), 0);
        while response.results.next(&ctx).unwrap().is_some() {}
        assert!((response.bytes_read)() > 0);
    }
}
