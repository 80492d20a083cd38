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

//! Storage contract
//!
//! The engine asks a [`SpansetFetcher`] for spansets matching a
//! [`FetchSpansRequest`]. Conditions are hints: the storage layer may
//! return a superset of the matching spans, and deduplicates repeated
//! conditions itself. With `all_conditions` set, every condition is part
//! of one conjunction and storage may return only spansets meeting all of
//! them.
//!
//! The optional `second_pass` callback runs between the two fetch passes:
//! the first pass materializes the columns the query needs, the callback
//! filters (typically by evaluating the whole pipeline), and the second
//! pass fetches `second_pass_conditions` (typically just metadata) for
//! whatever survived.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use crate::core::{Attribute, Intrinsic, Op, Result, Spanset, Static};
use crate::executor::ExecutionContext;
use crate::parser;

pub use memory::{InMemoryFetcher, InMemorySpan};

/// A hint asking the storage layer to materialize an attribute, optionally
/// constrained by an operator over the given operands
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: Attribute,
    /// `Op::None` means "fetch the attribute unconditionally"
    pub op: Op,
    pub operands: Vec<Static>,
}

impl Condition {
    /// An unconditional fetch of the given attribute
    pub fn fetch(attribute: Attribute) -> Self {
        Self {
            attribute,
            op: Op::None,
            operands: Vec::new(),
        }
    }
}

/// The canonical metadata column set requested by metadata-only second
/// passes
pub fn search_meta_conditions() -> Vec<Condition> {
    vec![
        Condition::fetch(Attribute::intrinsic(Intrinsic::TraceRootService)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::TraceRootSpan)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::TraceDuration)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::TraceId)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::TraceStartTime)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::SpanId)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::SpanStartTime)),
        Condition::fetch(Attribute::intrinsic(Intrinsic::Duration)),
    ]
}

/// [`search_meta_conditions`] minus the span duration column
pub fn search_meta_conditions_without_duration() -> Vec<Condition> {
    let mut conditions = search_meta_conditions();
    conditions.retain(|c| c.attribute.intrinsic != Intrinsic::Duration);
    conditions
}

/// Callback invoked per spanset between the first and second fetch pass
pub type SecondPassFn = Arc<dyn Fn(&Spanset) -> Result<Vec<Spanset>>>;

/// A request for spansets from the storage layer
#[derive(Clone, Default)]
pub struct FetchSpansRequest {
    pub start_time_unix_nanos: u64,
    pub end_time_unix_nanos: u64,
    pub conditions: Vec<Condition>,

    /// Set when every condition belongs to one conjunction, letting the
    /// storage layer return only spansets meeting all of them
    pub all_conditions: bool,

    /// Filter callback between the fetch passes
    pub second_pass: Option<SecondPassFn>,
    /// Columns to fetch for spansets surviving the second pass
    pub second_pass_conditions: Vec<Condition>,
}

impl FetchSpansRequest {
    /// Append conditions to the request
    pub fn append_condition(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }
}

impl fmt::Debug for FetchSpansRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchSpansRequest")
            .field("start_time_unix_nanos", &self.start_time_unix_nanos)
            .field("end_time_unix_nanos", &self.end_time_unix_nanos)
            .field("conditions", &self.conditions)
            .field("all_conditions", &self.all_conditions)
            .field("second_pass", &self.second_pass.is_some())
            .field("second_pass_conditions", &self.second_pass_conditions)
            .finish()
    }
}

/// Pull-based stream of spansets
///
/// Implementations hold whatever storage resources they need and release
/// them on drop, so early termination and cancellation both clean up.
pub trait SpansetIterator {
    /// Fetch the next spanset, or None when exhausted
    fn next(&mut self, ctx: &ExecutionContext) -> Result<Option<Spanset>>;
}

/// The storage layer's answer to a fetch request
pub struct FetchSpansResponse {
    /// Resulting spansets
    pub results: Box<dyn SpansetIterator>,
    /// Callback reporting the bytes read servicing this fetch
    pub bytes_read: Box<dyn Fn() -> u64>,
}

impl std::fmt::Debug for FetchSpansResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSpansResponse").finish_non_exhaustive()
    }
}

/// The storage layer
pub trait SpansetFetcher {
    fn fetch(&self, ctx: &ExecutionContext, request: FetchSpansRequest)
        -> Result<FetchSpansResponse>;
}

/// Adapter turning a closure into a [`SpansetFetcher`]
pub struct FetcherFn<F>(pub F);

impl<F> SpansetFetcher for FetcherFn<F>
where
    F: Fn(&ExecutionContext, FetchSpansRequest) -> Result<FetchSpansResponse>,
{
    fn fetch(
        &self,
        ctx: &ExecutionContext,
        request: FetchSpansRequest,
    ) -> Result<FetchSpansResponse> {
        (self.0)(ctx, request)
    }
}

/// Parse the query and derive the storage layer conditions
pub fn extract_fetch_spans_request(query: &str) -> Result<FetchSpansRequest> {
    let pipeline = parser::parse(query)?;
    let mut request = FetchSpansRequest {
        all_conditions: true,
        ..Default::default()
    };
    pipeline.extract_conditions(&mut request);
    Ok(request)
}

/// Like [`extract_fetch_spans_request`], with an identity second pass and
/// the metadata condition set installed
///
/// Panics if the query does not parse; reserved for boot-time
/// configuration where a bad query is a deployment error.
pub fn extract_fetch_spans_request_with_metadata(query: &str) -> FetchSpansRequest {
    let mut request = match extract_fetch_spans_request(query) {
        Ok(request) => request,
        Err(e) => panic!("failed to extract fetch request from '{}': {}", query, e),
    };
    request.second_pass = Some(Arc::new(|spanset: &Spanset| Ok(vec![spanset.clone()])));
    request.second_pass_conditions = search_meta_conditions();
    request
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_meta_conditions() {
        let conditions = search_meta_conditions();
        assert_eq!(conditions.len(), 8);
        assert!(conditions.iter().all(|c| c.op == Op::None));
        assert!(conditions
            .iter()
            .any(|c| c.attribute.intrinsic == Intrinsic::TraceId));

        let without = search_meta_conditions_without_duration();
        assert_eq!(without.len(), 7);
        assert!(!without
            .iter()
            .any(|c| c.attribute.intrinsic == Intrinsic::Duration));
    }

    #[test]
    fn test_extract_with_metadata_installs_second_pass() {
        let request = extract_fetch_spans_request_with_metadata("{ .foo = \"bar\" }");
        assert_eq!(request.second_pass_conditions, search_meta_conditions());

        // the installed pass is the identity
        let second_pass = request.second_pass.expect("second pass installed");
        let spanset = Spanset {
            trace_id: vec![7],
            ..Default::default()
        };
        let out = second_pass(&spanset).unwrap();
        assert_eq!(out, vec![spanset]);
    }

    #[test]
    #[should_panic(expected = "failed to extract fetch request")]
    fn test_extract_with_metadata_panics_on_bad_query() {
        extract_fetch_spans_request_with_metadata("{ not a query");
    }

    #[test]
    fn test_fetcher_fn_adapter() {
        let fetcher = FetcherFn(
            |_: &ExecutionContext, _: FetchSpansRequest| -> Result<FetchSpansResponse> {
                Err(crate::core::Error::storage(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "backend offline",
                )))
            },
        );
        let err = fetcher
            .fetch(&ExecutionContext::new(), FetchSpansRequest::default())
            .unwrap_err();
        assert!(err.is_storage());
    }
}
