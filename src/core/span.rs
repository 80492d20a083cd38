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

//! Span capability and the Spanset record
//!
//! A [`Span`] is a read-only view over a single timed operation; the
//! storage layer decides its representation. A [`Spanset`] is an ordered
//! batch of spans from one trace, threaded through the pipeline stages.
//! Stages never mutate their input: they clone the spanset shell and share
//! the spans by reference.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::attribute::{Attribute, AttributeScope, Intrinsic};
use super::value::Static;

/// Read-only view of a single span
///
/// Attribute maps are treated as immutable for the lifetime of a query.
pub trait Span: fmt::Debug {
    /// The attributes materialized for this span
    fn attributes(&self) -> &FxHashMap<Attribute, Static>;

    /// Unique span id
    fn id(&self) -> &[u8];

    /// Start time as unix nanoseconds
    fn start_time_unix_nanos(&self) -> u64;

    /// Elapsed nanoseconds
    fn duration_nanos(&self) -> u64;
}

/// Shared reference to a span
pub type SpanRef = Arc<dyn Span>;

impl Attribute {
    /// Resolve this attribute against a span
    ///
    /// Resolution order: exact key (covers intrinsics and scoped
    /// attributes), intrinsic accessor fallback, then for unscoped
    /// attributes span scope, resource scope, and finally any scope.
    /// A miss is nil, never an error.
    pub fn evaluate(&self, span: &dyn Span) -> Static {
        let attributes = span.attributes();
        if let Some(value) = attributes.get(self) {
            return value.clone();
        }

        if self.is_intrinsic() {
            // duration, spanID, and spanStartTime are backed by the span
            // accessors when the fetch layer did not materialize them
            return match self.intrinsic {
                Intrinsic::Duration => Static::Duration(span.duration_nanos() as i64),
                Intrinsic::SpanStartTime => Static::Int(span.start_time_unix_nanos() as i64),
                Intrinsic::SpanId => Static::string(hex_encode(span.id())),
                _ => Static::Nil,
            };
        }

        if self.scope == AttributeScope::None {
            for scope in [AttributeScope::Span, AttributeScope::Resource] {
                for (attribute, value) in attributes {
                    if attribute.scope == scope && attribute.name == self.name {
                        return value.clone();
                    }
                }
            }
            for (attribute, value) in attributes {
                if attribute.name == self.name {
                    return value.clone();
                }
            }
        }

        Static::Nil
    }
}

/// Lower-hex rendering of a span or trace id
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// An ordered batch of spans from a single trace, plus the per-spanset
/// state accumulated by pipeline stages
#[derive(Debug, Clone, Default)]
pub struct Spanset {
    /// Result of the last scalar aggregation over this spanset
    pub scalar: Static,
    /// Spans, shared by reference with the input
    pub spans: Vec<SpanRef>,

    /// Trace id
    pub trace_id: Vec<u8>,
    /// Name of the trace's root span
    pub root_span_name: String,
    /// Service name of the trace's root span
    pub root_service_name: String,
    /// Trace start time as unix nanoseconds
    pub start_time_unix_nanos: u64,
    /// Total trace duration in nanoseconds
    pub duration_nanos: u64,

    /// Named scalars surfaced to the caller ("count()", "avg(duration)", ...)
    pub attributes: FxHashMap<String, Static>,
}

impl Spanset {
    /// Create an empty spanset
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a named scalar on this spanset
    pub fn add_attribute(&mut self, key: impl Into<String>, value: Static) {
        self.attributes.insert(key.into(), value);
    }

    /// Clone the spanset shell, sharing the spans by reference
    pub fn clone_shell(&self) -> Spanset {
        Spanset {
            scalar: self.scalar.clone(),
            spans: self.spans.clone(),
            trace_id: self.trace_id.clone(),
            root_span_name: self.root_span_name.clone(),
            root_service_name: self.root_service_name.clone(),
            start_time_unix_nanos: self.start_time_unix_nanos,
            duration_nanos: self.duration_nanos,
            attributes: self.attributes.clone(),
        }
    }
}

impl PartialEq for Spanset {
    fn eq(&self, other: &Self) -> bool {
        self.scalar == other.scalar
            && self.trace_id == other.trace_id
            && self.root_span_name == other.root_span_name
            && self.root_service_name == other.root_service_name
            && self.start_time_unix_nanos == other.start_time_unix_nanos
            && self.duration_nanos == other.duration_nanos
            && self.attributes == other.attributes
            && self.spans.len() == other.spans.len()
            && self
                .spans
                .iter()
                .zip(other.spans.iter())
                .all(|(a, b)| span_eq(a.as_ref(), b.as_ref()))
    }
}

fn span_eq(a: &dyn Span, b: &dyn Span) -> bool {
    a.id() == b.id()
        && a.start_time_unix_nanos() == b.start_time_unix_nanos()
        && a.duration_nanos() == b.duration_nanos()
        && a.attributes() == b.attributes()
}
