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

//! Attribute keys: scopes and intrinsics
//!
//! An attribute is addressed by `(scope, intrinsic tag, name)`. Intrinsic
//! attributes (duration, name, status, ...) are exposed directly by a span
//! rather than stored under a user key, and bypass scope resolution.
//! Unscoped attributes search span scope first, then resource scope, then
//! any scope.

use std::fmt;

/// The logical container of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeScope {
    /// Unscoped - resolved against span scope, then resource scope
    #[default]
    None,
    /// Per-resource (process) attribute
    Resource,
    /// Per-span attribute
    Span,
    /// Scope token that did not resolve
    Unknown,
}

impl AttributeScope {
    /// Parse a scope prefix as written in a query ("span", "resource")
    pub fn from_str(s: &str) -> AttributeScope {
        match s {
            "span" => AttributeScope::Span,
            "resource" => AttributeScope::Resource,
            "" | "none" => AttributeScope::None,
            _ => AttributeScope::Unknown,
        }
    }
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttributeScope::None => "none",
            AttributeScope::Resource => "resource",
            AttributeScope::Span => "span",
            AttributeScope::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Well-known attributes exposed directly by a span or its trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Intrinsic {
    /// Not an intrinsic
    #[default]
    None,
    /// Span duration
    Duration,
    /// Span name
    Name,
    /// Span status
    Status,
    /// Span kind
    Kind,
    /// Number of child spans
    ChildCount,
    /// Parent span
    Parent,
    /// Root service name of the trace
    TraceRootService,
    /// Root span name of the trace
    TraceRootSpan,
    /// Total trace duration
    TraceDuration,
    /// Trace id (fetch layer only)
    TraceId,
    /// Trace start time (fetch layer only)
    TraceStartTime,
    /// Span id (fetch layer only)
    SpanId,
    /// Span start time (fetch layer only)
    SpanStartTime,
}

impl Intrinsic {
    /// Returns the matching intrinsic for the given string, or None
    pub fn from_str(s: &str) -> Option<Intrinsic> {
        match s {
            "duration" => Some(Intrinsic::Duration),
            "name" => Some(Intrinsic::Name),
            "status" => Some(Intrinsic::Status),
            "kind" => Some(Intrinsic::Kind),
            "childCount" => Some(Intrinsic::ChildCount),
            "parent" => Some(Intrinsic::Parent),
            "traceRootService" => Some(Intrinsic::TraceRootService),
            "traceRootSpan" => Some(Intrinsic::TraceRootSpan),
            "traceDuration" => Some(Intrinsic::TraceDuration),
            "traceID" => Some(Intrinsic::TraceId),
            "traceStartTime" => Some(Intrinsic::TraceStartTime),
            "spanID" => Some(Intrinsic::SpanId),
            "spanStartTime" => Some(Intrinsic::SpanStartTime),
            _ => None,
        }
    }
}

impl fmt::Display for Intrinsic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Intrinsic::None => "none",
            Intrinsic::Duration => "duration",
            Intrinsic::Name => "name",
            Intrinsic::Status => "status",
            Intrinsic::Kind => "kind",
            Intrinsic::ChildCount => "childCount",
            Intrinsic::Parent => "parent",
            Intrinsic::TraceRootService => "traceRootService",
            Intrinsic::TraceRootSpan => "traceRootSpan",
            Intrinsic::TraceDuration => "traceDuration",
            Intrinsic::TraceId => "traceID",
            Intrinsic::TraceStartTime => "traceStartTime",
            Intrinsic::SpanId => "spanID",
            Intrinsic::SpanStartTime => "spanStartTime",
        };
        f.write_str(s)
    }
}

/// A scoped attribute key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Attribute {
    /// Scope the attribute was addressed with
    pub scope: AttributeScope,
    /// Intrinsic tag; `Intrinsic::None` for user attributes
    pub intrinsic: Intrinsic,
    /// Attribute name
    pub name: String,
}

impl Attribute {
    /// Create an unscoped attribute (".name")
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            scope: AttributeScope::None,
            intrinsic: Intrinsic::None,
            name: name.into(),
        }
    }

    /// Create a scoped attribute ("span.name", "resource.name")
    pub fn scoped(scope: AttributeScope, name: impl Into<String>) -> Self {
        Self {
            scope,
            intrinsic: Intrinsic::None,
            name: name.into(),
        }
    }

    /// Create an intrinsic attribute ("duration", "status", ...)
    pub fn intrinsic(intrinsic: Intrinsic) -> Self {
        Self {
            scope: AttributeScope::None,
            intrinsic,
            name: intrinsic.to_string(),
        }
    }

    /// Whether this attribute carries an intrinsic tag
    pub fn is_intrinsic(&self) -> bool {
        self.intrinsic != Intrinsic::None
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_intrinsic() {
            return write!(f, "{}", self.intrinsic);
        }
        match self.scope {
            AttributeScope::None | AttributeScope::Unknown => write!(f, ".{}", self.name),
            scope => write!(f, "{}.{}", scope, self.name),
        }
    }
}
