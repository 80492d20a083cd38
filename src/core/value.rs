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

//! Static - the tagged value type of the query language
//!
//! A `Static` is an immutable literal or attribute value: integer, float,
//! string, boolean, duration, span status, span kind, or the nil value for
//! anything unresolved. Comparison and arithmetic live here as exhaustive
//! matches over the operand tags; the evaluator dispatches to them.
//!
//! Nil never equals anything, including itself. The one asymmetry is `!=`,
//! which is true when exactly one side is nil. Every other operator
//! touching nil, or operands of incompatible kinds, yields a non-match.

use std::fmt;
use std::sync::Arc;

use super::types::{Op, StaticType};

/// Span status as recorded by instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Operation failed
    Error,
    /// Operation succeeded
    Ok,
    /// Status was not set
    Unset,
}

impl Status {
    /// Parse a status literal as it appears in query text
    pub fn from_str(s: &str) -> Option<Status> {
        match s {
            "error" => Some(Status::Error),
            "ok" => Some(Status::Ok),
            "unset" => Some(Status::Unset),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Error => "error",
            Status::Ok => "ok",
            Status::Unset => "unset",
        };
        f.write_str(s)
    }
}

/// Span kind as recorded by instrumentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Kind was not specified
    Unspecified,
    /// Internal operation
    Internal,
    /// Server side of a remote call
    Server,
    /// Client side of a remote call
    Client,
    /// Message producer
    Producer,
    /// Message consumer
    Consumer,
}

impl Kind {
    /// Parse a kind literal as it appears in query text
    pub fn from_str(s: &str) -> Option<Kind> {
        match s {
            "unspecified" => Some(Kind::Unspecified),
            "internal" => Some(Kind::Internal),
            "server" => Some(Kind::Server),
            "client" => Some(Kind::Client),
            "producer" => Some(Kind::Producer),
            "consumer" => Some(Kind::Consumer),
            _ => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Kind::Unspecified => "unspecified",
            Kind::Internal => "internal",
            Kind::Server => "server",
            Kind::Client => "client",
            Kind::Producer => "producer",
            Kind::Consumer => "consumer",
        };
        f.write_str(s)
    }
}

/// A tagged immutable value of the query language
///
/// Note: strings use `Arc<str>` so that cloning values out of span
/// attribute maps during evaluation stays cheap.
#[derive(Debug, Clone, PartialEq)]
pub enum Static {
    /// Unresolved / missing value
    Nil,
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 string (Arc for cheap cloning)
    String(Arc<str>),
    /// Boolean
    Bool(bool),
    /// Elapsed time in nanoseconds
    Duration(i64),
    /// Span status
    Status(Status),
    /// Span kind
    Kind(Kind),
}

impl Static {
    /// Create a string value
    pub fn string(value: impl Into<String>) -> Self {
        Static::String(Arc::from(value.into().as_str()))
    }

    /// Returns the type tag of this value
    pub fn static_type(&self) -> StaticType {
        match self {
            Static::Nil => StaticType::Nil,
            Static::Int(_) => StaticType::Int,
            Static::Float(_) => StaticType::Float,
            Static::String(_) => StaticType::String,
            Static::Bool(_) => StaticType::Bool,
            Static::Duration(_) => StaticType::Duration,
            Static::Status(_) => StaticType::Status,
            Static::Kind(_) => StaticType::Kind,
        }
    }

    /// Returns true if this value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Static::Nil)
    }

    /// Extract the numeric value, promoting Int and Duration to f64
    ///
    /// Returns None for non-numeric kinds; strings, booleans, statuses,
    /// and kinds never coerce to numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Static::Int(v) => Some(*v as f64),
            Static::Float(v) => Some(*v),
            Static::Duration(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Boolean view used by the logical connectives: any non-Bool is false
    pub fn as_bool(&self) -> bool {
        matches!(self, Static::Bool(true))
    }

    /// Language-level equality with numeric promotion
    ///
    /// Int, Float, and Duration compare by value after promotion to f64.
    /// All other kinds compare only against themselves. Nil equals
    /// nothing, itself included.
    pub fn equals(&self, other: &Static) -> bool {
        match (self, other) {
            (Static::Nil, _) | (_, Static::Nil) => false,
            (Static::String(a), Static::String(b)) => a == b,
            (Static::Bool(a), Static::Bool(b)) => a == b,
            (Static::Status(a), Static::Status(b)) => a == b,
            (Static::Kind(a), Static::Kind(b)) => a == b,
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    /// Apply a binary operator to two resolved values
    ///
    /// Covers comparison, arithmetic, and the logical connectives. Regex
    /// operators are dispatched by the evaluator, which owns the compiled
    /// pattern cache; they yield nil here.
    pub fn execute_binary(op: Op, lhs: &Static, rhs: &Static) -> Static {
        match op {
            Op::Equal => Static::Bool(lhs.equals(rhs)),
            Op::NotEqual => Self::execute_not_equal(lhs, rhs),
            Op::Greater | Op::GreaterEqual | Op::Less | Op::LessEqual => {
                match (lhs.as_f64(), rhs.as_f64()) {
                    (Some(l), Some(r)) => Static::Bool(match op {
                        Op::Greater => l > r,
                        Op::GreaterEqual => l >= r,
                        Op::Less => l < r,
                        _ => l <= r,
                    }),
                    _ => Static::Bool(false),
                }
            }
            Op::And => Static::Bool(lhs.as_bool() && rhs.as_bool()),
            Op::Or => Static::Bool(lhs.as_bool() || rhs.as_bool()),
            Op::Add | Op::Sub | Op::Mult | Op::Div | Op::Mod | Op::Power => {
                Self::execute_arithmetic(op, lhs, rhs)
            }
            Op::Regex | Op::NotRegex | Op::None | Op::Not | Op::Neg => Static::Nil,
        }
    }

    /// Apply a unary operator to a resolved value
    pub fn execute_unary(op: Op, value: &Static) -> Static {
        match (op, value) {
            (Op::Neg, Static::Int(v)) => Static::Int(-v),
            (Op::Neg, Static::Float(v)) => Static::Float(-v),
            (Op::Neg, Static::Duration(v)) => Static::Duration(-v),
            (Op::Not, Static::Bool(v)) => Static::Bool(!v),
            _ => Static::Nil,
        }
    }

    fn execute_not_equal(lhs: &Static, rhs: &Static) -> Static {
        match (lhs.is_nil(), rhs.is_nil()) {
            // exactly one side unresolved
            (true, false) | (false, true) => Static::Bool(true),
            (true, true) => Static::Bool(false),
            (false, false) => {
                if lhs.static_type().is_matching_operand(rhs.static_type()) {
                    Static::Bool(!lhs.equals(rhs))
                } else {
                    Static::Bool(false)
                }
            }
        }
    }

    fn execute_arithmetic(op: Op, lhs: &Static, rhs: &Static) -> Static {
        let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) else {
            return Static::Nil;
        };
        if op == Op::Mod && r == 0.0 {
            return Static::Nil;
        }

        let lt = lhs.static_type();
        let rt = rhs.static_type();
        let both_int = lt == StaticType::Int && rt == StaticType::Int;
        let both_duration = lt == StaticType::Duration && rt == StaticType::Duration;
        let duration_scaled = (lt == StaticType::Duration && rt != StaticType::Duration)
            || (rt == StaticType::Duration && lt != StaticType::Duration);

        match op {
            // exponentiation is always float, via f64 pow
            Op::Power => Static::Float(l.powf(r)),

            // division promotes to float so 1 / 10 = .1 holds; a duration
            // divided by a plain number keeps its unit
            Op::Div => {
                if lt == StaticType::Duration && rt != StaticType::Duration {
                    Self::duration_from(l / r)
                } else {
                    Static::Float(l / r)
                }
            }

            Op::Add | Op::Sub => {
                if both_int {
                    let (a, b) = (Self::unwrap_int(lhs), Self::unwrap_int(rhs));
                    Static::Int(if op == Op::Add {
                        a.wrapping_add(b)
                    } else {
                        a.wrapping_sub(b)
                    })
                } else if both_duration {
                    Static::Duration(if op == Op::Add {
                        (l + r) as i64
                    } else {
                        (l - r) as i64
                    })
                } else {
                    Static::Float(if op == Op::Add { l + r } else { l - r })
                }
            }

            Op::Mult => {
                if both_int {
                    Static::Int(Self::unwrap_int(lhs).wrapping_mul(Self::unwrap_int(rhs)))
                } else if duration_scaled {
                    Self::duration_from(l * r)
                } else {
                    // including duration * duration, which has no sensible unit
                    Static::Float(l * r)
                }
            }

            Op::Mod => {
                if both_int {
                    Static::Int(Self::unwrap_int(lhs) % Self::unwrap_int(rhs))
                } else if both_duration {
                    Static::Duration((l % r) as i64)
                } else {
                    Static::Float(l % r)
                }
            }

            _ => Static::Nil,
        }
    }

    fn unwrap_int(v: &Static) -> i64 {
        match v {
            Static::Int(i) => *i,
            _ => 0,
        }
    }

    fn duration_from(nanos: f64) -> Static {
        if nanos.is_finite() {
            Static::Duration(nanos as i64)
        } else {
            Static::Nil
        }
    }
}

impl Default for Static {
    fn default() -> Self {
        Static::Nil
    }
}

impl fmt::Display for Static {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Static::Nil => f.write_str("nil"),
            Static::Int(v) => write!(f, "{}", v),
            Static::Float(v) => write!(f, "{}", v),
            Static::String(v) => write!(f, "\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")),
            Static::Bool(v) => write!(f, "{}", v),
            Static::Duration(v) => f.write_str(&format_duration(*v)),
            Static::Status(v) => write!(f, "{}", v),
            Static::Kind(v) => write!(f, "{}", v),
        }
    }
}

/// Render nanoseconds the way duration literals are written: the largest
/// unit tier that fits, with insignificant trailing digits trimmed
/// ("10ms", "1.8s", "1h30m0s").
pub fn format_duration(nanos: i64) -> String {
    if nanos == 0 {
        return "0s".to_string();
    }
    let neg = nanos < 0;
    let u = nanos.unsigned_abs();

    let body = if u < 1_000_000_000 {
        // sub-second tiers
        let (scale, unit) = if u < 1_000 {
            (1, "ns")
        } else if u < 1_000_000 {
            (1_000, "µs")
        } else {
            (1_000_000, "ms")
        };
        format!("{}{}", format_scaled(u, scale), unit)
    } else {
        let secs = u / 1_000_000_000;
        let frac = u % 1_000_000_000;
        let sec_part = format!("{}s", format_scaled(secs * 1_000_000_000 + frac, 1_000_000_000));
        let mins = secs / 60;
        if mins == 0 {
            sec_part
        } else {
            let rem_secs = u - mins * 60 * 1_000_000_000;
            let sec_part = format!("{}s", format_scaled(rem_secs, 1_000_000_000));
            let hours = mins / 60;
            if hours == 0 {
                format!("{}m{}", mins, sec_part)
            } else {
                format!("{}h{}m{}", hours, mins % 60, sec_part)
            }
        }
    };

    if neg {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format value/scale as a decimal with trailing zeros trimmed
fn format_scaled(value: u64, scale: u64) -> String {
    let whole = value / scale;
    let mut frac = value % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let mut digits = String::new();
    let mut denom = scale;
    while frac > 0 {
        denom /= 10;
        digits.push(char::from(b'0' + (frac / denom) as u8));
        frac %= denom;
    }
    format!("{}.{}", whole, digits)
}

/// Parse a duration literal: one or more number+unit segments, where the
/// unit is one of ns, us, µs, ms, s, m, h ("100ms", "1.5h", "1m30s").
pub fn parse_duration(s: &str) -> Option<i64> {
    let (neg, mut rest) = match s.strip_prefix('-') {
        Some(r) => (true, r),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    if rest.is_empty() {
        return None;
    }

    let mut total = 0.0f64;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let number: f64 = rest[..num_end].parse().ok()?;
        rest = &rest[num_end..];

        let (mult, consumed) = duration_unit(rest)?;
        rest = &rest[consumed..];
        total += number * mult;
    }

    let total = if neg { -total } else { total };
    if total.is_finite() {
        Some(total as i64)
    } else {
        None
    }
}

fn duration_unit(s: &str) -> Option<(f64, usize)> {
    for (unit, mult) in [
        ("ns", 1.0),
        ("us", 1e3),
        ("µs", 1e3),
        ("μs", 1e3),
        ("ms", 1e6),
    ] {
        if s.starts_with(unit) {
            return Some((mult, unit.len()));
        }
    }
    // single-letter units come last so "ms" is not read as "m"
    for (unit, mult) in [("s", 1e9), ("m", 60e9), ("h", 3600e9)] {
        if s.starts_with(unit) {
            return Some((mult, unit.len()));
        }
    }
    None
}
