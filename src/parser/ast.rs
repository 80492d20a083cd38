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

//! Abstract syntax tree for parsed queries
//!
//! A query is a [`Pipeline`] of stages. Each stage filters spansets with a
//! span-level predicate, combines spansets, aggregates a scalar, or
//! filters on an aggregated scalar. Ownership is a plain parent-to-child
//! tree.
//!
//! The `Display` implementations render canonical query text; aggregate
//! renderings ("count()", "avg(duration)") double as the attribute keys
//! under which scalar results are surfaced.

use std::fmt;

use crate::core::{AggregateOp, Attribute, Op, SpansetOp, Static};

/// A span-level expression evaluating to a [`Static`]
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Literal value
    Static(Static),
    /// Attribute reference resolved against the span
    Attribute(Attribute),
    /// Binary operation
    Binary(Box<BinaryOperation>),
    /// Unary operation
    Unary(Box<UnaryOperation>),
}

impl Expression {
    /// Shorthand for building a binary operation node
    pub fn binary(op: Op, lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary(Box::new(BinaryOperation { op, lhs, rhs }))
    }

    /// Shorthand for building a unary operation node
    pub fn unary(op: Op, expression: Expression) -> Expression {
        Expression::Unary(Box::new(UnaryOperation { op, expression }))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Static(s) => write!(f, "{}", s),
            Expression::Attribute(a) => write!(f, "{}", a),
            Expression::Binary(b) => write!(f, "{}", b),
            Expression::Unary(u) => write!(f, "{}", u),
        }
    }
}

/// A binary operation over two span-level expressions
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOperation {
    pub op: Op,
    pub lhs: Expression,
    pub rhs: Expression,
}

impl fmt::Display for BinaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// A unary operation over a span-level expression
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOperation {
    pub op: Op,
    pub expression: Expression,
}

impl fmt::Display for UnaryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.op, self.expression)
    }
}

/// A `{ expr }` stage retaining the spans the predicate holds for
#[derive(Debug, Clone, PartialEq)]
pub struct SpansetFilter {
    pub expression: Expression,
}

impl fmt::Display for SpansetFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ {} }}", self.expression)
    }
}

/// A spanset-level operand: a filter or a nested operation
#[derive(Debug, Clone, PartialEq)]
pub enum SpansetExpression {
    Filter(SpansetFilter),
    Operation(Box<SpansetOperation>),
}

impl fmt::Display for SpansetExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpansetExpression::Filter(filter) => write!(f, "{}", filter),
            SpansetExpression::Operation(op) => write!(f, "{}", op),
        }
    }
}

/// A binary operation combining two spanset expressions
#[derive(Debug, Clone, PartialEq)]
pub struct SpansetOperation {
    pub op: SpansetOp,
    pub lhs: SpansetExpression,
    pub rhs: SpansetExpression,
}

impl fmt::Display for SpansetOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// A scalar aggregation stage
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub op: AggregateOp,
    /// Expression evaluated per span; `count()` takes none
    pub expression: Option<Expression>,
}

impl Aggregate {
    pub fn new(op: AggregateOp, expression: Option<Expression>) -> Self {
        Self { op, expression }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.expression {
            Some(expression) => write!(f, "{}({})", self.op, expression),
            None => write!(f, "{}()", self.op),
        }
    }
}

/// Operand of a scalar filter
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarExpression {
    Static(Static),
    Aggregate(Aggregate),
}

impl fmt::Display for ScalarExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarExpression::Static(s) => write!(f, "{}", s),
            ScalarExpression::Aggregate(a) => write!(f, "{}", a),
        }
    }
}

/// A stage keeping spansets whose aggregated scalar passes a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarFilter {
    pub op: Op,
    pub lhs: ScalarExpression,
    pub rhs: ScalarExpression,
}

impl fmt::Display for ScalarFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.lhs, self.op, self.rhs)
    }
}

/// One stage of a pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Spanset filter or spanset combination
    Spanset(SpansetExpression),
    /// Scalar comparison over aggregated values
    ScalarFilter(ScalarFilter),
    /// Bare scalar aggregation
    Aggregate(Aggregate),
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Spanset(s) => write!(f, "{}", s),
            Stage::ScalarFilter(s) => write!(f, "{}", s),
            Stage::Aggregate(a) => write!(f, "{}", a),
        }
    }
}

/// An ordered sequence of stages; each stage consumes the previous
/// stage's spansets
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{}", stage)?;
        }
        Ok(())
    }
}
