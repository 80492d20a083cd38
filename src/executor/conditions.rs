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

//! Condition extraction
//!
//! Walks a parsed pipeline and derives the storage-layer conditions: which
//! attributes the query touches, constrained by an operator where the
//! shape allows it. `all_conditions` starts true and survives only pure
//! conjunctions; disjunctions, negations, spanset combinations, and any
//! shape the extractor cannot see through clear it.
//!
//! Conditions are appended without deduplication; the storage layer
//! deduplicates. Unknown scopes downgrade to unscoped.

use crate::core::{Attribute, AttributeScope, Op, Static};
use crate::parser::ast::{
    Aggregate, BinaryOperation, Expression, Pipeline, ScalarExpression, ScalarFilter,
    SpansetExpression, SpansetFilter, SpansetOperation, Stage, UnaryOperation,
};
use crate::storage::{Condition, FetchSpansRequest};

fn append(request: &mut FetchSpansRequest, attribute: &Attribute, op: Op, operands: Vec<Static>) {
    let mut attribute = attribute.clone();
    if attribute.scope == AttributeScope::Unknown {
        attribute.scope = AttributeScope::None;
    }
    request.conditions.push(Condition {
        attribute,
        op,
        operands,
    });
}

impl Pipeline {
    /// Derive storage conditions for every stage of this pipeline
    pub fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        for stage in &self.stages {
            stage.extract_conditions(request);
        }
    }
}

impl Stage {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        match self {
            Stage::Spanset(expression) => expression.extract_conditions(request),
            Stage::ScalarFilter(filter) => filter.extract_conditions(request),
            Stage::Aggregate(aggregate) => aggregate.extract_conditions(request),
        }
    }
}

impl SpansetExpression {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        match self {
            SpansetExpression::Filter(filter) => filter.extract_conditions(request),
            SpansetExpression::Operation(operation) => operation.extract_conditions(request),
        }
    }
}

impl SpansetFilter {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        self.expression.extract_conditions(request);
    }
}

impl SpansetOperation {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        // either side alone can admit a span into the overlap
        self.lhs.extract_conditions(request);
        self.rhs.extract_conditions(request);
        request.all_conditions = false;
    }
}

impl ScalarFilter {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        for side in [&self.lhs, &self.rhs] {
            match side {
                ScalarExpression::Static(_) => {}
                ScalarExpression::Aggregate(aggregate) => aggregate.extract_conditions(request),
            }
        }
    }
}

impl Aggregate {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        if let Some(expression) = &self.expression {
            expression.extract_conditions(request);
        }
    }
}

impl Expression {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        match self {
            Expression::Static(_) => {}
            Expression::Attribute(attribute) => {
                append(request, attribute, Op::None, Vec::new());
            }
            Expression::Binary(binary) => binary.extract_conditions(request),
            Expression::Unary(unary) => unary.extract_conditions(request),
        }
    }
}

impl BinaryOperation {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        match (&self.lhs, &self.rhs) {
            // x <op> literal
            (Expression::Attribute(attribute), Expression::Static(value)) => {
                append(request, attribute, self.op, vec![value.clone()]);
            }
            // literal <op> x
            (Expression::Static(value), Expression::Attribute(attribute)) => {
                append(request, attribute, self.op, vec![value.clone()]);
            }
            // x <op> y: fetch both sides, no usable constraint
            (Expression::Attribute(lhs), Expression::Attribute(rhs)) => {
                append(request, lhs, Op::None, Vec::new());
                append(request, rhs, Op::None, Vec::new());
            }
            // literal <op> literal contributes nothing
            (Expression::Static(_), Expression::Static(_)) => {}
            // an attribute or literal against a compound expression: the
            // constraint is invisible to storage
            (Expression::Attribute(_), _) | (Expression::Static(_), _) => {
                self.lhs.extract_conditions(request);
                self.rhs.extract_conditions(request);
                request.all_conditions = false;
            }
            // compound on the left: only conjunctions keep the guarantee
            _ => {
                self.lhs.extract_conditions(request);
                self.rhs.extract_conditions(request);
                request.all_conditions = request.all_conditions && self.op == Op::And;
            }
        }
    }
}

impl UnaryOperation {
    fn extract_conditions(&self, request: &mut FetchSpansRequest) {
        self.expression.extract_conditions(request);
        request.all_conditions = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Intrinsic;
    use crate::storage::extract_fetch_spans_request;

    fn extract(query: &str) -> FetchSpansRequest {
        extract_fetch_spans_request(query).unwrap_or_else(|e| panic!("{query}: {e}"))
    }

    #[test]
    fn test_single_condition() {
        let request = extract("{ .foo = \"bar\" }");
        assert!(request.all_conditions);
        assert_eq!(
            request.conditions,
            vec![Condition {
                attribute: Attribute::new("foo"),
                op: Op::Equal,
                operands: vec![Static::string("bar")],
            }]
        );
    }

    #[test]
    fn test_conjunction_keeps_all_conditions() {
        let request = extract("{ .foo = \"bar\" && span.baz > 2 }");
        assert!(request.all_conditions);
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(request.conditions[1].op, Op::Greater);
        assert_eq!(
            request.conditions[1].attribute,
            Attribute::scoped(AttributeScope::Span, "baz")
        );
    }

    #[test]
    fn test_disjunction_clears_all_conditions() {
        let request = extract("{ .foo = \"bar\" || .baz = 2 }");
        assert!(!request.all_conditions);
        assert_eq!(request.conditions.len(), 2);
    }

    #[test]
    fn test_literal_on_the_left() {
        let request = extract("{ 2 < .foo }");
        assert!(request.all_conditions);
        assert_eq!(request.conditions[0].op, Op::Less);
        assert_eq!(request.conditions[0].operands, vec![Static::Int(2)]);
    }

    #[test]
    fn test_attribute_vs_attribute_fetches_both() {
        let request = extract("{ .foo = .bar }");
        assert!(request.all_conditions);
        assert_eq!(request.conditions.len(), 2);
        assert!(request.conditions.iter().all(|c| c.op == Op::None));
    }

    #[test]
    fn test_negation_clears_all_conditions() {
        let request = extract("{ !(.foo = \"bar\") }");
        assert!(!request.all_conditions);
        assert_eq!(request.conditions.len(), 1);
    }

    #[test]
    fn test_arithmetic_shape_clears_all_conditions() {
        let request = extract("{ .foo + 1 = 2 }");
        assert!(!request.all_conditions);
        // the attribute is still requested, carrying the inner shape
        assert_eq!(request.conditions.len(), 1);
        assert_eq!(request.conditions[0].attribute, Attribute::new("foo"));
    }

    #[test]
    fn test_spanset_operation_clears_all_conditions() {
        let request = extract("{ .foo = \"a\" } && { .foo = \"b\" }");
        assert!(!request.all_conditions);
        assert_eq!(request.conditions.len(), 2);
    }

    #[test]
    fn test_aggregate_expression_is_fetched() {
        let request = extract("{ .foo = \"a\" } | avg(duration) >= 10ms");
        assert!(request.all_conditions);
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(
            request.conditions[1].attribute,
            Attribute::intrinsic(Intrinsic::Duration)
        );
        assert_eq!(request.conditions[1].op, Op::None);
    }

    #[test]
    fn test_duplicate_conditions_are_not_merged() {
        let request = extract("{ .foo = \"a\" && .foo = \"b\" }");
        assert_eq!(request.conditions.len(), 2);
    }
}
