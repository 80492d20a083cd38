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

//! Pipeline evaluator
//!
//! Runs each stage over the previous stage's spansets. Stages never
//! mutate their input: they clone the spanset shell and share spans by
//! reference. Trace-level fields ride along unchanged.
//!
//! Spanset operations merge with the right-hand side first and
//! deduplicate by span id, right side winning. Tests depend on that
//! order; keep it.

use rustc_hash::FxHashSet;

use crate::core::{AggregateOp, Error, Result, SpanRef, Spanset, SpansetOp, Static, StaticType};
use crate::parser::ast::{
    Aggregate, Pipeline, ScalarExpression, ScalarFilter, SpansetExpression, SpansetFilter,
    SpansetOperation, Stage,
};

use super::pattern_cache::PatternCache;

impl Pipeline {
    /// Run the pipeline over the input spansets
    ///
    /// The regex pattern cache lives exactly as long as this call. Use
    /// [`Pipeline::evaluate_with`] to share one cache across repeated
    /// evaluations of the same query.
    pub fn evaluate(&self, input: &[Spanset]) -> Result<Vec<Spanset>> {
        self.evaluate_with(input, &PatternCache::new())
    }

    /// Run the pipeline with a caller-owned pattern cache
    pub fn evaluate_with(
        &self,
        input: &[Spanset],
        patterns: &PatternCache,
    ) -> Result<Vec<Spanset>> {
        let mut current = input.to_vec();
        for stage in &self.stages {
            current = stage.evaluate(&current, patterns)?;
        }
        Ok(current)
    }
}

impl Stage {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        match self {
            Stage::Spanset(expression) => expression.evaluate(input, patterns),
            Stage::ScalarFilter(filter) => filter.evaluate(input, patterns),
            Stage::Aggregate(aggregate) => aggregate.evaluate(input, patterns),
        }
    }
}

impl SpansetExpression {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        match self {
            SpansetExpression::Filter(filter) => filter.evaluate(input, patterns),
            SpansetExpression::Operation(operation) => operation.evaluate(input, patterns),
        }
    }
}

impl SpansetFilter {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        let mut output = Vec::new();
        for spanset in input {
            if spanset.spans.is_empty() {
                continue;
            }

            let mut matching = spanset.clone_shell();
            matching.spans.clear();
            for span in &spanset.spans {
                let result = self.expression.execute(span.as_ref(), patterns)?;
                if matches!(result, Static::Bool(true)) {
                    matching.spans.push(span.clone());
                }
            }

            if !matching.spans.is_empty() {
                output.push(matching);
            }
        }
        Ok(output)
    }
}

impl SpansetOperation {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        let mut output = Vec::new();
        for spanset in input {
            let current = std::slice::from_ref(spanset);
            let lhs = self.lhs.evaluate(current, patterns)?;
            let rhs = self.rhs.evaluate(current, patterns)?;

            match self.op {
                SpansetOp::And => {
                    if !lhs.is_empty() && !rhs.is_empty() {
                        let mut merged = spanset.clone_shell();
                        merged.spans = unique_spans(&rhs, &lhs);
                        output.push(merged);
                    }
                }
                SpansetOp::Union => {
                    if !lhs.is_empty() || !rhs.is_empty() {
                        let mut merged = spanset.clone_shell();
                        merged.spans = unique_spans(&rhs, &lhs);
                        output.push(merged);
                    }
                }
                op => {
                    return Err(Error::unsupported(format!("spanset operation ({})", op)));
                }
            }
        }
        Ok(output)
    }
}

/// Collect the spans of both sides, first side leading, deduplicated by
/// span id with the first occurrence winning
fn unique_spans(first: &[Spanset], second: &[Spanset]) -> Vec<SpanRef> {
    let mut seen: FxHashSet<Vec<u8>> = FxHashSet::default();
    let mut output = Vec::new();
    for spanset in first.iter().chain(second) {
        for span in &spanset.spans {
            if seen.insert(span.id().to_vec()) {
                output.push(span.clone());
            }
        }
    }
    output
}

impl Aggregate {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        let mut output = Vec::with_capacity(input.len());
        for spanset in input {
            let scalar = match self.op {
                AggregateOp::Count => Static::Int(spanset.spans.len() as i64),
                _ => self.accumulate(spanset, patterns)?,
            };
            let mut aggregated = spanset.clone_shell();
            aggregated.scalar = scalar.clone();
            aggregated.add_attribute(self.to_string(), scalar);
            output.push(aggregated);
        }
        Ok(output)
    }

    /// Fold the expression over the spanset's spans
    ///
    /// Nil and non-numeric values do not contribute; avg divides by the
    /// number of contributions. The result keeps the unit of the inputs:
    /// all-duration stays duration, all-int stays int, any float promotes.
    fn accumulate(&self, spanset: &Spanset, patterns: &PatternCache) -> Result<Static> {
        let Some(expression) = &self.expression else {
            return Ok(Static::Nil);
        };

        let mut sum = 0.0f64;
        let mut count = 0usize;
        let mut all_int = true;
        let mut all_duration = true;
        let mut best: Option<(f64, Static)> = None;

        for span in &spanset.spans {
            let value = expression.execute(span.as_ref(), patterns)?;
            let Some(v) = value.as_f64() else {
                continue;
            };
            match value.static_type() {
                StaticType::Int => all_duration = false,
                StaticType::Duration => all_int = false,
                _ => {
                    all_int = false;
                    all_duration = false;
                }
            }

            sum += v;
            count += 1;

            let better = match &best {
                None => true,
                Some((current, _)) => match self.op {
                    AggregateOp::Min => v < *current,
                    AggregateOp::Max => v > *current,
                    _ => false,
                },
            };
            if better {
                best = Some((v, value));
            }
        }

        if count == 0 {
            return Ok(Static::Nil);
        }

        Ok(match self.op {
            AggregateOp::Min | AggregateOp::Max => match best {
                Some((_, value)) => value,
                None => Static::Nil,
            },
            AggregateOp::Sum => {
                if all_duration {
                    Static::Duration(sum as i64)
                } else if all_int {
                    Static::Int(sum as i64)
                } else {
                    Static::Float(sum)
                }
            }
            AggregateOp::Avg => {
                let mean = sum / count as f64;
                if all_duration {
                    Static::Duration(mean as i64)
                } else {
                    Static::Float(mean)
                }
            }
            AggregateOp::Count => Static::Int(count as i64),
        })
    }
}

impl ScalarFilter {
    fn evaluate(&self, input: &[Spanset], patterns: &PatternCache) -> Result<Vec<Spanset>> {
        match (&self.lhs, &self.rhs) {
            (ScalarExpression::Aggregate(aggregate), ScalarExpression::Static(rhs)) => {
                let aggregated = aggregate.evaluate(input, patterns)?;
                Ok(aggregated
                    .into_iter()
                    .filter(|ss| Static::execute_binary(self.op, &ss.scalar, rhs).as_bool())
                    .collect())
            }
            (ScalarExpression::Static(lhs), ScalarExpression::Aggregate(aggregate)) => {
                let aggregated = aggregate.evaluate(input, patterns)?;
                Ok(aggregated
                    .into_iter()
                    .filter(|ss| Static::execute_binary(self.op, lhs, &ss.scalar).as_bool())
                    .collect())
            }
            _ => Err(Error::unsupported(format!("scalar filter ({})", self))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Attribute, Span};
    use rustc_hash::FxHashMap;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct TestSpan {
        id: Vec<u8>,
        attributes: FxHashMap<Attribute, Static>,
    }

    impl Span for TestSpan {
        fn attributes(&self) -> &FxHashMap<Attribute, Static> {
            &self.attributes
        }
        fn id(&self) -> &[u8] {
            &self.id
        }
        fn start_time_unix_nanos(&self) -> u64 {
            0
        }
        fn duration_nanos(&self) -> u64 {
            0
        }
    }

    fn span(id: u8, value: Static) -> SpanRef {
        Arc::new(TestSpan {
            id: vec![id],
            attributes: [(Attribute::new("v"), value)].into_iter().collect(),
        })
    }

    fn spanset(spans: Vec<SpanRef>) -> Spanset {
        Spanset {
            spans,
            ..Default::default()
        }
    }

    fn value_aggregate(op: AggregateOp) -> Aggregate {
        Aggregate::new(
            op,
            Some(crate::parser::ast::Expression::Attribute(Attribute::new(
                "v",
            ))),
        )
    }

    #[test]
    fn test_unique_spans_first_side_leads() {
        let a = spanset(vec![span(1, Static::Int(1)), span(2, Static::Int(2))]);
        let b = spanset(vec![span(2, Static::Int(2)), span(3, Static::Int(3))]);
        let merged = unique_spans(std::slice::from_ref(&a), std::slice::from_ref(&b));
        let ids: Vec<u8> = merged.iter().map(|s| s.id()[0]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_aggregate_count() {
        let input = vec![spanset(vec![span(1, Static::Int(1)), span(2, Static::Int(2))])];
        let output = Aggregate::new(AggregateOp::Count, None)
            .evaluate(&input, &PatternCache::new())
            .unwrap();
        assert_eq!(output[0].scalar, Static::Int(2));
        assert_eq!(output[0].attributes.get("count()"), Some(&Static::Int(2)));
    }

    #[test]
    fn test_aggregate_keeps_duration_unit() {
        let input = vec![spanset(vec![
            span(1, Static::Duration(2_000_000)),
            span(2, Static::Duration(8_000_000)),
        ])];
        let patterns = PatternCache::new();

        let avg = value_aggregate(AggregateOp::Avg)
            .evaluate(&input, &patterns)
            .unwrap();
        assert_eq!(avg[0].scalar, Static::Duration(5_000_000));

        let sum = value_aggregate(AggregateOp::Sum)
            .evaluate(&input, &patterns)
            .unwrap();
        assert_eq!(sum[0].scalar, Static::Duration(10_000_000));

        let min = value_aggregate(AggregateOp::Min)
            .evaluate(&input, &patterns)
            .unwrap();
        assert_eq!(min[0].scalar, Static::Duration(2_000_000));

        let max = value_aggregate(AggregateOp::Max)
            .evaluate(&input, &patterns)
            .unwrap();
        assert_eq!(max[0].scalar, Static::Duration(8_000_000));
    }

    #[test]
    fn test_aggregate_int_and_mixed_typing() {
        let patterns = PatternCache::new();

        let ints = vec![spanset(vec![span(1, Static::Int(1)), span(2, Static::Int(2))])];
        let sum = value_aggregate(AggregateOp::Sum)
            .evaluate(&ints, &patterns)
            .unwrap();
        assert_eq!(sum[0].scalar, Static::Int(3));
        let avg = value_aggregate(AggregateOp::Avg)
            .evaluate(&ints, &patterns)
            .unwrap();
        assert_eq!(avg[0].scalar, Static::Float(1.5));

        let mixed = vec![spanset(vec![
            span(1, Static::Int(1)),
            span(2, Static::Float(2.0)),
        ])];
        let sum = value_aggregate(AggregateOp::Sum)
            .evaluate(&mixed, &patterns)
            .unwrap();
        assert_eq!(sum[0].scalar, Static::Float(3.0));
    }

    #[test]
    fn test_aggregate_skips_nil_contributions() {
        // second span has no "v" attribute at all
        let input = vec![spanset(vec![
            span(1, Static::Int(4)),
            Arc::new(TestSpan {
                id: vec![2],
                ..Default::default()
            }) as SpanRef,
        ])];
        let avg = value_aggregate(AggregateOp::Avg)
            .evaluate(&input, &PatternCache::new())
            .unwrap();
        // divisor is the count of numeric contributions, not total spans
        assert_eq!(avg[0].scalar, Static::Float(4.0));
    }

    #[test]
    fn test_aggregate_empty_is_nil() {
        let input = vec![spanset(vec![Arc::new(TestSpan {
            id: vec![1],
            ..Default::default()
        }) as SpanRef])];
        let sum = value_aggregate(AggregateOp::Sum)
            .evaluate(&input, &PatternCache::new())
            .unwrap();
        assert_eq!(sum[0].scalar, Static::Nil);
    }

    #[test]
    fn test_scalar_filter_static_on_left() {
        let input = vec![spanset(vec![span(1, Static::Int(1))])];
        let filter = ScalarFilter {
            op: crate::core::Op::Less,
            lhs: ScalarExpression::Static(Static::Int(0)),
            rhs: ScalarExpression::Aggregate(Aggregate::new(AggregateOp::Count, None)),
        };
        let output = filter.evaluate(&input, &PatternCache::new()).unwrap();
        assert_eq!(output.len(), 1);
    }

    #[test]
    fn test_scalar_filter_unsupported_shapes() {
        let filter = ScalarFilter {
            op: crate::core::Op::Equal,
            lhs: ScalarExpression::Static(Static::Int(1)),
            rhs: ScalarExpression::Static(Static::Int(1)),
        };
        assert!(matches!(
            filter.evaluate(&[], &PatternCache::new()),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn test_structural_operators_are_unsupported() {
        let filter = |v: &str| {
            SpansetExpression::Filter(SpansetFilter {
                expression: crate::parser::ast::Expression::binary(
                    crate::core::Op::Equal,
                    crate::parser::ast::Expression::Attribute(Attribute::new("v")),
                    crate::parser::ast::Expression::Static(Static::string(v)),
                ),
            })
        };
        let operation = SpansetOperation {
            op: SpansetOp::Descendant,
            lhs: filter("a"),
            rhs: filter("b"),
        };
        let input = vec![spanset(vec![span(1, Static::string("a"))])];
        assert!(matches!(
            operation.evaluate(&input, &PatternCache::new()),
            Err(Error::Unsupported(_))
        ));
    }
}
