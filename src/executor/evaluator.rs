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

//! Span predicate evaluator
//!
//! Evaluates expressions bottom-up against a single span. Attribute misses
//! and type mismatches resolve to nil / false rather than erroring; the
//! only failures that surface are malformed regex patterns.

use crate::core::{Op, Result, Span, Static};
use crate::parser::ast::{BinaryOperation, Expression, UnaryOperation};

use super::pattern_cache::PatternCache;

impl Expression {
    /// Evaluate this expression against a span
    pub fn execute(&self, span: &dyn Span, patterns: &PatternCache) -> Result<Static> {
        match self {
            Expression::Static(value) => Ok(value.clone()),
            Expression::Attribute(attribute) => Ok(attribute.evaluate(span)),
            Expression::Binary(binary) => binary.execute(span, patterns),
            Expression::Unary(unary) => unary.execute(span, patterns),
        }
    }
}

impl BinaryOperation {
    /// Evaluate this operation against a span
    pub fn execute(&self, span: &dyn Span, patterns: &PatternCache) -> Result<Static> {
        // logical connectives short-circuit on the left operand
        if self.op.is_logical() {
            let lhs = self.lhs.execute(span, patterns)?;
            return match (self.op, lhs.as_bool()) {
                (Op::And, false) => Ok(Static::Bool(false)),
                (Op::Or, true) => Ok(Static::Bool(true)),
                _ => Ok(Static::Bool(self.rhs.execute(span, patterns)?.as_bool())),
            };
        }

        let lhs = self.lhs.execute(span, patterns)?;
        let rhs = self.rhs.execute(span, patterns)?;

        match self.op {
            Op::Regex | Op::NotRegex => {
                // defined only over strings; anything else is a non-match
                let (Static::String(value), Static::String(pattern)) = (&lhs, &rhs) else {
                    return Ok(Static::Bool(false));
                };
                let regex = patterns.get_or_compile(pattern)?;
                let matched = regex.is_match(value);
                Ok(Static::Bool(if self.op == Op::Regex {
                    matched
                } else {
                    !matched
                }))
            }
            op => Ok(Static::execute_binary(op, &lhs, &rhs)),
        }
    }
}

impl UnaryOperation {
    /// Evaluate this operation against a span
    pub fn execute(&self, span: &dyn Span, patterns: &PatternCache) -> Result<Static> {
        let value = self.expression.execute(span, patterns)?;
        Ok(Static::execute_unary(self.op, &value))
    }
}
