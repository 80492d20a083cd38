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

//! Query parser
//!
//! Pratt parser over the lexer's token stream. A query is a pipeline of
//! stages separated by `|`; each stage is either a spanset expression
//! (`{ expr }` composed with spanset operators) or a scalar stage
//! (an aggregate, optionally compared against a literal).
//!
//! Parsing functions leave the cursor on the first token after their
//! production.

use super::ast::*;
use super::error::ParseError;
use super::lexer::Lexer;
use super::precedence::Precedence;
use super::token::{Token, TokenType};
use crate::core::{
    parse_duration, AggregateOp, Attribute, AttributeScope, Intrinsic, Kind, Op, SpansetOp,
    Static, Status,
};

/// Query parser
pub struct Parser {
    lexer: Lexer,
    cur_token: Token,
}

type Result<T> = std::result::Result<T, ParseError>;

impl Parser {
    /// Create a new parser for the given input
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let cur_token = lexer.next_token();
        Self { lexer, cur_token }
    }

    /// Parse the input as a full pipeline
    pub fn parse_pipeline(&mut self) -> Result<Pipeline> {
        let mut stages = vec![self.parse_stage()?];
        while self.cur_token.is_punctuator("|") {
            self.next_token()?;
            stages.push(self.parse_stage()?);
        }
        if !self.cur_token.is_eof() {
            return Err(self.unexpected("expected '|' or end of query"));
        }
        Ok(Pipeline::new(stages))
    }

    fn next_token(&mut self) -> Result<()> {
        self.cur_token = self.lexer.next_token();
        if self.cur_token.is_error() {
            let message = self
                .cur_token
                .error
                .clone()
                .unwrap_or_else(|| "invalid token".to_string());
            return Err(ParseError::new(message, self.cur_token.position));
        }
        Ok(())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.cur_token.is_error() {
            return ParseError::new(
                self.cur_token
                    .error
                    .clone()
                    .unwrap_or_else(|| "invalid token".to_string()),
                self.cur_token.position,
            );
        }
        let got = if self.cur_token.is_eof() {
            "end of query".to_string()
        } else {
            format!("'{}'", self.cur_token.literal)
        };
        ParseError::new(format!("{}, got {}", expected, got), self.cur_token.position)
    }

    fn expect_punctuator(&mut self, punct: &str) -> Result<()> {
        if !self.cur_token.is_punctuator(punct) {
            return Err(self.unexpected(&format!("expected '{}'", punct)));
        }
        self.next_token()
    }

    // =========================================================================
    // Stages
    // =========================================================================

    fn parse_stage(&mut self) -> Result<Stage> {
        if self.cur_token.is_error() {
            return Err(self.unexpected("expected a stage"));
        }
        if self.cur_token.is_punctuator("{") || self.cur_token.is_punctuator("(") {
            return Ok(Stage::Spanset(self.parse_spanset_expression()?));
        }
        self.parse_scalar_stage()
    }

    fn parse_spanset_expression(&mut self) -> Result<SpansetExpression> {
        let mut lhs = self.parse_spanset_primary()?;
        while let Some(op) = self.cur_spanset_op() {
            self.next_token()?;
            let rhs = self.parse_spanset_primary()?;
            lhs = SpansetExpression::Operation(Box::new(SpansetOperation { op, lhs, rhs }));
        }
        Ok(lhs)
    }

    fn cur_spanset_op(&self) -> Option<SpansetOp> {
        if self.cur_token.token_type != TokenType::Operator {
            return None;
        }
        match self.cur_token.literal.as_str() {
            "&&" => Some(SpansetOp::And),
            "||" => Some(SpansetOp::Union),
            ">>" => Some(SpansetOp::Descendant),
            "<<" => Some(SpansetOp::Ancestor),
            "!>>" => Some(SpansetOp::NotDescendant),
            "!<<" => Some(SpansetOp::NotAncestor),
            "+" => Some(SpansetOp::Add),
            "-" => Some(SpansetOp::Sub),
            _ => None,
        }
    }

    fn parse_spanset_primary(&mut self) -> Result<SpansetExpression> {
        if self.cur_token.is_punctuator("(") {
            self.next_token()?;
            let inner = self.parse_spanset_expression()?;
            self.expect_punctuator(")")?;
            return Ok(inner);
        }
        if !self.cur_token.is_punctuator("{") {
            return Err(self.unexpected("expected '{'"));
        }
        self.next_token()?;
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_punctuator("}")?;
        Ok(SpansetExpression::Filter(SpansetFilter { expression }))
    }

    fn parse_scalar_stage(&mut self) -> Result<Stage> {
        let lhs = self.parse_scalar_expression()?;

        let op = match self.cur_binary_op() {
            Some(op) if op.is_comparison() => op,
            _ => {
                // a bare aggregate is a valid stage; a bare literal is not
                return match lhs {
                    ScalarExpression::Aggregate(aggregate) => Ok(Stage::Aggregate(aggregate)),
                    ScalarExpression::Static(_) => {
                        Err(self.unexpected("expected comparison operator"))
                    }
                };
            }
        };
        self.next_token()?;

        let rhs = self.parse_scalar_expression()?;
        Ok(Stage::ScalarFilter(ScalarFilter { op, lhs, rhs }))
    }

    fn parse_scalar_expression(&mut self) -> Result<ScalarExpression> {
        if self.cur_token.token_type == TokenType::Identifier {
            if let Some(op) = AggregateOp::from_str(&self.cur_token.literal) {
                return Ok(ScalarExpression::Aggregate(self.parse_aggregate(op)?));
            }
        }

        let position = self.cur_token.position;
        match self.parse_unary()? {
            Expression::Static(value) => Ok(ScalarExpression::Static(value)),
            other => Err(ParseError::new(
                format!("expected aggregate or literal, got '{}'", other),
                position,
            )),
        }
    }

    fn parse_aggregate(&mut self, op: AggregateOp) -> Result<Aggregate> {
        let position = self.cur_token.position;
        self.next_token()?; // consume the aggregate name
        self.expect_punctuator("(")?;

        if self.cur_token.is_punctuator(")") {
            self.next_token()?;
            if op != AggregateOp::Count {
                return Err(ParseError::new(
                    format!("{}() requires an expression argument", op),
                    position,
                ));
            }
            return Ok(Aggregate::new(op, None));
        }

        if op == AggregateOp::Count {
            return Err(ParseError::new(
                "count() takes no arguments",
                self.cur_token.position,
            ));
        }
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect_punctuator(")")?;
        Ok(Aggregate::new(op, Some(expression)))
    }

    // =========================================================================
    // Span-level expressions
    // =========================================================================

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.cur_binary_op() {
            let op_precedence = Precedence::for_op(op);
            if op_precedence <= precedence {
                break;
            }
            self.next_token()?;

            // exponentiation is right-associative: recurse at one level
            // below its own precedence so a following ^ binds tighter
            let rhs_precedence = if op == Op::Power {
                Precedence::Product
            } else {
                op_precedence
            };
            let right = self.parse_expression(rhs_precedence)?;
            left = Expression::binary(op, left, right);
        }

        Ok(left)
    }

    fn cur_binary_op(&self) -> Option<Op> {
        if self.cur_token.token_type != TokenType::Operator {
            return None;
        }
        match self.cur_token.literal.as_str() {
            "=" => Some(Op::Equal),
            "!=" => Some(Op::NotEqual),
            "=~" => Some(Op::Regex),
            "!~" => Some(Op::NotRegex),
            "<" => Some(Op::Less),
            "<=" => Some(Op::LessEqual),
            ">" => Some(Op::Greater),
            ">=" => Some(Op::GreaterEqual),
            "+" => Some(Op::Add),
            "-" => Some(Op::Sub),
            "*" => Some(Op::Mult),
            "/" => Some(Op::Div),
            "%" => Some(Op::Mod),
            "^" => Some(Op::Power),
            "&&" => Some(Op::And),
            "||" => Some(Op::Or),
            _ => None,
        }
    }

    fn parse_unary(&mut self) -> Result<Expression> {
        if self.cur_token.is_operator("-") {
            self.next_token()?;
            let operand = self.parse_unary()?;
            // fold negation into numeric literals
            return Ok(match operand {
                Expression::Static(Static::Int(v)) => Expression::Static(Static::Int(-v)),
                Expression::Static(Static::Float(v)) => Expression::Static(Static::Float(-v)),
                Expression::Static(Static::Duration(v)) => {
                    Expression::Static(Static::Duration(-v))
                }
                other => Expression::unary(Op::Neg, other),
            });
        }
        if self.cur_token.is_operator("!") {
            self.next_token()?;
            let operand = self.parse_unary()?;
            return Ok(Expression::unary(Op::Not, operand));
        }
        if self.cur_token.is_punctuator("(") {
            self.next_token()?;
            let inner = self.parse_expression(Precedence::Lowest)?;
            self.expect_punctuator(")")?;
            return Ok(inner);
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expression> {
        let token = self.cur_token.clone();
        let expression = match token.token_type {
            TokenType::Integer => {
                let value: i64 = token.literal.parse().map_err(|_| {
                    ParseError::new(
                        format!("invalid integer literal '{}'", token.literal),
                        token.position,
                    )
                })?;
                Expression::Static(Static::Int(value))
            }
            TokenType::Float => {
                let value: f64 = token.literal.parse().map_err(|_| {
                    ParseError::new(
                        format!("invalid float literal '{}'", token.literal),
                        token.position,
                    )
                })?;
                Expression::Static(Static::Float(value))
            }
            TokenType::Duration => {
                let nanos = parse_duration(&token.literal).ok_or_else(|| {
                    ParseError::new(
                        format!("invalid duration literal '{}'", token.literal),
                        token.position,
                    )
                })?;
                Expression::Static(Static::Duration(nanos))
            }
            TokenType::String => Expression::Static(Static::string(token.literal.clone())),
            TokenType::Attribute => {
                Expression::Attribute(attribute_from_literal(&token.literal))
            }
            TokenType::Identifier => self.parse_identifier_literal(&token)?,
            _ => return Err(self.unexpected("expected expression")),
        };
        self.next_token()?;
        Ok(expression)
    }

    /// Bare identifiers: booleans, intrinsics, status and kind literals
    fn parse_identifier_literal(&self, token: &Token) -> Result<Expression> {
        let name = token.literal.as_str();
        if name == "true" {
            return Ok(Expression::Static(Static::Bool(true)));
        }
        if name == "false" {
            return Ok(Expression::Static(Static::Bool(false)));
        }
        if let Some(intrinsic) = Intrinsic::from_str(name) {
            return Ok(Expression::Attribute(Attribute::intrinsic(intrinsic)));
        }
        if let Some(status) = Status::from_str(name) {
            return Ok(Expression::Static(Static::Status(status)));
        }
        if let Some(kind) = Kind::from_str(name) {
            return Ok(Expression::Static(Static::Kind(kind)));
        }
        Err(ParseError::new(
            format!("unexpected identifier '{}'", name),
            token.position,
        ))
    }
}

/// Split an attribute token ("span.foo", "resource.foo", ".foo") into a
/// scope and name
fn attribute_from_literal(literal: &str) -> Attribute {
    if let Some(name) = literal.strip_prefix("span.") {
        return Attribute::scoped(AttributeScope::Span, name);
    }
    if let Some(name) = literal.strip_prefix("resource.") {
        return Attribute::scoped(AttributeScope::Resource, name);
    }
    Attribute::new(literal.strip_prefix('.').unwrap_or(literal))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Pipeline> {
        Parser::new(input).parse_pipeline()
    }

    fn parse_ok(input: &str) -> Pipeline {
        parse(input).unwrap_or_else(|e| panic!("parse failed for {input}: {e}"))
    }

    #[test]
    fn test_simple_filter() {
        let pipeline = parse_ok("{ .foo = \"bar\" }");
        assert_eq!(pipeline.stages.len(), 1);
        assert_eq!(pipeline.to_string(), "{ .foo = \"bar\" }");
    }

    #[test]
    fn test_precedence() {
        // * binds tighter than -, which binds tighter than =
        let pipeline = parse_ok("{ 2 - .bar * .foo = -19 }");
        let Stage::Spanset(SpansetExpression::Filter(filter)) = &pipeline.stages[0] else {
            panic!("expected filter");
        };
        let Expression::Binary(eq) = &filter.expression else {
            panic!("expected binary");
        };
        assert_eq!(eq.op, Op::Equal);
        assert_eq!(eq.rhs, Expression::Static(Static::Int(-19)));
        let Expression::Binary(sub) = &eq.lhs else {
            panic!("expected binary lhs");
        };
        assert_eq!(sub.op, Op::Sub);
        let Expression::Binary(mult) = &sub.rhs else {
            panic!("expected product on the right of -");
        };
        assert_eq!(mult.op, Op::Mult);
    }

    #[test]
    fn test_power_is_right_associative() {
        let pipeline = parse_ok("{ 2 ^ 3 ^ 2 = 512 }");
        let Stage::Spanset(SpansetExpression::Filter(filter)) = &pipeline.stages[0] else {
            panic!("expected filter");
        };
        let Expression::Binary(eq) = &filter.expression else {
            panic!("expected binary");
        };
        let Expression::Binary(outer) = &eq.lhs else {
            panic!("expected power chain");
        };
        assert_eq!(outer.op, Op::Power);
        assert_eq!(outer.lhs, Expression::Static(Static::Int(2)));
        // the right operand is itself 3 ^ 2
        let Expression::Binary(inner) = &outer.rhs else {
            panic!("expected nested power");
        };
        assert_eq!(inner.op, Op::Power);
    }

    #[test]
    fn test_parenthesized_expressions() {
        let pipeline = parse_ok("{ (2 - .bar) * .foo = -15 }");
        let Stage::Spanset(SpansetExpression::Filter(filter)) = &pipeline.stages[0] else {
            panic!("expected filter");
        };
        let Expression::Binary(eq) = &filter.expression else {
            panic!("expected binary");
        };
        let Expression::Binary(mult) = &eq.lhs else {
            panic!("expected product lhs");
        };
        assert_eq!(mult.op, Op::Mult);
        let Expression::Binary(sub) = &mult.lhs else {
            panic!("expected grouped subtraction");
        };
        assert_eq!(sub.op, Op::Sub);
    }

    #[test]
    fn test_unary_not_and_negation() {
        let pipeline = parse_ok("{ !(.foo = \"bar\") && -1 < 0 }");
        assert_eq!(pipeline.to_string(), "{ !(.foo = \"bar\") && -1 < 0 }");
    }

    #[test]
    fn test_literals() {
        let pipeline = parse_ok(
            "{ .a = 1 && .b = 2.5 && .c = .1 && .d = 100ms && .e = true && .f = error && .g = server }",
        );
        let rendered = pipeline.to_string();
        assert!(rendered.contains("2.5"));
        assert!(rendered.contains("100ms"));
        assert!(rendered.contains("error"));
        assert!(rendered.contains("server"));
    }

    #[test]
    fn test_attribute_scopes() {
        let pipeline = parse_ok("{ span.foo = 1 && resource.bar = 2 && .baz = 3 && duration > 1s }");
        let rendered = pipeline.to_string();
        assert!(rendered.contains("span.foo"));
        assert!(rendered.contains("resource.bar"));
        assert!(rendered.contains(".baz"));
        assert!(rendered.contains("duration > 1s"));
    }

    #[test]
    fn test_intrinsic_vs_unscoped() {
        let pipeline = parse_ok("{ duration > 1s && .duration > 2 }");
        let Stage::Spanset(SpansetExpression::Filter(filter)) = &pipeline.stages[0] else {
            panic!("expected filter");
        };
        let Expression::Binary(and) = &filter.expression else {
            panic!("expected binary");
        };
        let Expression::Binary(lhs) = &and.lhs else {
            panic!();
        };
        let Expression::Attribute(intrinsic) = &lhs.lhs else {
            panic!();
        };
        assert!(intrinsic.is_intrinsic());
        let Expression::Binary(rhs) = &and.rhs else {
            panic!();
        };
        let Expression::Attribute(user) = &rhs.lhs else {
            panic!();
        };
        assert!(!user.is_intrinsic());
    }

    #[test]
    fn test_spanset_operations() {
        let pipeline = parse_ok("{ .foo = `a` } && { .foo = `b` }");
        let Stage::Spanset(SpansetExpression::Operation(op)) = &pipeline.stages[0] else {
            panic!("expected spanset operation");
        };
        assert_eq!(op.op, SpansetOp::And);

        // left-associative chaining
        let pipeline = parse_ok("{ true } || { true } || { true }");
        let Stage::Spanset(SpansetExpression::Operation(outer)) = &pipeline.stages[0] else {
            panic!("expected spanset operation");
        };
        assert!(matches!(outer.lhs, SpansetExpression::Operation(_)));
        assert!(matches!(outer.rhs, SpansetExpression::Filter(_)));
    }

    #[test]
    fn test_structural_operators_parse() {
        for query in [
            "{ .a = 1 } >> { .b = 2 }",
            "{ .a = 1 } << { .b = 2 }",
            "{ .a = 1 } !>> { .b = 2 }",
            "{ .a = 1 } !<< { .b = 2 }",
        ] {
            parse_ok(query);
        }
    }

    #[test]
    fn test_pipeline_stages() {
        let pipeline = parse_ok("{ .foo = `a` } | count() > 1");
        assert_eq!(pipeline.stages.len(), 2);
        let Stage::ScalarFilter(filter) = &pipeline.stages[1] else {
            panic!("expected scalar filter");
        };
        assert_eq!(filter.op, Op::Greater);
        assert_eq!(
            filter.lhs,
            ScalarExpression::Aggregate(Aggregate::new(AggregateOp::Count, None))
        );
        assert_eq!(filter.rhs, ScalarExpression::Static(Static::Int(1)));
    }

    #[test]
    fn test_aggregate_stages() {
        let pipeline = parse_ok("{ true } | avg(duration) >= 10ms | count()");
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(
            pipeline.to_string(),
            "{ true } | avg(duration) >= 10ms | count()"
        );
    }

    #[test]
    fn test_aggregate_argument_arity() {
        assert!(parse("{ true } | count(.foo)").is_err());
        assert!(parse("{ true } | avg()").is_err());
        assert!(parse("{ true } | sum(.bytes) = 5").is_ok());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("{").is_err());
        assert!(parse("{ .foo = }").is_err());
        assert!(parse("{ .foo = 1 } |").is_err());
        assert!(parse("{ .foo = 1 } extra").is_err());
        assert!(parse("{ nosuchintrinsic = 1 }").is_err());
        assert!(parse("{ .foo == 1 }").is_err());
        assert!(parse("count() >").is_err());
        assert!(parse("3").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for query in [
            "{ .foo = \"bar\" }",
            "{ span.foo = 1 && resource.bar = 2 }",
            "{ duration > 1.8s }",
            "{ .foo = `a` } && { .foo = `b` }",
            "{ .foo = \"a\" } | avg(duration) >= 10ms",
            "{ true } | count() > 1",
        ] {
            let first = parse_ok(query).to_string();
            let second = parse_ok(&first).to_string();
            assert_eq!(first, second);
        }
    }
}
