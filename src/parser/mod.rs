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
//! - [`token`] / [`lexer`] - tokenization
//! - [`ast`] - the parsed query tree
//! - [`parser`] - Pratt parser producing a [`Pipeline`](ast::Pipeline)

pub mod ast;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod precedence;
pub mod token;

pub use ast::{
    Aggregate, BinaryOperation, Expression, Pipeline, ScalarExpression, ScalarFilter,
    SpansetExpression, SpansetFilter, SpansetOperation, Stage, UnaryOperation,
};
pub use error::ParseError;
pub use parser::Parser;

/// Parse a query into a pipeline
pub fn parse(input: &str) -> crate::core::Result<Pipeline> {
    Parser::new(input).parse_pipeline().map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entrypoint() {
        assert!(parse("{ .foo = 1 }").is_ok());
        let err = parse("{ .foo = ").unwrap_err();
        assert!(matches!(err, crate::core::Error::Parse(_)));
    }
}
