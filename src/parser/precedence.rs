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

//! Operator precedence levels for the Pratt parser

use crate::core::Op;

/// Precedence levels (higher number = higher precedence)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum Precedence {
    /// Lowest precedence
    #[default]
    Lowest = 0,
    /// Logical or (||)
    Or = 1,
    /// Logical and (&&)
    And = 2,
    /// Comparison and regex (=, !=, <, <=, >, >=, =~, !~)
    Comparison = 3,
    /// Addition and subtraction (+, -)
    Sum = 4,
    /// Multiplication, division, modulo (*, /, %)
    Product = 5,
    /// Exponentiation (^), right-associative
    Power = 6,
}

impl Precedence {
    /// Get the precedence of a binary operator
    pub fn for_op(op: Op) -> Precedence {
        match op {
            Op::Or => Precedence::Or,
            Op::And => Precedence::And,
            Op::Equal
            | Op::NotEqual
            | Op::Regex
            | Op::NotRegex
            | Op::Greater
            | Op::GreaterEqual
            | Op::Less
            | Op::LessEqual => Precedence::Comparison,
            Op::Add | Op::Sub => Precedence::Sum,
            Op::Mult | Op::Div | Op::Mod => Precedence::Product,
            Op::Power => Precedence::Power,
            _ => Precedence::Lowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        assert!(Precedence::Power > Precedence::Product);
        assert!(Precedence::Product > Precedence::Sum);
        assert!(Precedence::Sum > Precedence::Comparison);
        assert!(Precedence::Comparison > Precedence::And);
        assert!(Precedence::And > Precedence::Or);
        assert!(Precedence::Or > Precedence::Lowest);
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(Precedence::for_op(Op::Mult), Precedence::Product);
        assert_eq!(Precedence::for_op(Op::Add), Precedence::Sum);
        assert_eq!(Precedence::for_op(Op::Regex), Precedence::Comparison);
        assert_eq!(Precedence::for_op(Op::And), Precedence::And);
        assert_eq!(Precedence::for_op(Op::Power), Precedence::Power);
    }
}
