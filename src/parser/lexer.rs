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

//! Query lexer (tokenizer)
//!
//! Turns query text into [`Token`]s. A few shapes need one character of
//! lookahead to separate:
//!
//! - `.foo` is an attribute, `.5` is a float, `.5s` is a duration
//! - `span.foo` / `resource.foo` are scoped attributes, `span` alone is
//!   an identifier
//! - `|` is the pipeline separator, `||` is an operator
//! - `100ms` is one duration token, not a number and an identifier

use super::token::{
    is_attribute_char, is_identifier_char, is_identifier_start, is_operator, is_operator_char,
    is_punctuator, Position, Token, TokenType, OPERATORS,
};

/// Query lexer over a char buffer
pub struct Lexer {
    /// Input characters
    input: Vec<char>,
    /// Index of the character under examination
    position: usize,
    /// Index of the next character to read
    read_position: usize,
    /// Current character under examination
    ch: char,
    /// Current source position
    pos: Position,
}

impl Lexer {
    /// Create a new lexer for the given input
    pub fn new(input: &str) -> Self {
        let mut lexer = Self {
            input: input.chars().collect(),
            position: 0,
            read_position: 0,
            ch: '\0',
            pos: Position::new(0, 1, 1),
        };
        lexer.read_char();
        lexer
    }

    /// Read the next character
    fn read_char(&mut self) {
        if self.ch == '\n' {
            self.pos.line += 1;
            self.pos.column = 1;
        } else if self.ch != '\0' {
            self.pos.column += 1;
        }

        if self.read_position >= self.input.len() {
            self.ch = '\0';
        } else {
            self.ch = self.input[self.read_position];
            self.position = self.read_position;
            self.read_position += 1;
        }

        self.pos.offset = self.position;
    }

    /// Peek at the next character without advancing
    fn peek_char(&self) -> char {
        if self.read_position >= self.input.len() {
            '\0'
        } else {
            self.input[self.read_position]
        }
    }

    fn skip_whitespace(&mut self) {
        while self.ch.is_whitespace() {
            self.read_char();
        }
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        let pos = self.pos;

        match self.ch {
            '\0' => Token::eof(pos),

            // String literals: double quotes, single quotes, raw backticks
            '"' | '\'' => {
                let quote = self.ch;
                match self.read_string(quote) {
                    Ok(literal) => Token::new(TokenType::String, literal, pos),
                    Err(message) => Token::error(message, "", pos),
                }
            }
            '`' => match self.read_raw_string() {
                Ok(literal) => Token::new(TokenType::String, literal, pos),
                Err(message) => Token::error(message, "", pos),
            },

            // Leading-dot attribute or leading-dot number
            '.' => {
                if self.peek_char().is_ascii_digit() {
                    self.read_char(); // consume '.'
                    let mut literal = String::from(".");
                    while self.ch.is_ascii_digit() {
                        literal.push(self.ch);
                        self.read_char();
                    }
                    self.finish_number(literal, true, pos)
                } else if is_identifier_start(self.peek_char()) {
                    self.read_char(); // consume '.'
                    let name = self.read_attribute_name();
                    Token::new(TokenType::Attribute, format!(".{}", name), pos)
                } else {
                    self.read_char();
                    Token::error("unexpected character after '.'", ".", pos)
                }
            }

            // Number literal, possibly a duration
            c if c.is_ascii_digit() => {
                let mut literal = String::new();
                while self.ch.is_ascii_digit() {
                    literal.push(self.ch);
                    self.read_char();
                }
                let mut is_float = false;
                if self.ch == '.' {
                    is_float = true;
                    literal.push('.');
                    self.read_char();
                    while self.ch.is_ascii_digit() {
                        literal.push(self.ch);
                        self.read_char();
                    }
                }
                self.finish_number(literal, is_float, pos)
            }

            // Identifier, possibly a scoped attribute prefix
            c if is_identifier_start(c) => {
                let ident = self.read_identifier();
                let scoped = (ident == "span" || ident == "resource")
                    && self.ch == '.'
                    && is_attribute_char(self.peek_char());
                if scoped {
                    self.read_char(); // consume '.'
                    let name = self.read_attribute_name();
                    Token::new(TokenType::Attribute, format!("{}.{}", ident, name), pos)
                } else {
                    Token::new(TokenType::Identifier, ident, pos)
                }
            }

            // Pipe: pipeline separator, unless doubled into ||
            '|' => {
                if self.peek_char() == '|' {
                    self.read_char();
                    self.read_char();
                    Token::new(TokenType::Operator, "||", pos)
                } else {
                    self.read_char();
                    Token::new(TokenType::Punctuator, "|", pos)
                }
            }

            c if is_punctuator(c) => {
                self.read_char();
                Token::new(TokenType::Punctuator, c.to_string(), pos)
            }

            c if is_operator_char(c) => {
                let literal = self.read_operator();
                if is_operator(&literal) {
                    Token::new(TokenType::Operator, literal, pos)
                } else {
                    Token::error(format!("unknown operator '{}'", literal), literal, pos)
                }
            }

            c => {
                self.read_char();
                Token::error(
                    format!("unexpected character '{}'", c),
                    c.to_string(),
                    pos,
                )
            }
        }
    }

    /// Attach a trailing duration unit to a number if one follows
    fn finish_number(&mut self, mut literal: String, is_float: bool, pos: Position) -> Token {
        if matches!(self.ch, 'n' | 'u' | 'm' | 's' | 'h' | 'µ' | 'μ') {
            while self.ch.is_ascii_alphanumeric()
                || self.ch == '.'
                || self.ch == 'µ'
                || self.ch == 'μ'
            {
                literal.push(self.ch);
                self.read_char();
            }
            return Token::new(TokenType::Duration, literal, pos);
        }
        if is_float {
            Token::new(TokenType::Float, literal, pos)
        } else {
            Token::new(TokenType::Integer, literal, pos)
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut out = String::new();
        while is_identifier_char(self.ch) {
            out.push(self.ch);
            self.read_char();
        }
        out
    }

    /// Attribute names may contain dots ("http.status_code"); a dot is
    /// part of the name only when another name character follows it
    fn read_attribute_name(&mut self) -> String {
        let mut out = String::new();
        loop {
            if is_attribute_char(self.ch) {
                out.push(self.ch);
                self.read_char();
            } else if self.ch == '.' && is_attribute_char(self.peek_char()) {
                out.push('.');
                self.read_char();
            } else {
                break;
            }
        }
        out
    }

    /// Longest-match operator scan: extend only while the text remains a
    /// prefix of some known operator, so "=-1" lexes as '=' then '-' '1'
    fn read_operator(&mut self) -> String {
        let mut out = String::new();
        out.push(self.ch);
        self.read_char();
        while is_operator_char(self.ch) {
            let mut extended = out.clone();
            extended.push(self.ch);
            if !OPERATORS.iter().any(|op| op.starts_with(&extended)) {
                break;
            }
            out = extended;
            self.read_char();
        }
        out
    }

    fn read_string(&mut self, quote: char) -> Result<String, String> {
        self.read_char(); // consume opening quote
        let mut out = String::new();
        loop {
            match self.ch {
                '\0' => return Err("unterminated string literal".to_string()),
                '\\' => {
                    self.read_char();
                    let escaped = match self.ch {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        '\0' => return Err("unterminated string literal".to_string()),
                        c => c,
                    };
                    out.push(escaped);
                    self.read_char();
                }
                c if c == quote => {
                    self.read_char();
                    return Ok(out);
                }
                c => {
                    out.push(c);
                    self.read_char();
                }
            }
        }
    }

    /// Backtick strings are raw: no escape processing
    fn read_raw_string(&mut self) -> Result<String, String> {
        self.read_char(); // consume opening backtick
        let mut out = String::new();
        loop {
            match self.ch {
                '\0' => return Err("unterminated string literal".to_string()),
                '`' => {
                    self.read_char();
                    return Ok(out);
                }
                c => {
                    out.push(c);
                    self.read_char();
                }
            }
        }
    }
}
