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

//! Error types for spanql
//!
//! This module defines the error types used throughout the query engine.
//! Evaluation-local misses (unknown attributes, type mismatches, empty
//! aggregates) are not errors; they resolve to `Static::Nil` or a false
//! predicate inside the evaluator. Only structural failures surface here.

use thiserror::Error;

/// Result type alias for spanql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for query parsing and execution
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed query text
    #[error("parse error: {0}")]
    Parse(String),

    /// A stage or operator the evaluator does not implement
    #[error("not supported: {0}")]
    Unsupported(String),

    /// Invalid regular expression literal in a `=~` / `!~` predicate
    #[error("invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    /// Error propagated unchanged from the storage layer
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Query cancelled via the execution context
    #[error("query cancelled")]
    QueryCancelled,
}

impl Error {
    /// Create a new Parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    /// Create a new Unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported(message.into())
    }

    /// Create a new InvalidRegex error
    pub fn invalid_regex(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidRegex {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Wrap a storage-layer error
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Storage(Box::new(err))
    }

    /// Check if this error came from the storage layer
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Storage(_))
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::QueryCancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::parse("unexpected token '}'").to_string(),
            "parse error: unexpected token '}'"
        );
        assert_eq!(
            Error::unsupported("spanset operation (>>)").to_string(),
            "not supported: spanset operation (>>)"
        );
        assert_eq!(Error::QueryCancelled.to_string(), "query cancelled");
    }

    #[test]
    fn test_invalid_regex_display() {
        let err = Error::invalid_regex("(", "unclosed group");
        assert_eq!(err.to_string(), "invalid regex '(': unclosed group");
    }

    #[test]
    fn test_storage_wrapping() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "block gone");
        let err = Error::storage(io);
        assert!(err.is_storage());
        assert!(err.to_string().contains("storage error"));
        assert!(std::error::Error::source(&err)
            .expect("source")
            .to_string()
            .contains("block gone"));
    }

    #[test]
    fn test_classification() {
        assert!(Error::QueryCancelled.is_cancelled());
        assert!(!Error::parse("x").is_cancelled());
        assert!(!Error::parse("x").is_storage());
    }
}
