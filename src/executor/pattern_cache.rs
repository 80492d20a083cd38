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

//! Compiled pattern cache for regex predicates
//!
//! `=~` and `!~` predicates evaluate per span; compiling the pattern on
//! every row would dominate the match cost. Patterns are compiled once per
//! distinct pattern string and memoized for the duration of one pipeline
//! evaluation. The cache is created at query start and dropped with the
//! query, so patterns never leak across queries.
//!
//! Patterns match exactly as written: no anchors are added, so
//! `"hello w.*"` is an unanchored substring match unless the caller
//! writes `^`/`$` themselves.

use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::RwLock;

use crate::core::{Error, Result};

/// Patterns cached per evaluation before oldest entries are shed
const MAX_CACHE_SIZE: usize = 1_000;

/// Query-scoped cache of compiled regex patterns
#[derive(Debug, Default)]
pub struct PatternCache {
    cache: RwLock<FxHashMap<String, Regex>>,
}

impl PatternCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or compile the pattern
    ///
    /// A malformed pattern is a structural error and surfaces to the
    /// caller rather than being absorbed as a non-match.
    pub fn get_or_compile(&self, pattern: &str) -> Result<Regex> {
        if let Ok(cache) = self.cache.read() {
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let compiled = Regex::new(pattern)
            .map_err(|e| Error::invalid_regex(pattern, e.to_string()))?;

        if let Ok(mut cache) = self.cache.write() {
            if cache.len() >= MAX_CACHE_SIZE {
                let keys: Vec<_> = cache.keys().take(MAX_CACHE_SIZE / 2).cloned().collect();
                for key in keys {
                    cache.remove(&key);
                }
            }
            cache.insert(pattern.to_string(), compiled.clone());
        }

        Ok(compiled)
    }

    /// Number of cached patterns
    pub fn size(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}
