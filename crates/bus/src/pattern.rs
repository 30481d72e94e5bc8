// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2025 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! Compiles subscription patterns into matchers and caches them.
//!
//! A pattern is a literal event name with optional `*` segments. `*` matches any run of
//! characters, including the empty run and including `.`; every other character (including
//! other regex metacharacters) is treated literally. This is deliberately not a regex engine:
//! a pattern compiles to a flat sequence of literal/wildcard [`Segment`]s, which the matcher
//! walks directly against the candidate event name.

use std::cell::RefCell;

use cadbus_core::correctness::{check_nonempty_string, check_valid_string};
use indexmap::IndexMap;
use ustr::Ustr;

use crate::error::BusError;

/// Maximum length of a pattern or event name, in bytes.
pub const MAX_PATTERN_LEN: usize = 256;

/// Default capacity of the compiled-pattern cache before half-eviction kicks in.
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Star,
}

fn compile_segments(pattern: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut last = 0;

    for (i, _) in pattern.match_indices('*') {
        if i > last {
            segments.push(Segment::Literal(pattern[last..i].to_owned()));
        }
        if !matches!(segments.last(), Some(Segment::Star)) {
            segments.push(Segment::Star);
        }
        last = i + 1;
    }

    if last < pattern.len() {
        segments.push(Segment::Literal(pattern[last..].to_owned()));
    }

    segments
}

fn matches_segments(segments: &[Segment], event: &str) -> bool {
    match segments.split_first() {
        None => event.is_empty(),
        Some((Segment::Literal(lit), rest)) => {
            event.starts_with(lit.as_str()) && matches_segments(rest, &event[lit.len()..])
        }
        Some((Segment::Star, rest)) => {
            if rest.is_empty() {
                return true;
            }
            (0..=event.len())
                .filter(|&i| event.is_char_boundary(i))
                .any(|i| matches_segments(rest, &event[i..]))
        }
    }
}

/// A pattern compiled into a flat sequence of literal/wildcard segments.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    raw: Ustr,
    wildcard_only: bool,
    segments: Vec<Segment>,
}

impl CompiledPattern {
    fn compile(pattern: &str) -> Self {
        Self {
            raw: Ustr::from(pattern),
            wildcard_only: pattern == "*",
            segments: compile_segments(pattern),
        }
    }

    /// Returns whether `event` matches this compiled pattern.
    #[must_use]
    pub fn matches(&self, event: &str) -> bool {
        self.wildcard_only || matches_segments(&self.segments, event)
    }

    /// Returns the source pattern string this was compiled from.
    #[must_use]
    pub fn raw(&self) -> &str {
        self.raw.as_str()
    }
}

/// Validates that `pattern` is a legal subscription pattern: non-empty and at most
/// [`MAX_PATTERN_LEN`] bytes.
pub fn validate_pattern(pattern: &str) -> Result<(), BusError> {
    if pattern.is_empty() || pattern.len() > MAX_PATTERN_LEN {
        return Err(BusError::InvalidPattern {
            len: pattern.len(),
            max: MAX_PATTERN_LEN,
        });
    }
    check_nonempty_string(pattern, "pattern").map_err(|_| BusError::InvalidPattern {
        len: pattern.len(),
        max: MAX_PATTERN_LEN,
    })?;
    check_valid_string(pattern, "pattern").map_err(|_| BusError::InvalidPattern {
        len: pattern.len(),
        max: MAX_PATTERN_LEN,
    })
}

/// Compiles patterns on demand and memoizes them, bounded to a capacity with half-eviction
/// on overflow (oldest-inserted entries are evicted first).
#[derive(Debug)]
pub struct PatternMatcher {
    cache: RefCell<IndexMap<Ustr, std::rc::Rc<CompiledPattern>>>,
    capacity: usize,
}

impl PatternMatcher {
    /// Creates a new matcher with the given cache capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: RefCell::new(IndexMap::new()),
            capacity,
        }
    }

    /// Returns whether `event` matches `pattern`, compiling and caching `pattern` on first use.
    ///
    /// Compilation never fails for patterns validated by [`validate_pattern`] and is
    /// idempotent: repeated calls for the same pattern return the same cached matcher.
    #[must_use]
    pub fn matches(&self, event: &str, pattern: &str) -> bool {
        self.compiled(pattern).matches(event)
    }

    fn compiled(&self, pattern: &str) -> std::rc::Rc<CompiledPattern> {
        let key = Ustr::from(pattern);
        if let Some(existing) = self.cache.borrow().get(&key) {
            return existing.clone();
        }

        let compiled = std::rc::Rc::new(CompiledPattern::compile(pattern));
        let mut cache = self.cache.borrow_mut();
        if cache.len() >= self.capacity {
            let evict = (cache.len() / 2).max(1);
            for _ in 0..evict {
                cache.shift_remove_index(0);
            }
        }
        cache.insert(key, compiled.clone());
        compiled
    }

    /// Removes a cached compiled matcher for `pattern`, if present.
    pub fn invalidate_pattern(&self, pattern: &str) {
        self.cache.borrow_mut().shift_remove(&Ustr::from(pattern));
    }

    /// Empties the compiled-pattern cache.
    pub fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }

    /// Returns the number of cached compiled patterns.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("*", "*", true)]
    #[case("a", "*", true)]
    #[case("a", "a", true)]
    #[case("a", "b", false)]
    #[case("anything.at.all", "*", true)]
    #[case("data.quotes.BINANCE", "data.*", true)]
    #[case("data.quotes.BINANCE", "data.quotes*", true)]
    #[case("data.quotes.BINANCE", "data.*.BINANCE", true)]
    #[case("data.trades.BINANCE.ETHUSDT", "data.*.BINANCE.*", true)]
    #[case("data.trades.BINANCE.ETHUSDT", "data.*.BINANCE.ETH*", true)]
    #[case("a.b.c", "a.*.c", true)]
    #[case("a.b.x.c", "a.*.c", true)]
    #[case("a.c", "a.*.c", false)]
    #[case("b.a.x.c", "a.*.c", false)]
    fn test_matches(#[case] event: &str, #[case] pattern: &str, #[case] expected: bool) {
        let matcher = PatternMatcher::default();
        assert_eq!(matcher.matches(event, pattern), expected);
    }

    #[rstest]
    fn test_literal_metacharacters_are_not_special() {
        let matcher = PatternMatcher::default();
        assert!(matcher.matches("a?b", "a?b"));
        assert!(!matcher.matches("axb", "a?b"));
        assert!(!matcher.matches("ab", "a[b]"));
        assert!(matcher.matches("a[b]", "a[b]"));
    }

    #[rstest]
    fn test_cache_is_idempotent() {
        let matcher = PatternMatcher::default();
        assert!(matcher.matches("a.b", "a.*"));
        assert_eq!(matcher.cache_len(), 1);
        assert!(matcher.matches("a.c", "a.*"));
        assert_eq!(matcher.cache_len(), 1);
    }

    #[rstest]
    fn test_invalidate_and_clear() {
        let matcher = PatternMatcher::default();
        matcher.matches("a.b", "a.*");
        matcher.matches("x", "x");
        assert_eq!(matcher.cache_len(), 2);
        matcher.invalidate_pattern("a.*");
        assert_eq!(matcher.cache_len(), 1);
        matcher.clear_cache();
        assert_eq!(matcher.cache_len(), 0);
    }

    #[rstest]
    fn test_half_eviction_on_overflow() {
        let matcher = PatternMatcher::new(4);
        for i in 0..4 {
            matcher.matches("x", &format!("p{i}"));
        }
        assert_eq!(matcher.cache_len(), 4);
        matcher.matches("x", "p4");
        assert!(matcher.cache_len() <= 3);
    }

    #[rstest]
    fn test_validate_pattern() {
        assert!(validate_pattern("").is_err());
        assert!(validate_pattern(&"a".repeat(257)).is_err());
        assert!(validate_pattern("a.*.b").is_ok());
    }
}
