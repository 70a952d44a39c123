//! Fuzzy matching for spec names

use crate::error::{NcError, Result};
use crate::suite::Suite;
use nucleo::{Config, Matcher, Utf32Str};

/// Fuzzy matcher over spec full texts
pub struct FuzzyMatcher {
    matcher: Matcher,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FuzzyMatcher {
    pub fn new() -> Self {
        Self {
            matcher: Matcher::new(Config::DEFAULT),
        }
    }

    /// Score every candidate against the pattern.
    /// Returns candidate indices with scores, highest first
    pub fn match_candidates(&mut self, pattern: &str, candidates: &[String]) -> Vec<(usize, u16)> {
        if pattern.is_empty() {
            return Vec::new();
        }

        let mut pattern_buf = Vec::new();
        let pattern_utf32 = Utf32Str::new(pattern, &mut pattern_buf);

        let mut matches: Vec<(usize, u16)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(i, candidate)| {
                let mut candidate_buf = Vec::new();
                let candidate_utf32 = Utf32Str::new(candidate, &mut candidate_buf);
                self.matcher
                    .fuzzy_match(candidate_utf32, pattern_utf32)
                    .map(|score| (i, score))
            })
            .collect();

        matches.sort_by(|a, b| b.1.cmp(&a.1));
        matches
    }
}

/// Resolve a pattern to the index of one candidate.
///
/// A candidate containing the pattern verbatim wins when it is the only one;
/// otherwise the fuzzy winner must score more than twice the runner-up.
pub fn resolve_index(pattern: &str, candidates: &[String]) -> Result<usize> {
    if let Some(i) = candidates.iter().position(|c| c == pattern) {
        return Ok(i);
    }

    let containing: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.contains(pattern))
        .map(|(i, _)| i)
        .collect();
    if containing.len() == 1 {
        return Ok(containing[0]);
    }

    let mut matcher = FuzzyMatcher::new();
    let matches = matcher.match_candidates(pattern, candidates);

    match matches.len() {
        0 => Err(NcError::NotFound {
            kind: "spec".to_string(),
            name: pattern.to_string(),
        }),
        1 => Ok(matches[0].0),
        _ => {
            if matches[0].1 > matches[1].1.saturating_mul(2) {
                Ok(matches[0].0)
            } else {
                Err(NcError::AmbiguousMatch {
                    pattern: pattern.to_string(),
                    matches: matches
                        .iter()
                        .take(5)
                        .map(|(i, _)| candidates[*i].clone())
                        .collect(),
                })
            }
        }
    }
}

/// Resolve a pattern to the declaration index of one spec in the suite
pub fn resolve_spec(pattern: &str, suite: &Suite) -> Result<usize> {
    resolve_index(pattern, &suite.full_texts())
}
