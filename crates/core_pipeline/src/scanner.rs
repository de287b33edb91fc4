//! Candidate scanning over raw OCR text
//!
//! Two passes over the same character stream:
//! - strict: every `[A-Z]{4}[0-9]{7}` substring, the container-ID shape
//! - near-miss: whole 11-character alphanumeric tokens that only reach that
//!   shape through case folding and confusion-table substitutions
//!
//! Both keep the first occurrence of a string and drop later repeats.

use crate::confusion::ConfusionTable;
use crate::repair::FuzzyRepairer;
use crate::types::{CharClass, CONTAINER_ID_LEN};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref CONTAINER_ID_PATTERN: Regex = Regex::new(r"[A-Z]{4}[0-9]{7}").unwrap();
    static ref TOKEN_PATTERN: Regex = Regex::new(r"[A-Za-z0-9]+").unwrap();
}

/// Strict shape matches in `text`, left to right, first occurrence wins
pub fn scan_candidates(text: &str) -> Vec<String> {
    dedup(
        CONTAINER_ID_PATTERN
            .find_iter(text)
            .map(|m| (m.start(), m.as_str().to_string())),
    )
    .into_iter()
    .map(|(_, s)| s)
    .collect()
}

/// Tokens that look like IDs garbled by OCR
///
/// A token qualifies when it is exactly 11 alphanumerics, does not already
/// have the strict shape, and after uppercasing needs at most
/// `max_substitutions` wrong-class characters fixed, each of which has an
/// entry in `table`.
pub fn scan_near_misses(text: &str, table: &ConfusionTable, max_substitutions: usize) -> Vec<String> {
    near_miss_matches(text, table, max_substitutions)
        .into_iter()
        .map(|(_, s)| s)
        .collect()
}

/// Stateless scanner configured with the repair table and bound
#[derive(Debug, Clone)]
pub struct CandidateScanner {
    table: ConfusionTable,
    max_substitutions: usize,
    include_near_misses: bool,
}

impl CandidateScanner {
    pub fn new(table: ConfusionTable, max_substitutions: usize) -> Self {
        Self {
            table,
            max_substitutions,
            include_near_misses: true,
        }
    }

    /// A scanner that only reports strict matches
    pub fn strict() -> Self {
        Self {
            table: ConfusionTable::empty(),
            max_substitutions: 0,
            include_near_misses: false,
        }
    }

    pub fn from_repairer(repairer: &FuzzyRepairer) -> Self {
        Self::new(repairer.table().clone(), repairer.max_substitutions())
    }

    /// Strict matches and near-misses merged by position in `text`, deduplicated
    pub fn scan(&self, text: &str) -> Vec<String> {
        let mut found: Vec<(usize, String)> = dedup(
            CONTAINER_ID_PATTERN
                .find_iter(text)
                .map(|m| (m.start(), m.as_str().to_string())),
        );
        if self.include_near_misses {
            found.extend(near_miss_matches(text, &self.table, self.max_substitutions));
        }
        found.sort_by_key(|(start, _)| *start);
        dedup(found).into_iter().map(|(_, s)| s).collect()
    }
}

impl Default for CandidateScanner {
    fn default() -> Self {
        Self::from_repairer(&FuzzyRepairer::default())
    }
}

fn near_miss_matches(
    text: &str,
    table: &ConfusionTable,
    max_substitutions: usize,
) -> Vec<(usize, String)> {
    let tokens = TOKEN_PATTERN.find_iter(text).filter_map(|m| {
        let token = m.as_str();
        if token.len() != CONTAINER_ID_LEN || CONTAINER_ID_PATTERN.is_match(token) {
            return None;
        }
        is_near_miss(token, table, max_substitutions).then(|| (m.start(), token.to_string()))
    });
    dedup(tokens)
}

fn is_near_miss(token: &str, table: &ConfusionTable, max_substitutions: usize) -> bool {
    let mut wrong = 0;
    for (i, c) in token.chars().map(|c| c.to_ascii_uppercase()).enumerate() {
        let class = CharClass::for_position(i);
        if class.accepts(c) {
            continue;
        }
        if !table.can_correct(class, c) {
            return false;
        }
        wrong += 1;
    }
    wrong <= max_substitutions
}

fn dedup(matches: impl IntoIterator<Item = (usize, String)>) -> Vec<(usize, String)> {
    let mut seen = HashSet::new();
    matches
        .into_iter()
        .filter(|(_, s)| seen.insert(s.clone()))
        .collect()
}
