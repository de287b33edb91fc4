//! Core types for the recognition pipeline
//!
//! These are the values handed back to the caller. Field names on the wire
//! follow the flat report format (`container_ids_found`, `validated_ids`, ...)
//! so storage and UI layers can consume them as-is.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of characters in a container ID
pub const CONTAINER_ID_LEN: usize = 11;

/// Positions holding letters (owner code + equipment category)
pub const LETTER_POSITIONS: std::ops::Range<usize> = 0..4;

/// Which character class a position of a container ID must hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharClass {
    Letter,
    Digit,
}

impl CharClass {
    /// Expected class for `position` (0-based) in an 11-character ID
    pub fn for_position(position: usize) -> Self {
        if LETTER_POSITIONS.contains(&position) {
            CharClass::Letter
        } else {
            CharClass::Digit
        }
    }

    /// True if `c` is an uppercase member of this class
    pub fn accepts(self, c: char) -> bool {
        match self {
            CharClass::Letter => c.is_ascii_uppercase(),
            CharClass::Digit => c.is_ascii_digit(),
        }
    }
}

/// Per-candidate outcome that did not produce a valid ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    /// Not 3 letters + 1 letter + 6 digits + 1 digit
    #[error("malformed")]
    Malformed,
    /// Shape is right but the declared check digit is wrong
    #[error("checksum mismatch")]
    ChecksumMismatch,
    /// Fuzzy repair ran out of options within its bound
    #[error("repair exhausted")]
    RepairExhausted,
}

/// A single character substitution applied by the fuzzy repairer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    /// 0-based index into the ID
    pub position: usize,
    /// Character read by OCR
    pub observed: char,
    /// Character substituted
    pub corrected: char,
}

/// Verdict for one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    #[serde(rename = "container_id")]
    pub candidate_id: Option<String>,
    #[serde(rename = "valid")]
    pub is_valid: bool,
    /// Check digit computed from the first ten characters, when the shape allowed it
    #[serde(rename = "check_digit")]
    pub computed_check_digit: Option<u8>,
    pub error: Option<ValidationError>,
    /// Candidate as scanned, when the fuzzy repairer replaced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repaired_from: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corrections: Vec<Correction>,
}

impl ValidationResult {
    pub fn valid(id: impl Into<String>, check_digit: u8) -> Self {
        Self {
            candidate_id: Some(id.into()),
            is_valid: true,
            computed_check_digit: Some(check_digit),
            error: None,
            repaired_from: None,
            corrections: Vec::new(),
        }
    }

    pub fn invalid(
        id: impl Into<String>,
        check_digit: Option<u8>,
        error: ValidationError,
    ) -> Self {
        Self {
            candidate_id: Some(id.into()),
            is_valid: false,
            computed_check_digit: check_digit,
            error: Some(error),
            repaired_from: None,
            corrections: Vec::new(),
        }
    }

    /// Mark this result as the product of repairing `original`
    pub fn with_repair(mut self, original: impl Into<String>, corrections: Vec<Correction>) -> Self {
        self.repaired_from = Some(original.into());
        self.corrections = corrections;
        self
    }
}

/// Everything one recognition run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    pub success: bool,
    /// OCR output; absent when the run stopped before extraction finished
    pub raw_text: Option<String>,
    /// Candidates in order of first appearance, no duplicates
    #[serde(rename = "container_ids_found")]
    pub candidates_found: Vec<String>,
    /// One entry per candidate, same order as `candidates_found`
    ///
    /// A candidate that resolves to a valid ID already listed here (a
    /// repaired near-miss of an ID also read cleanly) is left out.
    #[serde(rename = "validated_ids")]
    pub validated: Vec<ValidationResult>,
    pub best_match: Option<ValidationResult>,
    pub error: Option<String>,
}

impl PipelineResult {
    /// Result for a run that aborted before text was available
    pub fn failure(error: impl ToString) -> Self {
        Self {
            success: false,
            raw_text: None,
            candidates_found: Vec::new(),
            validated: Vec::new(),
            best_match: None,
            error: Some(error.to_string()),
        }
    }

    /// Result for a completed run; `best_match` is derived from `validated`
    pub fn completed(
        raw_text: String,
        candidates_found: Vec<String>,
        validated: Vec<ValidationResult>,
    ) -> Self {
        let best_match = validated.iter().find(|v| v.is_valid).cloned();
        Self {
            success: true,
            raw_text: Some(raw_text),
            candidates_found,
            validated,
            best_match,
            error: None,
        }
    }

    /// ID of the best match, if any candidate validated
    pub fn best_id(&self) -> Option<&str> {
        self.best_match
            .as_ref()
            .and_then(|m| m.candidate_id.as_deref())
    }
}
