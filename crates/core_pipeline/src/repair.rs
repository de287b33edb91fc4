//! Fuzzy repair of OCR misreads
//!
//! OCR engines regularly swap look-alike glyphs across the letter/digit
//! boundary (`0`/`O`, `1`/`I`, `5`/`S`, ...). Because every position of a
//! container ID has a fixed class, a character of the wrong class tells us
//! exactly where the misread is and which direction to correct it.
//!
//! Only wrong-class positions are ever touched. A candidate whose shape is
//! already correct but whose check digit fails is left alone: that is either
//! another registered ID or a digit-for-digit misread, and guessing would
//! produce plausible-looking false positives.

use crate::checksum::ChecksumValidator;
use crate::confusion::ConfusionTable;
use crate::types::{CharClass, Correction, ValidationError, ValidationResult, CONTAINER_ID_LEN};
use tracing::{debug, trace};

/// Default bound on the number of positions a repair may change
pub const DEFAULT_MAX_SUBSTITUTIONS: usize = 2;

/// A successful repair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// The checksum-valid ID
    pub id: String,
    pub check_digit: u8,
    /// Substitutions applied, left to right; empty for a case-only fix
    pub corrections: Vec<Correction>,
}

/// Recovers checksum-valid IDs from candidates with wrong-class characters
#[derive(Debug, Clone)]
pub struct FuzzyRepairer {
    table: ConfusionTable,
    max_substitutions: usize,
    validator: ChecksumValidator,
}

impl Default for FuzzyRepairer {
    fn default() -> Self {
        Self::new(
            ConfusionTable::default(),
            DEFAULT_MAX_SUBSTITUTIONS,
            ChecksumValidator::default(),
        )
    }
}

impl FuzzyRepairer {
    pub fn new(table: ConfusionTable, max_substitutions: usize, validator: ChecksumValidator) -> Self {
        Self {
            table,
            max_substitutions,
            validator,
        }
    }

    pub fn table(&self) -> &ConfusionTable {
        &self.table
    }

    pub fn max_substitutions(&self) -> usize {
        self.max_substitutions
    }

    /// Positions of `candidate` (uppercased) holding the wrong character class
    ///
    /// Returns `None` if the candidate can never become an ID: wrong length
    /// or a non-alphanumeric character.
    pub fn misplaced_positions(candidate: &str) -> Option<Vec<usize>> {
        let normalized = normalize(candidate)?;
        Some(
            normalized
                .iter()
                .enumerate()
                .filter(|(i, c)| !CharClass::for_position(*i).accepts(**c))
                .map(|(i, _)| i)
                .collect(),
        )
    }

    /// True if every misplaced position of `candidate` has a table entry and
    /// there are no more of them than the bound allows
    pub fn is_repairable_shape(&self, candidate: &str) -> bool {
        let Some(normalized) = normalize(candidate) else {
            return false;
        };
        let Some(misplaced) = Self::misplaced_positions(candidate) else {
            return false;
        };
        misplaced.len() <= self.max_substitutions
            && misplaced
                .iter()
                .all(|&p| self.table.can_correct(CharClass::for_position(p), normalized[p]))
    }

    /// Try to turn `candidate` into a checksum-valid ID
    ///
    /// Substitutions are enumerated with positions in left-to-right order
    /// and each position's alternatives in table order. The rightmost
    /// position cycles fastest, so the leftmost position keeps its preferred
    /// reading longest and the first valid combination wins.
    pub fn repair(&self, candidate: &str) -> Result<Repair, ValidationError> {
        let normalized = normalize(candidate).ok_or(ValidationError::Malformed)?;
        let misplaced: Vec<usize> = (0..CONTAINER_ID_LEN)
            .filter(|&i| !CharClass::for_position(i).accepts(normalized[i]))
            .collect();

        if misplaced.is_empty() {
            // Shape is right; only case can differ from what was scanned
            let id: String = normalized.iter().collect();
            let result = self.validator.validate(&id);
            return match (result.is_valid, result.computed_check_digit) {
                (true, Some(check_digit)) => Ok(Repair {
                    id,
                    check_digit,
                    corrections: Vec::new(),
                }),
                _ => Err(result.error.unwrap_or(ValidationError::ChecksumMismatch)),
            };
        }

        if misplaced.len() > self.max_substitutions {
            debug!(
                candidate,
                misplaced = misplaced.len(),
                bound = self.max_substitutions,
                "Too many misplaced characters to repair"
            );
            return Err(ValidationError::RepairExhausted);
        }

        let options: Vec<&[char]> = misplaced
            .iter()
            .map(|&p| self.table.corrections(CharClass::for_position(p), normalized[p]))
            .collect();
        if options.iter().any(|o| o.is_empty()) {
            debug!(candidate, "Misplaced character has no confusion table entry");
            return Err(ValidationError::RepairExhausted);
        }

        let mut choice = vec![0usize; misplaced.len()];
        let mut attempt = normalized.clone();
        loop {
            for (slot, &pos) in misplaced.iter().enumerate() {
                attempt[pos] = options[slot][choice[slot]];
            }
            let id: String = attempt.iter().collect();
            let result = self.validator.validate(&id);
            trace!(candidate, attempt = %id, valid = result.is_valid, "Repair attempt");

            if let (true, Some(check_digit)) = (result.is_valid, result.computed_check_digit) {
                let corrections = misplaced
                    .iter()
                    .map(|&pos| Correction {
                        position: pos,
                        observed: normalized[pos],
                        corrected: attempt[pos],
                    })
                    .collect();
                debug!(candidate, repaired = %id, "Repaired candidate");
                return Ok(Repair {
                    id,
                    check_digit,
                    corrections,
                });
            }

            if !advance(&mut choice, &options) {
                return Err(ValidationError::RepairExhausted);
            }
        }
    }

    /// Validate `candidate`, falling back to repair when it is invalid
    pub fn resolve(&self, candidate: &str) -> ValidationResult {
        let initial = self.validator.validate(candidate);
        if initial.is_valid {
            return initial;
        }

        match self.repair(candidate) {
            Ok(repair) => ValidationResult::valid(repair.id, repair.check_digit)
                .with_repair(candidate, repair.corrections),
            Err(error) => {
                // Uppercasing alone may reach the ID shape; report that reading
                let folded = candidate.to_ascii_uppercase();
                if folded != candidate {
                    let result = self.validator.validate(&folded);
                    if result.computed_check_digit.is_some() {
                        return ValidationResult {
                            error: Some(error),
                            ..result
                        }
                        .with_repair(candidate, Vec::new());
                    }
                }
                ValidationResult {
                    error: Some(error),
                    ..initial
                }
            }
        }
    }
}

/// Uppercase and split into chars; `None` unless 11 alphanumerics
fn normalize(candidate: &str) -> Option<Vec<char>> {
    let chars: Vec<char> = candidate.chars().map(|c| c.to_ascii_uppercase()).collect();
    if chars.len() != CONTAINER_ID_LEN || !chars.iter().all(char::is_ascii_alphanumeric) {
        return None;
    }
    Some(chars)
}

/// Odometer step over per-slot alternatives; false once every combination was visited
fn advance(choice: &mut [usize], options: &[&[char]]) -> bool {
    for slot in (0..choice.len()).rev() {
        choice[slot] += 1;
        if choice[slot] < options[slot].len() {
            return true;
        }
        choice[slot] = 0;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum;

    fn repairer() -> FuzzyRepairer {
        FuzzyRepairer::default()
    }

    #[test]
    fn test_letter_in_serial_is_repaired() {
        let repair = repairer().repair("CSQU3O54383").unwrap();
        assert_eq!(repair.id, "CSQU3054383");
        assert_eq!(repair.check_digit, 3);
        assert_eq!(
            repair.corrections,
            vec![Correction {
                position: 5,
                observed: 'O',
                corrected: '0'
            }]
        );
    }

    #[test]
    fn test_digit_in_owner_code_is_repaired() {
        let repair = repairer().repair("C5QU3054383").unwrap();
        assert_eq!(repair.id, "CSQU3054383");
        assert_eq!(repair.corrections[0].position, 1);
    }

    #[test]
    fn test_letter_in_check_digit_is_repaired() {
        let repair = repairer().repair("MSCU100008S").unwrap();
        assert_eq!(repair.id, "MSCU1000085");
        assert_eq!(repair.check_digit, 5);
    }

    #[test]
    fn test_check_digit_substitution_that_fails_checksum() {
        // S reads as 5 but the computed digit is 4
        assert_eq!(
            repairer().repair("TCKU733693S"),
            Err(ValidationError::RepairExhausted)
        );
    }

    #[test]
    fn test_single_substitution_differs_in_one_position() {
        for (garbled, expected) in [
            ("0OLU1234567", "OOLU1234567"),
            ("TCKU733G934", "TCKU7336934"),
            ("HLXU10000I2", "HLXU1000012"),
            ("MSKU9070323", "MSKU9070323"),
        ] {
            let result = repairer().resolve(garbled);
            assert!(result.is_valid, "{} should resolve", garbled);
            let id = result.candidate_id.unwrap();
            assert!(checksum::validate(&id).is_valid);
            let diff = id.chars().zip(garbled.chars()).filter(|(a, b)| a != b).count();
            assert!(diff <= 1);
            if garbled != expected {
                assert_eq!(diff, 1);
                assert_eq!(id, expected);
            }
        }
    }

    #[test]
    fn test_every_single_table_substitution_is_recovered() {
        const KNOWN_GOOD: &[&str] = &[
            "TCKU7336934",
            "CSQU3054383",
            "MSKU9070323",
            "OOLU1234567",
            "MSCU1000085",
            "HLXU1000012",
        ];
        let repairer = repairer();
        let table = repairer.table();
        let mut checked = 0;

        for id in KNOWN_GOOD {
            for (pos, original) in id.chars().enumerate() {
                let class = CharClass::for_position(pos);
                for observed in ('0'..='9').chain('A'..='Z') {
                    if !table.corrections(class, observed).contains(&original) {
                        continue;
                    }
                    let garbled: String = id
                        .chars()
                        .enumerate()
                        .map(|(i, c)| if i == pos { observed } else { c })
                        .collect();

                    let result = repairer.resolve(&garbled);
                    assert!(result.is_valid, "{} should resolve", garbled);
                    let resolved = result.candidate_id.unwrap();
                    let diff = resolved
                        .chars()
                        .zip(garbled.chars())
                        .filter(|(a, b)| a != b)
                        .count();
                    assert_eq!(diff, 1, "{} -> {}", garbled, resolved);
                    assert!(checksum::validate(&resolved).is_valid);
                    checked += 1;
                }
            }
        }
        assert!(checked > 50, "only {} substitutions checked", checked);
    }

    #[test]
    fn test_tie_break_prefers_table_order() {
        // Both OOCU1234560 and DOCU1234560 are valid; O is listed first
        let repair = repairer().repair("0OCU1234560").unwrap();
        assert_eq!(repair.id, "OOCU1234560");
    }

    #[test]
    fn test_later_alternative_used_when_first_fails() {
        let repair = repairer().repair("0OCU1234562").unwrap();
        assert_eq!(repair.id, "QOCU1234562");
    }

    #[test]
    fn test_two_positions_within_bound() {
        let repair = repairer().repair("MSKU9O7O323").unwrap();
        assert_eq!(repair.id, "MSKU9070323");
        assert_eq!(repair.corrections.len(), 2);
        assert_eq!(repair.corrections[0].position, 5);
        assert_eq!(repair.corrections[1].position, 7);
    }

    #[test]
    fn test_bound_is_enforced() {
        let tight = FuzzyRepairer::new(ConfusionTable::default(), 1, ChecksumValidator::default());
        assert_eq!(
            tight.repair("MSKU9O7O323"),
            Err(ValidationError::RepairExhausted)
        );
        assert!(!tight.is_repairable_shape("MSKU9O7O323"));
        assert!(tight.is_repairable_shape("CSQU3O54383"));
    }

    #[test]
    fn test_shape_correct_checksum_failure_is_not_repaired() {
        assert_eq!(
            repairer().repair("ABCD1234567"),
            Err(ValidationError::ChecksumMismatch)
        );
        let result = repairer().resolve("ABCD1234567");
        assert!(!result.is_valid);
        assert_eq!(result.error, Some(ValidationError::ChecksumMismatch));
        assert_eq!(result.computed_check_digit, Some(0));
        assert_eq!(result.candidate_id.as_deref(), Some("ABCD1234567"));
    }

    #[test]
    fn test_lowercase_is_normalized() {
        let result = repairer().resolve("tcku7336934");
        assert!(result.is_valid);
        assert_eq!(result.candidate_id.as_deref(), Some("TCKU7336934"));
        assert_eq!(result.repaired_from.as_deref(), Some("tcku7336934"));
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn test_lowercase_checksum_failure_reports_digit() {
        let result = repairer().resolve("abcd1234567");
        assert!(!result.is_valid);
        assert_eq!(result.error, Some(ValidationError::ChecksumMismatch));
        assert_eq!(result.computed_check_digit, Some(0));
        assert_eq!(result.candidate_id.as_deref(), Some("ABCD1234567"));
        assert_eq!(result.repaired_from.as_deref(), Some("abcd1234567"));
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn test_unmapped_character_exhausts() {
        // X is not a digit look-alike
        assert_eq!(
            repairer().repair("TCKU73369X4"),
            Err(ValidationError::RepairExhausted)
        );
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        assert_eq!(repairer().repair("TCKU733693"), Err(ValidationError::Malformed));
        assert_eq!(repairer().repair("TCKU-336934"), Err(ValidationError::Malformed));
        let result = repairer().resolve("TCKU733693");
        assert_eq!(result.error, Some(ValidationError::Malformed));
        assert!(result.repaired_from.is_none());
    }

    #[test]
    fn test_resolve_records_repair() {
        let result = repairer().resolve("CSQU3O54383");
        assert!(result.is_valid);
        assert_eq!(result.candidate_id.as_deref(), Some("CSQU3054383"));
        assert_eq!(result.repaired_from.as_deref(), Some("CSQU3O54383"));
        assert_eq!(result.computed_check_digit, Some(3));
        assert_eq!(result.corrections.len(), 1);
    }

    #[test]
    fn test_resolve_reports_exhausted_without_dropping() {
        let result = repairer().resolve("TCKU733693S");
        assert!(!result.is_valid);
        assert_eq!(result.candidate_id.as_deref(), Some("TCKU733693S"));
        assert_eq!(result.error, Some(ValidationError::RepairExhausted));
    }

    #[test]
    fn test_misplaced_positions() {
        assert_eq!(
            FuzzyRepairer::misplaced_positions("C5QU3O54383"),
            Some(vec![1, 5])
        );
        assert_eq!(FuzzyRepairer::misplaced_positions("TCKU7336934"), Some(vec![]));
        assert_eq!(FuzzyRepairer::misplaced_positions("TCKU"), None);
    }

    #[test]
    fn test_empty_table_repairs_nothing() {
        let repairer = FuzzyRepairer::new(ConfusionTable::empty(), 2, ChecksumValidator::default());
        assert_eq!(
            repairer.repair("CSQU3O54383"),
            Err(ValidationError::RepairExhausted)
        );
    }
}
