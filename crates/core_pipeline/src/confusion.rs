//! OCR confusion table
//!
//! Maps a character the OCR engine produced in the wrong class to the
//! characters it was probably meant to be. Entries are keyed by the class
//! the position expects: a `0` in the owner code is looked up under
//! `letter`, an `O` in the serial under `digit`.

use crate::error::ConfigError;
use crate::types::CharClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ConfusionTableDef {
    #[serde(default)]
    letter: BTreeMap<char, Vec<char>>,
    #[serde(default)]
    digit: BTreeMap<char, Vec<char>>,
}

/// Expected class → {observed char → ordered corrections}
///
/// Alternatives are tried in the order listed, so the most likely reading
/// goes first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ConfusionTableDef", into = "ConfusionTableDef")]
pub struct ConfusionTable {
    letter: BTreeMap<char, Vec<char>>,
    digit: BTreeMap<char, Vec<char>>,
}

impl ConfusionTable {
    /// An empty table; repairs nothing
    pub fn empty() -> Self {
        Self {
            letter: BTreeMap::new(),
            digit: BTreeMap::new(),
        }
    }

    /// Add `observed → corrections` for positions expecting `class`
    pub fn insert(
        &mut self,
        class: CharClass,
        observed: char,
        corrections: &[char],
    ) -> Result<(), ConfigError> {
        for &corrected in corrections {
            check_entry(class, observed, corrected)?;
        }
        let slot = match class {
            CharClass::Letter => &mut self.letter,
            CharClass::Digit => &mut self.digit,
        };
        slot.insert(observed, corrections.to_vec());
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert)
    pub fn with(
        mut self,
        class: CharClass,
        observed: char,
        corrections: &[char],
    ) -> Result<Self, ConfigError> {
        self.insert(class, observed, corrections)?;
        Ok(self)
    }

    /// Corrections for `observed` at a position expecting `class`
    pub fn corrections(&self, class: CharClass, observed: char) -> &[char] {
        let slot = match class {
            CharClass::Letter => &self.letter,
            CharClass::Digit => &self.digit,
        };
        slot.get(&observed).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True if `observed` can be turned into a member of `class`
    pub fn can_correct(&self, class: CharClass, observed: char) -> bool {
        !self.corrections(class, observed).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.letter.is_empty() && self.digit.is_empty()
    }
}

/// Digit/letter look-alikes seen in manifest photos
impl Default for ConfusionTable {
    fn default() -> Self {
        let letter: &[(char, &[char])] = &[
            ('0', &['O', 'D', 'Q']),
            ('1', &['I', 'L']),
            ('2', &['Z']),
            ('4', &['A']),
            ('5', &['S']),
            ('6', &['G']),
            ('7', &['T']),
            ('8', &['B']),
        ];
        let digit: &[(char, &[char])] = &[
            ('O', &['0']),
            ('D', &['0']),
            ('Q', &['0']),
            ('I', &['1']),
            ('L', &['1']),
            ('Z', &['2']),
            ('A', &['4']),
            ('S', &['5']),
            ('G', &['6']),
            ('T', &['7']),
            ('B', &['8']),
        ];

        Self {
            letter: letter.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
            digit: digit.iter().map(|(k, v)| (*k, v.to_vec())).collect(),
        }
    }
}

fn check_entry(class: CharClass, observed: char, corrected: char) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidConfusion {
        observed,
        corrected,
        reason,
    };
    if !observed.is_ascii_alphanumeric() {
        return Err(invalid("observed character must be alphanumeric"));
    }
    if class.accepts(observed.to_ascii_uppercase()) {
        return Err(invalid("observed character already fits the expected class"));
    }
    if !class.accepts(corrected) {
        return Err(invalid("correction does not fit the expected class"));
    }
    Ok(())
}

impl TryFrom<ConfusionTableDef> for ConfusionTable {
    type Error = ConfigError;

    fn try_from(def: ConfusionTableDef) -> Result<Self, Self::Error> {
        let mut table = ConfusionTable::empty();
        for (observed, corrections) in &def.letter {
            table.insert(CharClass::Letter, *observed, corrections)?;
        }
        for (observed, corrections) in &def.digit {
            table.insert(CharClass::Digit, *observed, corrections)?;
        }
        Ok(table)
    }
}

impl From<ConfusionTable> for ConfusionTableDef {
    fn from(table: ConfusionTable) -> Self {
        Self {
            letter: table.letter,
            digit: table.digit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_letter_mappings() {
        let table = ConfusionTable::default();
        assert_eq!(table.corrections(CharClass::Letter, '0'), &['O', 'D', 'Q']);
        assert_eq!(table.corrections(CharClass::Letter, '1'), &['I', 'L']);
        assert_eq!(table.corrections(CharClass::Letter, '5'), &['S']);
        assert_eq!(table.corrections(CharClass::Letter, '8'), &['B']);
        assert!(table.corrections(CharClass::Letter, '3').is_empty());
    }

    #[test]
    fn test_default_digit_mappings() {
        let table = ConfusionTable::default();
        assert_eq!(table.corrections(CharClass::Digit, 'O'), &['0']);
        assert_eq!(table.corrections(CharClass::Digit, 'I'), &['1']);
        assert_eq!(table.corrections(CharClass::Digit, 'S'), &['5']);
        assert_eq!(table.corrections(CharClass::Digit, 'B'), &['8']);
        assert!(!table.can_correct(CharClass::Digit, 'X'));
    }

    #[test]
    fn test_direction_depends_on_expected_class() {
        let table = ConfusionTable::default();
        // A digit never needs correcting where a digit is expected
        assert!(table.corrections(CharClass::Digit, '0').is_empty());
        assert!(table.corrections(CharClass::Letter, 'O').is_empty());
    }

    #[test]
    fn test_insert_rejects_wrong_class_correction() {
        let mut table = ConfusionTable::empty();
        let err = table.insert(CharClass::Letter, '0', &['9']).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfusion { .. }));
    }

    #[test]
    fn test_insert_rejects_observed_already_in_class() {
        let mut table = ConfusionTable::empty();
        assert!(table.insert(CharClass::Digit, '3', &['8']).is_err());
        assert!(table.insert(CharClass::Letter, '#', &['H']).is_err());
    }

    #[test]
    fn test_custom_table_builder() {
        let table = ConfusionTable::empty()
            .with(CharClass::Digit, 'J', &['3'])
            .unwrap();
        assert_eq!(table.corrections(CharClass::Digit, 'J'), &['3']);
        assert!(table.corrections(CharClass::Digit, 'O').is_empty());
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{"letter": {"0": ["D", "O"]}, "digit": {"S": ["5"]}}"#;
        let table: ConfusionTable = serde_json::from_str(json).unwrap();
        assert_eq!(table.corrections(CharClass::Letter, '0'), &['D', 'O']);
        assert_eq!(table.corrections(CharClass::Digit, 'S'), &['5']);
    }

    #[test]
    fn test_json_rejects_invalid_entry() {
        let json = r#"{"digit": {"S": ["Z"]}}"#;
        let result: Result<ConfusionTable, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_table_survives_serialization() {
        let table = ConfusionTable::default();
        let json = serde_json::to_string(&table).unwrap();
        let back: ConfusionTable = serde_json::from_str(&json).unwrap();
        assert_eq!(table, back);
    }
}
