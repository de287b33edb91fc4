//! ISO 6346 check digit validation
//!
//! A container ID is a 3-letter owner code, a 1-letter equipment category,
//! a 6-digit serial number and a check digit. The check digit is the
//! weighted sum of the first ten characters (weights `2^i`), modulo 11,
//! with a remainder of 10 folded to 0.

use crate::types::{CharClass, ValidationError, ValidationResult, CONTAINER_ID_LEN};
use serde::{Deserialize, Serialize};

/// Equipment category identifier (4th character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipmentCategory {
    /// U: freight container
    Freight,
    /// J: detachable freight container-related equipment
    Detachable,
    /// Z: trailer or chassis
    TrailerChassis,
}

impl EquipmentCategory {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'U' => Some(Self::Freight),
            'J' => Some(Self::Detachable),
            'Z' => Some(Self::TrailerChassis),
            _ => None,
        }
    }
}

/// Numeric equivalent of a character
///
/// Digits map to themselves. Letters start at A=10 and skip every multiple
/// of 11, so B=12, L=23, V=34.
pub fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' => {
            let offset = c as u32 - 'A' as u32;
            let mut value = 10;
            for _ in 0..offset {
                value += 1;
                if value % 11 == 0 {
                    value += 1;
                }
            }
            Some(value)
        }
        _ => None,
    }
}

/// True if `id` has the exact positional shape `AAAA0000000`
pub fn has_valid_shape(id: &str) -> bool {
    id.chars().count() == CONTAINER_ID_LEN
        && id
            .chars()
            .enumerate()
            .all(|(i, c)| CharClass::for_position(i).accepts(c))
}

/// Compute the check digit from the first ten characters of `id`
///
/// Returns `None` if fewer than ten characters are present or one of them
/// is outside `A-Z0-9`.
pub fn compute_check_digit(id: &str) -> Option<u8> {
    let mut sum: u32 = 0;
    let mut count = 0;
    for (i, c) in id.chars().take(CONTAINER_ID_LEN - 1).enumerate() {
        sum += char_value(c)? << i;
        count += 1;
    }
    if count < CONTAINER_ID_LEN - 1 {
        return None;
    }
    Some((sum % 11 % 10) as u8)
}

/// Validates candidates against ISO 6346
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumValidator {
    /// Reject category letters other than U, J and Z as malformed
    pub strict_category: bool,
}

impl ChecksumValidator {
    pub fn new(strict_category: bool) -> Self {
        Self { strict_category }
    }

    /// Check shape first, then the check digit
    pub fn validate(&self, id: &str) -> ValidationResult {
        if !has_valid_shape(id) || !self.category_allowed(id) {
            return ValidationResult::invalid(id, None, ValidationError::Malformed);
        }

        // Shape guarantees ten mappable characters
        let Some(computed) = compute_check_digit(id) else {
            return ValidationResult::invalid(id, None, ValidationError::Malformed);
        };
        let declared = id
            .chars()
            .last()
            .and_then(|c| c.to_digit(10))
            .map(|d| d as u8);

        if declared == Some(computed) {
            ValidationResult::valid(id, computed)
        } else {
            ValidationResult::invalid(id, Some(computed), ValidationError::ChecksumMismatch)
        }
    }

    fn category_allowed(&self, id: &str) -> bool {
        !self.strict_category
            || id
                .chars()
                .nth(3)
                .and_then(EquipmentCategory::from_char)
                .is_some()
    }
}

/// Validate with the default (lenient category) validator
pub fn validate(id: &str) -> ValidationResult {
    ChecksumValidator::default().validate(id)
}
