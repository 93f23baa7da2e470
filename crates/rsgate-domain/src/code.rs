//! Canonical code form.
//!
//! Every component canonicalizes raw input before touching the store,
//! so two differently-cased submissions of the same code always collapse
//! to one canonical value.

use crate::error::{AccessError, AccessResult};

/// Default code length.
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Default generation alphabet: the ASCII digits.
pub const DIGIT_ALPHABET: &str = "0123456789";

/// Normalizes raw textual code input into its canonical form.
///
/// Trims surrounding whitespace and upper-cases. Rejects empty input and
/// input whose trimmed length does not match `length`. Pure and
/// deterministic; no I/O.
pub fn canonicalize(raw: &str, length: usize) -> AccessResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AccessError::InvalidInput {
            message: "code must not be empty".to_string(),
        });
    }

    let canonical = trimmed.to_uppercase();
    let actual = canonical.chars().count();
    if actual != length {
        return Err(AccessError::InvalidInput {
            message: format!("code must be {length} characters, got {actual}"),
        });
    }

    Ok(canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_uppercases() {
        assert_eq!(canonicalize("  ab12cd ", 6).unwrap(), "AB12CD");
        assert_eq!(canonicalize("AB12CD", 6).unwrap(), "AB12CD");
    }

    #[test]
    fn differently_cased_inputs_collapse() {
        let a = canonicalize("ab12cd", 6).unwrap();
        let b = canonicalize("AB12CD", 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_empty_and_whitespace_only() {
        assert!(matches!(
            canonicalize("", 6),
            Err(AccessError::InvalidInput { .. })
        ));
        assert!(matches!(
            canonicalize("   \t", 6),
            Err(AccessError::InvalidInput { .. })
        ));
    }

    #[test]
    fn rejects_length_mismatch() {
        assert!(matches!(
            canonicalize("12345", 6),
            Err(AccessError::InvalidInput { .. })
        ));
        assert!(matches!(
            canonicalize("1234567", 6),
            Err(AccessError::InvalidInput { .. })
        ));
    }
}
