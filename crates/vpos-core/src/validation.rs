//! # Validation Module
//!
//! Barcode payload validation, applied before any dispatch.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Input channel                                                │
//! │  ├── Keyboard: printable chars only, min/max length (KeyBuffer)        │
//! │  └── Camera: decoder backend only reports configured symbologies       │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE, before dispatch                                 │
//! │  ├── Strip CR/LF suffix, reject blank / control chars / oversize       │
//! │  └── Optional GTIN check digit (EAN-8, UPC-A, EAN-13, GTIN-14)         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Checkout (external)                                          │
//! │  └── Product lookup by barcode                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use vpos_core::validation::{validate_barcode, validate_gtin};
//!
//! let code = validate_barcode("8935024122211\r\n", 128).unwrap();
//! assert_eq!(code, "8935024122211");
//! assert!(validate_gtin(&code).is_ok());
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

const FIELD: &str = "barcode";

// =============================================================================
// Payload Validators
// =============================================================================

/// Validates a decoded payload and returns what should be dispatched.
///
/// Only a trailing CR/LF suffix is removed. Spaces are payload: Code 128 and
/// Code 39 can carry them.
///
/// ## Rules
/// - Must not be empty or whitespace only
/// - Must not exceed `max_len` characters
/// - Must not contain control characters (a stray Tab or NUL from a
///   misconfigured scanner would otherwise reach product lookup)
pub fn validate_barcode(code: &str, max_len: usize) -> ValidationResult<String> {
    let code = code.trim_end_matches(['\r', '\n']);

    if code.trim().is_empty() {
        return Err(ValidationError::Required {
            field: FIELD.to_string(),
        });
    }

    if code.chars().count() > max_len {
        return Err(ValidationError::TooLong {
            field: FIELD.to_string(),
            max: max_len,
        });
    }

    if code.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Checks if a code looks like a retail GTIN (8-14 numeric digits).
///
/// ## Formats Detected
/// - EAN-8: 8 digits
/// - UPC-A: 12 digits
/// - EAN-13: 13 digits
/// - GTIN-14: 14 digits (cartons)
pub fn is_retail_barcode(code: &str) -> bool {
    matches!(code.len(), 8 | 12 | 13 | 14) && code.chars().all(|c| c.is_ascii_digit())
}

// =============================================================================
// GTIN Check Digit
// =============================================================================

/// Computes the GTIN check digit for a payload *without* its check digit.
///
/// Weights alternate 3, 1, 3, ... starting from the rightmost digit.
/// Returns `None` if the payload contains a non-digit.
pub fn gtin_check_digit(payload: &str) -> Option<u32> {
    let mut sum = 0;
    for (i, c) in payload.chars().rev().enumerate() {
        let digit = c.to_digit(10)?;
        sum += if i % 2 == 0 { digit * 3 } else { digit };
    }
    Some((10 - sum % 10) % 10)
}

/// Validates the check digit of an EAN-8 / UPC-A / EAN-13 / GTIN-14 code.
///
/// ## Example
/// ```rust
/// use vpos_core::validation::validate_gtin;
///
/// assert!(validate_gtin("96385074").is_ok());      // EAN-8
/// assert!(validate_gtin("036000291452").is_ok());  // UPC-A
/// assert!(validate_gtin("8935024122217").is_err()); // wrong check digit
/// ```
pub fn validate_gtin(code: &str) -> ValidationResult<()> {
    if !is_retail_barcode(code) {
        return Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "GTIN must be 8, 12, 13 or 14 digits".to_string(),
        });
    }

    let (payload, check) = code.split_at(code.len() - 1);
    let actual = check.chars().next().and_then(|c| c.to_digit(10));
    let expected = gtin_check_digit(payload);

    match (expected, actual) {
        (Some(expected), Some(actual)) if expected == actual => Ok(()),
        (Some(expected), Some(actual)) => Err(ValidationError::ChecksumMismatch {
            field: FIELD.to_string(),
            expected,
            actual,
        }),
        _ => Err(ValidationError::InvalidFormat {
            field: FIELD.to_string(),
            reason: "GTIN must contain only digits".to_string(),
        }),
    }
}
