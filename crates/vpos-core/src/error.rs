//! # Error Types
//!
//! Domain-specific error types for vpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  vpos-core errors (this file)                                          │
//! │  ├── CoreError        - Unknown names, rejected scans                  │
//! │  └── ValidationError  - Barcode payload failures                       │
//! │                                                                         │
//! │  vpos-scanner errors (separate crate)                                  │
//! │  └── ScannerError     - Devices, sessions, configuration               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ScannerError → bool / None        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! None of these ever reach the checkout UI as exceptions. The unifier logs
//! them and converts them to sentinel returns at its boundary.

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core scan-logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Scanner type string is not one of `camera`, `usb`, `both`.
    #[error("Unknown scanner type: '{0}'. Valid options: camera, usb, both")]
    UnknownScannerType(String),

    /// Symbology / reader name is not supported.
    ///
    /// ## When This Occurs
    /// - `decoder.readers` in scanner.toml names a reader we don't ship
    /// - A decoder backend reports a format we can't map
    #[error("Unknown symbology: '{0}'")]
    UnknownSymbology(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Barcode payload validation errors.
///
/// Raised before a decoded string is dispatched, so subscribers only ever
/// see clean codes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (control characters, non-digits in a GTIN, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// GTIN check digit does not match the payload.
    #[error("{field} check digit mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        field: String,
        expected: u32,
        actual: u32,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::UnknownScannerType("laser".to_string());
        assert_eq!(
            err.to_string(),
            "Unknown scanner type: 'laser'. Valid options: camera, usb, both"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        assert_eq!(err.to_string(), "barcode is required");

        let err = ValidationError::ChecksumMismatch {
            field: "barcode".to_string(),
            expected: 1,
            actual: 7,
        };
        assert_eq!(
            err.to_string(),
            "barcode check digit mismatch: expected 1, got 7"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "barcode".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
