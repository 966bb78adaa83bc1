//! # vpos-core: Pure Scan Logic for VPOS
//!
//! Every decision the barcode input layer makes, as pure functions with zero
//! I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      VPOS Barcode Input Layer                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Checkout screen (web UI)                     │   │
//! │  │        on_scan(cb) ──► product lookup ──► add to cart           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ ScanEvent / ScanStatus                 │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          vpos-scanner (BarcodeUnifier, tokio tasks)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ vpos-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │  ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌────────────┐   │   │
//! │  │  │ key_buffer│  │ debounce  │  │ validation│  │ symbology  │   │   │
//! │  │  │ KeyBuffer │  │ Duplicate │  │  barcode  │  │ EAN, UPC,  │   │   │
//! │  │  │ KeyInput  │  │  Filter   │  │  GTIN     │  │ Code128... │   │   │
//! │  │  └───────────┘  └───────────┘  └───────────┘  └────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO TIMERS • NO TASKS • TIME PASSED IN AS ARGUMENTS   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - ScanEvent, ScanStatus, ScannerType, SessionState
//! - [`key_buffer`] - Keystroke buffering for keyboard-wedge scanners
//! - [`debounce`] - Same-code suppression for camera decoding
//! - [`validation`] - Barcode payload and GTIN checks
//! - [`symbology`] - Supported linear barcode formats
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use vpos_core::key_buffer::{KeyBuffer, KeyInput, KeyOutcome};
//!
//! let mut buffer = KeyBuffer::default();
//! let mut now = Instant::now();
//! for c in "8935024122211".chars() {
//!     buffer.push(KeyInput::char(c), now);
//!     now += Duration::from_millis(3);
//! }
//!
//! assert_eq!(
//!     buffer.push(KeyInput::enter(), now),
//!     KeyOutcome::Completed("8935024122211".to_string())
//! );
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod debounce;
pub mod error;
pub mod key_buffer;
pub mod symbology;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use debounce::DuplicateFilter;
pub use error::{CoreError, CoreResult, ValidationError};
pub use key_buffer::{KeyBuffer, KeyBufferConfig, KeyInput, KeyOutcome, KeyStroke};
pub use symbology::Symbology;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Shortest keyboard payload accepted as a scan (buffer length must exceed 3).
///
/// ## Business Reason
/// Cashiers hit Enter on short manual entries (quantities, "OK"); no label
/// in the shop is shorter than 4 characters.
pub const MIN_BARCODE_LENGTH: usize = 4;

/// Longest payload accepted from either channel.
pub const MAX_BARCODE_LENGTH: usize = 128;

/// Keyboard silence after which a partial buffer is abandoned.
///
/// Wedge scanners type the whole payload in a few milliseconds; people
/// rarely manage more than one key per 100ms.
pub const DEFAULT_KEY_IDLE_TIMEOUT_MS: u64 = 100;

/// Window in which the camera may not re-dispatch the same code.
pub const DEFAULT_DUPLICATE_WINDOW_MS: u64 = 2000;
