//! # vpos-scanner: Barcode Input Unifier for VPOS
//!
//! Merges the USB keyboard-wedge channel and the camera channel into one
//! debounced stream of validated barcode scans for the checkout screen.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Barcode Input Unifier                               │
//! │                                                                         │
//! │  ┌────────────────────────┐          ┌────────────────────────────┐    │
//! │  │ Keyboard channel       │          │ Camera channel             │    │
//! │  │                        │          │                            │    │
//! │  │ KeyboardHub (lease)    │          │ OpticalBackend (trait)     │    │
//! │  │ listener task          │          │ SessionGuard (RAII)        │    │
//! │  │ KeyBuffer + idle timer │          │ frame pump ──► OverlaySink │    │
//! │  └───────────┬────────────┘          └─────────────┬──────────────┘    │
//! │              │  Enter, len ≥ 4                     │ decoded frame      │
//! │              └──────────────┬──────────────────────┘                    │
//! │                             ▼                                           │
//! │               ┌──────────────────────────────┐                          │
//! │               │ Dispatcher                   │ ◄── scan_from_image      │
//! │               │ validate → debounce (camera) │                          │
//! │               │ → last scan → subscribers    │                          │
//! │               └──────────────┬───────────────┘                          │
//! │                     ┌────────┴─────────┐                                │
//! │                     ▼                  ▼                                │
//! │             on_scan callbacks     scan_stream()                         │
//! │          (SubscriberRegistry)   (broadcast Stream)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`unifier`] - `BarcodeUnifier`, connect options and builder
//! - [`keyboard`] - Exclusive keyboard lease and listener task
//! - [`camera`] - Optical backend seam and decode session guard
//! - [`overlay`] - Processed-frame drawing
//! - [`registry`] - Subscriber registry and isolated delivery
//! - [`config`] - Scanner and decoder configuration
//! - [`error`] - Scanner error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vpos_scanner::{BarcodeUnifier, ConnectOptions, ScannerConfig};
//!
//! let mut scanner = BarcodeUnifier::new(ScannerConfig::load_or_default(None));
//! let id = scanner.on_scan(|code| println!("scanned {code}"));
//!
//! if !scanner.connect(ConnectOptions::usb()).await {
//!     eprintln!("scanner unavailable");
//! }
//!
//! // ... checkout view closes
//! scanner.off_scan(id);
//! scanner.disconnect();
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod camera;
pub mod config;
mod dispatch;
pub mod error;
pub mod keyboard;
pub mod overlay;
pub mod registry;
pub mod unifier;

// =============================================================================
// Re-exports
// =============================================================================

pub use camera::{
    BoundingBox, CameraDevice, DecodeSession, FrameReport, ImageSource, NoCameraBackend,
    OpticalBackend, Scanline, SessionGuard, VideoSurface,
};
pub use config::{
    DebugFlags, DecoderConfig, DecoderConfigPatch, FacingMode, ScannerConfig, ScannerSettings,
};
pub use error::{ScannerError, ScannerResult};
pub use keyboard::{KeyboardHub, KeyboardLease};
pub use overlay::{NoOpOverlay, OverlaySink, TracingOverlay};
pub use registry::SubscriptionId;
pub use unifier::{BarcodeUnifier, BarcodeUnifierBuilder, ConnectOptions};
