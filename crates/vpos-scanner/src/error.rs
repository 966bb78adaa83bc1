//! # Scanner Error Types
//!
//! Error types for the barcode input unifier.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scanner Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Device      │  │     Lifecycle           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  CameraUnavail. │  │  AlreadyConnected       │ │
//! │  │  ConfigLoad     │  │  PermissionDen. │  │  KeyboardInUse          │ │
//! │  │  ConfigSave     │  │  DeviceNotFound │  │  MissingVideoSurface    │ │
//! │  │                 │  │  DecoderInit    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Every variant is converted to a bool / None at the unifier boundary   │
//! │  after being logged. The checkout UI never handles these directly.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for scanner operations.
pub type ScannerResult<T> = Result<T, ScannerError>;

/// Scanner error type covering all unifier failures.
#[derive(Debug, Error)]
pub enum ScannerError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid scanner configuration.
    #[error("Invalid scanner configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Device Errors
    // =========================================================================
    /// No camera is attached, or the backend has no camera support.
    #[error("No camera available")]
    CameraUnavailable,

    /// The operator or OS refused camera access.
    #[error("Camera permission denied: {0}")]
    PermissionDenied(String),

    /// Requested camera device id does not exist.
    #[error("Camera device not found: {0}")]
    DeviceNotFound(String),

    /// The decoder backend failed to start a session.
    #[error("Decoder initialization failed: {0}")]
    DecoderInit(String),

    /// A still-image decode failed for a reason other than "no barcode".
    #[error("Image decode failed: {0}")]
    DecodeFailed(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// `connect` called while a connection is active.
    #[error("Scanner is already connected ({0})")]
    AlreadyConnected(String),

    /// Another unifier holds the keyboard lease.
    #[error("Keyboard stream is already owned by another scanner")]
    KeyboardInUse,

    /// Camera mode requested without a surface to render into.
    #[error("Camera scanning requires a video surface")]
    MissingVideoSurface,

    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Scan payload rejected.
    #[error(transparent)]
    Core(#[from] vpos_core::CoreError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<vpos_core::ValidationError> for ScannerError {
    fn from(err: vpos_core::ValidationError) -> Self {
        ScannerError::Core(err.into())
    }
}

impl From<std::io::Error> for ScannerError {
    fn from(err: std::io::Error) -> Self {
        ScannerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for ScannerError {
    fn from(err: toml::de::Error) -> Self {
        ScannerError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ScannerError {
    fn from(err: toml::ser::Error) -> Self {
        ScannerError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ScannerError {
    /// Returns true if calling `connect` again may succeed without any
    /// change in configuration (e.g. camera was busy, unplugged, or the
    /// operator dismissed the permission prompt).
    ///
    /// The unifier itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScannerError::CameraUnavailable
                | ScannerError::PermissionDenied(_)
                | ScannerError::DecoderInit(_)
                | ScannerError::KeyboardInUse
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ScannerError::InvalidConfig(_)
                | ScannerError::ConfigLoadFailed(_)
                | ScannerError::ConfigSaveFailed(_)
                | ScannerError::MissingVideoSurface
        )
    }

    /// Returns true if the error came from camera hardware or its driver.
    pub fn is_device_error(&self) -> bool {
        matches!(
            self,
            ScannerError::CameraUnavailable
                | ScannerError::PermissionDenied(_)
                | ScannerError::DeviceNotFound(_)
                | ScannerError::DecoderInit(_)
        )
    }
}
