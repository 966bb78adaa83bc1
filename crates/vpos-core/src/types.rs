//! # Domain Types
//!
//! Types shared by both input channels and the checkout UI.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Scan Types                                      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  ScannerType    │   │   ScanEvent     │   │   ScanStatus    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Camera         │   │  code           │   │  connected      │       │
//! │  │  Usb            │   │  source         │   │  scanner_type   │       │
//! │  │  Both           │   │  scanned_at     │   │  last code/time │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────────────────────────────┐     │
//! │  │  ScanSource     │   │  SessionState (optical decoder)         │     │
//! │  │  ─────────────  │   │  ─────────────────────────────────────  │     │
//! │  │  Keyboard       │   │  Uninitialized → Initializing → Running │     │
//! │  │  Camera, Image  │   │        ▲              │         │       │     │
//! │  └─────────────────┘   │        └── restart ───┘─────────┘       │     │
//! │                        │  any ──── disconnect ────► Stopped      │     │
//! │                        └─────────────────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Scanner Type
// =============================================================================

/// Which physical input channels a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ScannerType {
    /// Optical decoding from a camera feed only.
    Camera,

    /// USB keyboard-wedge scanner only.
    #[default]
    Usb,

    /// Both channels at once.
    Both,
}

impl ScannerType {
    /// Returns true if the keyboard channel should be listening.
    pub fn uses_keyboard(&self) -> bool {
        matches!(self, ScannerType::Usb | ScannerType::Both)
    }

    /// Returns true if the optical decoder should be started.
    pub fn uses_camera(&self) -> bool {
        matches!(self, ScannerType::Camera | ScannerType::Both)
    }
}

impl std::fmt::Display for ScannerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerType::Camera => write!(f, "camera"),
            ScannerType::Usb => write!(f, "usb"),
            ScannerType::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for ScannerType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "camera" | "webcam" => Ok(ScannerType::Camera),
            "usb" | "keyboard" | "wedge" => Ok(ScannerType::Usb),
            "both" | "all" => Ok(ScannerType::Both),
            other => Err(CoreError::UnknownScannerType(other.to_string())),
        }
    }
}

// =============================================================================
// Scan Source
// =============================================================================

/// The channel that produced a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ScanSource {
    /// Keyboard-wedge input terminated by Enter.
    Keyboard,
    /// Continuous camera decoding.
    Camera,
    /// One-shot still image decode.
    Image,
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanSource::Keyboard => write!(f, "keyboard"),
            ScanSource::Camera => write!(f, "camera"),
            ScanSource::Image => write!(f, "image"),
        }
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// A decoded barcode on its way to subscribers.
///
/// Never persisted; lives only for the duration of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanEvent {
    /// The barcode payload.
    pub code: String,

    /// Channel the payload arrived on.
    pub source: ScanSource,

    /// Capture time.
    #[ts(as = "String")]
    pub scanned_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Creates an event stamped with the current time.
    pub fn new(code: impl Into<String>, source: ScanSource) -> Self {
        Self::at(code, source, Utc::now())
    }

    /// Creates an event with an explicit capture time.
    pub fn at(code: impl Into<String>, source: ScanSource, scanned_at: DateTime<Utc>) -> Self {
        ScanEvent {
            code: code.into(),
            source,
            scanned_at,
        }
    }

    /// Capture time as epoch milliseconds.
    pub fn scanned_at_millis(&self) -> i64 {
        self.scanned_at.timestamp_millis()
    }
}

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle of the optical decode session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SessionState {
    /// No session has ever been started.
    #[default]
    Uninitialized,
    /// Waiting on the decoder backend to come up.
    Initializing,
    /// Frames are being decoded.
    Running,
    /// Session torn down (disconnect or failed start).
    Stopped,
}

impl SessionState {
    /// Checks whether moving to `next` is a legal transition.
    ///
    /// `Stopped` is reachable from anywhere; `Running → Initializing` is a
    /// restart after a camera switch or config change.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (_, Stopped) => true,
            (Uninitialized, Initializing) => true,
            (Stopped, Initializing) => true,
            (Initializing, Running) => true,
            (Running, Initializing) => true,
            _ => false,
        }
    }

    /// Returns true if a decode session is live.
    pub fn is_running(&self) -> bool {
        matches!(self, SessionState::Running)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Uninitialized => write!(f, "uninitialized"),
            SessionState::Initializing => write!(f, "initializing"),
            SessionState::Running => write!(f, "running"),
            SessionState::Stopped => write!(f, "stopped"),
        }
    }
}

// =============================================================================
// Scan Status
// =============================================================================

/// Snapshot returned by `status()`, serialized as camelCase for the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanStatus {
    /// Whether `connect` succeeded and `disconnect` has not been called.
    pub connected: bool,

    /// Channels of the current connection.
    pub scanner_type: Option<ScannerType>,

    /// Whether an optical session is currently running.
    pub camera_initialized: bool,

    /// Most recently dispatched code.
    pub last_scanned_code: Option<String>,

    /// Capture time of `last_scanned_code` (epoch millis).
    pub last_scanned_time: Option<i64>,
}

impl ScanStatus {
    /// Records a dispatched event as the latest scan.
    pub fn record(&mut self, event: &ScanEvent) {
        self.last_scanned_code = Some(event.code.clone());
        self.last_scanned_time = Some(event.scanned_at_millis());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scanner_type_parsing() {
        assert_eq!("camera".parse::<ScannerType>().unwrap(), ScannerType::Camera);
        assert_eq!("USB".parse::<ScannerType>().unwrap(), ScannerType::Usb);
        assert_eq!("both".parse::<ScannerType>().unwrap(), ScannerType::Both);
        assert!("laser".parse::<ScannerType>().is_err());
    }

    #[test]
    fn test_scanner_type_channels() {
        assert!(ScannerType::Usb.uses_keyboard());
        assert!(!ScannerType::Usb.uses_camera());
        assert!(ScannerType::Camera.uses_camera());
        assert!(!ScannerType::Camera.uses_keyboard());
        assert!(ScannerType::Both.uses_camera() && ScannerType::Both.uses_keyboard());
    }

    #[test]
    fn test_session_transitions() {
        use SessionState::*;
        assert!(Uninitialized.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Running));
        assert!(Running.can_transition_to(Initializing));
        assert!(Running.can_transition_to(Stopped));
        assert!(Uninitialized.can_transition_to(Stopped));
        assert!(Stopped.can_transition_to(Initializing));

        assert!(!Uninitialized.can_transition_to(Running));
        assert!(!Stopped.can_transition_to(Running));
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut status = ScanStatus {
            connected: true,
            scanner_type: Some(ScannerType::Both),
            ..Default::default()
        };
        let event = ScanEvent::at(
            "8935024122211",
            ScanSource::Keyboard,
            Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        );
        status.record(&event);

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["connected"], true);
        assert_eq!(json["scannerType"], "both");
        assert_eq!(json["cameraInitialized"], false);
        assert_eq!(json["lastScannedCode"], "8935024122211");
        assert_eq!(json["lastScannedTime"], 1_700_000_000_123i64);
    }
}
