//! # Optical Decoder Seam
//!
//! The camera channel talks to a pluggable decoding backend. The backend owns
//! the camera device and the frame-decoding engine; this crate owns the
//! session lifecycle around it.
//!
//! ## Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  BarcodeUnifier                 OpticalBackend                          │
//! │  ──────────────                 ──────────────                          │
//! │  start_session() ──── start(config, frames_tx) ───► camera opened       │
//! │        │                                              │                 │
//! │        │ ◄──────────── Box<dyn DecodeSession> ────────┘                 │
//! │        ▼                                                                │
//! │  SessionGuard { id, session, pump }                                     │
//! │        │          frames_rx ◄── FrameReport ── (every processed frame)  │
//! │        │                                                                │
//! │  drop(guard) ───────── session.stop() ──────────► camera released      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A session is only ever reachable through its [`SessionGuard`], so a restart
//! or a failed start cannot leak an open device.

use std::fmt;
use std::path::PathBuf;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use vpos_core::Symbology;

use crate::config::{DecoderConfig, FacingMode};
use crate::error::{ScannerError, ScannerResult};

// =============================================================================
// Devices and Surfaces
// =============================================================================

/// Handle to the display surface a live camera feed renders into.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoSurface(String);

impl VideoSurface {
    pub fn new(id: impl Into<String>) -> Self {
        VideoSurface(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A video input the backend can open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub device_id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<FacingMode>,
}

impl CameraDevice {
    pub fn new(device_id: impl Into<String>, label: impl Into<String>) -> Self {
        CameraDevice {
            device_id: device_id.into(),
            label: label.into(),
            facing: None,
        }
    }
}

/// A still image for one-shot decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// `data:image/...;base64,...` as produced by a file picker or canvas.
    DataUrl(String),
    /// Encoded image bytes (PNG, JPEG).
    Bytes(Vec<u8>),
    /// Image file on disk.
    Path(PathBuf),
}

// =============================================================================
// Frame Reports
// =============================================================================

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// The line along which a barcode was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scanline {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

/// What the backend found in one processed frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Regions the locator considered barcode-like.
    pub candidates: Vec<BoundingBox>,
    /// Region the payload was decoded from.
    pub accepted: Option<BoundingBox>,
    pub scanline: Option<Scanline>,
    /// Decoded payload, if this frame produced one.
    pub code: Option<String>,
    pub symbology: Option<Symbology>,
}

impl FrameReport {
    /// A frame that decoded `code`.
    pub fn decoded(code: impl Into<String>, symbology: Symbology) -> Self {
        FrameReport {
            code: Some(code.into()),
            symbology: Some(symbology),
            ..Default::default()
        }
    }

    /// A frame with no readable barcode.
    pub fn empty() -> Self {
        Self::default()
    }
}

// =============================================================================
// Backend Trait
// =============================================================================

/// A running decode session inside the backend.
pub trait DecodeSession: Send {
    /// Stops decoding and releases the camera. Called exactly once.
    fn stop(&mut self);
}

/// Optical decoding engine plus camera access.
///
/// Implementations report every processed frame on the `frames` sender until
/// the session is stopped, then drop the sender.
pub trait OpticalBackend: Send + Sync {
    /// Enumerates video inputs.
    fn list_devices(&self) -> BoxFuture<'_, ScannerResult<Vec<CameraDevice>>>;

    /// Opens the camera described by `config` and starts live decoding.
    fn start(
        &self,
        config: DecoderConfig,
        frames: mpsc::Sender<FrameReport>,
    ) -> BoxFuture<'_, ScannerResult<Box<dyn DecodeSession>>>;

    /// Decodes a single still image. `Ok(None)` means no barcode was found.
    fn decode_image(
        &self,
        config: DecoderConfig,
        image: ImageSource,
    ) -> BoxFuture<'_, ScannerResult<Option<String>>>;
}

/// Backend for terminals without a camera. Every camera operation fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCameraBackend;

impl OpticalBackend for NoCameraBackend {
    fn list_devices(&self) -> BoxFuture<'_, ScannerResult<Vec<CameraDevice>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn start(
        &self,
        _config: DecoderConfig,
        _frames: mpsc::Sender<FrameReport>,
    ) -> BoxFuture<'_, ScannerResult<Box<dyn DecodeSession>>> {
        Box::pin(async { Err(ScannerError::CameraUnavailable) })
    }

    fn decode_image(
        &self,
        _config: DecoderConfig,
        _image: ImageSource,
    ) -> BoxFuture<'_, ScannerResult<Option<String>>> {
        Box::pin(async { Err(ScannerError::CameraUnavailable) })
    }
}

// =============================================================================
// Session Guard
// =============================================================================

/// Owns a live decode session and the task pumping its frames.
///
/// Dropping the guard stops the session and the pump.
pub struct SessionGuard {
    id: Uuid,
    device_id: Option<String>,
    session: Option<Box<dyn DecodeSession>>,
    pump: Option<JoinHandle<()>>,
}

impl fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGuard")
            .field("id", &self.id)
            .field("device_id", &self.device_id)
            .field("live", &self.session.is_some())
            .finish()
    }
}

impl SessionGuard {
    pub(crate) fn new(
        id: Uuid,
        device_id: Option<String>,
        session: Box<dyn DecodeSession>,
        pump: JoinHandle<()>,
    ) -> Self {
        SessionGuard {
            id,
            device_id,
            session: Some(session),
            pump: Some(pump),
        }
    }

    /// Session id used to correlate log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
            debug!(session_id = %self.id, device_id = ?self.device_id, "Decode session stopped");
        }
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

// =============================================================================
// Test Support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted backend for camera-path tests.

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    type FrameSlot = Arc<Mutex<Option<mpsc::Sender<FrameReport>>>>;

    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub devices: Vec<CameraDevice>,
        pub fail_start: AtomicBool,
        pub image_result: Mutex<Option<String>>,
        pub starts: AtomicUsize,
        pub stops: Arc<AtomicUsize>,
        pub last_config: Mutex<Option<DecoderConfig>>,
        frames: FrameSlot,
    }

    struct FakeSession {
        frames: FrameSlot,
        stops: Arc<AtomicUsize>,
    }

    impl DecodeSession for FakeSession {
        fn stop(&mut self) {
            self.frames.lock().unwrap().take();
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl FakeBackend {
        pub fn with_devices(ids: &[&str]) -> Self {
            FakeBackend {
                devices: ids
                    .iter()
                    .map(|id| CameraDevice::new(*id, format!("Camera {id}")))
                    .collect(),
                ..Default::default()
            }
        }

        /// Pushes a frame into the live session. Returns false if none is running.
        pub async fn emit(&self, report: FrameReport) -> bool {
            let tx = self.frames.lock().unwrap().clone();
            match tx {
                Some(tx) => tx.send(report).await.is_ok(),
                None => false,
            }
        }

        pub async fn emit_code(&self, code: &str) -> bool {
            self.emit(FrameReport::decoded(code, Symbology::Ean13)).await
        }

        pub fn is_live(&self) -> bool {
            self.frames.lock().unwrap().is_some()
        }
    }

    impl OpticalBackend for FakeBackend {
        fn list_devices(&self) -> BoxFuture<'_, ScannerResult<Vec<CameraDevice>>> {
            let devices = self.devices.clone();
            Box::pin(async move { Ok(devices) })
        }

        fn start(
            &self,
            config: DecoderConfig,
            frames: mpsc::Sender<FrameReport>,
        ) -> BoxFuture<'_, ScannerResult<Box<dyn DecodeSession>>> {
            Box::pin(async move {
                self.starts.fetch_add(1, Ordering::SeqCst);
                *self.last_config.lock().unwrap() = Some(config);
                if self.fail_start.load(Ordering::SeqCst) {
                    return Err(ScannerError::DecoderInit("camera busy".into()));
                }
                *self.frames.lock().unwrap() = Some(frames);
                Ok(Box::new(FakeSession {
                    frames: Arc::clone(&self.frames),
                    stops: Arc::clone(&self.stops),
                }) as Box<dyn DecodeSession>)
            })
        }

        fn decode_image(
            &self,
            _config: DecoderConfig,
            _image: ImageSource,
        ) -> BoxFuture<'_, ScannerResult<Option<String>>> {
            let result = self.image_result.lock().unwrap().clone();
            Box::pin(async move { Ok(result) })
        }
    }
}
