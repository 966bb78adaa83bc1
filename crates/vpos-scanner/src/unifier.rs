//! # Barcode Input Unifier
//!
//! Merges the keyboard-wedge channel and the camera channel into one stream
//! of validated barcode scans for the checkout screen.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   connect(options)                                                      │
//! │     ├── usb / both    ──► KeyboardHub::acquire ──► listener task        │
//! │     └── camera / both ──► OpticalBackend::start ──► SessionGuard        │
//! │                                                                         │
//! │   switch_camera / set_config   (camera running)                         │
//! │     └── drop old guard ──► Initializing ──► start ──► Running           │
//! │                                                    └─► Stopped (failed) │
//! │                                                                         │
//! │   disconnect()                                                          │
//! │     └── drop guard, drop lease, clear buffer + filter ──► Stopped       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every recoverable failure is logged and converted to `false` / `None` at
//! this boundary.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vpos_core::{KeyBuffer, ScanEvent, ScanSource, ScanStatus, ScannerType, SessionState};

use crate::camera::{
    CameraDevice, FrameReport, ImageSource, NoCameraBackend, OpticalBackend, SessionGuard,
    VideoSurface,
};
use crate::config::{DebugFlags, DecoderConfig, DecoderConfigPatch, ScannerConfig, ScannerSettings};
use crate::dispatch::{clock_now, Dispatcher};
use crate::error::{ScannerError, ScannerResult};
use crate::keyboard::{KeyboardHub, KeyboardListener};
use crate::overlay::{self, NoOpOverlay, OverlaySink};
use crate::registry::SubscriptionId;

/// Frames buffered between the backend and the pump before the backend waits.
const FRAME_CHANNEL_CAPACITY: usize = 32;

// =============================================================================
// Connect Options
// =============================================================================

/// Arguments to [`BarcodeUnifier::connect`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Required when `scanner_type` uses the camera.
    pub video_surface: Option<VideoSurface>,
    pub scanner_type: ScannerType,
}

impl ConnectOptions {
    pub fn usb() -> Self {
        ConnectOptions {
            video_surface: None,
            scanner_type: ScannerType::Usb,
        }
    }

    pub fn camera(surface: VideoSurface) -> Self {
        ConnectOptions {
            video_surface: Some(surface),
            scanner_type: ScannerType::Camera,
        }
    }

    pub fn both(surface: VideoSurface) -> Self {
        ConnectOptions {
            video_surface: Some(surface),
            scanner_type: ScannerType::Both,
        }
    }
}

// =============================================================================
// Barcode Unifier
// =============================================================================

struct Connection {
    scanner_type: ScannerType,
    keyboard: Option<KeyboardListener>,
    camera: Option<SessionGuard>,
}

/// One per running application; owned by the checkout view.
pub struct BarcodeUnifier {
    settings: ScannerSettings,
    decoder: DecoderConfig,
    keyboard_hub: KeyboardHub,
    backend: Arc<dyn OpticalBackend>,
    overlay: Arc<dyn OverlaySink>,
    dispatcher: Arc<Dispatcher>,
    key_buffer: Arc<Mutex<KeyBuffer>>,
    session_state: SessionState,
    connection: Option<Connection>,
}

impl BarcodeUnifier {
    /// Creates a unifier on the process keyboard stream with no camera backend.
    pub fn new(config: ScannerConfig) -> Self {
        BarcodeUnifierBuilder::new(config).build()
    }

    pub fn builder(config: ScannerConfig) -> BarcodeUnifierBuilder {
        BarcodeUnifierBuilder::new(config)
    }

    /// Default connect options from configuration (no video surface).
    pub fn default_options(&self) -> ConnectOptions {
        ConnectOptions {
            video_surface: None,
            scanner_type: self.settings.scanner_type,
        }
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    /// Starts the channels selected by `options.scanner_type`.
    ///
    /// Returns false, after logging, if anything fails; a partially started
    /// connection is torn down first. Calling this while connected is refused.
    pub async fn connect(&mut self, options: ConnectOptions) -> bool {
        if let Some(conn) = &self.connection {
            warn!(
                current = %conn.scanner_type,
                requested = %options.scanner_type,
                "{}",
                ScannerError::AlreadyConnected(conn.scanner_type.to_string())
            );
            return false;
        }

        let scanner_type = options.scanner_type;
        match self.try_connect(options).await {
            Ok(conn) => {
                self.connection = Some(conn);
                info!(scanner_type = %scanner_type, "Scanner connected");
                true
            }
            Err(e) => {
                error!(
                    scanner_type = %scanner_type,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Scanner connect failed"
                );
                false
            }
        }
    }

    async fn try_connect(&mut self, options: ConnectOptions) -> ScannerResult<Connection> {
        let scanner_type = options.scanner_type;

        if scanner_type.uses_camera() && options.video_surface.is_none() {
            return Err(ScannerError::MissingVideoSurface);
        }

        let keyboard = if scanner_type.uses_keyboard() {
            let lease = self.keyboard_hub.acquire()?;
            Some(KeyboardListener::spawn(
                lease,
                Arc::clone(&self.key_buffer),
                Arc::clone(&self.dispatcher),
            )?)
        } else {
            None
        };

        // On camera failure `keyboard` drops here and releases the lease.
        let camera = if scanner_type.uses_camera() {
            self.decoder.input_stream.target = options.video_surface;
            Some(self.start_session().await?)
        } else {
            None
        };

        Ok(Connection {
            scanner_type,
            keyboard,
            camera,
        })
    }

    /// Stops both channels and clears the key buffer. Safe to call repeatedly.
    pub fn disconnect(&mut self) -> bool {
        let Some(mut conn) = self.connection.take() else {
            debug!("Disconnect requested while not connected");
            return true;
        };

        if let Some(guard) = conn.camera.take() {
            drop(guard);
        }
        if self.session_state != SessionState::Uninitialized {
            self.transition(SessionState::Stopped);
        }

        // Dropping the listener releases the keyboard lease and discards
        // keys it has not processed yet.
        conn.keyboard.take();
        self.key_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.dispatcher.reset_filter();

        info!(scanner_type = %conn.scanner_type, "Scanner disconnected");
        true
    }

    // =========================================================================
    // Subscribers
    // =========================================================================

    /// Registers a callback invoked with every dispatched barcode.
    pub fn on_scan<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = self.dispatcher.subscribe(callback);
        debug!(subscription = %id, "Scan subscriber registered");
        id
    }

    /// Unregisters exactly the subscriber behind `id`.
    pub fn off_scan(&self, id: SubscriptionId) -> bool {
        let removed = self.dispatcher.unsubscribe(id);
        debug!(subscription = %id, removed, "Scan subscriber unregistered");
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.dispatcher.subscriber_count()
    }

    /// Dispatched events as an async stream. Lagging readers skip ahead.
    pub fn scan_stream(&self) -> impl Stream<Item = ScanEvent> + Send + 'static {
        BroadcastStream::new(self.dispatcher.events()).filter_map(|item| match item {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Scan stream lagged, events dropped");
                None
            }
        })
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn status(&self) -> ScanStatus {
        let mut status = ScanStatus {
            connected: self.connection.is_some(),
            scanner_type: self.connection.as_ref().map(|c| c.scanner_type),
            camera_initialized: self.camera_running(),
            ..Default::default()
        };
        if let Some(event) = self.dispatcher.last_scan() {
            status.record(&event);
        }
        status
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    /// Id of the live decode session, for log correlation.
    pub fn session_id(&self) -> Option<Uuid> {
        self.connection
            .as_ref()
            .and_then(|c| c.camera.as_ref())
            .map(SessionGuard::id)
    }

    /// Characters currently waiting for Enter.
    pub fn buffered_key_count(&self) -> usize {
        self.key_buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn decoder_config(&self) -> &DecoderConfig {
        &self.decoder
    }

    pub fn settings(&self) -> &ScannerSettings {
        &self.settings
    }

    fn camera_running(&self) -> bool {
        self.session_state.is_running()
            && self
                .connection
                .as_ref()
                .is_some_and(|c| c.camera.is_some())
    }

    // =========================================================================
    // Camera
    // =========================================================================

    /// Decodes one still image with the current decoder configuration and
    /// dispatches the result. `None` if no barcode was found or decoding failed.
    pub async fn scan_from_image(&self, image: ImageSource) -> Option<String> {
        match self.backend.decode_image(self.decoder.clone(), image).await {
            Ok(Some(raw)) => self
                .dispatcher
                .dispatch(&raw, ScanSource::Image, clock_now())
                .map(|event| event.code),
            Ok(None) => {
                debug!("No barcode found in image");
                None
            }
            Err(e) => {
                warn!(error = %e, "Image decode failed");
                None
            }
        }
    }

    /// Lists video inputs. Empty on failure.
    pub async fn available_cameras(&self) -> Vec<CameraDevice> {
        match self.backend.list_devices().await {
            Ok(devices) => devices,
            Err(e) => {
                warn!(error = %e, "Camera enumeration failed");
                Vec::new()
            }
        }
    }

    pub async fn is_camera_available(&self) -> bool {
        !self.available_cameras().await.is_empty()
    }

    /// Pins `device_id` and restarts a running session on it.
    ///
    /// When the camera is not running the device is remembered for the next
    /// start and this returns true.
    pub async fn switch_camera(&mut self, device_id: &str) -> bool {
        info!(device_id = %device_id, "Switching camera");
        self.decoder.input_stream.constraints.device_id = Some(device_id.to_string());

        if !self.camera_active() {
            return true;
        }
        self.restart_session().await
    }

    /// Shallow-merges `patch` into the decoder configuration and restarts a
    /// running session. An invalid merge is rejected and nothing changes.
    pub async fn set_config(&mut self, patch: DecoderConfigPatch) -> bool {
        if patch.is_empty() {
            return true;
        }

        let mut merged = self.decoder.clone();
        let target = merged.input_stream.target.clone();
        merged.merge(patch);
        if merged.input_stream.target.is_none() {
            merged.input_stream.target = target;
        }

        if let Err(e) = merged.validate() {
            warn!(error = %e, "Decoder config rejected");
            return false;
        }

        self.decoder = merged;
        debug!("Decoder config updated");

        if !self.camera_active() {
            return true;
        }
        self.restart_session().await
    }

    fn camera_active(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.camera.is_some())
    }

    async fn restart_session(&mut self) -> bool {
        // Old device is released before the new one is opened.
        if let Some(conn) = self.connection.as_mut() {
            conn.camera.take();
        }

        match self.start_session().await {
            Ok(guard) => {
                if let Some(conn) = self.connection.as_mut() {
                    conn.camera = Some(guard);
                }
                true
            }
            Err(e) => {
                error!(error = %e, "Decode session restart failed");
                false
            }
        }
    }

    async fn start_session(&mut self) -> ScannerResult<SessionGuard> {
        self.transition(SessionState::Initializing);
        if let Err(e) = self.decoder.validate() {
            self.transition(SessionState::Stopped);
            return Err(e);
        }

        let id = Uuid::new_v4();
        let device_id = self.decoder.device_id().map(str::to_string);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

        debug!(session_id = %id, device_id = ?device_id, "Starting decode session");
        match self.backend.start(self.decoder.clone(), frames_tx).await {
            Ok(session) => {
                let pump = tokio::spawn(pump_frames(
                    id,
                    frames_rx,
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.overlay),
                    self.decoder.decoder.debug,
                ));
                self.transition(SessionState::Running);
                info!(session_id = %id, device_id = ?device_id, "Decode session running");
                Ok(SessionGuard::new(id, device_id, session, pump))
            }
            Err(e) => {
                self.transition(SessionState::Stopped);
                Err(e)
            }
        }
    }

    fn transition(&mut self, next: SessionState) {
        if !self.session_state.can_transition_to(next) {
            warn!(from = %self.session_state, to = %next, "Unexpected session transition");
        }
        debug!(from = %self.session_state, to = %next, "Session state");
        self.session_state = next;
    }
}

impl Drop for BarcodeUnifier {
    fn drop(&mut self) {
        if self.connection.is_some() {
            self.disconnect();
        }
    }
}

async fn pump_frames(
    session_id: Uuid,
    mut frames: mpsc::Receiver<FrameReport>,
    dispatcher: Arc<Dispatcher>,
    overlay: Arc<dyn OverlaySink>,
    debug_flags: DebugFlags,
) {
    while let Some(report) = frames.recv().await {
        overlay::render(overlay.as_ref(), &report, &debug_flags);
        if let Some(code) = report.code.as_deref() {
            dispatcher.dispatch(code, ScanSource::Camera, clock_now());
        }
    }
    debug!(session_id = %session_id, "Frame stream closed");
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for wiring a [`BarcodeUnifier`] to its collaborators.
pub struct BarcodeUnifierBuilder {
    config: ScannerConfig,
    keyboard_hub: Option<KeyboardHub>,
    backend: Option<Arc<dyn OpticalBackend>>,
    overlay: Option<Arc<dyn OverlaySink>>,
}

impl BarcodeUnifierBuilder {
    pub fn new(config: ScannerConfig) -> Self {
        BarcodeUnifierBuilder {
            config,
            keyboard_hub: None,
            backend: None,
            overlay: None,
        }
    }

    /// Uses a specific keyboard hub instead of the process-wide one.
    pub fn with_keyboard_hub(mut self, hub: KeyboardHub) -> Self {
        self.keyboard_hub = Some(hub);
        self
    }

    /// Sets the optical decoding backend.
    pub fn with_backend(mut self, backend: Arc<dyn OpticalBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Sets the overlay sink for processed frames.
    pub fn with_overlay(mut self, overlay: Arc<dyn OverlaySink>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn build(self) -> BarcodeUnifier {
        let ScannerConfig { scanner, decoder } = self.config;

        BarcodeUnifier {
            dispatcher: Arc::new(Dispatcher::new(&scanner)),
            key_buffer: Arc::new(Mutex::new(KeyBuffer::new(scanner.key_buffer_config()))),
            keyboard_hub: self.keyboard_hub.unwrap_or_else(KeyboardHub::global),
            backend: self.backend.unwrap_or_else(|| Arc::new(NoCameraBackend)),
            overlay: self.overlay.unwrap_or_else(|| Arc::new(NoOpOverlay)),
            settings: scanner,
            decoder,
            session_state: SessionState::Uninitialized,
            connection: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::testing::FakeBackend;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use vpos_core::{KeyInput, Symbology};

    struct Rig {
        hub: KeyboardHub,
        backend: Arc<FakeBackend>,
        unifier: BarcodeUnifier,
        seen: Arc<Mutex<Vec<String>>>,
    }

    fn rig() -> Rig {
        let hub = KeyboardHub::new();
        let backend = Arc::new(FakeBackend::with_devices(&["cam-front", "cam-rear"]));
        let unifier = BarcodeUnifier::builder(ScannerConfig::default())
            .with_keyboard_hub(hub.clone())
            .with_backend(backend.clone())
            .build();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        unifier.on_scan(move |code: &str| sink.lock().unwrap().push(code.to_string()));

        Rig {
            hub,
            backend,
            unifier,
            seen,
        }
    }

    fn surface() -> VideoSurface {
        VideoSurface::new("checkout-video")
    }

    fn type_keys(hub: &KeyboardHub, text: &str) {
        for c in text.chars() {
            hub.send(KeyInput::char(c));
        }
    }

    /// Lets spawned tasks drain their queues.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_usb_scan_dispatches_once() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::usb()).await);

        type_keys(&r.hub, "8935024122211");
        r.hub.send(KeyInput::enter());
        settle().await;

        assert_eq!(*r.seen.lock().unwrap(), vec!["8935024122211"]);
        let status = r.unifier.status();
        assert_eq!(status.last_scanned_code.as_deref(), Some("8935024122211"));
        assert!(status.last_scanned_time.is_some());
        assert_eq!(r.unifier.buffered_key_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_keys_are_abandoned() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::usb()).await);

        type_keys(&r.hub, "12345");
        settle().await;
        assert_eq!(r.unifier.buffered_key_count(), 5);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(r.unifier.buffered_key_count(), 0);

        r.hub.send(KeyInput::enter());
        settle().await;
        assert!(r.seen.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_keyboard_input_not_dispatched() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::usb()).await);

        type_keys(&r.hub, "123");
        r.hub.send(KeyInput::enter());
        settle().await;

        assert!(r.seen.lock().unwrap().is_empty());
        assert_eq!(r.unifier.buffered_key_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_decode_reaches_all_subscribers_despite_panic() {
        let backend = Arc::new(FakeBackend::with_devices(&["cam-rear"]));
        let mut unifier = BarcodeUnifier::builder(ScannerConfig::default())
            .with_keyboard_hub(KeyboardHub::new())
            .with_backend(backend.clone())
            .build();

        let first_calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&first_calls);
        unifier.on_scan(move |_| {
            *counter.lock().unwrap() += 1;
            panic!("cart service unavailable");
        });
        let second = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&second);
        unifier.on_scan(move |code: &str| sink.lock().unwrap().push(code.to_string()));

        assert!(unifier.connect(ConnectOptions::camera(surface())).await);
        assert!(backend.emit_code("123456").await);
        settle().await;
        // Same code still in front of the lens.
        assert!(backend.emit_code("123456").await);
        settle().await;

        assert_eq!(*first_calls.lock().unwrap(), 1);
        assert_eq!(*second.lock().unwrap(), vec!["123456"]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(backend.emit_code("123456").await);
        settle().await;
        assert_eq!(*first_calls.lock().unwrap(), 2);
        assert_eq!(second.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_camera_code_dispatches_immediately() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);

        r.backend.emit_code("111111").await;
        r.backend.emit(FrameReport::empty()).await;
        r.backend.emit_code("222222").await;
        r.backend.emit_code("111111").await;
        settle().await;

        assert_eq!(*r.seen.lock().unwrap(), vec!["111111", "222222", "111111"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_off_scan_removes_only_that_subscriber() {
        let mut r = rig();
        let other = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&other);
        let id = r
            .unifier
            .on_scan(move |code: &str| sink.lock().unwrap().push(code.to_string()));

        assert!(r.unifier.off_scan(id));
        assert!(!r.unifier.off_scan(id));
        assert_eq!(r.unifier.subscriber_count(), 1);

        assert!(r.unifier.connect(ConnectOptions::usb()).await);
        type_keys(&r.hub, "ABC-123");
        r.hub.send(KeyInput::enter());
        settle().await;

        assert!(other.lock().unwrap().is_empty());
        assert_eq!(*r.seen.lock().unwrap(), vec!["ABC-123"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_resets_status() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::both(surface())).await);
        let status = r.unifier.status();
        assert!(status.connected);
        assert!(status.camera_initialized);
        assert_eq!(status.scanner_type, Some(ScannerType::Both));
        assert!(r.unifier.session_id().is_some());

        type_keys(&r.hub, "8935");
        settle().await;
        assert_eq!(r.unifier.buffered_key_count(), 4);

        assert!(r.unifier.disconnect());
        let status = r.unifier.status();
        assert!(!status.connected);
        assert!(!status.camera_initialized);
        assert_eq!(status.scanner_type, None);
        assert_eq!(r.unifier.buffered_key_count(), 0);
        assert_eq!(r.unifier.session_state(), SessionState::Stopped);
        assert_eq!(r.backend.stops.load(Ordering::SeqCst), 1);
        assert!(!r.hub.is_leased());
        assert!(!r.backend.is_live());

        // Idempotent.
        assert!(r.unifier.disconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_queued_before_disconnect_are_discarded() {
        let mut r = rig();
        for _ in 0..20 {
            assert!(r.unifier.connect(ConnectOptions::usb()).await);
            type_keys(&r.hub, "1234");
            r.hub.send(KeyInput::enter());
            assert!(r.unifier.disconnect());
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(r.seen.lock().unwrap().is_empty());
        assert_eq!(r.unifier.status().last_scanned_code, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_scan_with_spaces_dispatches_verbatim() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::usb()).await);

        type_keys(&r.hub, "  12");
        r.hub.send(KeyInput::enter());
        type_keys(&r.hub, "SKU 0042");
        r.hub.send(KeyInput::enter());
        settle().await;

        assert_eq!(*r.seen.lock().unwrap(), vec!["  12", "SKU 0042"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_starts_with_fresh_camera_filter() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);
        r.backend.emit_code("123456").await;
        settle().await;

        assert!(r.unifier.disconnect());
        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);
        r.backend.emit_code("123456").await;
        settle().await;

        assert_eq!(*r.seen.lock().unwrap(), vec!["123456", "123456"]);
        assert_eq!(
            r.unifier.status().last_scanned_code.as_deref(),
            Some("123456")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_from_image() {
        let r = rig();

        assert_eq!(r.unifier.scan_from_image(ImageSource::Bytes(vec![0; 16])).await, None);
        assert!(r.seen.lock().unwrap().is_empty());

        *r.backend.image_result.lock().unwrap() = Some("8935024122211".into());
        assert_eq!(
            r.unifier
                .scan_from_image(ImageSource::DataUrl("data:image/png;base64,AAAA".into()))
                .await
                .as_deref(),
            Some("8935024122211")
        );
        assert_eq!(*r.seen.lock().unwrap(), vec!["8935024122211"]);
        assert_eq!(
            r.unifier.status().last_scanned_code.as_deref(),
            Some("8935024122211")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_while_connected_is_refused() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::usb()).await);
        assert!(!r.unifier.connect(ConnectOptions::camera(surface())).await);
        assert_eq!(r.unifier.status().scanner_type, Some(ScannerType::Usb));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keyboard_lease_is_exclusive_across_unifiers() {
        let mut r = rig();
        let mut second = BarcodeUnifier::builder(ScannerConfig::default())
            .with_keyboard_hub(r.hub.clone())
            .build();

        assert!(r.unifier.connect(ConnectOptions::usb()).await);
        assert!(!second.connect(ConnectOptions::usb()).await);

        r.unifier.disconnect();
        assert!(second.connect(ConnectOptions::usb()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_without_surface_fails() {
        let mut r = rig();
        let options = ConnectOptions {
            video_surface: None,
            scanner_type: ScannerType::Camera,
        };
        assert!(!r.unifier.connect(options).await);
        assert!(!r.unifier.status().connected);
        assert_eq!(r.backend.starts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_failure_releases_keyboard() {
        let hub = KeyboardHub::new();
        let mut unifier = BarcodeUnifier::builder(ScannerConfig::default())
            .with_keyboard_hub(hub.clone())
            .build();

        assert!(!unifier.connect(ConnectOptions::both(surface())).await);
        assert!(!unifier.status().connected);
        assert!(!hub.is_leased());
        assert_eq!(unifier.session_state(), SessionState::Stopped);
        assert!(!unifier.is_camera_available().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_camera_restarts_session() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);
        let first_session = r.unifier.session_id();

        let cameras = r.unifier.available_cameras().await;
        assert_eq!(cameras.len(), 2);
        assert!(r.unifier.is_camera_available().await);

        assert!(r.unifier.switch_camera("cam-rear").await);
        assert_eq!(r.backend.starts.load(Ordering::SeqCst), 2);
        assert_eq!(r.backend.stops.load(Ordering::SeqCst), 1);
        assert_ne!(r.unifier.session_id(), first_session);
        assert_eq!(r.unifier.session_state(), SessionState::Running);

        let config = r.backend.last_config.lock().unwrap().clone().unwrap();
        assert_eq!(config.device_id(), Some("cam-rear"));
        assert_eq!(config.input_stream.target, Some(surface()));

        // Frames from the new session still dispatch.
        assert!(r.backend.emit_code("5550001112223").await);
        settle().await;
        assert_eq!(*r.seen.lock().unwrap(), vec!["5550001112223"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_camera_while_stopped_is_remembered() {
        let mut r = rig();
        assert!(r.unifier.switch_camera("cam-front").await);
        assert_eq!(r.backend.starts.load(Ordering::SeqCst), 0);

        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);
        let config = r.backend.last_config.lock().unwrap().clone().unwrap();
        assert_eq!(config.device_id(), Some("cam-front"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_config_merges_and_restarts() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::camera(surface())).await);

        assert!(
            r.unifier
                .set_config(DecoderConfigPatch::readers(vec![Symbology::Code128]))
                .await
        );
        assert_eq!(r.backend.starts.load(Ordering::SeqCst), 2);
        let config = r.backend.last_config.lock().unwrap().clone().unwrap();
        assert_eq!(config.decoder.readers, vec![Symbology::Code128]);
        assert_eq!(config.input_stream.target, Some(surface()));

        // Empty reader list never reaches the backend.
        assert!(!r.unifier.set_config(DecoderConfigPatch::readers(vec![])).await);
        assert_eq!(r.backend.starts.load(Ordering::SeqCst), 2);
        assert_eq!(r.unifier.decoder_config().decoder.readers, vec![Symbology::Code128]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_failure_leaves_camera_stopped() {
        let mut r = rig();
        assert!(r.unifier.connect(ConnectOptions::both(surface())).await);

        r.backend.fail_start.store(true, Ordering::SeqCst);
        assert!(!r.unifier.switch_camera("cam-rear").await);

        let status = r.unifier.status();
        assert!(status.connected);
        assert!(!status.camera_initialized);
        assert_eq!(r.unifier.session_state(), SessionState::Stopped);
        assert_eq!(r.backend.stops.load(Ordering::SeqCst), 1);

        // Keyboard channel keeps working.
        type_keys(&r.hub, "ABC-123");
        r.hub.send(KeyInput::enter());
        settle().await;
        assert_eq!(*r.seen.lock().unwrap(), vec!["ABC-123"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_stream_yields_tagged_events() {
        let mut r = rig();
        let mut stream = Box::pin(r.unifier.scan_stream());
        assert!(r.unifier.connect(ConnectOptions::both(surface())).await);

        type_keys(&r.hub, "ABC-123");
        r.hub.send(KeyInput::enter());
        settle().await;
        r.backend.emit_code("8935024122211").await;
        settle().await;

        let first = stream.next().await.unwrap();
        assert_eq!(first.code, "ABC-123");
        assert_eq!(first.source, ScanSource::Keyboard);
        let second = stream.next().await.unwrap();
        assert_eq!(second.code, "8935024122211");
        assert_eq!(second.source, ScanSource::Camera);
    }
}
