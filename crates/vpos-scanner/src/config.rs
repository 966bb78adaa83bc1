//! # Scanner Configuration
//!
//! Configuration for both input channels and the optical decoder.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Runtime (highest priority)                                         │
//! │     BarcodeUnifier::set_config / switch_camera                         │
//! │                                                                         │
//! │  2. Environment Variables                                              │
//! │     VPOS_SCANNER_TYPE=both                                             │
//! │     VPOS_CAMERA_DEVICE=usb-046d-0825                                   │
//! │                                                                         │
//! │  3. TOML Config File                                                   │
//! │     ~/.config/vpos-scanner/scanner.toml (Linux)                        │
//! │     ~/Library/Application Support/vn.vpos.vpos-scanner/ (macOS)         │
//! │                                                                         │
//! │  4. Default Values (lowest priority)                                   │
//! │     usb, 100ms idle, 2s duplicate window, retail symbologies           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [scanner]
//! scanner_type = "both"
//! key_idle_timeout_ms = 100
//! duplicate_window_ms = 2000
//!
//! [decoder.input_stream.constraints]
//! facing_mode = "environment"
//! device_id = "usb-046d-0825"
//!
//! [decoder.decoder]
//! readers = ["ean13", "code128"]
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use vpos_core::{
    KeyBufferConfig, ScannerType, Symbology, DEFAULT_DUPLICATE_WINDOW_MS,
    DEFAULT_KEY_IDLE_TIMEOUT_MS, MAX_BARCODE_LENGTH, MIN_BARCODE_LENGTH,
};

use crate::camera::VideoSurface;
use crate::error::{ScannerError, ScannerResult};

// =============================================================================
// Scanner Settings
// =============================================================================

/// Behaviour of the unifier itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerSettings {
    /// Channels used when the caller doesn't say.
    #[serde(default)]
    pub scanner_type: ScannerType,

    /// Keyboard silence before a partial buffer is abandoned (milliseconds).
    #[serde(default = "default_key_idle_timeout")]
    pub key_idle_timeout_ms: u64,

    /// Shortest keyboard payload that counts as a scan.
    #[serde(default = "default_min_code_length")]
    pub min_code_length: usize,

    /// Longest payload accepted from any channel.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,

    /// Same-code suppression window for the camera (milliseconds).
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_ms: u64,

    /// Reject 8/12/13/14-digit codes whose GTIN check digit is wrong.
    #[serde(default)]
    pub verify_checksum: bool,

    /// Skip characters typed with Ctrl/Alt/Meta held.
    #[serde(default = "default_true")]
    pub ignore_modified_keys: bool,
}

fn default_key_idle_timeout() -> u64 {
    DEFAULT_KEY_IDLE_TIMEOUT_MS
}
fn default_min_code_length() -> usize {
    MIN_BARCODE_LENGTH
}
fn default_max_code_length() -> usize {
    MAX_BARCODE_LENGTH
}
fn default_duplicate_window() -> u64 {
    DEFAULT_DUPLICATE_WINDOW_MS
}
fn default_true() -> bool {
    true
}

impl Default for ScannerSettings {
    fn default() -> Self {
        ScannerSettings {
            scanner_type: ScannerType::default(),
            key_idle_timeout_ms: default_key_idle_timeout(),
            min_code_length: default_min_code_length(),
            max_code_length: default_max_code_length(),
            duplicate_window_ms: default_duplicate_window(),
            verify_checksum: false,
            ignore_modified_keys: true,
        }
    }
}

impl ScannerSettings {
    /// Key buffer tuning derived from these settings.
    pub fn key_buffer_config(&self) -> KeyBufferConfig {
        KeyBufferConfig {
            idle_timeout: Duration::from_millis(self.key_idle_timeout_ms),
            min_length: self.min_code_length,
            max_length: self.max_code_length,
            ignore_modified: self.ignore_modified_keys,
        }
    }

    pub fn duplicate_window(&self) -> Duration {
        Duration::from_millis(self.duplicate_window_ms)
    }
}

// =============================================================================
// Decoder Configuration
// =============================================================================

/// Which camera a session prefers when no device id is pinned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacingMode {
    /// Rear camera on tablets; the one pointed at the counter.
    #[default]
    Environment,
    /// Front camera.
    User,
}

/// Pixel bounds for one video dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionBounds {
    pub min: u32,
    pub max: u32,
}

/// Aspect ratio bounds (width / height).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AspectBounds {
    pub min: f64,
    pub max: f64,
}

/// Camera stream constraints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    #[serde(default = "default_width")]
    pub width: DimensionBounds,

    #[serde(default = "default_height")]
    pub height: DimensionBounds,

    #[serde(default)]
    pub facing_mode: FacingMode,

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: AspectBounds,

    /// Pin a specific camera; overrides `facing_mode`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

fn default_width() -> DimensionBounds {
    DimensionBounds { min: 640, max: 1920 }
}
fn default_height() -> DimensionBounds {
    DimensionBounds { min: 480, max: 1080 }
}
fn default_aspect_ratio() -> AspectBounds {
    AspectBounds { min: 1.0, max: 2.0 }
}

impl Default for StreamConstraints {
    fn default() -> Self {
        StreamConstraints {
            width: default_width(),
            height: default_height(),
            facing_mode: FacingMode::default(),
            aspect_ratio: default_aspect_ratio(),
            device_id: None,
        }
    }
}

/// Where frames come from and where they are drawn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputStreamConfig {
    /// Display surface the live feed renders into. Set by `connect`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<VideoSurface>,

    #[serde(default)]
    pub constraints: StreamConstraints,
}

/// Overlay toggles for processed frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugFlags {
    #[serde(default)]
    pub draw_bounding_box: bool,
    #[serde(default)]
    pub show_frequency: bool,
    #[serde(default)]
    pub draw_scanline: bool,
    #[serde(default)]
    pub show_pattern: bool,
}

impl DebugFlags {
    /// Returns true if any overlay drawing is enabled.
    pub fn any(&self) -> bool {
        self.draw_bounding_box || self.show_frequency || self.draw_scanline || self.show_pattern
    }
}

/// Symbology readers and their debug overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    #[serde(default = "Symbology::default_readers")]
    pub readers: Vec<Symbology>,

    #[serde(default)]
    pub debug: DebugFlags,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            readers: Symbology::default_readers(),
            debug: DebugFlags::default(),
        }
    }
}

/// Size of the grid cells the locator searches for barcode-like regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchSize {
    XSmall,
    Small,
    #[default]
    Medium,
    Large,
    XLarge,
}

/// Detection-region tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    #[serde(default)]
    pub patch_size: PatchSize,

    /// Decode at half resolution for speed.
    #[serde(default = "default_true")]
    pub half_sample: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            patch_size: PatchSize::default(),
            half_sample: true,
        }
    }
}

/// Complete optical decoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub input_stream: InputStreamConfig,

    #[serde(default)]
    pub decoder: ReaderConfig,

    /// Search the frame for barcodes instead of scanning a fixed line.
    #[serde(default = "default_true")]
    pub locate: bool,

    #[serde(default)]
    pub locator: LocatorConfig,

    /// Target decode attempts per second.
    #[serde(default = "default_frequency")]
    pub frequency: u32,
}

fn default_frequency() -> u32 {
    10
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            input_stream: InputStreamConfig::default(),
            decoder: ReaderConfig::default(),
            locate: true,
            locator: LocatorConfig::default(),
            frequency: default_frequency(),
        }
    }
}

impl DecoderConfig {
    /// Shallow merge: every top-level key present in `patch` replaces the
    /// whole corresponding section.
    pub fn merge(&mut self, patch: DecoderConfigPatch) {
        if let Some(input_stream) = patch.input_stream {
            self.input_stream = input_stream;
        }
        if let Some(decoder) = patch.decoder {
            self.decoder = decoder;
        }
        if let Some(locate) = patch.locate {
            self.locate = locate;
        }
        if let Some(locator) = patch.locator {
            self.locator = locator;
        }
        if let Some(frequency) = patch.frequency {
            self.frequency = frequency;
        }
    }

    /// Validates the decoder configuration.
    pub fn validate(&self) -> ScannerResult<()> {
        if self.decoder.readers.is_empty() {
            return Err(ScannerError::InvalidConfig(
                "decoder.readers must name at least one symbology".into(),
            ));
        }

        let c = &self.input_stream.constraints;
        if c.width.min > c.width.max || c.height.min > c.height.max {
            return Err(ScannerError::InvalidConfig(format!(
                "resolution bounds inverted: width {}..{}, height {}..{}",
                c.width.min, c.width.max, c.height.min, c.height.max
            )));
        }
        if !(c.aspect_ratio.min > 0.0 && c.aspect_ratio.min <= c.aspect_ratio.max) {
            return Err(ScannerError::InvalidConfig(format!(
                "aspect ratio bounds invalid: {}..{}",
                c.aspect_ratio.min, c.aspect_ratio.max
            )));
        }

        if self.frequency == 0 {
            return Err(ScannerError::InvalidConfig(
                "frequency must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Pinned camera device, if any.
    pub fn device_id(&self) -> Option<&str> {
        self.input_stream.constraints.device_id.as_deref()
    }
}

/// Partial decoder configuration accepted by `set_config`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecoderConfigPatch {
    #[serde(default)]
    pub input_stream: Option<InputStreamConfig>,
    #[serde(default)]
    pub decoder: Option<ReaderConfig>,
    #[serde(default)]
    pub locate: Option<bool>,
    #[serde(default)]
    pub locator: Option<LocatorConfig>,
    #[serde(default)]
    pub frequency: Option<u32>,
}

impl DecoderConfigPatch {
    pub fn readers(readers: Vec<Symbology>) -> Self {
        DecoderConfigPatch {
            decoder: Some(ReaderConfig {
                readers,
                debug: DebugFlags::default(),
            }),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &DecoderConfigPatch::default()
    }
}

// =============================================================================
// Main Scanner Configuration
// =============================================================================

/// Complete scanner configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Unifier behaviour.
    #[serde(default)]
    pub scanner: ScannerSettings,

    /// Optical decoder.
    #[serde(default)]
    pub decoder: DecoderConfig,
}

impl ScannerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (scanner.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ScannerResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading scanner config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load scanner config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ScannerResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ScannerError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ScannerError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ScannerError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Scanner config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ScannerResult<()> {
        let s = &self.scanner;

        if s.key_idle_timeout_ms == 0 {
            return Err(ScannerError::InvalidConfig(
                "key_idle_timeout_ms must be greater than 0".into(),
            ));
        }

        if s.min_code_length == 0 || s.min_code_length > s.max_code_length {
            return Err(ScannerError::InvalidConfig(format!(
                "code length bounds invalid: min {}, max {}",
                s.min_code_length, s.max_code_length
            )));
        }

        self.decoder.validate()
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(kind) = std::env::var("VPOS_SCANNER_TYPE") {
            match kind.parse() {
                Ok(parsed) => {
                    debug!(scanner_type = %kind, "Overriding scanner type from environment");
                    self.scanner.scanner_type = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring VPOS_SCANNER_TYPE"),
            }
        }

        if let Ok(ms) = std::env::var("VPOS_KEY_IDLE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.scanner.key_idle_timeout_ms = ms;
            }
        }

        if let Ok(ms) = std::env::var("VPOS_DUPLICATE_WINDOW_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.scanner.duplicate_window_ms = ms;
            }
        }

        if let Ok(device) = std::env::var("VPOS_CAMERA_DEVICE") {
            debug!(device_id = %device, "Pinning camera from environment");
            self.decoder.input_stream.constraints.device_id = Some(device);
        }

        if let Ok(flag) = std::env::var("VPOS_VERIFY_CHECKSUM") {
            match flag.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.scanner.verify_checksum = true,
                "0" | "false" | "no" => self.scanner.verify_checksum = false,
                _ => warn!(value = %flag, "Unknown VPOS_VERIFY_CHECKSUM value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("vn", "vpos", "vpos-scanner")
            .map(|dirs| dirs.config_dir().join("scanner.toml"))
    }
}
