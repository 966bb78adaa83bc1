//! # vpos-scan: Scanner Bench Tool
//!
//! Feeds terminal keystrokes into the barcode input unifier so a wedge
//! scanner can be checked at the till without the POS frontend.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  USB scanner ──► terminal (raw mode) ──► crossterm::event::read         │
//! │                                               │                         │
//! │                                   convert_key_event                     │
//! │                                               ▼                         │
//! │                                        KeyboardHub::send                │
//! │                                               │                         │
//! │                                        BarcodeUnifier                   │
//! │                                      ┌────────┴────────┐                │
//! │                                  on_scan count     scan_stream print    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```text
//! vpos-scan [path/to/scanner.toml]
//! RUST_LOG=vpos_scanner=trace vpos-scan
//! ```
//! `Esc` or `Ctrl+C` quits and prints the final status as JSON.

mod input;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use crossterm::event::{self, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vpos_scanner::{BarcodeUnifier, ConnectOptions, KeyboardHub, ScannerConfig, TracingOverlay};

use crate::input::{convert_key_event, TerminalKey};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ScannerConfig::load(config_path).context("loading scanner config")?;

    let hub = KeyboardHub::global();
    let mut scanner = BarcodeUnifier::builder(config)
        .with_keyboard_hub(hub.clone())
        .with_overlay(Arc::new(TracingOverlay))
        .build();

    if scanner.settings().scanner_type.uses_camera() {
        warn!(
            scanner_type = %scanner.settings().scanner_type,
            "No camera backend in the terminal, using the keyboard channel only"
        );
    }

    let scans = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&scans);
    scanner.on_scan(move |_| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    let mut stream = Box::pin(scanner.scan_stream());
    tokio::spawn(async move {
        while let Some(event) = stream.next().await {
            print_line(&format!(
                "  {}  [{}]  {}",
                event.scanned_at.format("%H:%M:%S%.3f"),
                event.source,
                event.code
            ));
        }
    });

    if !scanner.connect(ConnectOptions::usb()).await {
        bail!("keyboard stream unavailable");
    }

    {
        let _raw = RawMode::enable().context("enabling raw terminal mode")?;
        print_line("vpos-scan ready. Scan a barcode, Esc to quit.");

        let reader_hub = hub.clone();
        tokio::task::spawn_blocking(move || read_keys(&reader_hub))
            .await
            .context("key reader panicked")??;
    }

    scanner.disconnect();
    let status = scanner.status();
    info!(scans = scans.load(Ordering::Relaxed), "Bench session finished");
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// ## Log Levels
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=vpos_scanner=trace` - Include overlay drawing
/// - Default: INFO, DEBUG for vpos crates
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,vpos=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Blocks on terminal input until a quit key arrives.
fn read_keys(hub: &KeyboardHub) -> anyhow::Result<()> {
    loop {
        if !event::poll(Duration::from_millis(250))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            match convert_key_event(key) {
                TerminalKey::Quit => return Ok(()),
                TerminalKey::Scan(input) => {
                    hub.send(input);
                }
                TerminalKey::Skip => {}
            }
        }
    }
}

/// Raw mode needs explicit carriage returns.
fn print_line(text: &str) {
    let mut stdout = io::stdout().lock();
    let _ = write!(stdout, "{text}\r\n");
    let _ = stdout.flush();
}

/// Restores cooked mode on drop, including on early return.
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawMode)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}
