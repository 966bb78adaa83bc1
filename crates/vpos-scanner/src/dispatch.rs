//! # Dispatcher
//!
//! The single routine both channels converge on.
//!
//! ```text
//!  keyboard ─┐
//!  camera  ──┼──► validate ──► duplicate filter ──► record last scan ──► subscribers
//!  image   ──┘     (CR/LF,      (camera only)        (ScanStatus)        broadcast
//!                  GTIN)
//! ```
//!
//! Dispatches are serialized: whichever channel reaches the dispatcher first
//! is delivered first, and deliveries never interleave.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use vpos_core::validation::{is_retail_barcode, validate_barcode, validate_gtin};
use vpos_core::{DuplicateFilter, ScanEvent, ScanSource, ValidationError};

use crate::config::ScannerSettings;
use crate::registry::{deliver, SubscriberRegistry, SubscriptionId};

/// Capacity of the broadcast ring behind `scan_stream`.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Current time on the tokio clock, as a std instant.
///
/// Reading through tokio keeps paused-clock tests deterministic.
pub(crate) fn clock_now() -> Instant {
    tokio::time::Instant::now().into_std()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct DispatchState {
    filter: DuplicateFilter,
    last: Option<ScanEvent>,
}

/// Validation, debounce and fan-out shared by every channel.
pub(crate) struct Dispatcher {
    max_code_length: usize,
    verify_checksum: bool,
    state: Mutex<DispatchState>,
    registry: Mutex<SubscriberRegistry>,
    events: broadcast::Sender<ScanEvent>,
    /// Held for the whole of a dispatch.
    serial: Mutex<()>,
}

impl Dispatcher {
    pub(crate) fn new(settings: &ScannerSettings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Dispatcher {
            max_code_length: settings.max_code_length,
            verify_checksum: settings.verify_checksum,
            state: Mutex::new(DispatchState {
                filter: DuplicateFilter::new(settings.duplicate_window()),
                last: None,
            }),
            registry: Mutex::new(SubscriberRegistry::new()),
            events,
            serial: Mutex::new(()),
        }
    }

    pub(crate) fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        lock(&self.registry).subscribe(callback)
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.registry).unsubscribe(id)
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        lock(&self.registry).len()
    }

    pub(crate) fn events(&self) -> broadcast::Receiver<ScanEvent> {
        self.events.subscribe()
    }

    /// Most recently dispatched event.
    pub(crate) fn last_scan(&self) -> Option<ScanEvent> {
        lock(&self.state).last.clone()
    }

    /// Forgets the last admitted code so a new session starts unfiltered.
    /// The last-scan status is kept.
    pub(crate) fn reset_filter(&self) {
        lock(&self.state).filter.reset();
    }

    fn validate(&self, raw: &str) -> Result<String, ValidationError> {
        let code = validate_barcode(raw, self.max_code_length)?;
        if self.verify_checksum && is_retail_barcode(&code) {
            validate_gtin(&code)?;
        }
        Ok(code)
    }

    /// Runs one decoded payload through validation and debounce, then
    /// notifies every subscriber.
    ///
    /// Returns the delivered event, or `None` if the payload was rejected or
    /// suppressed as a duplicate.
    pub(crate) fn dispatch(&self, raw: &str, source: ScanSource, now: Instant) -> Option<ScanEvent> {
        let _serial = lock(&self.serial);

        let code = match self.validate(raw) {
            Ok(code) => code,
            Err(e) => {
                warn!(source = %source, error = %e, "Rejected scan payload");
                return None;
            }
        };

        let event = {
            let mut state = lock(&self.state);
            if source == ScanSource::Camera {
                if !state.filter.admit(&code, now) {
                    debug!(code = %code, "Duplicate camera decode suppressed");
                    return None;
                }
            } else {
                state.filter.record(&code, now);
            }

            let event = ScanEvent::new(code, source);
            state.last = Some(event.clone());
            event
        };

        let subscribers = lock(&self.registry).snapshot();
        let delivered = deliver(&subscribers, &event.code);
        info!(
            code = %event.code,
            source = %source,
            subscribers = subscribers.len(),
            delivered,
            "Barcode dispatched"
        );

        // No stream listeners is normal.
        let _ = self.events.send(event.clone());

        Some(event)
    }
}
