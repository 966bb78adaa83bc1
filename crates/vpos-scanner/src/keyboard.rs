//! # Keyboard Channel
//!
//! USB keyboard-wedge scanners type their payload followed by Enter. The
//! process keyboard stream is modelled as a [`KeyboardHub`] that at most one
//! listener can lease at a time.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  terminal / window events                                              │
//! │         │ hub.send(KeyInput)                                            │
//! │         ▼                                                               │
//! │  ┌──────────────┐  acquire()   ┌───────────────┐                       │
//! │  │ KeyboardHub  │ ───────────► │ KeyboardLease │  (one at a time)      │
//! │  │ slot: Option │              └───────┬───────┘                       │
//! │  └──────────────┘                      │ keys                           │
//! │         ▲  drop(lease) empties slot    ▼                                │
//! │         │                 ┌─────────────────────────┐                   │
//! │         │                 │ listener task           │                   │
//! │         │                 │  select! {              │                   │
//! │         │                 │    key  => buffer.push  │──► Dispatcher     │
//! │         │                 │    idle => buffer.expire│                   │
//! │         │                 │    shutdown => break    │                   │
//! │         │                 │  }                      │                   │
//! │         │                 └─────────────────────────┘                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys sent while nobody holds the lease are dropped, the same way a
//! keystroke with no listener attached goes nowhere.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant as TokioInstant};
use tracing::{debug, info, trace, warn};

use vpos_core::{KeyBuffer, KeyInput, KeyOutcome, ScanSource};

use crate::dispatch::{clock_now, Dispatcher};
use crate::error::{ScannerError, ScannerResult};

// =============================================================================
// Keyboard Hub
// =============================================================================

struct Listener {
    lease_id: u64,
    keys: mpsc::UnboundedSender<KeyInput>,
}

struct HubInner {
    next_lease: AtomicU64,
    slot: Mutex<Option<Listener>>,
}

/// Fan-in point for keyboard events with a single exclusive listener.
#[derive(Clone)]
pub struct KeyboardHub {
    inner: Arc<HubInner>,
}

impl Default for KeyboardHub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyboardHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyboardHub")
            .field("leased", &self.is_leased())
            .finish()
    }
}

impl KeyboardHub {
    /// Creates an independent hub. Most callers want [`KeyboardHub::global`].
    pub fn new() -> Self {
        KeyboardHub {
            inner: Arc::new(HubInner {
                next_lease: AtomicU64::new(1),
                slot: Mutex::new(None),
            }),
        }
    }

    /// The process keyboard stream.
    pub fn global() -> KeyboardHub {
        static GLOBAL: OnceLock<KeyboardHub> = OnceLock::new();
        GLOBAL.get_or_init(KeyboardHub::new).clone()
    }

    /// Delivers a key-down event to the current listener.
    ///
    /// Returns false if nobody is listening.
    pub fn send(&self, input: KeyInput) -> bool {
        let slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(listener) => listener.keys.send(input).is_ok(),
            None => false,
        }
    }

    /// Returns true if a lease is currently held.
    pub fn is_leased(&self) -> bool {
        self.inner
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Takes exclusive ownership of the keyboard stream.
    pub fn acquire(&self) -> ScannerResult<KeyboardLease> {
        let mut slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(ScannerError::KeyboardInUse);
        }

        let lease_id = self.inner.next_lease.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(Listener { lease_id, keys: tx });

        debug!(lease_id, "Keyboard lease acquired");
        Ok(KeyboardLease {
            id: lease_id,
            hub: self.clone(),
            keys: Some(rx),
        })
    }

    fn release(&self, lease_id: u64) {
        let mut slot = self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().map(|l| l.lease_id) == Some(lease_id) {
            *slot = None;
            debug!(lease_id, "Keyboard lease released");
        }
    }
}

/// Exclusive right to receive keyboard events. Released on drop.
pub struct KeyboardLease {
    id: u64,
    hub: KeyboardHub,
    keys: Option<mpsc::UnboundedReceiver<KeyInput>>,
}

impl KeyboardLease {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Hands the key receiver to a listener task. The lease itself stays
    /// with the owner so release happens synchronously on drop.
    pub fn take_keys(&mut self) -> Option<mpsc::UnboundedReceiver<KeyInput>> {
        self.keys.take()
    }
}

impl Drop for KeyboardLease {
    fn drop(&mut self) {
        self.hub.release(self.id);
    }
}

// =============================================================================
// Listener Task
// =============================================================================

/// Running keyboard listener. Dropping it releases the lease and stops the
/// task; keys still queued at that point are never dispatched.
pub(crate) struct KeyboardListener {
    _lease: KeyboardLease,
    active: Arc<AtomicBool>,
    buffer: Arc<Mutex<KeyBuffer>>,
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl KeyboardListener {
    /// Spawns the listener on the current tokio runtime.
    pub(crate) fn spawn(
        mut lease: KeyboardLease,
        buffer: Arc<Mutex<KeyBuffer>>,
        dispatcher: Arc<Dispatcher>,
    ) -> ScannerResult<Self> {
        let keys = lease
            .take_keys()
            .ok_or_else(|| ScannerError::ChannelError("keyboard lease already drained".into()))?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let active = Arc::new(AtomicBool::new(true));

        info!(lease_id = lease.id(), "Keyboard listener started");
        let task = tokio::spawn(run_listener(
            keys,
            Arc::clone(&buffer),
            Arc::clone(&active),
            dispatcher,
            shutdown_rx,
        ));

        Ok(KeyboardListener {
            _lease: lease,
            active,
            buffer,
            shutdown_tx,
            task,
        })
    }
}

impl Drop for KeyboardListener {
    fn drop(&mut self) {
        // Flipped under the buffer lock so no key can complete afterwards.
        {
            let mut buffer = lock_buffer(&self.buffer);
            self.active.store(false, Ordering::Release);
            buffer.clear();
        }
        let _ = self.shutdown_tx.try_send(());
        self.task.abort();
    }
}

fn lock_buffer(buffer: &Mutex<KeyBuffer>) -> std::sync::MutexGuard<'_, KeyBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_listener(
    mut keys: mpsc::UnboundedReceiver<KeyInput>,
    buffer: Arc<Mutex<KeyBuffer>>,
    active: Arc<AtomicBool>,
    dispatcher: Arc<Dispatcher>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        let deadline = lock_buffer(&buffer).deadline();
        // Parked far away when nothing is buffered; the branch is disabled anyway.
        let idle_at = deadline
            .map(TokioInstant::from_std)
            .unwrap_or_else(|| TokioInstant::now() + Duration::from_secs(3600));

        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!("Keyboard listener received shutdown");
                break;
            }

            maybe_key = keys.recv() => {
                let Some(input) = maybe_key else {
                    debug!("Keyboard stream closed");
                    break;
                };
                handle_key(input, &buffer, &active, &dispatcher);
            }

            _ = sleep_until(idle_at), if deadline.is_some() => {
                if let Some(abandoned) = lock_buffer(&buffer).expire(clock_now()) {
                    trace!(len = abandoned.chars().count(), "Idle timeout, key buffer abandoned");
                }
            }
        }
    }

    // The buffer is shared with the next listener; clearing is the owner's job.
    info!("Keyboard listener stopped");
}

fn handle_key(
    input: KeyInput,
    buffer: &Mutex<KeyBuffer>,
    active: &AtomicBool,
    dispatcher: &Dispatcher,
) {
    // Guard dropped before dispatch; subscribers may inspect the buffer.
    let outcome = {
        let mut buffer = lock_buffer(buffer);
        if !active.load(Ordering::Acquire) {
            return;
        }
        buffer.push(input, clock_now())
    };

    match outcome {
        KeyOutcome::Completed(code) => {
            dispatcher.dispatch(&code, ScanSource::Keyboard, clock_now());
        }
        KeyOutcome::TooShort { len } => {
            debug!(len, "Enter on short key buffer, cleared without dispatch");
        }
        KeyOutcome::Overflow { len } => {
            warn!(len, "Key buffer overflow, discarding input");
        }
        KeyOutcome::Buffered { .. } | KeyOutcome::Ignored => {}
    }
}
