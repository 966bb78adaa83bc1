//! # Duplicate Filter
//!
//! Debounce policy for continuous camera decoding.
//!
//! A barcode held in front of the camera decodes on many consecutive
//! frames. Only the first decode should reach the checkout.
//!
//! ```text
//! time ──────────────────────────────────────────────────────────────►
//!        A     A  A   A          B   A             A (t > 2s after A)
//!        ✔     ✘  ✘   ✘          ✔   ✔             ✔
//!        │◄──── 2s window ────►│
//! ```
//!
//! The filter remembers a single last-code/last-time pair. It is not a
//! rolling set, so alternating `A, B, A` within the window dispatches all
//! three. Suppressed decodes do not extend the window.

use std::time::{Duration, Instant};

use crate::DEFAULT_DUPLICATE_WINDOW_MS;

/// Suppresses repeats of the most recently admitted code.
#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    window: Duration,
    last: Option<(String, Instant)>,
}

impl Default for DuplicateFilter {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_DUPLICATE_WINDOW_MS))
    }
}

impl DuplicateFilter {
    pub fn new(window: Duration) -> Self {
        DuplicateFilter { window, last: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true if `code` is a repeat of the last admitted code inside
    /// the window. Does not change state.
    pub fn is_duplicate(&self, code: &str, now: Instant) -> bool {
        match &self.last {
            Some((last_code, at)) => {
                last_code == code && now.saturating_duration_since(*at) < self.window
            }
            None => false,
        }
    }

    /// Decides whether `code` should dispatch, recording it if so.
    pub fn admit(&mut self, code: &str, now: Instant) -> bool {
        if self.is_duplicate(code, now) {
            return false;
        }
        self.record(code, now);
        true
    }

    /// Records a dispatch that bypassed `admit` (keyboard, still image),
    /// so the camera does not re-fire a code that was just scanned.
    pub fn record(&mut self, code: &str, now: Instant) {
        self.last = Some((code.to_string(), now));
    }

    /// Forgets the last code.
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_code_suppressed_inside_window() {
        let mut filter = DuplicateFilter::default();
        let t0 = Instant::now();

        assert!(filter.admit("123456", t0));
        assert!(!filter.admit("123456", t0 + Duration::from_millis(40)));
        assert!(!filter.admit("123456", t0 + Duration::from_millis(1999)));
        assert!(filter.admit("123456", t0 + Duration::from_millis(2000)));
    }

    #[test]
    fn test_suppressed_decodes_do_not_extend_window() {
        let mut filter = DuplicateFilter::default();
        let t0 = Instant::now();

        assert!(filter.admit("A", t0));
        assert!(!filter.admit("A", t0 + Duration::from_millis(1500)));
        assert!(filter.admit("A", t0 + Duration::from_millis(2100)));
    }

    #[test]
    fn test_different_code_dispatches_immediately() {
        let mut filter = DuplicateFilter::default();
        let t0 = Instant::now();

        assert!(filter.admit("A", t0));
        assert!(filter.admit("B", t0 + Duration::from_millis(10)));
    }

    #[test]
    fn test_alternating_codes_all_dispatch() {
        let mut filter = DuplicateFilter::default();
        let t0 = Instant::now();

        assert!(filter.admit("A", t0));
        assert!(filter.admit("B", t0 + Duration::from_millis(100)));
        assert!(filter.admit("A", t0 + Duration::from_millis(200)));
    }

    #[test]
    fn test_record_and_reset() {
        let mut filter = DuplicateFilter::new(Duration::from_millis(500));
        let t0 = Instant::now();

        filter.record("K1", t0);
        assert!(filter.is_duplicate("K1", t0 + Duration::from_millis(100)));
        assert!(!filter.admit("K1", t0 + Duration::from_millis(100)));

        filter.reset();
        assert!(filter.admit("K1", t0 + Duration::from_millis(200)));
    }
}
