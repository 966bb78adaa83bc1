//! # Key Buffer
//!
//! Keystroke buffering state machine for USB keyboard-wedge scanners.
//!
//! ## How Wedge Scanners Look From The Keyboard
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Scanner:  8 9 3 5 0 2 4 1 2 2 2 1 1 ⏎     (whole payload in ~30ms)    │
//! │  Human:    8 . . . . 9 . . . . 3 . . . .    (100ms+ between keys)       │
//! │                                                                         │
//! │  ┌──────────┐  printable key   ┌───────────┐                           │
//! │  │  Empty   │ ───────────────► │ Buffering │ ◄─┐ printable key         │
//! │  └──────────┘                  └─────┬─────┘ ──┘ (resets idle timer)   │
//! │       ▲                              │                                  │
//! │       │         Enter, len ≥ min ────┼──► Completed(code)               │
//! │       ├──────── Enter, len < min ────┤    TooShort (cleared)            │
//! │       ├──────── idle timer fired ────┤    abandoned (cleared)           │
//! │       └──────── len > max ───────────┘    Overflow (cleared)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Scanner input is told apart from human typing only by the absence of
//! activity: if nothing arrives for `idle_timeout`, the buffer is dropped.
//! Inter-key timing is never inspected directly.
//!
//! The buffer never reads a clock. Callers pass `now`, and the async layer
//! arms a timer on [`KeyBuffer::deadline`].

use std::time::{Duration, Instant};

use crate::{DEFAULT_KEY_IDLE_TIMEOUT_MS, MAX_BARCODE_LENGTH, MIN_BARCODE_LENGTH};

// =============================================================================
// Key Input
// =============================================================================

/// The part of a key-down event the buffer cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStroke {
    /// A single printable character.
    Char(char),
    /// The scanner's terminator.
    Enter,
    /// Shift, arrows, function keys and anything else.
    Other,
}

impl KeyStroke {
    /// Maps a DOM-style key name (`"a"`, `"Enter"`, `"Shift"`) to a stroke.
    ///
    /// A name consisting of exactly one character is printable; everything
    /// else except `Enter` is ignored by the buffer.
    pub fn from_key_name(name: &str) -> Self {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => KeyStroke::Char(c),
            _ if name == "Enter" => KeyStroke::Enter,
            _ => KeyStroke::Other,
        }
    }
}

/// A key-down event from the keyboard stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub stroke: KeyStroke,
    /// Ctrl, Alt or Meta was held.
    pub modified: bool,
}

impl KeyInput {
    pub fn char(c: char) -> Self {
        KeyInput {
            stroke: KeyStroke::Char(c),
            modified: false,
        }
    }

    pub fn enter() -> Self {
        KeyInput {
            stroke: KeyStroke::Enter,
            modified: false,
        }
    }

    /// Builds an input from a DOM-style key name.
    pub fn named(name: &str) -> Self {
        KeyInput {
            stroke: KeyStroke::from_key_name(name),
            modified: false,
        }
    }

    /// Marks the input as pressed together with Ctrl/Alt/Meta.
    pub fn with_modifier(mut self) -> Self {
        self.modified = true;
        self
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Tuning for the keystroke buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBufferConfig {
    /// Silence after which a partial buffer is abandoned.
    pub idle_timeout: Duration,
    /// Shortest payload that counts as a scan on Enter.
    pub min_length: usize,
    /// Longest payload before the buffer is discarded as runaway input.
    pub max_length: usize,
    /// Skip characters typed with Ctrl/Alt/Meta held (shortcuts).
    pub ignore_modified: bool,
}

impl Default for KeyBufferConfig {
    fn default() -> Self {
        KeyBufferConfig {
            idle_timeout: Duration::from_millis(DEFAULT_KEY_IDLE_TIMEOUT_MS),
            min_length: MIN_BARCODE_LENGTH,
            max_length: MAX_BARCODE_LENGTH,
            ignore_modified: true,
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What a single keystroke did to the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Character appended; buffer now holds `len` characters.
    Buffered { len: usize },
    /// Enter closed a plausible barcode.
    Completed(String),
    /// Enter arrived with fewer than `min_length` characters; buffer cleared.
    TooShort { len: usize },
    /// Buffer grew past `max_length`; buffer cleared.
    Overflow { len: usize },
    /// Keystroke had no effect.
    Ignored,
}

// =============================================================================
// Key Buffer
// =============================================================================

/// Accumulates wedge-scanner keystrokes between resets.
#[derive(Debug, Clone)]
pub struct KeyBuffer {
    config: KeyBufferConfig,
    chars: String,
    len: usize,
    last_key_at: Option<Instant>,
}

impl Default for KeyBuffer {
    fn default() -> Self {
        Self::new(KeyBufferConfig::default())
    }
}

impl KeyBuffer {
    pub fn new(config: KeyBufferConfig) -> Self {
        KeyBuffer {
            config,
            chars: String::new(),
            len: 0,
            last_key_at: None,
        }
    }

    pub fn config(&self) -> &KeyBufferConfig {
        &self.config
    }

    /// Number of buffered characters.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Buffered characters in typed order.
    pub fn as_str(&self) -> &str {
        &self.chars
    }

    /// Feeds one key-down event.
    pub fn push(&mut self, input: KeyInput, now: Instant) -> KeyOutcome {
        // A missed timer tick must not glue two scans together.
        self.expire(now);

        match input.stroke {
            KeyStroke::Char(_) if input.modified && self.config.ignore_modified => {
                KeyOutcome::Ignored
            }
            KeyStroke::Char(c) if c.is_control() => KeyOutcome::Ignored,
            KeyStroke::Char(c) => {
                self.chars.push(c);
                self.len += 1;
                self.last_key_at = Some(now);

                if self.len > self.config.max_length {
                    let len = self.len;
                    self.clear();
                    return KeyOutcome::Overflow { len };
                }
                KeyOutcome::Buffered { len: self.len }
            }
            KeyStroke::Enter => {
                if self.is_empty() {
                    return KeyOutcome::Ignored;
                }
                let len = self.len;
                let code = self.take();
                if len >= self.config.min_length {
                    KeyOutcome::Completed(code)
                } else {
                    KeyOutcome::TooShort { len }
                }
            }
            KeyStroke::Other => KeyOutcome::Ignored,
        }
    }

    /// When the idle timer should fire, if anything is buffered.
    pub fn deadline(&self) -> Option<Instant> {
        if self.is_empty() {
            return None;
        }
        self.last_key_at.map(|at| at + self.config.idle_timeout)
    }

    /// Drops the buffer if its idle deadline has passed.
    ///
    /// Returns the abandoned characters, never dispatched.
    pub fn expire(&mut self, now: Instant) -> Option<String> {
        match self.deadline() {
            Some(deadline) if now >= deadline => Some(self.take()),
            _ => None,
        }
    }

    /// Empties the buffer and disarms the idle deadline.
    pub fn clear(&mut self) {
        self.chars.clear();
        self.len = 0;
        self.last_key_at = None;
    }

    fn take(&mut self) -> String {
        let chars = std::mem::take(&mut self.chars);
        self.len = 0;
        self.last_key_at = None;
        chars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(buffer: &mut KeyBuffer, text: &str, start: Instant, gap: Duration) -> Instant {
        let mut at = start;
        for c in text.chars() {
            buffer.push(KeyInput::char(c), at);
            at += gap;
        }
        at
    }

    #[test]
    fn test_scanner_burst_completes_on_enter() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        let end = type_str(&mut buffer, "8935024122211", start, Duration::from_millis(2));

        assert_eq!(
            buffer.push(KeyInput::enter(), end),
            KeyOutcome::Completed("8935024122211".to_string())
        );
        assert!(buffer.is_empty());
        assert!(buffer.deadline().is_none());
    }

    #[test]
    fn test_short_input_is_cleared_without_completing() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        let end = type_str(&mut buffer, "123", start, Duration::from_millis(2));

        assert_eq!(buffer.push(KeyInput::enter(), end), KeyOutcome::TooShort { len: 3 });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_four_characters_is_enough() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        let end = type_str(&mut buffer, "A1B2", start, Duration::from_millis(2));

        assert_eq!(
            buffer.push(KeyInput::enter(), end),
            KeyOutcome::Completed("A1B2".to_string())
        );
    }

    #[test]
    fn test_idle_timeout_abandons_buffer() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        let end = type_str(&mut buffer, "12345", start, Duration::from_millis(5));
        let deadline = buffer.deadline().unwrap();
        assert_eq!(deadline, start + Duration::from_millis(20) + Duration::from_millis(100));

        assert_eq!(buffer.expire(deadline - Duration::from_millis(1)), None);
        assert_eq!(buffer.expire(deadline), Some("12345".to_string()));
        assert!(buffer.is_empty());

        // Enter after the abandon has nothing to complete.
        assert_eq!(buffer.push(KeyInput::enter(), end + Duration::from_secs(1)), KeyOutcome::Ignored);
    }

    #[test]
    fn test_every_keystroke_resets_idle_deadline() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        // 90ms gaps: slow, but never idle long enough to abandon.
        let end = type_str(&mut buffer, "98765", start, Duration::from_millis(90));

        assert_eq!(buffer.len(), 5);
        assert_eq!(
            buffer.push(KeyInput::enter(), end - Duration::from_millis(10)),
            KeyOutcome::Completed("98765".to_string())
        );
    }

    #[test]
    fn test_late_key_starts_fresh_buffer() {
        let mut buffer = KeyBuffer::default();
        let start = Instant::now();
        buffer.push(KeyInput::char('1'), start);
        buffer.push(KeyInput::char('2'), start + Duration::from_millis(500));

        assert_eq!(buffer.as_str(), "2");
    }

    #[test]
    fn test_non_printable_and_modified_keys_are_ignored() {
        let mut buffer = KeyBuffer::default();
        let now = Instant::now();

        assert_eq!(buffer.push(KeyInput::named("Shift"), now), KeyOutcome::Ignored);
        assert_eq!(buffer.push(KeyInput::named("ArrowUp"), now), KeyOutcome::Ignored);
        assert_eq!(buffer.push(KeyInput::char('\t'), now), KeyOutcome::Ignored);
        assert_eq!(
            buffer.push(KeyInput::char('c').with_modifier(), now),
            KeyOutcome::Ignored
        );
        assert!(buffer.is_empty());

        let mut permissive = KeyBuffer::new(KeyBufferConfig {
            ignore_modified: false,
            ..Default::default()
        });
        assert_eq!(
            permissive.push(KeyInput::char('C').with_modifier(), now),
            KeyOutcome::Buffered { len: 1 }
        );
    }

    #[test]
    fn test_overflow_discards_runaway_input() {
        let mut buffer = KeyBuffer::new(KeyBufferConfig {
            max_length: 5,
            ..Default::default()
        });
        let now = Instant::now();
        for c in "12345".chars() {
            buffer.push(KeyInput::char(c), now);
        }
        assert_eq!(buffer.push(KeyInput::char('6'), now), KeyOutcome::Overflow { len: 6 });
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_key_names() {
        assert_eq!(KeyStroke::from_key_name("a"), KeyStroke::Char('a'));
        assert_eq!(KeyStroke::from_key_name("Đ"), KeyStroke::Char('Đ'));
        assert_eq!(KeyStroke::from_key_name("Enter"), KeyStroke::Enter);
        assert_eq!(KeyStroke::from_key_name("Tab"), KeyStroke::Other);
        assert_eq!(KeyStroke::from_key_name(""), KeyStroke::Other);
    }
}
