//! Crossterm key events to scanner key input.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use vpos_core::{KeyInput, KeyStroke};

/// What the bench loop should do with a terminal key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKey {
    /// Forward to the keyboard hub.
    Scan(KeyInput),
    /// Leave the bench tool.
    Quit,
    /// Key releases.
    Skip,
}

// =============================================================================
// KEY EVENT CONVERSION
// =============================================================================

/// Converts a crossterm key event.
///
/// `Esc` and `Ctrl+C` quit; raw mode swallows the usual SIGINT.
pub fn convert_key_event(event: KeyEvent) -> TerminalKey {
    if event.kind == KeyEventKind::Release {
        return TerminalKey::Skip;
    }

    let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
    match event.code {
        KeyCode::Esc => return TerminalKey::Quit,
        KeyCode::Char('c') | KeyCode::Char('C') if ctrl => return TerminalKey::Quit,
        _ => {}
    }

    let stroke = match event.code {
        KeyCode::Char(c) => KeyStroke::Char(c),
        KeyCode::Enter => KeyStroke::Enter,
        _ => KeyStroke::Other,
    };

    TerminalKey::Scan(KeyInput {
        stroke,
        modified: is_modified(event.modifiers),
    })
}

/// Ctrl, Alt and Super count as shortcut modifiers. Shift does not; wedge
/// scanners send it for upper-case letters.
fn is_modified(mods: KeyModifiers) -> bool {
    mods.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT | KeyModifiers::SUPER | KeyModifiers::META)
}
