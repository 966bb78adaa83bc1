//! # Frame Overlay
//!
//! Presentation side effect of the camera channel: every processed frame is
//! drawn over the live feed so the cashier can see what the decoder sees.
//!
//! ```text
//! FrameReport ──► render() ──► OverlaySink
//!                   │
//!                   ├── clear()                       always
//!                   ├── draw_candidates(boxes)        debug.draw_bounding_box
//!                   ├── draw_accepted(box)            whenever a code decoded
//!                   ├── draw_scanline(line)           debug.draw_scanline
//!                   └── show_pattern / frequency      debug.show_pattern / show_frequency
//! ```

use tracing::trace;

use crate::camera::{BoundingBox, FrameReport, Scanline};
use crate::config::DebugFlags;

/// Receives drawing commands for the overlay canvas.
pub trait OverlaySink: Send + Sync {
    /// Wipes the previous frame's drawing.
    fn clear(&self);

    fn draw_candidates(&self, boxes: &[BoundingBox]);

    fn draw_accepted(&self, bbox: &BoundingBox);

    fn draw_scanline(&self, line: &Scanline);

    /// Shows the decoded payload and format next to the box.
    fn annotate(&self, _code: &str, _symbology: &str) {}
}

/// Overlay for headless terminals.
pub struct NoOpOverlay;

impl OverlaySink for NoOpOverlay {
    fn clear(&self) {}
    fn draw_candidates(&self, _boxes: &[BoundingBox]) {}
    fn draw_accepted(&self, _bbox: &BoundingBox) {}
    fn draw_scanline(&self, _line: &Scanline) {}
}

/// Overlay that writes drawing commands to the trace log.
pub struct TracingOverlay;

impl OverlaySink for TracingOverlay {
    fn clear(&self) {
        trace!("overlay: clear");
    }

    fn draw_candidates(&self, boxes: &[BoundingBox]) {
        trace!(count = boxes.len(), "overlay: candidate boxes");
    }

    fn draw_accepted(&self, bbox: &BoundingBox) {
        trace!(
            x = bbox.x,
            y = bbox.y,
            width = bbox.width,
            height = bbox.height,
            "overlay: accepted box"
        );
    }

    fn draw_scanline(&self, line: &Scanline) {
        trace!(from = ?line.from, to = ?line.to, "overlay: scanline");
    }

    fn annotate(&self, code: &str, symbology: &str) {
        trace!(code = %code, symbology = %symbology, "overlay: label");
    }
}

/// Draws one processed frame according to the debug flags.
pub fn render(sink: &dyn OverlaySink, report: &FrameReport, debug: &DebugFlags) {
    sink.clear();

    if debug.draw_bounding_box && !report.candidates.is_empty() {
        sink.draw_candidates(&report.candidates);
    }

    if report.code.is_some() {
        if let Some(bbox) = &report.accepted {
            sink.draw_accepted(bbox);
        }
    }

    if debug.draw_scanline {
        if let Some(line) = &report.scanline {
            sink.draw_scanline(line);
        }
    }

    if debug.show_pattern || debug.show_frequency {
        if let (Some(code), Some(symbology)) = (&report.code, report.symbology) {
            sink.annotate(code, symbology.as_str());
        }
    }
}
