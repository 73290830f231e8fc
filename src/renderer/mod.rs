//! Draw collaborators
//!
//! The engine brackets every render with these calls; the games draw in
//! between. Real backends live outside the core except for the small WebGL2
//! surface used by the browser build.

#[cfg(target_arch = "wasm32")]
pub mod webgl;

#[cfg(target_arch = "wasm32")]
pub use webgl::WebGlRenderer;

use crate::sim::FrameNumber;

/// Primitive renderer; one `begin`/`flush_batch`/`end` per render
pub trait Renderer {
    fn begin(&mut self);
    /// Submit batched primitives (text is drawn after this)
    fn flush_batch(&mut self);
    fn end(&mut self);
    /// Drawing surface size in pixels
    fn size(&self) -> (u32, u32);
}

/// Text layer, drawn on top of primitives
pub trait TextRenderer {
    fn begin_frame(&mut self);
    fn flush(&mut self, width: u32, height: u32);
}

/// Notified once per completed render
pub trait FrameCapture {
    /// `capture` is set on the capture cadence while a session records
    fn on_frame_rendered(&mut self, frame: FrameNumber, capture: bool);
}

/// Renderer with no output (headless runs and tests)
#[derive(Debug, Clone)]
pub struct NullRenderer {
    pub size: (u32, u32),
}

impl Default for NullRenderer {
    fn default() -> Self {
        Self { size: (480, 400) }
    }
}

impl Renderer for NullRenderer {
    fn begin(&mut self) {}

    fn flush_batch(&mut self) {}

    fn end(&mut self) {}

    fn size(&self) -> (u32, u32) {
        self.size
    }
}

#[derive(Debug, Default)]
pub struct NullText;

impl TextRenderer for NullText {
    fn begin_frame(&mut self) {}

    fn flush(&mut self, _width: u32, _height: u32) {}
}

/// Counts renders and the frames that were due for capture
#[derive(Debug, Default)]
pub struct CaptureLog {
    pub rendered: u64,
    pub captured: u64,
    pub last_captured: Option<FrameNumber>,
}

impl FrameCapture for CaptureLog {
    fn on_frame_rendered(&mut self, frame: FrameNumber, capture: bool) {
        self.rendered += 1;
        if capture {
            self.captured += 1;
            self.last_captured = Some(frame);
        }
    }
}
