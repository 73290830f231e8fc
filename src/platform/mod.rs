//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Frame scheduling (`requestAnimationFrame` or a headless driver)
//! - Input event delivery
//! - Visibility detection
//! - The DOM overlay

pub mod headless;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use headless::HeadlessDriver;

use std::time::Duration;

use crate::sim::{FrameNumber, InputLog};

/// Host render-callback scheduler
pub trait FrameDriver {
    type Handle: Copy;

    /// Run `callback` with the host timestamp at the next frame
    fn schedule(&self, callback: Box<dyn FnOnce(Duration)>) -> Self::Handle;

    fn cancel(&self, handle: Self::Handle);

    /// Current host time on the callback clock, if the host exposes one
    fn now(&self) -> Option<Duration> {
        None
    }
}

/// Feeds raw input into the engine between render callbacks
pub trait EventSource {
    /// `frame` is the last completed render
    fn deliver(&mut self, frame: FrameNumber, input: &mut InputLog);
}

/// Show/hide text overlay over the canvas
pub trait Overlay {
    fn set_visible(&mut self, visible: bool);

    fn set_text(&mut self, title: &str, body: &str);

    fn show(&mut self, title: &str, body: &str) {
        self.set_visible(true);
        self.set_text(title, body);
    }

    fn hide(&mut self) {
        self.set_visible(false);
    }
}

/// Overlay that only remembers what it was told
#[derive(Debug, Default, Clone)]
pub struct NullOverlay {
    pub visible: bool,
    pub title: String,
    pub body: String,
}

impl Overlay for NullOverlay {
    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_text(&mut self, title: &str, body: &str) {
        self.title = title.to_string();
        self.body = body.to_string();
    }
}

/// Convert a host `DOMHighResTimeStamp` (ms) into a duration.
/// Negative or non-finite values become zero.
pub fn duration_from_millis(ms: f64) -> Duration {
    if ms.is_finite() && ms > 0.0 {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    } else {
        Duration::ZERO
    }
}

/// Page names that host a game rather than name one
const LAUNCHER_PAGES: [&str; 4] = ["index.html", "v2.html", "keypad.html", "autoplay.html"];

/// Game name from a page path: the first segment that is not a launcher page
pub fn detect_game_name(path: &str) -> Option<&str> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .find(|part| !LAUNCHER_PAGES.contains(part))
}
