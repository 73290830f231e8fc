//! Arcade Engine - a deterministic fixed-timestep core for browser games
//!
//! Core modules:
//! - `sim`: Clock, input log, frame sequencing and session state
//! - `engine`: Wires the core to a game and its host collaborators
//! - `recorder`: Session/segment recording of raw input
//! - `replay`: Re-running captured input through a fresh engine
//! - `renderer`: Draw collaborator traits (WebGL2 in the browser)
//! - `platform`: Browser/headless frame drivers, overlay and input binding

pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod platform;
pub mod recorder;
pub mod renderer;
pub mod replay;
pub mod sim;

pub use config::EngineConfig;
pub use engine::{DrawContext, Engine, Game, Host, LoopHandle, TickContext};
pub use error::{ConfigError, EngineError, RecorderError};
pub use replay::{Recording, ReplaySource, replay};

/// Engine configuration constants
pub mod consts {
    use std::time::Duration;

    /// Fixed simulation timestep (60 Hz)
    pub const FIXED_STEP: Duration = Duration::from_nanos(16_666_667);
    /// Accumulator cap in ticks to prevent spiral of death
    pub const MAX_CATCH_UP_TICKS: u32 = 5;

    /// Frames between capture requests while recording
    pub const CAPTURE_EVERY_N: u32 = 8;
    /// Minimum spacing of recorded mouse moves
    pub const MOUSE_MOVE_THROTTLE: Duration = Duration::from_millis(33);
    /// Recorded segment length
    pub const SEGMENT_DURATION: Duration = Duration::from_secs(60);

    pub const DEFAULT_CANVAS_ID: &str = "game";
    /// Game name when neither the config nor the page path gives one
    pub const DEFAULT_GAME_NAME: &str = "unknown";
}
