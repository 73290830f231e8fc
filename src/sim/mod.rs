//! Deterministic simulation core
//!
//! Everything a fixed tick sees lives here. This module must stay
//! deterministic:
//! - Fixed timestep only, integer-nanosecond accumulator
//! - Input edges change only at tick boundaries
//! - No rendering or DOM dependencies

pub mod clock;
pub mod event;
pub mod frame;
pub mod input;
pub mod key;
pub mod session;

pub use clock::Clock;
pub use event::{ButtonAction, EventKind, RawEvent, RawInput};
pub use frame::{FrameCounter, FrameNumber, FrameReader, FrameSequencer};
pub use input::{CanvasRect, InputLog, KeyState, MouseState};
pub use key::{Key, KeyInterner, KeySet};
pub use session::{GameState, Session, SessionController, Transition};
