//! Raw input events retained for recording

use std::time::Duration;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::frame::FrameNumber;
use super::key::Key;

/// Category of a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    KeyDown,
    KeyUp,
    MouseMove,
    MouseDown,
    MouseUp,
    Click,
    Wheel,
}

/// Mouse button transitions that carry a button index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Down,
    Up,
    Click,
}

/// Kind-specific payload
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawInput {
    KeyDown { key: Key, key_code: u32 },
    KeyUp { key: Key, key_code: u32 },
    MouseMove { pos: Vec2 },
    MouseDown { button: u8, pos: Vec2 },
    MouseUp { button: u8, pos: Vec2 },
    Click { button: u8, pos: Vec2 },
    Wheel { delta: Vec2, pos: Vec2 },
}

impl RawInput {
    pub fn kind(&self) -> EventKind {
        match self {
            RawInput::KeyDown { .. } => EventKind::KeyDown,
            RawInput::KeyUp { .. } => EventKind::KeyUp,
            RawInput::MouseMove { .. } => EventKind::MouseMove,
            RawInput::MouseDown { .. } => EventKind::MouseDown,
            RawInput::MouseUp { .. } => EventKind::MouseUp,
            RawInput::Click { .. } => EventKind::Click,
            RawInput::Wheel { .. } => EventKind::Wheel,
        }
    }

    pub(crate) fn button(action: ButtonAction, button: u8, pos: Vec2) -> Self {
        match action {
            ButtonAction::Down => RawInput::MouseDown { button, pos },
            ButtonAction::Up => RawInput::MouseUp { button, pos },
            ButtonAction::Click => RawInput::Click { button, pos },
        }
    }
}

/// An input event tagged with the frame it was captured after
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Host time of capture
    #[serde(rename = "timestamp_ms", with = "millis")]
    pub timestamp: Duration,
    #[serde(flatten)]
    pub input: RawInput,
    /// Last completed render when the event arrived
    pub frame_number: FrameNumber,
}

impl RawEvent {
    pub fn kind(&self) -> EventKind {
        self.input.kind()
    }
}

/// Timestamps travel as fractional milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        if !ms.is_finite() || ms < 0.0 {
            return Err(serde::de::Error::custom(format!("invalid timestamp {ms}")));
        }
        Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
    }
}
