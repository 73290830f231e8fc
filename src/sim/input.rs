//! Input log
//!
//! Two disjoint surfaces:
//! - Query API (`is_down`, `was_pressed`, `was_released`, mouse state), read
//!   by simulation code inside a tick. Queries never mutate.
//! - Capture API (`on_raw_*`), called by the host between render callbacks.
//!   Each capture updates the level/edge state and queues a [`RawEvent`]
//!   tagged with the current frame number.
//!
//! Edge sets are cleared once per tick by [`InputLog::end_tick`].

use std::time::Duration;

use glam::Vec2;

use super::event::{ButtonAction, RawEvent, RawInput};
use super::frame::{FrameNumber, FrameReader};
use super::key::{Key, KeySet};
use crate::consts::MOUSE_MOVE_THROTTLE;

/// Level and edge key state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyState {
    /// Currently held
    pub down: KeySet,
    /// Went down since the last tick boundary
    pub pressed: KeySet,
    /// Went up since the last tick boundary
    pub released: KeySet,
}

impl KeyState {
    fn key_down(&mut self, key: Key) {
        // OS key-repeat must not re-trigger the press edge
        if self.down.insert(key) {
            self.pressed.insert(key);
        }
    }

    fn key_up(&mut self, key: Key) {
        self.down.remove(key);
        self.released.insert(key);
    }

    fn clear_edges(&mut self) {
        self.pressed.clear();
        self.released.clear();
    }
}

/// Last known pointer position and held buttons
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    pub position: Option<Vec2>,
    buttons: u32,
}

impl MouseState {
    pub fn is_button_down(&self, button: u8) -> bool {
        button < 32 && self.buttons & (1 << button) != 0
    }

    fn apply(&mut self, input: &RawInput) {
        match *input {
            RawInput::MouseMove { pos }
            | RawInput::Click { pos, .. }
            | RawInput::Wheel { pos, .. } => {
                self.position = Some(pos);
            }
            RawInput::MouseDown { button, pos } => {
                self.position = Some(pos);
                if button < 32 {
                    self.buttons |= 1 << button;
                }
            }
            RawInput::MouseUp { button, pos } => {
                self.position = Some(pos);
                if button < 32 {
                    self.buttons &= !(1 << button);
                }
            }
            RawInput::KeyDown { .. } | RawInput::KeyUp { .. } => {}
        }
    }
}

/// Canvas bounds in client (page) coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl CanvasRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Canvas-relative whole-pixel position, or `None` outside the canvas
    pub fn to_canvas(&self, client: Vec2) -> Option<Vec2> {
        let inside = client.x >= self.left
            && client.x <= self.left + self.width
            && client.y >= self.top
            && client.y <= self.top + self.height;
        inside.then(|| (client - Vec2::new(self.left, self.top)).round())
    }
}

/// Authoritative keyboard/mouse state plus the pending raw event queue
#[derive(Debug)]
pub struct InputLog {
    keys: KeyState,
    mouse: MouseState,
    events: Vec<RawEvent>,
    frame: FrameReader,
    mouse_throttle: Duration,
    last_mouse_move: Option<Duration>,
    /// Every captured event, kept for replay when enabled
    journal: Option<Vec<RawEvent>>,
}

impl Default for InputLog {
    fn default() -> Self {
        Self::new(FrameReader::detached())
    }
}

impl InputLog {
    pub fn new(frame: FrameReader) -> Self {
        Self {
            keys: KeyState::default(),
            mouse: MouseState::default(),
            events: Vec::new(),
            frame,
            mouse_throttle: MOUSE_MOVE_THROTTLE,
            last_mouse_move: None,
            journal: None,
        }
    }

    pub fn with_mouse_throttle(mut self, throttle: Duration) -> Self {
        self.mouse_throttle = throttle;
        self
    }

    // === Query API ===

    pub fn is_down(&self, key: Key) -> bool {
        self.keys.down.contains(key)
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.keys.pressed.contains(key)
    }

    pub fn was_released(&self, key: Key) -> bool {
        self.keys.released.contains(key)
    }

    pub fn keys(&self) -> &KeyState {
        &self.keys
    }

    pub fn mouse_position(&self) -> Option<Vec2> {
        self.mouse.position
    }

    pub fn is_button_down(&self, button: u8) -> bool {
        self.mouse.is_button_down(button)
    }

    // === Capture API ===

    pub fn on_raw_key_down(&mut self, key: Key, key_code: u32, timestamp: Duration) {
        self.capture(RawInput::KeyDown { key, key_code }, timestamp);
    }

    /// A release for a key never seen down is still an edge
    pub fn on_raw_key_up(&mut self, key: Key, key_code: u32, timestamp: Duration) {
        self.capture(RawInput::KeyUp { key, key_code }, timestamp);
    }

    /// Dropped when closer than the throttle to the last move that passed
    /// it. `None` is a move outside the canvas: it still opens a new
    /// throttle window but is not captured. Returns whether it was captured.
    pub fn on_raw_mouse_move(&mut self, pos: Option<Vec2>, timestamp: Duration) -> bool {
        if let Some(last) = self.last_mouse_move {
            if timestamp.saturating_sub(last) < self.mouse_throttle {
                return false;
            }
        }
        self.last_mouse_move = Some(timestamp);
        match pos {
            Some(pos) => {
                self.capture(RawInput::MouseMove { pos }, timestamp);
                true
            }
            None => false,
        }
    }

    pub fn on_raw_mouse_button(
        &mut self,
        action: ButtonAction,
        button: u8,
        pos: Vec2,
        timestamp: Duration,
    ) {
        self.capture(RawInput::button(action, button, pos), timestamp);
    }

    pub fn on_raw_wheel(&mut self, delta: Vec2, pos: Vec2, timestamp: Duration) {
        self.capture(RawInput::Wheel { delta, pos }, timestamp);
    }

    /// Re-inject a recorded event. It bypasses the mousemove throttle (it
    /// already passed it once) and is re-tagged with the current frame.
    pub fn apply(&mut self, event: &RawEvent) {
        self.capture(event.input, event.timestamp);
    }

    fn capture(&mut self, input: RawInput, timestamp: Duration) {
        match input {
            RawInput::KeyDown { key, .. } => self.keys.key_down(key),
            RawInput::KeyUp { key, .. } => self.keys.key_up(key),
            RawInput::MouseMove { .. } => {
                self.last_mouse_move = Some(timestamp);
                self.mouse.apply(&input);
            }
            _ => self.mouse.apply(&input),
        }
        let event = RawEvent {
            timestamp,
            input,
            frame_number: self.frame.current(),
        };
        if let Some(journal) = self.journal.as_mut() {
            journal.push(event);
        }
        self.events.push(event);
    }

    // === Driver API ===

    /// Clear both edge sets; called once after each tick's update
    pub fn end_tick(&mut self) {
        self.keys.clear_edges();
    }

    /// Move the queued raw events out
    pub fn drain_events(&mut self) -> Vec<RawEvent> {
        std::mem::take(&mut self.events)
    }

    /// Drop the queued raw events, returning how many there were
    pub fn discard_events(&mut self) -> usize {
        let count = self.events.len();
        self.events.clear();
        count
    }

    pub fn pending_events(&self) -> &[RawEvent] {
        &self.events
    }

    pub fn current_frame(&self) -> FrameNumber {
        self.frame.current()
    }

    /// Keep a copy of every capture from now on, independent of draining
    pub fn start_journal(&mut self) {
        self.journal = Some(Vec::new());
    }

    pub fn take_journal(&mut self) -> Vec<RawEvent> {
        self.journal.take().unwrap_or_default()
    }
}
