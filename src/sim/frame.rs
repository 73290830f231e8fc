//! Rendered-frame counter
//!
//! The frame number advances once per completed render, never per tick.
//! Input captured between render N and render N+1 is tagged N.

use std::cell::Cell;
use std::rc::Rc;

/// Identifier of a completed render
pub type FrameNumber = u64;

/// Shared frame counter; only the sequencer writes to it
#[derive(Debug, Default)]
pub struct FrameCounter(Rc<Cell<FrameNumber>>);

impl FrameCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only view for input capture
    pub fn reader(&self) -> FrameReader {
        FrameReader(Rc::clone(&self.0))
    }

    fn get(&self) -> FrameNumber {
        self.0.get()
    }

    fn increment(&self) -> FrameNumber {
        let next = self.0.get() + 1;
        self.0.set(next);
        next
    }
}

/// Read-only handle onto a [`FrameCounter`]
#[derive(Debug, Clone)]
pub struct FrameReader(Rc<Cell<FrameNumber>>);

impl FrameReader {
    /// A reader over a private counter stuck at zero
    pub fn detached() -> Self {
        Self(Rc::new(Cell::new(0)))
    }

    pub fn current(&self) -> FrameNumber {
        self.0.get()
    }
}

/// Advances the frame counter after each render
#[derive(Debug)]
pub struct FrameSequencer {
    counter: FrameCounter,
    capture_every_n: u32,
}

impl FrameSequencer {
    pub fn new(capture_every_n: u32) -> Self {
        Self {
            counter: FrameCounter::new(),
            capture_every_n: capture_every_n.max(1),
        }
    }

    /// Number of the last completed render (0 before the first)
    pub fn current(&self) -> FrameNumber {
        self.counter.get()
    }

    /// Call once the frame has been submitted. Returns the new frame number.
    pub fn on_frame_rendered(&mut self) -> FrameNumber {
        self.counter.increment()
    }

    pub fn reader(&self) -> FrameReader {
        self.counter.reader()
    }

    /// Whether `frame` falls on the capture cadence
    pub fn should_capture(&self, frame: FrameNumber) -> bool {
        frame % self.capture_every_n as u64 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increments_then_returns() {
        let mut seq = FrameSequencer::new(8);
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.on_frame_rendered(), 1);
        assert_eq!(seq.on_frame_rendered(), 2);
        assert_eq!(seq.current(), 2);
    }

    #[test]
    fn test_reader_sees_updates() {
        let mut seq = FrameSequencer::new(8);
        let reader = seq.reader();
        assert_eq!(reader.current(), 0);
        seq.on_frame_rendered();
        assert_eq!(reader.current(), 1);
        assert_eq!(FrameReader::detached().current(), 0);
    }

    #[test]
    fn test_capture_cadence() {
        let seq = FrameSequencer::new(8);
        assert!(seq.should_capture(0));
        assert!(!seq.should_capture(7));
        assert!(seq.should_capture(16));

        let every = FrameSequencer::new(0);
        assert!(every.should_capture(3));
    }
}
