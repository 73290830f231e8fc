//! Headless frame driver
//!
//! Holds at most one pending render callback and fires it on demand with a
//! synthetic timestamp, so loops can run without a browser.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use super::FrameDriver;

type Callback = Box<dyn FnOnce(Duration)>;

#[derive(Default)]
pub struct HeadlessDriver {
    pending: RefCell<Option<(u64, Callback)>>,
    next_handle: Cell<u64>,
    now: Cell<Duration>,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_scheduled(&self) -> bool {
        self.pending.borrow().is_some()
    }

    /// Synthetic time of the last fired callback
    pub fn now(&self) -> Duration {
        self.now.get()
    }

    /// Run the pending callback at `timestamp`. Returns false if none was
    /// scheduled.
    pub fn fire(&self, timestamp: Duration) -> bool {
        // Release the slot before running so the callback can reschedule
        let pending = self.pending.borrow_mut().take();
        match pending {
            Some((_, callback)) => {
                self.now.set(timestamp);
                callback(timestamp);
                true
            }
            None => false,
        }
    }

    /// Fire `delta` after the previous callback
    pub fn advance(&self, delta: Duration) -> bool {
        self.fire(self.now.get() + delta)
    }
}

impl FrameDriver for HeadlessDriver {
    type Handle = u64;

    fn schedule(&self, callback: Box<dyn FnOnce(Duration)>) -> u64 {
        let handle = self.next_handle.get() + 1;
        self.next_handle.set(handle);
        *self.pending.borrow_mut() = Some((handle, callback));
        handle
    }

    fn cancel(&self, handle: u64) {
        let mut pending = self.pending.borrow_mut();
        if pending.as_ref().is_some_and(|(h, _)| *h == handle) {
            *pending = None;
        }
    }

    fn now(&self) -> Option<Duration> {
        Some(self.now.get())
    }
}
