//! Game state machine and recording sessions
//!
//! `Waiting -> Playing -> Over -> Waiting`. Transitions come from game logic;
//! recording starts and stops as a side effect. Any transition is accepted;
//! ones that do not change the recording posture are no-ops.

use serde::{Deserialize, Serialize};

use crate::platform::Overlay;
use crate::recorder::Recorder;

/// Coarse game lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameState {
    /// Title/attract screen, nothing recorded
    #[default]
    Waiting,
    /// Active run, recorded
    Playing,
    /// Run ended
    Over,
}

/// Recording side effect of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Started,
    Ended,
    Unchanged,
}

/// The interval between entering `Playing` and leaving it (or being forced out)
#[derive(Debug, Clone, Default)]
pub struct Session {
    active: bool,
    /// Sessions started so far
    started: u64,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn count(&self) -> u64 {
        self.started
    }

    fn start(&mut self, recorder: &mut dyn Recorder) {
        self.active = true;
        self.started += 1;
        log::debug!("Session {} started", self.started);
        if let Err(e) = recorder.start_session() {
            log::warn!("Recorder failed to start session: {e}");
        }
    }

    fn end(&mut self, score: f64, recorder: &mut dyn Recorder) {
        self.active = false;
        log::debug!("Session {} ended (score {score})", self.started);
        if let Err(e) = recorder.end_session(score) {
            log::warn!("Recorder failed to end session: {e}");
        }
    }
}

/// Drives [`Session`] from [`GameState`] transitions and page visibility
#[derive(Debug, Default)]
pub struct SessionController {
    state: GameState,
    session: Session,
}

impl SessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_active()
    }

    /// Move to `new_state`, starting or ending a session as needed.
    ///
    /// `score` is only read when a session ends.
    pub fn set_state(
        &mut self,
        new_state: GameState,
        score: impl FnOnce() -> f64,
        recorder: &mut dyn Recorder,
        overlay: &mut dyn Overlay,
    ) -> Transition {
        let old_state = std::mem::replace(&mut self.state, new_state);

        match (old_state, new_state) {
            (old, GameState::Playing) if old != GameState::Playing => {
                overlay.hide();
                if !self.session.is_active() {
                    self.session.start(recorder);
                    return Transition::Started;
                }
                Transition::Unchanged
            }
            (GameState::Playing, GameState::Over) if self.session.is_active() => {
                self.session.end(score(), recorder);
                Transition::Ended
            }
            (_, GameState::Waiting) => {
                overlay.set_visible(true);
                Transition::Unchanged
            }
            _ => Transition::Unchanged,
        }
    }

    /// Force-end an active session when the page is hidden
    pub fn on_visibility_change(
        &mut self,
        hidden: bool,
        score: impl FnOnce() -> f64,
        recorder: &mut dyn Recorder,
    ) -> Transition {
        if hidden && self.session.is_active() {
            log::info!("Page hidden, closing session");
            self.session.end(score(), recorder);
            return Transition::Ended;
        }
        Transition::Unchanged
    }
}
