//! Key tally demo game
//!
//! Space starts a round, Escape ends it, Enter returns to the title.
//! The score is the number of key presses seen while playing.

use crate::engine::{DrawContext, Game, TickContext};
use crate::sim::{GameState, Key};

#[derive(Debug, Default)]
pub struct KeyTally {
    pub presses: u32,
    pub ticks: u64,
    /// Highest-coded key pressed in the latest tick that had any
    pub last_key: Option<Key>,
    pub frames_drawn: u64,
}

impl KeyTally {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Game for KeyTally {
    fn init(&mut self) {
        log::info!("Key tally ready, press Space to start");
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self.ticks += 1;

        match ctx.state() {
            GameState::Waiting => {
                if ctx.was_pressed(Key::SPACE) {
                    self.presses = 0;
                    self.last_key = None;
                    ctx.set_state(GameState::Playing);
                }
            }
            GameState::Playing => {
                if ctx.was_pressed(Key::ESCAPE) {
                    ctx.set_state(GameState::Over);
                    ctx.show_overlay("GAME OVER", format!("Score: {}. Press Enter", self.presses));
                    return;
                }
                let pressed = &ctx.input().keys().pressed;
                self.presses += pressed.len() as u32;
                if let Some(key) = pressed.iter().last() {
                    self.last_key = Some(key);
                }
            }
            GameState::Over => {
                if ctx.was_pressed(Key::ENTER) {
                    ctx.set_state(GameState::Waiting);
                    ctx.show_overlay("KEY TALLY", "Press Space to start");
                }
            }
        }
    }

    fn draw(&mut self, _ctx: &mut DrawContext<'_>) {
        self.frames_drawn += 1;
    }

    fn state_changed(&mut self, state: GameState) {
        log::debug!("Key tally state: {state:?}");
    }

    fn score(&self) -> f64 {
        self.presses as f64
    }
}
