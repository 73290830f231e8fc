//! Replay
//!
//! A [`Recording`] holds the per-callback time deltas and every captured raw
//! event of a run. Feeding it back into a fresh engine reproduces the same
//! tick-by-tick input state, provided the run was traced from its start.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::{Engine, Game, Host};
use crate::error::RecorderError;
use crate::platform::{EventSource, HeadlessDriver};
use crate::sim::{FrameNumber, InputLog, RawEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub fixed_step_ns: u64,
    pub max_catch_up_ticks: u32,
    /// Clock delta of each host callback, in order
    pub frame_deltas_ns: Vec<u64>,
    pub events: Vec<RawEvent>,
}

impl Recording {
    pub fn new(config: &EngineConfig, deltas: Vec<Duration>, events: Vec<RawEvent>) -> Self {
        Self {
            fixed_step_ns: config.fixed_step_ns,
            max_catch_up_ticks: config.max_catch_up_ticks,
            frame_deltas_ns: deltas.iter().map(|d| d.as_nanos() as u64).collect(),
            events,
        }
    }

    /// Timing config the run used
    pub fn config(&self) -> EngineConfig {
        EngineConfig {
            fixed_step_ns: self.fixed_step_ns,
            max_catch_up_ticks: self.max_catch_up_ticks,
            ..EngineConfig::default()
        }
    }

    pub fn frames(&self) -> usize {
        self.frame_deltas_ns.len()
    }

    pub fn to_json(&self) -> Result<String, RecorderError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RecorderError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Injects recorded events once their frame has been rendered
#[derive(Debug, Clone)]
pub struct ReplaySource {
    events: Vec<RawEvent>,
    next: usize,
}

impl ReplaySource {
    pub fn new(events: Vec<RawEvent>) -> Self {
        Self { events, next: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.events.len() - self.next
    }
}

impl EventSource for ReplaySource {
    fn deliver(&mut self, frame: FrameNumber, input: &mut InputLog) {
        while let Some(event) = self.events.get(self.next) {
            if event.frame_number > frame {
                break;
            }
            input.apply(event);
            self.next += 1;
        }
    }
}

/// Run `game` through a recording on a headless driver
pub fn replay<G: Game + 'static>(recording: &Recording, game: G) -> Rc<RefCell<Engine<G>>> {
    let engine = Rc::new(RefCell::new(Engine::new(
        recording.config(),
        game,
        Host::headless(),
    )));
    let driver = Rc::new(HeadlessDriver::new());
    let handle = Engine::run(&engine, Rc::clone(&driver));

    let mut source = ReplaySource::new(recording.events.clone());
    let mut now = Duration::ZERO;
    for &delta in &recording.frame_deltas_ns {
        {
            let mut engine = engine.borrow_mut();
            let frame = engine.frame_number();
            source.deliver(frame, engine.input_mut());
        }
        now += Duration::from_nanos(delta);
        driver.fire(now);
    }
    handle.stop();

    if source.remaining() > 0 {
        log::debug!("{} events captured after the last frame", source.remaining());
    }
    engine
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TickContext;
    use crate::sim::{GameState, Key, KeyState};
    use glam::Vec2;
    use proptest::prelude::*;

    /// Samples the full input state every tick
    #[derive(Default)]
    struct Tracer {
        samples: Vec<(u64, KeyState, Option<Vec2>)>,
    }

    impl Game for Tracer {
        fn update(&mut self, ctx: &mut TickContext<'_>) {
            let input = ctx.input();
            self.samples
                .push((ctx.tick(), input.keys().clone(), input.mouse_position()));
            if ctx.was_pressed(Key::SPACE) && ctx.state() != GameState::Playing {
                ctx.set_state(GameState::Playing);
            }
        }
    }

    const KEYS: [Key; 4] = [Key::SPACE, Key::ARROW_LEFT, Key::ARROW_RIGHT, Key::ESCAPE];

    /// One host callback: input captured before it, then the time delta
    type Step = (u64, Vec<(usize, bool)>, Option<(f32, f32)>);

    fn run_live(steps: &[Step]) -> (Recording, Vec<(u64, KeyState, Option<Vec2>)>) {
        let mut engine = Engine::new(EngineConfig::default(), Tracer::default(), Host::headless());
        engine.start();
        engine.record_trace();

        let mut now = Duration::ZERO;
        for (delta_ms, keys, mouse) in steps {
            for &(idx, down) in keys {
                let key = KEYS[idx];
                if down {
                    engine.input_mut().on_raw_key_down(key, 0, now);
                } else {
                    engine.input_mut().on_raw_key_up(key, 0, now);
                }
            }
            if let Some((x, y)) = mouse {
                engine.input_mut().on_raw_mouse_move(Some(Vec2::new(*x, *y)), now);
            }
            now += Duration::from_millis(*delta_ms);
            engine.frame(now);
        }

        let recording = engine.take_recording().unwrap();
        let samples = std::mem::take(&mut engine.game_mut().samples);
        (recording, samples)
    }

    fn run_replay(recording: &Recording) -> Vec<(u64, KeyState, Option<Vec2>)> {
        let engine = replay(recording, Tracer::default());
        let samples = std::mem::take(&mut engine.borrow_mut().game_mut().samples);
        samples
    }

    #[test]
    fn test_source_waits_for_frame() {
        let mut live = InputLog::default();
        live.on_raw_key_down(Key::ENTER, 13, Duration::ZERO);
        let mut events = live.drain_events();
        events[0].frame_number = 3;

        let mut source = ReplaySource::new(events);
        let mut input = InputLog::default();
        source.deliver(2, &mut input);
        assert!(!input.is_down(Key::ENTER));
        source.deliver(3, &mut input);
        assert!(input.is_down(Key::ENTER));
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_replay_matches_live_run() {
        let steps: Vec<Step> = vec![
            (0, vec![], None),
            (17, vec![(1, true)], Some((10.0, 10.0))),
            (5, vec![(1, true), (0, true)], None),
            (40, vec![(0, false), (1, false)], Some((12.0, 30.0))),
            (250, vec![(2, true)], None),
            (16, vec![(2, false)], None),
        ];
        let (recording, live) = run_live(&steps);
        assert!(!live.is_empty());
        assert_eq!(run_replay(&recording), live);
    }

    #[test]
    fn test_recording_json() {
        let steps: Vec<Step> = vec![(0, vec![(0, true)], None), (20, vec![(0, false)], None)];
        let (recording, _) = run_live(&steps);
        let json = recording.to_json().unwrap();
        let restored = Recording::from_json(&json).unwrap();
        assert_eq!(restored, recording);
        assert_eq!(restored.frames(), 2);
        assert!(Recording::from_json("{}").is_err());
    }

    fn step() -> impl Strategy<Value = Step> {
        (
            0u64..120,
            prop::collection::vec((0usize..KEYS.len(), any::<bool>()), 0..4),
            prop::option::of((0f32..480.0, 0f32..400.0)),
        )
    }

    proptest! {
        #[test]
        fn prop_replay_is_deterministic(steps in prop::collection::vec(step(), 1..40)) {
            let (recording, live) = run_live(&steps);
            let first = run_replay(&recording);
            let second = run_replay(&recording);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(&first, &live);
        }
    }
}
