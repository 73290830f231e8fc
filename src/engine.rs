//! Engine: wires the clock, input log, frame sequencer and session
//! controller to a game and its host collaborators.
//!
//! Per host callback:
//! 1. the clock turns the elapsed time into zero or more fixed ticks;
//! 2. each tick runs `Game::update`, applies requested state changes,
//!    forwards the drained raw events to the recorder (only while a session
//!    is active) and clears the input edges;
//! 3. the frame is drawn once;
//! 4. the frame counter advances, tagging input captured from here on.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::platform::{FrameDriver, NullOverlay, Overlay};
use crate::recorder::{NullRecorder, Recorder};
use crate::renderer::{CaptureLog, FrameCapture, NullRenderer, NullText, Renderer, TextRenderer};
use crate::replay::Recording;
use crate::sim::{
    Clock, FrameNumber, FrameSequencer, GameState, InputLog, Key, SessionController, Transition,
};

/// A game module driven by the engine
pub trait Game {
    /// Called once by [`Engine::start`]
    fn init(&mut self) {}

    /// Advance the simulation by one fixed step
    fn update(&mut self, ctx: &mut TickContext<'_>);

    /// Draw the current state; `ctx.alpha` interpolates between ticks
    fn draw(&mut self, _ctx: &mut DrawContext<'_>) {}

    /// Observer notification after every `set_state`
    fn state_changed(&mut self, _state: GameState) {}

    /// Current score, read when a recording session closes
    fn score(&self) -> f64 {
        0.0
    }
}

/// Side effects a tick asks for, applied after `update` returns
#[derive(Debug, Clone, PartialEq)]
enum Request {
    State(GameState),
    ShowOverlay(String, String),
    HideOverlay,
}

/// What a game sees during one fixed tick
pub struct TickContext<'a> {
    input: &'a InputLog,
    dt: Duration,
    frame: FrameNumber,
    tick: u64,
    state: GameState,
    requests: Vec<Request>,
}

impl<'a> TickContext<'a> {
    pub fn input(&self) -> &InputLog {
        self.input
    }

    pub fn is_down(&self, key: Key) -> bool {
        self.input.is_down(key)
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.input.was_pressed(key)
    }

    pub fn was_released(&self, key: Key) -> bool {
        self.input.was_released(key)
    }

    /// Fixed step
    pub fn dt(&self) -> Duration {
        self.dt
    }

    pub fn dt_secs(&self) -> f32 {
        self.dt.as_secs_f32()
    }

    /// Last completed render
    pub fn frame(&self) -> FrameNumber {
        self.frame
    }

    /// Index of this tick since the engine was created
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// State as of the latest request in this tick
    pub fn state(&self) -> GameState {
        self.requests
            .iter()
            .rev()
            .find_map(|r| match r {
                Request::State(s) => Some(*s),
                _ => None,
            })
            .unwrap_or(self.state)
    }

    pub fn set_state(&mut self, state: GameState) {
        self.requests.push(Request::State(state));
    }

    pub fn show_overlay(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.requests
            .push(Request::ShowOverlay(title.into(), body.into()));
    }

    pub fn hide_overlay(&mut self) {
        self.requests.push(Request::HideOverlay);
    }
}

/// What a game draws with
pub struct DrawContext<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub text: &'a mut dyn TextRenderer,
    /// Interpolation fraction between the last two ticks
    pub alpha: f64,
    pub state: GameState,
}

/// Host collaborators
pub struct Host {
    pub renderer: Box<dyn Renderer>,
    pub text: Box<dyn TextRenderer>,
    pub capture: Box<dyn FrameCapture>,
    pub recorder: Box<dyn Recorder>,
    pub overlay: Box<dyn Overlay>,
}

impl Host {
    /// No-output collaborators for tests and replays
    pub fn headless() -> Self {
        Self {
            renderer: Box::new(NullRenderer::default()),
            text: Box::new(NullText),
            capture: Box::new(CaptureLog::default()),
            recorder: Box::new(NullRecorder),
            overlay: Box::new(NullOverlay::default()),
        }
    }

    pub fn with_recorder(mut self, recorder: Box<dyn Recorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_capture(mut self, capture: Box<dyn FrameCapture>) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = overlay;
        self
    }
}

/// The fixed-timestep runtime around one game
pub struct Engine<G: Game> {
    config: EngineConfig,
    game: G,
    clock: Clock,
    input: InputLog,
    frames: FrameSequencer,
    session: SessionController,
    host: Host,
    running: bool,
    /// Frame deltas kept for [`Engine::take_recording`]
    trace: Option<Vec<Duration>>,
}

impl<G: Game> Engine<G> {
    pub fn new(config: EngineConfig, game: G, host: Host) -> Self {
        let frames = FrameSequencer::new(config.capture_every_n);
        let input = InputLog::new(frames.reader()).with_mouse_throttle(config.mouse_throttle());
        Self {
            clock: Clock::from_config(&config),
            config,
            game,
            input,
            frames,
            session: SessionController::new(),
            host,
            running: false,
            trace: None,
        }
    }

    /// Initialise the game and draw the first frame. Idempotent.
    pub fn start(&mut self) {
        if self.boot() {
            self.clock.reset();
        }
    }

    /// Start with the clock seeded at host time `timestamp`, so the first
    /// callback advances by the time elapsed since
    pub fn start_at(&mut self, timestamp: Duration) {
        if self.boot() {
            self.clock.reset_at(timestamp);
        }
    }

    /// Init and draw the first frame. False if already running.
    fn boot(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        log::info!(
            "Engine starting ({:?} step, {:?} cap)",
            self.clock.fixed_step(),
            self.clock.max_accumulated()
        );

        self.game.init();
        draw_frame(&mut self.game, &mut self.host, 0.0, self.session.state());
        true
    }

    /// Stop reacting to host callbacks; a loop started with [`Engine::run`]
    /// does not reschedule after this
    pub fn stop(&mut self) {
        if self.running {
            log::info!("Engine stopped after {} ticks", self.clock.total_ticks());
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// One host render callback at `timestamp`. Returns the ticks run.
    pub fn frame(&mut self, timestamp: Duration) -> u32 {
        if !self.running {
            return 0;
        }

        let delta = self.clock.delta_since(timestamp);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(delta);
        }

        let Self {
            game,
            clock,
            input,
            frames,
            session,
            host,
            ..
        } = self;

        let dt = clock.fixed_step();
        let frame = frames.current();
        let mut tick = clock.total_ticks();
        let ticks = clock.advance(delta, || {
            run_tick(game, input, session, host, dt, frame, tick);
            tick += 1;
        });

        draw_frame(game, host, clock.alpha(), session.state());

        let rendered = frames.on_frame_rendered();
        let capture = session.is_recording() && frames.should_capture(rendered);
        host.capture.on_frame_rendered(rendered, capture);

        ticks
    }

    /// Externally driven state change (menus, host code)
    pub fn set_state(&mut self, state: GameState) -> Transition {
        apply_state(
            &mut self.game,
            &mut self.input,
            &mut self.session,
            &mut self.host,
            state,
        )
    }

    /// Host page visibility signal
    pub fn on_visibility_change(&mut self, hidden: bool) -> Transition {
        let game = &self.game;
        self.session
            .on_visibility_change(hidden, || game.score(), self.host.recorder.as_mut())
    }

    pub fn show_overlay(&mut self, title: &str, body: &str) {
        self.host.overlay.show(title, body);
    }

    pub fn hide_overlay(&mut self) {
        self.host.overlay.hide();
    }

    /// Keep frame deltas and captured events for replay
    pub fn record_trace(&mut self) {
        self.trace = Some(Vec::new());
        self.input.start_journal();
    }

    /// Everything captured since [`Engine::record_trace`]
    pub fn take_recording(&mut self) -> Option<Recording> {
        let deltas = self.trace.take()?;
        let events = self.input.take_journal();
        Some(Recording::new(&self.config, deltas, events))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn game(&self) -> &G {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut G {
        &mut self.game
    }

    pub fn input(&self) -> &InputLog {
        &self.input
    }

    /// Capture API for push-style hosts
    pub fn input_mut(&mut self) -> &mut InputLog {
        &mut self.input
    }

    pub fn state(&self) -> GameState {
        self.session.state()
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn frame_number(&self) -> FrameNumber {
        self.frames.current()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn alpha(&self) -> f64 {
        self.clock.alpha()
    }

    pub fn host(&self) -> &Host {
        &self.host
    }
}

impl<G: Game + 'static> Engine<G> {
    /// Start the engine and drive it from `driver` until stopped
    pub fn run<D: FrameDriver + 'static>(
        engine: &Rc<RefCell<Self>>,
        driver: Rc<D>,
    ) -> LoopHandle<D> {
        match driver.now() {
            Some(now) => engine.borrow_mut().start_at(now),
            None => engine.borrow_mut().start(),
        }
        let handle = LoopHandle {
            driver,
            scheduled: Rc::new(Cell::new(None)),
            stopped: Rc::new(Cell::new(false)),
        };
        schedule_next(Rc::clone(engine), &handle);
        handle
    }
}

/// Cancels a loop started by [`Engine::run`]
pub struct LoopHandle<D: FrameDriver> {
    driver: Rc<D>,
    scheduled: Rc<Cell<Option<D::Handle>>>,
    stopped: Rc<Cell<bool>>,
}

impl<D: FrameDriver> LoopHandle<D> {
    /// Detach from the driver. A tick already running finishes normally.
    pub fn stop(&self) {
        self.stopped.set(true);
        if let Some(handle) = self.scheduled.take() {
            self.driver.cancel(handle);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

impl<D: FrameDriver> Clone for LoopHandle<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Rc::clone(&self.driver),
            scheduled: Rc::clone(&self.scheduled),
            stopped: Rc::clone(&self.stopped),
        }
    }
}

fn schedule_next<G, D>(engine: Rc<RefCell<Engine<G>>>, handle: &LoopHandle<D>)
where
    G: Game + 'static,
    D: FrameDriver + 'static,
{
    let next = handle.clone();
    let id = handle.driver.schedule(Box::new(move |timestamp| {
        next.scheduled.set(None);
        if next.is_stopped() || !engine.borrow().is_running() {
            return;
        }
        // Reschedule first so a stop() issued during the frame cancels it
        schedule_next(Rc::clone(&engine), &next);
        engine.borrow_mut().frame(timestamp);
    }));
    handle.scheduled.set(Some(id));
}

fn run_tick<G: Game>(
    game: &mut G,
    input: &mut InputLog,
    session: &mut SessionController,
    host: &mut Host,
    dt: Duration,
    frame: FrameNumber,
    tick: u64,
) {
    let requests = {
        let mut ctx = TickContext {
            input,
            dt,
            frame,
            tick,
            state: session.state(),
            requests: Vec::new(),
        };
        game.update(&mut ctx);
        ctx.requests
    };

    for request in requests {
        match request {
            Request::State(state) => {
                apply_state(game, input, session, host, state);
            }
            Request::ShowOverlay(title, body) => host.overlay.show(&title, &body),
            Request::HideOverlay => host.overlay.hide(),
        }
    }

    let events = input.drain_events();
    if session.is_recording() {
        for event in events {
            if let Err(e) = host.recorder.record_event(event) {
                log::warn!("Recorder dropped event: {e}");
            }
        }
    }

    input.end_tick();
}

fn apply_state<G: Game>(
    game: &mut G,
    input: &mut InputLog,
    session: &mut SessionController,
    host: &mut Host,
    state: GameState,
) -> Transition {
    let transition = session.set_state(
        state,
        || game.score(),
        host.recorder.as_mut(),
        host.overlay.as_mut(),
    );

    // Input captured while waiting belongs to no session
    if transition == Transition::Started {
        let dropped = input.discard_events();
        if dropped > 0 {
            log::debug!("Discarded {dropped} events captured before session start");
        }
    }

    game.state_changed(state);
    transition
}

fn draw_frame<G: Game>(game: &mut G, host: &mut Host, alpha: f64, state: GameState) {
    host.renderer.begin();
    host.text.begin_frame();

    game.draw(&mut DrawContext {
        renderer: host.renderer.as_mut(),
        text: host.text.as_mut(),
        alpha,
        state,
    });

    // Primitives first, then text on top
    host.renderer.flush_batch();
    let (width, height) = host.renderer.size();
    host.text.flush(width, height);
    host.renderer.end();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RecorderError;
    use crate::platform::HeadlessDriver;
    use crate::recorder::testing::CountingRecorder;
    use crate::sim::{KeyState, RawEvent};

    /// Records key state every tick; Space starts, Escape ends
    #[derive(Default)]
    struct TestGame {
        samples: Vec<KeyState>,
        states: Vec<GameState>,
        inits: u32,
        draws: u32,
        last_alpha: f64,
    }

    impl Game for TestGame {
        fn init(&mut self) {
            self.inits += 1;
        }

        fn update(&mut self, ctx: &mut TickContext<'_>) {
            self.samples.push(ctx.input().keys().clone());
            if ctx.was_pressed(Key::SPACE) && ctx.state() != GameState::Playing {
                ctx.set_state(GameState::Playing);
            }
            if ctx.was_pressed(Key::ESCAPE) && ctx.state() == GameState::Playing {
                ctx.set_state(GameState::Over);
                ctx.show_overlay("GAME OVER", "Press Enter");
            }
        }

        fn draw(&mut self, ctx: &mut DrawContext<'_>) {
            self.draws += 1;
            self.last_alpha = ctx.alpha;
        }

        fn state_changed(&mut self, state: GameState) {
            self.states.push(state);
        }

        fn score(&self) -> f64 {
            self.samples.len() as f64
        }
    }

    /// Recorder shared with the test body
    #[derive(Clone, Default)]
    struct Shared(Rc<RefCell<CountingRecorder>>);

    impl Recorder for Shared {
        fn start_session(&mut self) -> Result<(), RecorderError> {
            self.0.borrow_mut().start_session()
        }

        fn end_session(&mut self, score: f64) -> Result<(), RecorderError> {
            self.0.borrow_mut().end_session(score)
        }

        fn record_event(&mut self, event: RawEvent) -> Result<(), RecorderError> {
            self.0.borrow_mut().record_event(event)
        }

        fn is_recording(&self) -> bool {
            self.0.borrow().is_recording()
        }
    }

    /// Renderer that logs its call order
    struct Bracket(Rc<RefCell<Vec<&'static str>>>);

    impl Renderer for Bracket {
        fn begin(&mut self) {
            self.0.borrow_mut().push("begin");
        }

        fn flush_batch(&mut self) {
            self.0.borrow_mut().push("flush");
        }

        fn end(&mut self) {
            self.0.borrow_mut().push("end");
        }

        fn size(&self) -> (u32, u32) {
            (480, 400)
        }
    }

    const STEP: Duration = Duration::from_micros(16_667);

    fn config() -> EngineConfig {
        EngineConfig::with_fixed_step(STEP)
    }

    fn engine() -> (Engine<TestGame>, Shared) {
        let recorder = Shared::default();
        let host = Host::headless().with_recorder(Box::new(recorder.clone()));
        let mut engine = Engine::new(config(), TestGame::default(), host);
        engine.start();
        (engine, recorder)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_start_draws_once_and_is_idempotent() {
        let (mut engine, _) = engine();
        engine.start();
        assert_eq!(engine.game().inits, 1);
        assert_eq!(engine.game().draws, 1);
        assert_eq!(engine.frame_number(), 0);
    }

    #[test]
    fn test_stalled_callback_runs_five_ticks() {
        let (mut engine, _) = engine();
        assert_eq!(engine.frame(ms(1000)), 0);
        assert_eq!(engine.frame(ms(1500)), 5);
        assert_eq!(engine.game().samples.len(), 5);
        assert!(engine.clock().accumulated() < STEP);
        assert_eq!(engine.frame_number(), 2);
    }

    #[test]
    fn test_frame_without_start_does_nothing() {
        let mut engine = Engine::new(config(), TestGame::default(), Host::headless());
        assert_eq!(engine.frame(ms(100)), 0);
        assert_eq!(engine.frame_number(), 0);
    }

    #[test]
    fn test_edges_visible_for_exactly_one_tick() {
        let (mut engine, _) = engine();
        engine.frame(ms(0));
        engine.input_mut().on_raw_key_down(Key::ARROW_LEFT, 37, ms(5));
        engine.input_mut().on_raw_key_down(Key::ARROW_LEFT, 37, ms(6));
        // Two ticks owed: the press edge shows only in the first
        engine.frame(ms(34));

        let samples = &engine.game().samples;
        assert_eq!(samples.len(), 2);
        assert!(samples[0].pressed.contains(Key::ARROW_LEFT));
        assert!(!samples[1].pressed.contains(Key::ARROW_LEFT));
        assert!(samples[1].down.contains(Key::ARROW_LEFT));
    }

    #[test]
    fn test_input_between_renders_waits_for_next_tick() {
        let (mut engine, _) = engine();
        engine.frame(ms(0));
        engine.input_mut().on_raw_key_down(Key::SPACE, 32, ms(2));
        // No tick owed yet: edge survives until one runs
        assert_eq!(engine.frame(ms(8)), 0);
        assert!(engine.input().was_pressed(Key::SPACE));
        assert_eq!(engine.frame(ms(17)), 1);
        assert!(engine.game().samples[0].pressed.contains(Key::SPACE));
        assert!(!engine.input().was_pressed(Key::SPACE));
    }

    #[test]
    fn test_events_tagged_with_last_rendered_frame() {
        let (mut engine, recorder) = engine();
        engine.set_state(GameState::Playing);
        engine.frame(ms(0));
        engine.frame(ms(17));
        assert_eq!(engine.frame_number(), 2);

        engine.input_mut().on_raw_key_down(Key::TAB, 9, ms(20));
        assert_eq!(engine.input().pending_events()[0].frame_number, 2);
        engine.frame(ms(34));

        let rec = recorder.0.borrow();
        assert_eq!(rec.events.len(), 1);
        assert_eq!(rec.events[0].frame_number, 2);
    }

    #[test]
    fn test_waiting_input_never_recorded() {
        let (mut engine, recorder) = engine();
        engine.frame(ms(0));
        engine.input_mut().on_raw_key_down(Key::ARROW_UP, 38, ms(1));
        engine.frame(ms(17));
        // Space starts the session inside the tick; it was captured while waiting
        engine.input_mut().on_raw_key_down(Key::SPACE, 32, ms(20));
        engine.frame(ms(34));
        assert_eq!(engine.state(), GameState::Playing);
        assert_eq!(recorder.0.borrow().starts, 1);
        assert!(recorder.0.borrow().events.is_empty());

        engine.input_mut().on_raw_key_up(Key::SPACE, 32, ms(40));
        engine.frame(ms(51));
        let rec = recorder.0.borrow();
        assert_eq!(rec.events.len(), 1);
        assert_eq!(rec.events[0].timestamp, ms(40));
    }

    #[test]
    fn test_tick_requests_drive_session_and_overlay() {
        let (mut engine, recorder) = engine();
        engine.frame(ms(0));
        engine.input_mut().on_raw_key_down(Key::SPACE, 32, ms(1));
        engine.frame(ms(17));
        engine.input_mut().on_raw_key_down(Key::ESCAPE, 27, ms(20));
        engine.frame(ms(34));

        assert_eq!(engine.state(), GameState::Over);
        assert_eq!(engine.game().states, vec![GameState::Playing, GameState::Over]);
        assert_eq!(recorder.0.borrow().ended_scores, vec![2.0]);
    }

    #[test]
    fn test_hidden_page_ends_session_once() {
        let (mut engine, recorder) = engine();
        engine.set_state(GameState::Playing);
        assert_eq!(engine.on_visibility_change(true), Transition::Ended);
        assert_eq!(engine.on_visibility_change(true), Transition::Unchanged);
        engine.set_state(GameState::Over);
        assert_eq!(recorder.0.borrow().ended_scores.len(), 1);

        // Nothing is forwarded once the session is closed
        engine.input_mut().on_raw_key_down(Key::ENTER, 13, ms(1));
        engine.frame(ms(0));
        engine.frame(ms(17));
        assert!(recorder.0.borrow().events.is_empty());
    }

    #[test]
    fn test_render_bracket_order() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let host = Host::headless().with_renderer(Box::new(Bracket(Rc::clone(&calls))));
        let mut engine = Engine::new(config(), TestGame::default(), host);
        engine.start();
        engine.frame(ms(0));
        assert_eq!(
            *calls.borrow(),
            vec!["begin", "flush", "end", "begin", "flush", "end"]
        );
    }

    #[test]
    fn test_alpha_reaches_draw() {
        let (mut engine, _) = engine();
        engine.frame(ms(0));
        engine.frame(ms(25));
        let expected = (ms(25) - STEP).as_secs_f64() / STEP.as_secs_f64();
        assert!((engine.game().last_alpha - expected).abs() < 1e-9);
        assert!((engine.alpha() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_run_with_headless_driver() {
        let engine = Rc::new(RefCell::new(Engine::new(
            config(),
            TestGame::default(),
            Host::headless(),
        )));
        let driver = Rc::new(HeadlessDriver::new());
        let handle = Engine::run(&engine, Rc::clone(&driver));

        // Measured from the driver's time at start, then clamped
        driver.fire(ms(1000));
        assert_eq!(engine.borrow().game().samples.len(), 5);
        for _ in 0..10 {
            driver.advance(STEP);
        }
        assert_eq!(engine.borrow().frame_number(), 11);
        assert_eq!(engine.borrow().game().samples.len(), 15);

        handle.stop();
        assert!(!driver.is_scheduled());
        assert!(!driver.advance(STEP));
        assert_eq!(engine.borrow().frame_number(), 11);
    }

    #[test]
    fn test_engine_stop_ends_loop() {
        let engine = Rc::new(RefCell::new(Engine::new(
            config(),
            TestGame::default(),
            Host::headless(),
        )));
        let driver = Rc::new(HeadlessDriver::new());
        let _handle = Engine::run(&engine, Rc::clone(&driver));
        driver.fire(ms(0));
        engine.borrow_mut().stop();
        assert!(driver.advance(STEP));
        assert!(!driver.is_scheduled());
        assert_eq!(engine.borrow().frame_number(), 1);
    }

    #[test]
    fn test_start_at_seeds_clock() {
        let mut engine = Engine::new(config(), TestGame::default(), Host::headless());
        engine.start_at(ms(100));
        assert_eq!(engine.game().inits, 1);
        assert_eq!(engine.frame(ms(117)), 1);

        // A second start is ignored and keeps the seed
        engine.start_at(ms(5000));
        assert_eq!(engine.game().inits, 1);
        assert_eq!(engine.frame(ms(134)), 1);
    }

    #[test]
    fn test_unseeded_start_skips_first_delta() {
        let (mut engine, _) = engine();
        assert_eq!(engine.frame(ms(100)), 0);
        assert_eq!(engine.frame(ms(117)), 1);
    }
}
