//! Arcade Engine entry point
//!
//! In the browser this attaches the key tally demo to the page canvas.
//! Natively it runs a scripted headless session and replays it.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::rc::Rc;

    use arcade_engine::demo::KeyTally;
    use arcade_engine::platform::web::{self, RafDriver};
    use arcade_engine::{Engine, EngineConfig, EngineError};

    pub fn run() -> Result<(), EngineError> {
        let config = EngineConfig::load();
        let seed = js_sys::Date::now() as u64;

        let (host, canvas) = web::attach(&config, seed)?;
        let engine = Rc::new(RefCell::new(Engine::new(config, KeyTally::new(), host)));
        web::bind_input(&engine, &canvas)?;

        engine
            .borrow_mut()
            .show_overlay("KEY TALLY", "Press Space to start");

        // The loop lives as long as the page
        let _handle = Engine::run(&engine, Rc::new(RafDriver));

        log::info!("Arcade Engine running with seed: {}", seed);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialised".into());
    }

    log::info!("Arcade Engine starting...");
    if let Err(e) = wasm_game::run() {
        if e.is_recoverable() {
            log::warn!("Engine unavailable: {e}");
        } else {
            log::error!("Engine failed to start: {e}");
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Arcade Engine (native) starting...");
    log::info!("Native mode runs headless - serve the wasm build for the browser version");

    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::time::Duration;

    use arcade_engine::demo::KeyTally;
    use arcade_engine::sim::Key;
    use arcade_engine::{Engine, EngineConfig, Host, replay};

    /// Host callback times (ms) and the keys tapped just before each
    const SCRIPT: &[(u64, &[Key])] = &[
        (0, &[]),
        (16, &[Key::SPACE]),
        (33, &[]),
        (50, &[Key::ARROW_LEFT]),
        (66, &[Key::ARROW_RIGHT, Key::ARROW_UP]),
        (400, &[]),
        (416, &[Key::ARROW_DOWN]),
        (433, &[Key::ESCAPE]),
        (450, &[]),
    ];

    pub fn run() {
        let config = EngineConfig::default();
        let mut engine = Engine::new(config, KeyTally::new(), Host::headless());
        engine.start();
        engine.record_trace();

        let mut last = Duration::ZERO;
        for &(at, keys) in SCRIPT {
            let at = Duration::from_millis(at);
            for &key in keys {
                engine.input_mut().on_raw_key_down(key, 0, last);
                engine.input_mut().on_raw_key_up(key, 0, last);
            }
            let ticks = engine.frame(at);
            log::debug!("Frame {} at {:?}: {} ticks", engine.frame_number(), at, ticks);
            last = at;
        }

        log::info!(
            "Live run: {:?}, score {}, {} ticks",
            engine.state(),
            engine.game().presses,
            engine.game().ticks
        );

        let Some(recording) = engine.take_recording() else {
            log::error!("No trace captured");
            return;
        };
        match recording.to_json() {
            Ok(json) => log::info!(
                "Recording: {} frames, {} bytes",
                recording.frames(),
                json.len()
            ),
            Err(e) => log::warn!("Recording not serializable: {e}"),
        }

        let replayed = replay(&recording, KeyTally::new());
        let replayed = replayed.borrow();
        let matches = replayed.game().presses == engine.game().presses
            && replayed.game().ticks == engine.game().ticks
            && replayed.state() == engine.state();
        if matches {
            log::info!("✓ Replay reproduced the live run");
        } else {
            log::error!(
                "Replay diverged: {:?} score {} vs {:?} score {}",
                replayed.state(),
                replayed.game().presses,
                engine.state(),
                engine.game().presses
            );
        }
    }
}
