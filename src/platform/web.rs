//! Browser platform: `requestAnimationFrame` driver, DOM overlay and
//! document input listeners.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use glam::Vec2;
use wasm_bindgen::JsCast;
use wasm_bindgen::convert::FromWasmAbi;
use wasm_bindgen::prelude::*;
use web_sys::{
    AddEventListenerOptions, Document, HtmlCanvasElement, HtmlElement, KeyboardEvent, MouseEvent,
    VisibilityState, WheelEvent,
};

use super::{FrameDriver, NullOverlay, Overlay, detect_game_name, duration_from_millis};
use crate::config::EngineConfig;
use crate::consts::DEFAULT_GAME_NAME;
use crate::engine::{Engine, Game, Host};
use crate::error::EngineError;
use crate::recorder::{LocalStorageSink, SegmentSink, SessionRecorder};
use crate::renderer::{CaptureLog, NullText, Renderer, WebGlRenderer};
use crate::sim::{ButtonAction, CanvasRect, Key};

/// LocalStorage key of the per-browser collector id
const COLLECTOR_ID_KEY: &str = "arcade_collector_id";

/// `performance.now()` as a duration
pub fn now() -> Duration {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| duration_from_millis(p.now()))
        .unwrap_or_default()
}

/// Schedules callbacks with `window.requestAnimationFrame`
#[derive(Debug, Default)]
pub struct RafDriver;

impl FrameDriver for RafDriver {
    type Handle = i32;

    fn schedule(&self, callback: Box<dyn FnOnce(Duration)>) -> i32 {
        let Some(window) = web_sys::window() else {
            log::error!("No window to schedule a frame on");
            return 0;
        };
        let closure = Closure::once_into_js(move |timestamp: f64| {
            callback(duration_from_millis(timestamp));
        });
        match window.request_animation_frame(closure.unchecked_ref()) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("requestAnimationFrame failed: {e:?}");
                0
            }
        }
    }

    fn cancel(&self, handle: i32) {
        if let Some(window) = web_sys::window() {
            let _ = window.cancel_animation_frame(handle);
        }
    }

    fn now(&self) -> Option<Duration> {
        Some(now())
    }
}

/// The `#overlay` / `#overlayTitle` / `#overlayText` elements
pub struct DomOverlay {
    overlay: HtmlElement,
    title: Option<web_sys::Element>,
    text: Option<web_sys::Element>,
}

impl DomOverlay {
    pub fn from_document(document: &Document) -> Option<Self> {
        let overlay = document
            .get_element_by_id("overlay")?
            .dyn_into::<HtmlElement>()
            .ok()?;
        Some(Self {
            overlay,
            title: document.get_element_by_id("overlayTitle"),
            text: document.get_element_by_id("overlayText"),
        })
    }
}

impl Overlay for DomOverlay {
    fn set_visible(&mut self, visible: bool) {
        let display = if visible { "flex" } else { "none" };
        let _ = self.overlay.style().set_property("display", display);
    }

    fn set_text(&mut self, title: &str, body: &str) {
        if let Some(el) = &self.title {
            el.set_text_content(Some(title));
        }
        if let Some(el) = &self.text {
            el.set_text_content(Some(body));
        }
    }
}

fn document() -> Result<Document, EngineError> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| EngineError::ContextUnavailable("no document".into()))
}

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()
        .and_then(|w| w.local_storage().ok())
        .flatten()
}

/// Reuse the stored collector id, or store the recorder's fresh one
fn persist_collector_id<S: SegmentSink>(recorder: SessionRecorder<S>) -> SessionRecorder<S> {
    let Some(storage) = local_storage() else {
        return recorder;
    };
    match storage.get_item(COLLECTOR_ID_KEY) {
        Ok(Some(id)) if !id.is_empty() => recorder.with_collector_id(id),
        _ => {
            if storage.set_item(COLLECTOR_ID_KEY, recorder.collector_id()).is_err() {
                log::warn!("Collector id not persisted");
            }
            recorder
        }
    }
}

/// Build the browser host around the configured canvas
pub fn attach(
    config: &EngineConfig,
    seed: u64,
) -> Result<(Host, HtmlCanvasElement), EngineError> {
    let document = document()?;
    let canvas: HtmlCanvasElement = document
        .get_element_by_id(&config.canvas_id)
        .and_then(|el| el.dyn_into().ok())
        .ok_or_else(|| EngineError::CanvasNotFound(config.canvas_id.clone()))?;

    let renderer = WebGlRenderer::new(&canvas)?;
    let size = renderer.size();
    log::info!("Canvas #{} attached ({}x{})", config.canvas_id, size.0, size.1);

    let mut config = config.clone();
    if config.game_name == DEFAULT_GAME_NAME {
        let path = web_sys::window().and_then(|w| w.location().pathname().ok());
        if let Some(name) = path.as_deref().and_then(detect_game_name) {
            config.game_name = name.to_string();
        }
    }

    let recorder = SessionRecorder::new(LocalStorageSink, &config, size, seed);
    let recorder = persist_collector_id(recorder);
    log::info!("Recording {} as {}", config.game_name, recorder.collector_id());

    let overlay: Box<dyn Overlay> = match DomOverlay::from_document(&document) {
        Some(overlay) => Box::new(overlay),
        None => {
            log::warn!("No #overlay element, overlay disabled");
            Box::new(NullOverlay::default())
        }
    };

    let host = Host {
        renderer: Box::new(renderer),
        text: Box::new(NullText),
        capture: Box::new(CaptureLog::default()),
        recorder: Box::new(recorder),
        overlay,
    };
    Ok((host, canvas))
}

fn canvas_xy(canvas: &HtmlCanvasElement, event: &MouseEvent) -> Option<Vec2> {
    let rect = canvas.get_bounding_client_rect();
    CanvasRect::new(
        rect.left() as f32,
        rect.top() as f32,
        rect.width() as f32,
        rect.height() as f32,
    )
    .to_canvas(Vec2::new(event.client_x() as f32, event.client_y() as f32))
}

/// Run `f` against the engine unless it is mid-frame
fn with_engine<G: Game>(engine: &Rc<RefCell<Engine<G>>>, f: impl FnOnce(&mut Engine<G>)) {
    match engine.try_borrow_mut() {
        Ok(mut engine) => f(&mut engine),
        Err(_) => log::warn!("Input dropped: engine busy"),
    }
}

fn listen<E, F>(
    document: &Document,
    kind: &str,
    handler: F,
    passive: bool,
) -> Result<(), EngineError>
where
    E: FromWasmAbi + 'static,
    F: FnMut(E) + 'static,
{
    let closure = Closure::<dyn FnMut(E)>::new(handler);
    let result = if passive {
        let options = AddEventListenerOptions::new();
        options.set_passive(true);
        document.add_event_listener_with_callback_and_add_event_listener_options(
            kind,
            closure.as_ref().unchecked_ref(),
            &options,
        )
    } else {
        document.add_event_listener_with_callback(kind, closure.as_ref().unchecked_ref())
    };
    result.map_err(|e| EngineError::ContextUnavailable(format!("{kind} listener: {e:?}")))?;
    closure.forget();
    Ok(())
}

/// Wire document keyboard, mouse and visibility events into the engine
pub fn bind_input<G: Game + 'static>(
    engine: &Rc<RefCell<Engine<G>>>,
    canvas: &HtmlCanvasElement,
) -> Result<(), EngineError> {
    let document = document()?;

    {
        let engine = Rc::clone(engine);
        listen(
            &document,
            "keydown",
            move |event: KeyboardEvent| {
                let key = Key::intern(&event.key());
                // Keep arrows and space from scrolling the page
                if key.is_game_key() {
                    event.prevent_default();
                }
                with_engine(&engine, |e| {
                    e.input_mut().on_raw_key_down(key, event.key_code(), now())
                });
            },
            false,
        )?;
    }

    {
        let engine = Rc::clone(engine);
        listen(
            &document,
            "keyup",
            move |event: KeyboardEvent| {
                let key = Key::intern(&event.key());
                with_engine(&engine, |e| {
                    e.input_mut().on_raw_key_up(key, event.key_code(), now())
                });
            },
            false,
        )?;
    }

    {
        let engine = Rc::clone(engine);
        let canvas = canvas.clone();
        listen(
            &document,
            "mousemove",
            move |event: MouseEvent| {
                let pos = canvas_xy(&canvas, &event);
                with_engine(&engine, |e| {
                    e.input_mut().on_raw_mouse_move(pos, now());
                });
            },
            false,
        )?;
    }

    for (kind, action) in [
        ("mousedown", ButtonAction::Down),
        ("mouseup", ButtonAction::Up),
        ("click", ButtonAction::Click),
    ] {
        let engine = Rc::clone(engine);
        let canvas = canvas.clone();
        listen(
            &document,
            kind,
            move |event: MouseEvent| {
                if let Some(pos) = canvas_xy(&canvas, &event) {
                    let button = event.button().clamp(0, u8::MAX as i16) as u8;
                    with_engine(&engine, |e| {
                        e.input_mut().on_raw_mouse_button(action, button, pos, now())
                    });
                }
            },
            false,
        )?;
    }

    {
        let engine = Rc::clone(engine);
        let canvas = canvas.clone();
        listen(
            &document,
            "wheel",
            move |event: WheelEvent| {
                if let Some(pos) = canvas_xy(&canvas, &event) {
                    let delta = Vec2::new(event.delta_x() as f32, event.delta_y() as f32);
                    with_engine(&engine, |e| e.input_mut().on_raw_wheel(delta, pos, now()));
                }
            },
            true,
        )?;
    }

    {
        let engine = Rc::clone(engine);
        let doc = document.clone();
        listen(
            &document,
            "visibilitychange",
            move |_event: web_sys::Event| {
                let hidden = doc.visibility_state() == VisibilityState::Hidden;
                with_engine(&engine, |e| {
                    e.on_visibility_change(hidden);
                });
            },
            false,
        )?;
    }

    log::info!("Input bound");
    Ok(())
}
