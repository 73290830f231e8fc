//! WebGL2 canvas surface
//!
//! Owns the context and clears it each frame; games issue their own draw
//! calls through [`WebGlRenderer::gl`].

use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, WebGl2RenderingContext as Gl};

use super::Renderer;
use crate::error::{EngineError, Result};

/// Background color (#1a1a2e)
const CLEAR_COLOR: [f32; 4] = [26.0 / 255.0, 26.0 / 255.0, 46.0 / 255.0, 1.0];

pub struct WebGlRenderer {
    gl: Gl,
    size: (u32, u32),
}

impl WebGlRenderer {
    /// Fails with a recoverable error when WebGL2 is missing
    pub fn new(canvas: &HtmlCanvasElement) -> Result<Self> {
        let context = canvas
            .get_context("webgl2")
            .map_err(|e| EngineError::ContextUnavailable(format!("{e:?}")))?
            .ok_or_else(|| EngineError::BackendUnsupported("WebGL 2".into()))?;
        let gl = context
            .dyn_into::<Gl>()
            .map_err(|_| EngineError::BackendUnsupported("WebGL 2".into()))?;

        Ok(Self {
            gl,
            size: (canvas.width(), canvas.height()),
        })
    }

    pub fn gl(&self) -> &Gl {
        &self.gl
    }
}

impl Renderer for WebGlRenderer {
    fn begin(&mut self) {
        let [r, g, b, a] = CLEAR_COLOR;
        self.gl.viewport(0, 0, self.size.0 as i32, self.size.1 as i32);
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(Gl::COLOR_BUFFER_BIT);
    }

    fn flush_batch(&mut self) {}

    fn end(&mut self) {
        self.gl.flush();
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }
}
