//! Engine configuration
//!
//! Persisted in LocalStorage alongside the games' own settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Tunable engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Timing ===
    /// Fixed simulation step in nanoseconds
    pub fixed_step_ns: u64,
    /// Most ticks a single render callback may owe (accumulator cap)
    pub max_catch_up_ticks: u32,

    // === Capture ===
    /// Capture every Nth rendered frame
    pub capture_every_n: u32,
    /// Minimum spacing between recorded mousemove events (ms)
    pub mouse_throttle_ms: u64,
    /// Recorder segment length in event time (ms)
    pub segment_duration_ms: u64,

    // === Host ===
    /// Canvas element id
    pub canvas_id: String,
    /// Game name reported in recorded segments
    pub game_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fixed_step_ns: FIXED_STEP.as_nanos() as u64,
            max_catch_up_ticks: MAX_CATCH_UP_TICKS,

            capture_every_n: CAPTURE_EVERY_N,
            mouse_throttle_ms: MOUSE_MOVE_THROTTLE.as_millis() as u64,
            segment_duration_ms: SEGMENT_DURATION.as_millis() as u64,

            canvas_id: DEFAULT_CANVAS_ID.to_string(),
            game_name: DEFAULT_GAME_NAME.to_string(),
        }
    }
}

impl EngineConfig {
    /// Config with a custom fixed step, everything else default
    pub fn with_fixed_step(fixed_step: Duration) -> Self {
        Self {
            fixed_step_ns: fixed_step.as_nanos() as u64,
            ..Self::default()
        }
    }

    /// Parse a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn fixed_step(&self) -> Duration {
        Duration::from_nanos(self.fixed_step_ns.max(1))
    }

    /// Accumulator cap: `max_catch_up_ticks` whole steps
    pub fn max_accumulated(&self) -> Duration {
        self.fixed_step() * self.max_catch_up_ticks.max(1)
    }

    pub fn mouse_throttle(&self) -> Duration {
        Duration::from_millis(self.mouse_throttle_ms)
    }

    pub fn segment_duration(&self) -> Duration {
        Duration::from_millis(self.segment_duration_ms)
    }

    /// Frames captured per second at the nominal 60 Hz render rate
    pub fn capture_fps(&self) -> f64 {
        60.0 / self.capture_every_n.max(1) as f64
    }

    /// LocalStorage key
    #[cfg(target_arch = "wasm32")]
    const STORAGE_KEY: &'static str = "arcade_engine_config";

    /// Load config from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Self {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(Some(json)) = storage.get_item(Self::STORAGE_KEY) {
                match Self::from_json(&json) {
                    Ok(config) => {
                        log::info!("Loaded engine config from LocalStorage");
                        return config;
                    }
                    Err(e) => log::warn!("{e}, using defaults"),
                }
            }
        }

        Self::default()
    }

    /// Save config to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten();

        if let Some(storage) = storage {
            if let Ok(json) = serde_json::to_string(self) {
                let _ = storage.set_item(Self::STORAGE_KEY, &json);
                log::info!("Engine config saved");
            }
        }
    }

    /// Native stubs
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Self {
        Self::default()
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) {
        // No-op for native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_consts() {
        let config = EngineConfig::default();
        assert_eq!(config.fixed_step(), FIXED_STEP);
        assert_eq!(config.max_accumulated(), FIXED_STEP * 5);
        assert_eq!(config.capture_fps(), 7.5);
        assert_eq!(config.canvas_id, "game");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{"fixed_step_ns": 10000000, "game_name": "snake"}"#)
            .unwrap();
        assert_eq!(config.fixed_step(), Duration::from_millis(10));
        assert_eq!(config.max_accumulated(), Duration::from_millis(50));
        assert_eq!(config.game_name, "snake");
        assert_eq!(config.capture_every_n, CAPTURE_EVERY_N);
    }

    #[test]
    fn test_bad_json_is_an_error() {
        assert!(EngineConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_zero_step_is_clamped() {
        let config = EngineConfig {
            fixed_step_ns: 0,
            max_catch_up_ticks: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.fixed_step(), Duration::from_nanos(1));
        assert_eq!(config.max_accumulated(), Duration::from_nanos(1));
    }
}
