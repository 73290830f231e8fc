//! Session recording
//!
//! The engine talks to a [`Recorder`]; [`SessionRecorder`] is the stock
//! implementation. It buffers raw events, cuts them into fixed-length
//! segments and hands each one to a [`SegmentSink`].

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use uuid::Builder;

use crate::config::EngineConfig;
use crate::error::RecorderError;
use crate::sim::RawEvent;

/// Segment format version reported to the ingest side
pub const ENGINE_VERSION: u32 = 2;

/// Receives session lifecycle and input events from the engine
pub trait Recorder {
    fn start_session(&mut self) -> Result<(), RecorderError>;
    /// `score` is the game's score at the moment the session closes
    fn end_session(&mut self, score: f64) -> Result<(), RecorderError>;
    fn record_event(&mut self, event: RawEvent) -> Result<(), RecorderError>;
    fn is_recording(&self) -> bool;
}

/// Recorder that drops everything
#[derive(Debug, Default)]
pub struct NullRecorder;

impl Recorder for NullRecorder {
    fn start_session(&mut self) -> Result<(), RecorderError> {
        Ok(())
    }

    fn end_session(&mut self, _score: f64) -> Result<(), RecorderError> {
        Ok(())
    }

    fn record_event(&mut self, _event: RawEvent) -> Result<(), RecorderError> {
        Ok(())
    }

    fn is_recording(&self) -> bool {
        false
    }
}

/// Describes one uploaded chunk of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub game: String,
    pub session_id: String,
    pub collector_id: String,
    pub segment_num: u32,
    pub is_final: bool,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Event time covered since the session's first event
    pub duration_ms: f64,
    /// Known only for the final segment
    pub score: Option<f64>,
    pub engine_version: u32,
    pub capture_fps: f64,
}

/// Metadata plus the events it covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub metadata: SegmentMetadata,
    pub events: Vec<RawEvent>,
}

impl Segment {
    pub fn to_json(&self) -> Result<String, RecorderError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Destination for finished segments
pub trait SegmentSink {
    /// On error the recorder keeps the events and retries later
    fn write(&mut self, segment: &Segment) -> Result<(), RecorderError>;
}

/// Keeps segments in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub segments: Vec<Segment>,
}

impl SegmentSink for MemorySink {
    fn write(&mut self, segment: &Segment) -> Result<(), RecorderError> {
        self.segments.push(segment.clone());
        Ok(())
    }
}

/// Stores each segment as JSON in LocalStorage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct LocalStorageSink;

#[cfg(target_arch = "wasm32")]
impl SegmentSink for LocalStorageSink {
    fn write(&mut self, segment: &Segment) -> Result<(), RecorderError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| RecorderError::Sink("LocalStorage unavailable".into()))?;

        let key = format!(
            "arcade_segment_{}_{}",
            segment.metadata.session_id, segment.metadata.segment_num
        );
        storage
            .set_item(&key, &segment.to_json()?)
            .map_err(|e| RecorderError::Sink(format!("{e:?}")))?;
        log::info!("Segment {} stored ({} events)", key, segment.events.len());
        Ok(())
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: String,
    segment_num: u32,
    events: Vec<RawEvent>,
    first_event_at: Option<Duration>,
    segment_started_at: Option<Duration>,
    last_event_at: Duration,
}

impl ActiveSession {
    fn duration(&self) -> Duration {
        self.first_event_at
            .map(|first| self.last_event_at.saturating_sub(first))
            .unwrap_or_default()
    }
}

/// Buffers a session's events and emits them in segments
#[derive(Debug)]
pub struct SessionRecorder<S: SegmentSink> {
    sink: S,
    rng: Pcg32,
    game_name: String,
    collector_id: String,
    canvas_size: (u32, u32),
    capture_fps: f64,
    segment_duration: Duration,
    session: Option<ActiveSession>,
}

impl<S: SegmentSink> SessionRecorder<S> {
    /// `seed` drives collector and session ids
    pub fn new(sink: S, config: &EngineConfig, canvas_size: (u32, u32), seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let collector_id = Builder::from_random_bytes(rng.random()).into_uuid();
        let collector_id = format!("browser-{collector_id}");
        Self {
            sink,
            rng,
            game_name: config.game_name.clone(),
            collector_id,
            canvas_size,
            capture_fps: config.capture_fps(),
            segment_duration: config.segment_duration(),
            session: None,
        }
    }

    /// Reuse a persisted collector id
    pub fn with_collector_id(mut self, collector_id: impl Into<String>) -> Self {
        self.collector_id = collector_id.into();
        self
    }

    pub fn collector_id(&self) -> &str {
        &self.collector_id
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Hand the buffered events to the sink. Empty segments are skipped.
    /// A failed write leaves the buffer and segment number untouched.
    fn flush_segment(&mut self, is_final: bool, score: Option<f64>) -> Result<(), RecorderError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };
        if session.events.is_empty() {
            return Ok(());
        }

        let segment = Segment {
            metadata: SegmentMetadata {
                game: self.game_name.clone(),
                session_id: session.id.clone(),
                collector_id: self.collector_id.clone(),
                segment_num: session.segment_num,
                is_final,
                canvas_width: self.canvas_size.0,
                canvas_height: self.canvas_size.1,
                duration_ms: session.duration().as_nanos() as f64 / 1_000_000.0,
                score,
                engine_version: ENGINE_VERSION,
                capture_fps: self.capture_fps,
            },
            events: std::mem::take(&mut session.events),
        };

        log::debug!(
            "Flushing segment {} of session {} ({} events, final: {})",
            segment.metadata.segment_num,
            segment.metadata.session_id,
            segment.events.len(),
            is_final
        );
        match self.sink.write(&segment) {
            Ok(()) => {
                session.segment_num += 1;
                session.segment_started_at = None;
                Ok(())
            }
            Err(e) => {
                session.events = segment.events;
                Err(e)
            }
        }
    }
}

impl<S: SegmentSink> Recorder for SessionRecorder<S> {
    fn start_session(&mut self) -> Result<(), RecorderError> {
        if self.session.is_some() {
            return Ok(());
        }
        let id = Builder::from_random_bytes(self.rng.random())
            .into_uuid()
            .to_string();
        log::info!("Recording session {id}");
        self.session = Some(ActiveSession {
            id,
            segment_num: 0,
            events: Vec::new(),
            first_event_at: None,
            segment_started_at: None,
            last_event_at: Duration::ZERO,
        });
        Ok(())
    }

    fn end_session(&mut self, score: f64) -> Result<(), RecorderError> {
        if self.session.is_none() {
            return Ok(());
        }
        let result = self.flush_segment(true, Some(score));
        if let Some(session) = self.session.take() {
            log::info!(
                "Session {} closed after {} segments",
                session.id,
                session.segment_num
            );
        }
        result
    }

    fn record_event(&mut self, event: RawEvent) -> Result<(), RecorderError> {
        let segment_duration = self.segment_duration;
        let Some(session) = self.session.as_mut() else {
            return Ok(());
        };

        let rollover = session
            .segment_started_at
            .is_some_and(|start| event.timestamp.saturating_sub(start) >= segment_duration);
        // The event is kept even when the rollover write fails
        let flushed = if rollover {
            self.flush_segment(false, None)
        } else {
            Ok(())
        };

        if let Some(session) = self.session.as_mut() {
            session.first_event_at.get_or_insert(event.timestamp);
            session.segment_started_at.get_or_insert(event.timestamp);
            session.last_event_at = session.last_event_at.max(event.timestamp);
            session.events.push(event);
        }
        flushed
    }

    fn is_recording(&self) -> bool {
        self.session.is_some()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every call, optionally failing all of them
    #[derive(Debug, Default)]
    pub struct CountingRecorder {
        pub starts: u32,
        pub ended_scores: Vec<f64>,
        pub events: Vec<RawEvent>,
        pub recording: bool,
        pub fail: bool,
    }

    impl CountingRecorder {
        fn result(&self) -> Result<(), RecorderError> {
            if self.fail {
                Err(RecorderError::Sink("unavailable".into()))
            } else {
                Ok(())
            }
        }
    }

    impl Recorder for CountingRecorder {
        fn start_session(&mut self) -> Result<(), RecorderError> {
            self.starts += 1;
            self.recording = true;
            self.result()
        }

        fn end_session(&mut self, score: f64) -> Result<(), RecorderError> {
            self.ended_scores.push(score);
            self.recording = false;
            self.result()
        }

        fn record_event(&mut self, event: RawEvent) -> Result<(), RecorderError> {
            self.events.push(event);
            self.result()
        }

        fn is_recording(&self) -> bool {
            self.recording
        }
    }
}
