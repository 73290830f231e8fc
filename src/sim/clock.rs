//! Fixed timestep clock
//!
//! Converts irregular render-callback deltas into whole simulation ticks.
//! Durations are integer nanoseconds so the accumulator never drifts.

use std::time::Duration;

use crate::config::EngineConfig;

/// Real-time accumulator drained in whole `fixed_step` units
#[derive(Debug, Clone)]
pub struct Clock {
    fixed_step: Duration,
    /// Cap applied to every incoming delta (death spiral protection)
    max_accumulated: Duration,
    accumulated: Duration,
    last_timestamp: Option<Duration>,
    total_ticks: u64,
}

impl Clock {
    pub fn new(fixed_step: Duration, max_accumulated: Duration) -> Self {
        let fixed_step = fixed_step.max(Duration::from_nanos(1));
        Self {
            fixed_step,
            max_accumulated,
            accumulated: Duration::ZERO,
            last_timestamp: None,
            total_ticks: 0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.fixed_step(), config.max_accumulated())
    }

    /// Delta since the previous host timestamp.
    ///
    /// The first timestamp after a reset yields zero, as does a timestamp
    /// that runs backwards.
    pub fn delta_since(&mut self, timestamp: Duration) -> Duration {
        let delta = match self.last_timestamp {
            Some(last) => timestamp.saturating_sub(last),
            None => Duration::ZERO,
        };
        self.last_timestamp = Some(timestamp);
        delta
    }

    /// Clamp `raw_delta`, accumulate it and run every tick it pays for.
    ///
    /// `on_tick` runs synchronously, in temporal order. Returns the number
    /// of ticks run.
    pub fn advance<F: FnMut()>(&mut self, raw_delta: Duration, mut on_tick: F) -> u32 {
        let delta = raw_delta.min(self.max_accumulated);
        if delta < raw_delta {
            log::debug!(
                "Clamped frame delta {:?} -> {:?}",
                raw_delta,
                self.max_accumulated
            );
        }
        self.accumulated += delta;

        let mut ticks = 0;
        while self.accumulated >= self.fixed_step {
            on_tick();
            self.accumulated -= self.fixed_step;
            self.total_ticks += 1;
            ticks += 1;
        }
        ticks
    }

    /// Render interpolation fraction in `[0, 1)`
    pub fn alpha(&self) -> f64 {
        self.accumulated.as_secs_f64() / self.fixed_step.as_secs_f64()
    }

    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn fixed_step(&self) -> Duration {
        self.fixed_step
    }

    pub fn max_accumulated(&self) -> Duration {
        self.max_accumulated
    }

    /// Ticks run since construction
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Forget the last timestamp and any unconsumed time
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.last_timestamp = None;
    }

    /// Reset with `timestamp` as the last seen host time, so the next
    /// callback is measured from it
    pub fn reset_at(&mut self, timestamp: Duration) {
        self.accumulated = Duration::ZERO;
        self.last_timestamp = Some(timestamp);
    }
}
