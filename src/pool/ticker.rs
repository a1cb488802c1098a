//! Frequency-driven tick timer with drift compensation.

use std::time::{Duration, Instant};

/// Schedules generations at a target frequency.
///
/// The delay before the next tick is the tick period minus the time already
/// spent since the previous tick fired, so slow ticks do not push the whole
/// schedule back.
#[derive(Debug, Clone)]
pub struct Ticker {
    frequency: f64,
    last_fire: Option<Instant>,
    deadline: Option<Instant>,
}

impl Ticker {
    /// `frequency` is in ticks per second and must be positive.
    pub fn new(frequency: f64) -> Self {
        Self {
            frequency,
            last_fire: None,
            deadline: None,
        }
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        self.frequency = frequency;
    }

    /// Target time between ticks.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.frequency).unwrap_or(Duration::ZERO)
    }

    /// `max(0, period - elapsed)`.
    pub fn delay(&self, elapsed: Duration) -> Duration {
        self.period().saturating_sub(elapsed)
    }

    /// Schedule the next tick relative to the last one.
    pub fn arm(&mut self, now: Instant) {
        let elapsed = self
            .last_fire
            .map_or(Duration::MAX, |last| now.saturating_duration_since(last));
        self.deadline = Some(now + self.delay(elapsed));
    }

    /// Cancel a scheduled tick.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consume the deadline if it has passed. Returns true when a tick fires.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                self.last_fire = Some(now);
                true
            }
            _ => false,
        }
    }
}
