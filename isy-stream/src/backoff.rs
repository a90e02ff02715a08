//! Capped exponential reconnect backoff

use std::time::Duration;

use crate::config::ConnectionConfig;

/// Delay generator for consecutive reconnect attempts.
///
/// Delays never decrease between resets and never exceed the cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    multiplier: f64,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, multiplier: f64) -> Self {
        let max = max.max(initial);
        Self {
            initial,
            max,
            multiplier: if multiplier.is_finite() { multiplier.max(1.0) } else { 1.0 },
            current: initial,
            attempts: 0,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(
            config.initial_backoff,
            config.max_backoff,
            config.backoff_multiplier,
        )
    }

    /// Delay before the next attempt
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.attempts = self.attempts.saturating_add(1);
        let grown = self.current.as_secs_f64() * self.multiplier;
        self.current = if grown >= self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(grown).max(self.current)
        };
        delay
    }

    /// Failed attempts since the last reset
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
        self.attempts = 0;
    }
}
