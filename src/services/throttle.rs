// src/services/throttle.rs

//! Jittered pause between page loads.

use std::time::Duration;

use rand::Rng;

/// Never pause for less than this.
const MIN_DELAY_SECS: f64 = 0.5;
/// Jitter is drawn uniformly from ±this.
const JITTER_SECS: f64 = 0.5;

/// Paces navigation at a human-looking cadence.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    base_secs: f64,
    enabled: bool,
}

impl Throttle {
    pub fn new(base_secs: f64) -> Self {
        Self {
            base_secs,
            enabled: true,
        }
    }

    /// A throttle that never sleeps.
    pub fn disabled() -> Self {
        Self {
            base_secs: 0.0,
            enabled: false,
        }
    }

    /// Sleep for `max(0.5, base + U(-0.5, 0.5))` seconds.
    pub async fn pause(&self) {
        if !self.enabled {
            return;
        }
        let jitter = rand::thread_rng().gen_range(-JITTER_SECS..=JITTER_SECS);
        tokio::time::sleep(jittered_delay(self.base_secs, jitter)).await;
    }
}

/// Delay for a given base and jitter, floored at 0.5s.
pub fn jittered_delay(base_secs: f64, jitter_secs: f64) -> Duration {
    Duration::from_secs_f64((base_secs + jitter_secs).max(MIN_DELAY_SECS))
}
