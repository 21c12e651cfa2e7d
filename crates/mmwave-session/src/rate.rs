use tokio::time::Instant;

/// Frequency assumed before the first frame is delivered.
pub const INITIAL_FREQUENCY_HZ: f64 = 10.0;

/// Exponentially smoothed delivery rate.
///
/// Each observation blends the instantaneous rate with the previous
/// estimate: `freq = 0.5 / dt + 0.5 * freq`.
#[derive(Debug, Clone, Copy)]
pub struct RateEstimator {
    freq: f64,
    last: Instant,
}

impl RateEstimator {
    pub fn new(now: Instant) -> Self {
        Self {
            freq: INITIAL_FREQUENCY_HZ,
            last: now,
        }
    }

    /// Restart the interval clock without touching the estimate.
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }

    /// Record a delivery at `now` and return the updated estimate.
    pub fn observe(&mut self, now: Instant) -> f64 {
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        if dt > 0.0 {
            self.freq = 0.5 / dt + 0.5 * self.freq;
        }
        self.last = now;
        self.freq
    }

    pub fn frequency(&self) -> f64 {
        self.freq
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}
