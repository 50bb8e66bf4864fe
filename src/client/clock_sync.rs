//! Host Clock Estimation
//!
//! Snapshot timestamps are host wall-clock readings, so the render time must
//! be computed on the host's clock. Each ping carries the host time at send;
//! combined with the round-trip time the host reports for us, that yields an
//! offset sample. Samples are smoothed with an exponential moving average.

use tracing::debug;

/// Weight of a new sample in the moving average.
const SMOOTHING: f64 = 0.1;

/// A sample this far from the estimate replaces it outright (ms).
const RESYNC_THRESHOLD_MS: f64 = 1_000.0;

/// Estimates `host_clock - local_clock`.
#[derive(Debug, Clone, Default)]
pub struct ClockSync {
    offset_ms: Option<f64>,
    samples: u64,
}

impl ClockSync {
    /// Create an estimator with no samples.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one ping: `host_time` was read on the host when the ping left,
    /// `local_now` is the local clock at arrival, `rtt_ms` the last measured
    /// round trip (0 when unknown).
    pub fn observe(&mut self, host_time: f64, local_now: f64, rtt_ms: f64) {
        if !host_time.is_finite() || !local_now.is_finite() {
            return;
        }
        let one_way = if rtt_ms.is_finite() { rtt_ms.max(0.0) * 0.5 } else { 0.0 };
        let sample = host_time + one_way - local_now;
        self.samples += 1;

        self.offset_ms = Some(match self.offset_ms {
            Some(current) if (sample - current).abs() <= RESYNC_THRESHOLD_MS => {
                current + (sample - current) * SMOOTHING
            }
            Some(current) => {
                debug!(current, sample, "host clock jumped, resyncing");
                sample
            }
            None => sample,
        });
    }

    /// Current offset estimate, once at least one sample arrived.
    pub fn offset_ms(&self) -> Option<f64> {
        self.offset_ms
    }

    /// Local clock converted to the host clock. Falls back to the local clock.
    pub fn host_now(&self, local_now: f64) -> f64 {
        local_now + self.offset_ms.unwrap_or(0.0)
    }

    /// Samples observed.
    pub fn samples(&self) -> u64 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_sample_sets_offset() {
        let mut sync = ClockSync::new();
        assert_eq!(sync.host_now(100.0), 100.0);

        sync.observe(5_000.0, 1_000.0, 40.0);
        assert_eq!(sync.offset_ms(), Some(4_020.0));
        assert_eq!(sync.host_now(1_100.0), 5_120.0);
    }

    #[test]
    fn test_smoothing() {
        let mut sync = ClockSync::new();
        sync.observe(1_000.0, 0.0, 0.0);
        sync.observe(1_100.0, 0.0, 0.0);
        assert!((sync.offset_ms().unwrap() - 1_010.0).abs() < 1e-9);
        assert_eq!(sync.samples(), 2);
    }

    #[test]
    fn test_large_jump_resyncs() {
        let mut sync = ClockSync::new();
        sync.observe(1_000.0, 0.0, 0.0);
        sync.observe(90_000.0, 0.0, 0.0);
        assert_eq!(sync.offset_ms(), Some(90_000.0));
    }

    #[test]
    fn test_ignores_garbage() {
        let mut sync = ClockSync::new();
        sync.observe(f64::NAN, 0.0, 0.0);
        assert_eq!(sync.offset_ms(), None);
    }
}
