//! Clocks and Fixed Timestep
//!
//! Wall-clock helper for wire timestamps, and the accumulator that turns a
//! variable-rate poll loop into fixed simulation steps.

use chrono::Utc;

/// Wall-clock time in milliseconds since the Unix epoch, as carried on the wire.
pub fn now_ms() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1000.0
}

/// Fixed-timestep accumulator.
///
/// Frame deltas are accumulated and consumed in steps of `dt`. A single frame
/// never runs more than `max_steps` steps; if the accumulator is still behind
/// afterwards the backlog is dropped instead of spiralling.
#[derive(Debug, Clone)]
pub struct FixedStep {
    dt: f64,
    max_steps: u32,
    max_frame: f64,
    accumulator: f64,
    total_steps: u64,
}

impl FixedStep {
    /// Create an accumulator for the given tick rate.
    pub fn new(tick_hz: u32, max_steps: u32, max_frame_secs: f64) -> Self {
        Self {
            dt: 1.0 / tick_hz.max(1) as f64,
            max_steps: max_steps.max(1),
            max_frame: max_frame_secs,
            accumulator: 0.0,
            total_steps: 0,
        }
    }

    /// Step length in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Feed a frame delta and return how many fixed steps to run now.
    pub fn advance(&mut self, frame_secs: f64) -> u32 {
        let frame = if frame_secs.is_finite() {
            frame_secs.clamp(0.0, self.max_frame)
        } else {
            0.0
        };
        self.accumulator += frame;

        let mut steps = 0;
        while self.accumulator >= self.dt && steps < self.max_steps {
            self.accumulator -= self.dt;
            steps += 1;
        }

        // Still behind after the cap: skip the backlog.
        if self.accumulator >= self.dt {
            self.accumulator = 0.0;
        }

        self.total_steps += steps as u64;
        steps
    }

    /// Fraction of a step left in the accumulator, for render blending.
    pub fn alpha(&self) -> f64 {
        (self.accumulator / self.dt).min(1.0)
    }

    /// Steps taken since creation or the last reset.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }

    /// Drop any accumulated time (used between rounds).
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.total_steps = 0;
    }
}

impl Default for FixedStep {
    fn default() -> Self {
        Self::new(crate::TICK_RATE, 5, 0.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_ms_is_plausible() {
        // After 2020-01-01
        assert!(now_ms() > 1_577_836_800_000.0);
    }

    #[test]
    fn test_fixed_step_accumulates() {
        let mut step = FixedStep::new(60, 5, 0.1);
        assert_eq!(step.advance(0.008), 0);
        assert_eq!(step.advance(0.009), 1);
        assert_eq!(step.total_steps(), 1);
        assert!(step.alpha() < 1.0);
    }

    #[test]
    fn test_fixed_step_caps_steps_and_drops_backlog() {
        let mut step = FixedStep::new(60, 3, 0.1);
        // 100ms frame is ~6 steps worth, capped at 3, remainder dropped
        assert_eq!(step.advance(0.1), 3);
        assert_eq!(step.alpha(), 0.0);
    }

    #[test]
    fn test_fixed_step_clamps_frame() {
        let mut step = FixedStep::new(10, 100, 0.25);
        // 2 seconds is clamped to 250ms => 2 steps of 100ms
        assert_eq!(step.advance(2.0), 2);
        assert_eq!(step.advance(f64::NAN), 0);
        assert_eq!(step.advance(-1.0), 0);
    }

    #[test]
    fn test_reset() {
        let mut step = FixedStep::new(60, 5, 0.1);
        step.advance(0.05);
        step.reset();
        assert_eq!(step.total_steps(), 0);
        assert_eq!(step.alpha(), 0.0);
    }
}
