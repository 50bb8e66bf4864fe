//! Liveness Watchdog
//!
//! Tracks the last time a peer was heard from. Only an armed watchdog can
//! expire; both roles arm theirs only while a round is active.

/// Default silence allowed before a peer is considered gone (ms).
pub const DEFAULT_TIMEOUT_MS: f64 = 10_000.0;

/// Silence-based liveness check.
#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout_ms: f64,
    last_seen: f64,
    armed: bool,
}

impl Watchdog {
    /// Create a disarmed watchdog.
    pub fn new(timeout_ms: f64, now: f64) -> Self {
        Self {
            timeout_ms,
            last_seen: now,
            armed: false,
        }
    }

    /// Start enforcing the timeout, counting from `now`.
    pub fn arm(&mut self, now: f64) {
        self.armed = true;
        self.last_seen = now;
    }

    /// Stop enforcing the timeout.
    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Whether the timeout is enforced.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Record activity from the peer.
    #[inline]
    pub fn feed(&mut self, now: f64) {
        self.last_seen = self.last_seen.max(now);
    }

    /// Milliseconds since the peer was last heard from.
    pub fn silence_ms(&self, now: f64) -> f64 {
        (now - self.last_seen).max(0.0)
    }

    /// True once an armed watchdog has seen more than `timeout_ms` of silence.
    pub fn is_expired(&self, now: f64) -> bool {
        self.armed && self.silence_ms(now) > self.timeout_ms
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disarmed_never_expires() {
        let dog = Watchdog::new(1_000.0, 0.0);
        assert!(!dog.is_expired(1_000_000.0));
    }

    #[test]
    fn test_expires_after_silence() {
        let mut dog = Watchdog::new(10_000.0, 0.0);
        dog.arm(100.0);
        assert!(!dog.is_expired(10_100.0));
        assert!(dog.is_expired(10_100.5));
    }

    #[test]
    fn test_feed_resets() {
        let mut dog = Watchdog::new(10_000.0, 0.0);
        dog.arm(0.0);
        dog.feed(9_000.0);
        assert!(!dog.is_expired(15_000.0));
        assert_eq!(dog.silence_ms(15_000.0), 6_000.0);

        // Older timestamps never move it backwards
        dog.feed(1.0);
        assert_eq!(dog.silence_ms(15_000.0), 6_000.0);
    }

    #[test]
    fn test_disarm() {
        let mut dog = Watchdog::default();
        dog.arm(0.0);
        dog.disarm();
        assert!(!dog.is_expired(DEFAULT_TIMEOUT_MS * 2.0));
    }
}
