//! Per-Link Health
//!
//! The host pings every link on a fixed interval. Each pong yields a
//! round-trip sample; the gap between pings sent and pongs received is the
//! link's loss count. The latest round trip is what gets written into the
//! `latency_ms` field of that participant's entity in every snapshot.

use tracing::trace;

use crate::network::protocol::ControlMessage;

/// Ping bookkeeping for one link.
#[derive(Debug, Clone)]
pub struct LinkStats {
    interval_ms: f64,
    last_ping_at: Option<f64>,
    pings_sent: u32,
    pongs_received: u32,
    rtt_ms: Option<f64>,
}

impl LinkStats {
    /// Create stats for a link pinged every `interval_ms`.
    pub fn new(interval_ms: f64) -> Self {
        Self {
            interval_ms,
            last_ping_at: None,
            pings_sent: 0,
            pongs_received: 0,
            rtt_ms: None,
        }
    }

    /// The next ping, if one is due at `now`.
    pub fn poll_ping(&mut self, now: f64) -> Option<ControlMessage> {
        if let Some(last) = self.last_ping_at {
            if now - last < self.interval_ms {
                return None;
            }
        }
        self.last_ping_at = Some(now);
        self.pings_sent += 1;
        Some(ControlMessage::Ping {
            seq: self.pings_sent,
            sent_at: now,
            host_time: now,
        })
    }

    /// Record a pong. Replies to pings never sent are ignored.
    pub fn on_pong(&mut self, seq: u32, sent_at: f64, now: f64) -> Option<f64> {
        if seq == 0 || seq > self.pings_sent || !sent_at.is_finite() || sent_at > now {
            trace!(seq, sent_at, "bogus pong ignored");
            return None;
        }
        let rtt = now - sent_at;
        self.pongs_received = (self.pongs_received + 1).min(self.pings_sent);
        self.rtt_ms = Some(rtt);
        Some(rtt)
    }

    /// Latest round trip (ms).
    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt_ms
    }

    /// Latest round trip as carried in snapshots, saturating at `u16::MAX`.
    pub fn latency_ms(&self) -> u16 {
        self.rtt_ms
            .map_or(0, |rtt| rtt.round().clamp(0.0, u16::MAX as f64) as u16)
    }

    /// Pings that never got a pong.
    pub fn lost(&self) -> u32 {
        self.pings_sent - self.pongs_received
    }

    /// Fraction of pings without a pong.
    pub fn loss_ratio(&self) -> f64 {
        if self.pings_sent == 0 {
            0.0
        } else {
            self.lost() as f64 / self.pings_sent as f64
        }
    }

    /// Pings sent.
    pub fn pings_sent(&self) -> u32 {
        self.pings_sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_interval() {
        let mut link = LinkStats::new(1_000.0);
        assert!(matches!(link.poll_ping(0.0), Some(ControlMessage::Ping { seq: 1, .. })));
        assert!(link.poll_ping(999.0).is_none());
        assert!(matches!(link.poll_ping(1_000.0), Some(ControlMessage::Ping { seq: 2, .. })));
        assert_eq!(link.pings_sent(), 2);
    }

    #[test]
    fn test_rtt_and_latency() {
        let mut link = LinkStats::new(1_000.0);
        link.poll_ping(100.0);
        assert_eq!(link.latency_ms(), 0);

        let rtt = link.on_pong(1, 100.0, 164.6).unwrap();
        assert!((rtt - 64.6).abs() < 1e-9);
        assert_eq!(link.latency_ms(), 65);
        assert_eq!(link.lost(), 0);
    }

    #[test]
    fn test_loss_counting() {
        let mut link = LinkStats::new(10.0);
        for i in 0..4 {
            link.poll_ping(i as f64 * 10.0);
        }
        link.on_pong(2, 10.0, 35.0);
        assert_eq!(link.lost(), 3);
        assert!((link.loss_ratio() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_bogus_pong() {
        let mut link = LinkStats::new(1_000.0);
        assert_eq!(link.on_pong(1, 0.0, 10.0), None);
        link.poll_ping(0.0);
        assert_eq!(link.on_pong(1, 50.0, 10.0), None);
        assert_eq!(link.on_pong(7, 0.0, 10.0), None);
        assert_eq!(link.rtt_ms(), None);
    }

    #[test]
    fn test_latency_saturates() {
        let mut link = LinkStats::new(1_000.0);
        link.poll_ping(0.0);
        link.on_pong(1, 0.0, 100_000.0);
        assert_eq!(link.latency_ms(), u16::MAX);
    }
}
