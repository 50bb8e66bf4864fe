//! Configuration
//!
//! Every tunable of the sync core, with defaults matching the tuned values.
//! Sources are layered: defaults, then an optional JSON file, then
//! `PEER_SYNC_*` environment variables.

use std::env;
use std::path::Path;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of range or inconsistent with another.
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// An environment variable could not be parsed.
    #[error("Cannot parse {key}={value}")]
    Parse {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },

    /// Config file could not be read.
    #[error("Cannot read config file: {0}")]
    Io(String),

    /// Config file is not valid JSON for this schema.
    #[error("Invalid config JSON: {0}")]
    Json(String),
}

/// Correction thresholds and blend factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Position error above which the local entity is overwritten.
    pub hard_snap_threshold: f32,
    /// Position error at or below which no correction happens.
    pub epsilon: f32,
    /// Fraction of the position error removed by a soft blend.
    pub position_blend: f32,
    /// Weight of the authoritative velocity in a soft blend.
    pub velocity_blend: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            hard_snap_threshold: 50.0,
            epsilon: 2.0,
            position_blend: 0.15,
            velocity_blend: 0.2,
        }
    }
}

/// Remote entity interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpolationConfig {
    /// How far behind the host clock remote entities are rendered (ms).
    pub delay_ms: f64,
    /// Snapshots older than this, relative to the newest, are evicted (ms).
    pub retention_ms: f64,
    /// Maximum buffered snapshots.
    pub capacity: usize,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            delay_ms: 150.0,
            retention_ms: 500.0,
            capacity: 60,
        }
    }
}

/// Unacknowledged input storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Maximum unacknowledged inputs kept for replay.
    pub capacity: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self { capacity: 60 }
    }
}

/// Loop timing and liveness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Simulation rate (Hz).
    pub tick_rate: u32,
    /// Most fixed steps run in one frame.
    pub max_steps_per_frame: u32,
    /// Longest frame delta accepted (ms).
    pub max_frame_ms: f64,
    /// Simulation ticks per snapshot broadcast.
    pub broadcast_every: u32,
    /// Minimum spacing between sent movement inputs (ms).
    pub input_interval_ms: f64,
    /// Host ping period per link (ms).
    pub ping_interval_ms: f64,
    /// Silence before a peer is considered gone (ms).
    pub watchdog_timeout_ms: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_rate: crate::TICK_RATE,
            max_steps_per_frame: 5,
            max_frame_ms: 100.0,
            broadcast_every: 3,
            input_interval_ms: 33.0,
            ping_interval_ms: 1_000.0,
            watchdog_timeout_ms: 10_000.0,
        }
    }
}

impl TimingConfig {
    /// Fixed step length in seconds.
    pub fn dt(&self) -> f64 {
        1.0 / self.tick_rate.max(1) as f64
    }
}

/// Network endpoints and limits used by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Host listen address.
    pub bind_addr: String,
    /// URL clients connect to.
    pub host_url: String,
    /// Maximum participants, host included.
    pub max_participants: usize,
    /// Default tracing filter.
    pub log_level: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            host_url: "ws://127.0.0.1:8080".to_string(),
            max_participants: 16,
            log_level: "info".to_string(),
        }
    }
}

/// Complete sync core configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Reconciliation.
    pub reconcile: ReconcileConfig,
    /// Interpolation.
    pub interpolation: InterpolationConfig,
    /// Replay buffer.
    pub replay: ReplayConfig,
    /// Timing.
    pub timing: TimingConfig,
    /// Network.
    pub net: NetConfig,
}

impl SyncConfig {
    /// Parse from JSON; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))
    }

    /// Load from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Apply `PEER_SYNC_*` environment variables.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "PEER_SYNC_HARD_SNAP", &mut self.reconcile.hard_snap_threshold)?;
        override_parsed(&lookup, "PEER_SYNC_EPSILON", &mut self.reconcile.epsilon)?;
        override_parsed(&lookup, "PEER_SYNC_POSITION_BLEND", &mut self.reconcile.position_blend)?;
        override_parsed(&lookup, "PEER_SYNC_VELOCITY_BLEND", &mut self.reconcile.velocity_blend)?;
        override_parsed(&lookup, "PEER_SYNC_INTERP_DELAY_MS", &mut self.interpolation.delay_ms)?;
        override_parsed(&lookup, "PEER_SYNC_RETENTION_MS", &mut self.interpolation.retention_ms)?;
        override_parsed(&lookup, "PEER_SYNC_SNAPSHOT_CAPACITY", &mut self.interpolation.capacity)?;
        override_parsed(&lookup, "PEER_SYNC_REPLAY_CAPACITY", &mut self.replay.capacity)?;
        override_parsed(&lookup, "PEER_SYNC_TICK_RATE", &mut self.timing.tick_rate)?;
        override_parsed(&lookup, "PEER_SYNC_BROADCAST_EVERY", &mut self.timing.broadcast_every)?;
        override_parsed(&lookup, "PEER_SYNC_PING_INTERVAL_MS", &mut self.timing.ping_interval_ms)?;
        override_parsed(&lookup, "PEER_SYNC_WATCHDOG_MS", &mut self.timing.watchdog_timeout_ms)?;
        override_parsed(&lookup, "PEER_SYNC_MAX_PARTICIPANTS", &mut self.net.max_participants)?;

        if let Some(addr) = lookup("PEER_SYNC_BIND_ADDR") {
            self.net.bind_addr = addr;
        }
        if let Some(url) = lookup("PEER_SYNC_HOST_URL") {
            self.net.host_url = url;
        }
        if let Some(level) = lookup("PEER_SYNC_LOG_LEVEL") {
            self.net.log_level = level;
        }
        Ok(())
    }

    /// Reject values the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.reconcile;
        if !(r.epsilon >= 0.0 && r.hard_snap_threshold > r.epsilon) {
            return Err(ConfigError::Invalid(format!(
                "hard_snap_threshold ({}) must exceed epsilon ({}) and epsilon must be >= 0",
                r.hard_snap_threshold, r.epsilon
            )));
        }
        let factors = [("position_blend", r.position_blend), ("velocity_blend", r.velocity_blend)];
        for (name, factor) in factors {
            if !(0.0..=1.0).contains(&factor) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be in [0, 1], got {}",
                    name, factor
                )));
            }
        }

        let i = &self.interpolation;
        if i.delay_ms < 0.0 || i.retention_ms <= i.delay_ms {
            return Err(ConfigError::Invalid(format!(
                "retention_ms ({}) must exceed delay_ms ({})",
                i.retention_ms, i.delay_ms
            )));
        }
        if i.capacity < 2 {
            return Err(ConfigError::Invalid(
                "interpolation capacity must be at least 2".to_string(),
            ));
        }
        if self.replay.capacity == 0 {
            return Err(ConfigError::Invalid("replay capacity must be positive".to_string()));
        }

        let t = &self.timing;
        if t.tick_rate == 0 || t.max_steps_per_frame == 0 || t.broadcast_every == 0 {
            return Err(ConfigError::Invalid(
                "tick_rate, max_steps_per_frame and broadcast_every must be positive".to_string(),
            ));
        }
        if t.watchdog_timeout_ms <= t.ping_interval_ms {
            return Err(ConfigError::Invalid(format!(
                "watchdog_timeout_ms ({}) must exceed ping_interval_ms ({})",
                t.watchdog_timeout_ms, t.ping_interval_ms
            )));
        }

        let max = self.net.max_participants;
        if max < 1 || max > crate::network::codec::MAX_ENTITIES {
            return Err(ConfigError::Invalid(format!(
                "max_participants must be in 1..={}",
                crate::network::codec::MAX_ENTITIES
            )));
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(value) = lookup(key) {
        *target = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Parse { key, value })?;
    }
    Ok(())
}
