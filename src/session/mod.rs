//! Session Roles
//!
//! A session wires the pieces together for one role. [`HostSession`] owns the
//! simulation and a transport per participant; [`ClientSession`] owns one
//! transport to the host plus prediction and interpolation state. Both are
//! driven by `poll(now, frame_secs)` from the embedding game loop.

pub mod client;
pub mod host;
pub mod identity;

pub use client::{ClientEvent, ClientSession, ClientState, ClientStats};
pub use host::{HostSession, HostStats};
pub use identity::{IdentityError, IdentityMap};

use tracing::{debug, warn};

use crate::host::dispatcher::DispatchError;
use crate::network::codec::CodecError;
use crate::network::protocol::ProtocolError;
use crate::network::transport::TransportError;

/// Session-level errors. Everything except `Protocol` ends the session.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    /// No traffic from the host for the watchdog window.
    #[error("Host silent for {silent_ms:.0} ms")]
    WatchdogTimeout {
        /// Silence observed (ms).
        silent_ms: f64,
    },

    /// Host announced it is leaving.
    #[error("Host quit")]
    HostQuit,

    /// Session was already torn down.
    #[error("Session closed")]
    Closed,

    /// A round is already running.
    #[error("Round {0} already in progress")]
    RoundInProgress(u32),

    /// Bad inbound frame.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Channel fault.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Participant bookkeeping fault.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl From<CodecError> for SessionError {
    fn from(e: CodecError) -> Self {
        SessionError::Protocol(ProtocolError::Codec(e))
    }
}

/// Logs decode failures: the first truncated packet warns, later ones only
/// show at debug level.
#[derive(Debug, Clone, Default)]
pub(crate) struct DecodeFaultLog {
    truncation_warned: bool,
    faults: u64,
}

impl DecodeFaultLog {
    pub(crate) fn record(&mut self, origin: &str, err: &ProtocolError) {
        self.faults += 1;
        match err {
            ProtocolError::Codec(CodecError::TruncatedPacket { .. }) if !self.truncation_warned => {
                self.truncation_warned = true;
                warn!(origin, error = %err, "truncated packet dropped");
            }
            ProtocolError::Codec(CodecError::TruncatedPacket { .. }) => {
                debug!(origin, error = %err, "truncated packet dropped");
            }
            _ => warn!(origin, error = %err, "undecodable frame dropped"),
        }
    }

    pub(crate) fn faults(&self) -> u64 {
        self.faults
    }
}
