//! Crate-level error.

use crate::config::ConfigError;
use crate::host::dispatcher::DispatchError;
use crate::network::codec::CodecError;
use crate::network::protocol::ProtocolError;
use crate::network::transport::TransportError;
use crate::session::SessionError;

/// Any error the sync core can surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Binary packet fault.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Frame decode fault.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Channel fault.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Participant state machine violation.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// Session-ending fault.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Bad configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias over [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
