//! Transport Boundary
//!
//! The core sees the peer connection as an already-open, message-oriented,
//! point-to-point channel. Inbound frames are drained non-blocking at the
//! start of each frame, so no core operation ever waits on the network.

use std::collections::VecDeque;

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::trace;

use crate::core::clock::now_ms;
use crate::core::rng::DeterministicRng;

/// One transport message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Snapshot or input packet.
    Binary(Vec<u8>),
    /// JSON control message.
    Text(String),
}

impl Frame {
    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Binary(data) => data.len(),
            Frame::Text(text) => text.len(),
        }
    }

    /// True for an empty payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The channel is closed (locally or by the peer).
    #[error("Transport closed")]
    Closed,

    /// Underlying socket failure.
    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Message-oriented point-to-point channel.
pub trait Transport: Send {
    /// Queue a frame for delivery.
    fn send(&mut self, frame: Frame) -> Result<(), TransportError>;

    /// Take the next received frame, if any. Never blocks.
    fn try_recv(&mut self) -> Option<Frame>;

    /// Whether frames can still flow in both directions.
    fn is_open(&self) -> bool;

    /// Close the channel. Further sends fail with `Closed`.
    fn close(&mut self);

    /// Drain everything currently received.
    fn drain(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

// =============================================================================
// IN-MEMORY CHANNEL
// =============================================================================

/// In-process transport over tokio unbounded channels.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<mpsc::UnboundedSender<Frame>>,
    rx: mpsc::UnboundedReceiver<Frame>,
    peer_closed: bool,
}

impl ChannelTransport {
    /// Create a connected pair of endpoints.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self::from_channels(a_tx, a_rx),
            Self::from_channels(b_tx, b_rx),
        )
    }

    /// Wrap an existing channel pair (used by the WebSocket adapter).
    pub fn from_channels(
        tx: mpsc::UnboundedSender<Frame>,
        rx: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        Self {
            tx: Some(tx),
            rx,
            peer_closed: false,
        }
    }
}

impl Transport for ChannelTransport {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(frame).map_err(|_| TransportError::Closed)
    }

    fn try_recv(&mut self) -> Option<Frame> {
        match self.rx.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.peer_closed = true;
                None
            }
        }
    }

    fn is_open(&self) -> bool {
        !self.peer_closed && self.tx.as_ref().map_or(false, |tx| !tx.is_closed())
    }

    fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }
}

// =============================================================================
// LINK CONDITIONER
// =============================================================================

/// Wraps a transport and adds inbound latency and loss.
///
/// Loss applies to binary frames only; control messages ride a reliable
/// channel. Drops are drawn from a seeded RNG so runs are reproducible.
#[derive(Debug)]
pub struct LinkConditioner<T> {
    inner: T,
    latency_ms: f64,
    loss: f64,
    rng: DeterministicRng,
    pending: VecDeque<(f64, Frame)>,
    dropped: u64,
}

impl<T: Transport> LinkConditioner<T> {
    /// Wrap `inner` with one-way `latency_ms` and binary `loss` probability.
    pub fn new(inner: T, latency_ms: f64, loss: f64, seed: u64) -> Self {
        Self {
            inner,
            latency_ms: latency_ms.max(0.0),
            loss: loss.clamp(0.0, 1.0),
            rng: DeterministicRng::new(seed),
            pending: VecDeque::new(),
            dropped: 0,
        }
    }

    /// Binary frames dropped so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    fn pull(&mut self, now: f64) {
        while let Some(frame) = self.inner.try_recv() {
            if matches!(frame, Frame::Binary(_)) && self.rng.next_bool(self.loss) {
                self.dropped += 1;
                trace!(len = frame.len(), "conditioner dropped frame");
                continue;
            }
            self.pending.push_back((now + self.latency_ms, frame));
        }
    }
}

impl<T: Transport> Transport for LinkConditioner<T> {
    fn send(&mut self, frame: Frame) -> Result<(), TransportError> {
        self.inner.send(frame)
    }

    fn try_recv(&mut self) -> Option<Frame> {
        let now = now_ms();
        self.pull(now);
        match self.pending.front() {
            Some((due, _)) if *due <= now => self.pending.pop_front().map(|(_, f)| f),
            _ => None,
        }
    }

    fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    fn close(&mut self) {
        self.inner.close();
    }
}
