//! WebSocket Adapter
//!
//! Bridges a WebSocket connection onto a [`ChannelTransport`]: one task
//! forwards inbound messages into a channel, another writes queued frames to
//! the socket. The session loop only ever touches the channels.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};

use crate::network::transport::{ChannelTransport, Frame, TransportError};

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        TransportError::Io(e.to_string())
    }
}

/// Connect to a host and return the bridged transport.
#[instrument]
pub async fn connect(url: &str) -> Result<ChannelTransport, TransportError> {
    let (ws, _response) = connect_async(url).await?;
    info!("Connected to {}", url);
    Ok(bridge(ws, url.to_string()))
}

/// Accepts WebSocket participants for a host.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", addr);
        Ok(Self { listener })
    }

    /// Local address (useful when bound to port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept one participant and complete the WebSocket handshake.
    pub async fn accept(&self) -> Result<(ChannelTransport, SocketAddr), TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        let ws = accept_async(stream).await?;
        debug!("WebSocket handshake complete for {}", addr);
        Ok((bridge(ws, addr.to_string()), addr))
    }

    /// Accept forever on a background task, handing each new transport to
    /// the returned channel. The task ends when the receiver is dropped.
    pub fn spawn_acceptor(self) -> mpsc::UnboundedReceiver<(ChannelTransport, SocketAddr)> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                match self.accept().await {
                    Ok(conn) => {
                        if tx.send(conn).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                }
            }
        });
        rx
    }
}

/// Spawn reader and writer tasks for `ws` and return the channel end.
fn bridge<S>(ws: WebSocketStream<S>, peer: String) -> ChannelTransport
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Frame>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<Frame>();

    let writer_peer = peer.clone();
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let msg = match frame {
                Frame::Binary(data) => Message::Binary(data),
                Frame::Text(text) => Message::Text(text),
            };
            if let Err(e) = ws_sender.send(msg).await {
                debug!("Write to {} failed: {}", writer_peer, e);
                break;
            }
        }
        if let Err(e) = ws_sender.send(Message::Close(None)).await {
            debug!("Close to {} failed: {}", writer_peer, e);
        }
    });

    tokio::spawn(async move {
        while let Some(msg) = ws_receiver.next().await {
            let frame = match msg {
                Ok(Message::Binary(data)) => Frame::Binary(data),
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Close(_)) => {
                    debug!("{} closed the connection", peer);
                    break;
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("WebSocket error for {}: {}", peer, e);
                    break;
                }
            };
            if in_tx.send(frame).is_err() {
                break;
            }
        }
    });

    ChannelTransport::from_channels(out_tx, in_rx)
}
