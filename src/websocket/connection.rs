//! Connection Adapter
//!
//! The hub never talks to a socket type directly. Each admitted client
//! carries a [`Connection`]: a read half and a write half behind the
//! [`FrameReader`] / [`FrameWriter`] traits. The axum WebSocket adapter
//! lives here; tests plug in in-memory halves.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;

/// One outbound unit of wire transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text frame carrying an encoded envelope
    Text(String),
    /// Liveness probe
    Ping,
    /// Protocol-level close
    Close,
}

/// Errors raised by a connection half
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Connection closed")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timed out")]
    Timeout,
}

impl From<axum::Error> for ConnectionError {
    fn from(err: axum::Error) -> Self {
        ConnectionError::Transport(err.to_string())
    }
}

/// Read half of a client connection
#[async_trait]
pub trait FrameReader: Send + 'static {
    /// Wait for the next inbound text payload.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn read_frame(&mut self) -> Result<Option<String>, ConnectionError>;
}

/// Write half of a client connection
#[async_trait]
pub trait FrameWriter: Send + 'static {
    /// Write one frame to the peer
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError>;
}

/// Duplex connection handed to the hub at registration
pub struct Connection {
    pub(crate) reader: Box<dyn FrameReader>,
    pub(crate) writer: Box<dyn FrameWriter>,
}

impl Connection {
    /// Build a connection from arbitrary halves
    pub fn new(reader: impl FrameReader, writer: impl FrameWriter) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Wrap an upgraded axum WebSocket
    pub fn from_websocket(socket: WebSocket) -> Self {
        let (sink, stream) = socket.split();
        Self::new(WsReader { stream }, WsWriter { sink })
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish_non_exhaustive()
    }
}

/// Read half of an axum WebSocket
pub struct WsReader {
    stream: SplitStream<WebSocket>,
}

#[async_trait]
impl FrameReader for WsReader {
    async fn read_frame(&mut self) -> Result<Option<String>, ConnectionError> {
        while let Some(result) = self.stream.next().await {
            match result? {
                Message::Text(text) => return Ok(Some(text)),
                Message::Binary(bytes) => {
                    // Binary frames are accepted when they carry UTF-8 text
                    return String::from_utf8(bytes)
                        .map(Some)
                        .map_err(|_| ConnectionError::Protocol("non UTF-8 binary frame".into()));
                }
                // Axum answers pings itself
                Message::Ping(_) | Message::Pong(_) => continue,
                Message::Close(_) => return Ok(None),
            }
        }
        Ok(None)
    }
}

/// Write half of an axum WebSocket
pub struct WsWriter {
    sink: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl FrameWriter for WsWriter {
    async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
        let message = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Ping => Message::Ping(Vec::new()),
            Frame::Close => Message::Close(None),
        };
        self.sink.send(message).await?;
        Ok(())
    }
}

/// In-memory connection halves for tests
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use tokio::sync::mpsc;

    /// Test side of an in-memory connection
    pub struct Peer {
        /// Frames the client "sends" to the hub; drop to simulate remote close
        pub inbound: mpsc::UnboundedSender<Result<String, ConnectionError>>,
        /// Frames the hub wrote to the client
        pub outbound: mpsc::UnboundedReceiver<Frame>,
    }

    impl Peer {
        /// Wait for the next frame written to this peer
        pub async fn next_frame(&mut self) -> Option<Frame> {
            tokio::time::timeout(std::time::Duration::from_secs(2), self.outbound.recv())
                .await
                .ok()
                .flatten()
        }

        /// Wait for the next text frame, skipping pings
        pub async fn next_text(&mut self) -> Option<String> {
            loop {
                match self.next_frame().await? {
                    Frame::Text(text) => return Some(text),
                    Frame::Ping => continue,
                    Frame::Close => return None,
                }
            }
        }
    }

    struct MemoryReader {
        rx: mpsc::UnboundedReceiver<Result<String, ConnectionError>>,
    }

    #[async_trait]
    impl FrameReader for MemoryReader {
        async fn read_frame(&mut self) -> Result<Option<String>, ConnectionError> {
            self.rx.recv().await.transpose()
        }
    }

    struct MemoryWriter {
        tx: mpsc::UnboundedSender<Frame>,
    }

    #[async_trait]
    impl FrameWriter for MemoryWriter {
        async fn write_frame(&mut self, frame: Frame) -> Result<(), ConnectionError> {
            self.tx.send(frame).map_err(|_| ConnectionError::Closed)
        }
    }

    /// Writer that never completes a write, like a peer that stopped reading
    pub struct StalledWriter;

    #[async_trait]
    impl FrameWriter for StalledWriter {
        async fn write_frame(&mut self, _frame: Frame) -> Result<(), ConnectionError> {
            std::future::pending().await
        }
    }

    /// Create a connected pair
    pub fn pair() -> (Connection, Peer) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let connection = Connection::new(MemoryReader { rx: in_rx }, MemoryWriter { tx: out_tx });
        let peer = Peer {
            inbound: in_tx,
            outbound: out_rx,
        };
        (connection, peer)
    }

    /// Create a connection whose writes never finish
    pub fn stalled() -> (Connection, mpsc::UnboundedSender<Result<String, ConnectionError>>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (Connection::new(MemoryReader { rx: in_rx }, StalledWriter), in_tx)
    }
}
