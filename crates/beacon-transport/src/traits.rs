//! Transport abstraction traits for Beacon.
//!
//! A connection is split into a reader and a writer half so the inbound and
//! outbound loops of an adapter can run as independent tasks.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// The inbound half of a connection.
#[async_trait]
pub trait FrameReader: Send {
    /// Receive the next payload.
    ///
    /// Returns `None` if the peer closed the connection cleanly.
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError>;
}

/// The outbound half of a connection.
#[async_trait]
pub trait FrameWriter: Send {
    /// Send a payload to the peer.
    async fn send(&mut self, payload: Bytes) -> Result<(), TransportError>;

    /// Close the connection.
    ///
    /// Closing an already closed writer succeeds and does nothing.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// A bidirectional connection that can be split into independent halves.
pub trait Connection: Send {
    /// The inbound half.
    type Reader: FrameReader + 'static;
    /// The outbound half.
    type Writer: FrameWriter + 'static;

    /// Split the connection into its reader and writer.
    fn split(self) -> (Self::Reader, Self::Writer);

    /// Get the remote address of the connection, if available.
    ///
    /// Used for logging only.
    fn remote_addr(&self) -> Option<String> {
        None
    }
}
