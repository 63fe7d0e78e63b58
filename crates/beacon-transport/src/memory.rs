//! In-memory transport.
//!
//! A [`pair`] returns a connection for the server side and a [`MemoryPeer`]
//! that plays the remote client. Used by tests and benchmarks.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::traits::{Connection, FrameReader, FrameWriter, TransportError};

type Inbound = Result<Bytes, String>;

/// Create a connected pair.
///
/// `capacity` bounds both directions; a peer that never reads will
/// eventually stall the connection's writer.
///
/// # Panics
///
/// Panics if `capacity` is zero.
#[must_use]
pub fn pair(capacity: usize) -> (MemoryConnection, MemoryPeer) {
    let (to_conn, inbound) = mpsc::channel(capacity);
    let (outbound, from_conn) = mpsc::channel(capacity);
    (
        MemoryConnection { inbound, outbound },
        MemoryPeer {
            to_conn: Some(to_conn),
            from_conn,
        },
    )
}

/// Server side of an in-memory pair.
pub struct MemoryConnection {
    inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::Sender<Bytes>,
}

impl Connection for MemoryConnection {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn split(self) -> (MemoryReader, MemoryWriter) {
        (
            MemoryReader {
                inbound: self.inbound,
            },
            MemoryWriter {
                outbound: Some(self.outbound),
            },
        )
    }

    fn remote_addr(&self) -> Option<String> {
        Some("memory".to_string())
    }
}

/// Reader half of a [`MemoryConnection`].
pub struct MemoryReader {
    inbound: mpsc::Receiver<Inbound>,
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.inbound.recv().await {
            Some(Ok(payload)) => Ok(Some(payload)),
            Some(Err(reason)) => Err(TransportError::ReceiveFailed(reason)),
            None => Ok(None),
        }
    }
}

/// Writer half of a [`MemoryConnection`].
pub struct MemoryWriter {
    outbound: Option<mpsc::Sender<Bytes>>,
}

#[async_trait]
impl FrameWriter for MemoryWriter {
    async fn send(&mut self, payload: Bytes) -> Result<(), TransportError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        outbound
            .send(payload)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        Ok(())
    }
}

/// The remote end of an in-memory pair.
pub struct MemoryPeer {
    to_conn: Option<mpsc::Sender<Inbound>>,
    from_conn: mpsc::Receiver<Bytes>,
}

impl MemoryPeer {
    /// Send a payload to the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if either side has closed.
    pub async fn send(&self, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.push(Ok(payload.into())).await
    }

    /// Make the connection's next read fail with `reason`.
    ///
    /// # Errors
    ///
    /// Returns an error if either side has closed.
    pub async fn fail(&self, reason: impl Into<String>) -> Result<(), TransportError> {
        self.push(Err(reason.into())).await
    }

    /// Receive the next payload written by the connection.
    ///
    /// Returns `None` once the connection's writer has closed.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.from_conn.recv().await
    }

    /// Close the peer's sending side; the connection reads a clean close.
    pub fn close(&mut self) {
        self.to_conn = None;
    }

    async fn push(&self, item: Inbound) -> Result<(), TransportError> {
        let to_conn = self
            .to_conn
            .as_ref()
            .ok_or(TransportError::ConnectionClosed)?;
        to_conn
            .send(item)
            .await
            .map_err(|_| TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pair_roundtrip() {
        let (conn, mut peer) = pair(4);
        assert_eq!(conn.remote_addr().as_deref(), Some("memory"));
        let (mut reader, mut writer) = conn.split();

        peer.send("ping").await.unwrap();
        assert_eq!(reader.recv().await.unwrap().unwrap(), Bytes::from_static(b"ping"));

        writer.send(Bytes::from_static(b"pong")).await.unwrap();
        assert_eq!(peer.recv().await.unwrap(), Bytes::from_static(b"pong"));

        peer.fail("boom").await.unwrap();
        assert!(matches!(
            reader.recv().await,
            Err(TransportError::ReceiveFailed(_))
        ));

        peer.close();
        assert!(reader.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (conn, mut peer) = pair(4);
        let (_reader, mut writer) = conn.split();

        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert!(matches!(
            writer.send(Bytes::from_static(b"late")).await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(peer.recv().await.is_none());
    }
}
