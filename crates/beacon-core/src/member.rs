//! Hub-side view of an attached connection.

use crate::message::MemberId;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

/// Default capacity of a member's outbound queue.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 256;

/// A member of a session hub.
///
/// Holds the sending half of the member's bounded outbound queue. The hub
/// owns it once admitted; dropping it closes the queue, which is how the hub
/// tells the connection's writer to stop, and resolves the member's
/// [`Evicted`] signal.
#[derive(Debug)]
pub struct Member {
    id: MemberId,
    outbound: mpsc::Sender<Bytes>,
    _evicted: oneshot::Sender<()>,
}

impl Member {
    /// Create a member with a fresh id and an outbound queue of `capacity`.
    ///
    /// Returns the member and the receiving end of its outbound queue.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (member, rx, _) = Self::with_eviction(capacity);
        (member, rx)
    }

    /// Like [`Member::channel`], also returning a signal that resolves once
    /// the member is dropped.
    ///
    /// The outbound queue only reports closure after it has been drained,
    /// which never happens while the connection's writer is blocked. The
    /// signal fires immediately.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_eviction(capacity: usize) -> (Self, mpsc::Receiver<Bytes>, Evicted) {
        let (outbound, rx) = mpsc::channel(capacity);
        let (evicted_tx, evicted_rx) = oneshot::channel();
        let member = Self {
            id: MemberId::generate(),
            outbound,
            _evicted: evicted_tx,
        };
        (member, rx, Evicted(Some(evicted_rx)))
    }

    /// Get the member id.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    pub(crate) fn try_deliver(
        &self,
        payload: Bytes,
    ) -> Result<(), mpsc::error::TrySendError<Bytes>> {
        self.outbound.try_send(payload)
    }
}

/// Resolves once the hub has dropped the matching [`Member`].
#[derive(Debug)]
pub struct Evicted(Option<oneshot::Receiver<()>>);

impl Evicted {
    /// Wait until the member is gone.
    pub async fn wait(&mut self) {
        if let Some(rx) = self.0.as_mut() {
            // Nothing is ever sent; only the sender's drop completes this.
            let _ = rx.await;
            self.0 = None;
        }
    }

    /// Check whether the member has already been dropped.
    #[must_use]
    pub fn is_evicted(&mut self) -> bool {
        let Some(rx) = self.0.as_mut() else {
            return true;
        };
        match rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => false,
            _ => {
                self.0 = None;
                true
            }
        }
    }
}
