//! Connection adapter.
//!
//! Bridges one connection to a session hub. The inbound loop forwards every
//! payload read from the peer to the hub; the outbound loop drains the
//! member's queue into the connection. The adapter is finished once both
//! loops have stopped and the member has been dismissed.
//!
//! If the hub drops the member (slow consumer, or the hub shut down), the
//! inbound loop stops right away and the outbound loop is aborted, because
//! its writer may be blocked on a peer that no longer reads.

use beacon_core::{Evicted, HubHandle, Member, MemberId, Message};
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::traits::{Connection, FrameReader, FrameWriter};

/// Counters reported when an adapter finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdapterStats {
    /// Payloads read from the peer and submitted for broadcast.
    pub received: u64,
    /// Payloads written to the peer.
    pub sent: u64,
}

/// Binds one connection to one hub for the connection's lifetime.
pub struct Adapter {
    hub: HubHandle,
    member: Member,
    outbound: mpsc::Receiver<Bytes>,
    evicted: Evicted,
}

impl Adapter {
    /// Create an adapter with an outbound queue of `outbound_capacity`.
    ///
    /// # Panics
    ///
    /// Panics if `outbound_capacity` is zero.
    #[must_use]
    pub fn new(hub: HubHandle, outbound_capacity: usize) -> Self {
        let (member, outbound, evicted) = Member::with_eviction(outbound_capacity);
        Self {
            hub,
            member,
            outbound,
            evicted,
        }
    }

    /// Get the member id this adapter is admitted under.
    #[must_use]
    pub fn id(&self) -> MemberId {
        self.member.id()
    }

    /// Admit the member, then run both loops until the connection is done.
    ///
    /// Admission completes before the first read, so nothing the peer sends
    /// can reach the hub ahead of its own membership.
    pub async fn run<C: Connection>(self, connection: C) -> AdapterStats {
        let Self {
            hub,
            member,
            outbound,
            mut evicted,
        } = self;
        let id = member.id();
        let remote = connection
            .remote_addr()
            .unwrap_or_else(|| "unknown".to_string());
        let (mut reader, mut writer) = connection.split();

        if let Err(e) = hub.admit(member).await {
            warn!(member = %id, remote = %remote, error = %e, "Admission failed");
            let _ = writer.close().await;
            return AdapterStats::default();
        }
        debug!(session = %hub.key(), member = %id, remote = %remote, "Adapter attached");

        let sent = Arc::new(AtomicU64::new(0));
        let mut write_task = tokio::spawn(write_loop(
            writer,
            outbound,
            hub.clone(),
            id,
            Arc::clone(&sent),
        ));
        let mut writer_done = false;
        let mut was_evicted = false;
        let mut received = 0;

        loop {
            tokio::select! {
                frame = reader.recv() => match frame {
                    Ok(Some(payload)) => {
                        received += 1;
                        trace!(member = %id, bytes = payload.len(), "Inbound payload");
                        if hub.broadcast(Message::from_member(id, payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!(member = %id, "Peer closed connection");
                        break;
                    }
                    Err(e) => {
                        warn!(member = %id, error = %e, "Read failed");
                        break;
                    }
                },
                result = &mut write_task => {
                    writer_done = true;
                    if let Err(e) = result {
                        warn!(member = %id, error = %e, "Outbound loop failed");
                    }
                    break;
                }
                () = evicted.wait() => {
                    debug!(session = %hub.key(), member = %id, "Dropped by hub");
                    was_evicted = true;
                    break;
                }
            }
        }

        // Dismissal closes the outbound queue, which stops a writer that is
        // still making progress.
        let _ = hub.dismiss(id).await;

        if !writer_done {
            if was_evicted {
                write_task.abort();
            }
            if let Err(e) = write_task.await {
                if !e.is_cancelled() {
                    warn!(member = %id, error = %e, "Outbound loop failed");
                }
            }
        }
        let sent = sent.load(Ordering::Relaxed);

        debug!(session = %hub.key(), member = %id, received, sent, "Adapter detached");
        AdapterStats { received, sent }
    }
}

async fn write_loop<W: FrameWriter>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    hub: HubHandle,
    id: MemberId,
    sent: Arc<AtomicU64>,
) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = writer.send(payload).await {
            debug!(member = %id, error = %e, "Write failed");
            break;
        }
        sent.fetch_add(1, Ordering::Relaxed);
    }

    if let Err(e) = writer.close().await {
        trace!(member = %id, error = %e, "Close failed");
    }
    let _ = hub.dismiss(id).await;
}
