//! Session hub.
//!
//! A hub is the single authority over who is in a session and what goes to
//! whom. It runs as one task draining a command queue; the membership set
//! lives inside that task and is never touched from anywhere else.

use crate::member::Member;
use crate::message::{MemberId, Message};
use crate::session::SessionKey;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The hub's control loop is no longer running.
    #[error("Session hub closed: {0}")]
    Closed(SessionKey),
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the command queue feeding the control loop.
    pub command_capacity: usize,
    /// Whether a member receives the payloads it sent itself.
    pub echo_to_sender: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            command_capacity: 1024,
            echo_to_sender: false,
        }
    }
}

/// Hub statistics, computed inside the control loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Current number of members.
    pub members: usize,
    /// Broadcasts processed since the hub started.
    pub broadcasts: u64,
    /// Payloads enqueued onto member outbound queues.
    pub delivered: u64,
    /// Members dropped because their outbound queue was full.
    pub dropped_slow: u64,
}

/// Commands accepted by the control loop.
#[derive(Debug)]
enum Command {
    Admit(Member),
    Dismiss(MemberId),
    Broadcast(Message),
    Stats(oneshot::Sender<HubStats>),
}

/// Handle to a running hub.
///
/// Handles are cheap to clone. The control loop exits once every handle has
/// been dropped.
#[derive(Debug, Clone)]
pub struct HubHandle {
    key: SessionKey,
    commands: mpsc::Sender<Command>,
}

impl HubHandle {
    /// Get the session key this hub serves.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Admit a freshly created member.
    ///
    /// # Errors
    ///
    /// Returns an error if the control loop has terminated.
    pub async fn admit(&self, member: Member) -> Result<(), HubError> {
        self.send(Command::Admit(member)).await
    }

    /// Remove a member and close its outbound queue.
    ///
    /// Dismissing a member that is not present is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the control loop has terminated.
    pub async fn dismiss(&self, id: MemberId) -> Result<(), HubError> {
        self.send(Command::Dismiss(id)).await
    }

    /// Fan a message out to every current member.
    ///
    /// Delivery is fire-and-forget.
    ///
    /// # Errors
    ///
    /// Returns an error if the control loop has terminated.
    pub async fn broadcast(&self, message: Message) -> Result<(), HubError> {
        self.send(Command::Broadcast(message)).await
    }

    /// Get a statistics snapshot.
    ///
    /// The snapshot reflects every command submitted through this handle
    /// before the call.
    ///
    /// # Errors
    ///
    /// Returns an error if the control loop has terminated.
    pub async fn stats(&self) -> Result<HubStats, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx)).await?;
        rx.await.map_err(|_| self.closed())
    }

    /// Get the current member count.
    ///
    /// # Errors
    ///
    /// Returns an error if the control loop has terminated.
    pub async fn member_count(&self) -> Result<usize, HubError> {
        Ok(self.stats().await?.members)
    }

    /// Check if the control loop is still accepting commands.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands.send(command).await.map_err(|_| self.closed())
    }

    fn closed(&self) -> HubError {
        HubError::Closed(self.key.clone())
    }
}

/// The control loop state for one session.
pub struct Hub {
    key: SessionKey,
    config: HubConfig,
    members: HashMap<MemberId, Member>,
    stats: HubStats,
}

impl Hub {
    /// Spawn a hub for `key` on the current tokio runtime.
    #[must_use]
    pub fn spawn(key: impl Into<SessionKey>, config: HubConfig) -> HubHandle {
        let key = key.into();
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let hub = Self {
            key: key.clone(),
            config,
            members: HashMap::new(),
            stats: HubStats::default(),
        };
        tokio::spawn(hub.run(rx));
        debug!(session = %key, "Spawned session hub");
        HubHandle { key, commands: tx }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Admit(member) => self.admit(member),
                Command::Dismiss(id) => self.dismiss(id),
                Command::Broadcast(message) => self.broadcast(message),
                Command::Stats(reply) => {
                    let _ = reply.send(self.snapshot());
                }
            }
        }
        debug!(session = %self.key, "Session hub stopped");
    }

    fn admit(&mut self, member: Member) {
        let id = member.id();
        self.members.insert(id, member);
        debug!(
            session = %self.key,
            member = %id,
            members = self.members.len(),
            "Member admitted"
        );
    }

    fn dismiss(&mut self, id: MemberId) {
        // Dropping the member closes its outbound queue.
        if self.members.remove(&id).is_some() {
            debug!(
                session = %self.key,
                member = %id,
                members = self.members.len(),
                "Member dismissed"
            );
        }
    }

    fn broadcast(&mut self, message: Message) {
        self.stats.broadcasts += 1;

        let mut gone = Vec::new();
        for (id, member) in &self.members {
            if !self.config.echo_to_sender && message.origin == Some(*id) {
                continue;
            }
            match member.try_deliver(message.payload.clone()) {
                Ok(()) => self.stats.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(session = %self.key, member = %id, "Outbound queue full, dropping slow member");
                    self.stats.dropped_slow += 1;
                    gone.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(session = %self.key, member = %id, "Outbound queue closed");
                    gone.push(*id);
                }
            }
        }

        for id in gone {
            self.members.remove(&id);
        }

        trace!(
            session = %self.key,
            bytes = message.payload_size(),
            members = self.members.len(),
            "Broadcast"
        );
    }

    fn snapshot(&self) -> HubStats {
        HubStats {
            members: self.members.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn spawn_default() -> HubHandle {
        Hub::spawn("test", HubConfig::default())
    }

    async fn join(hub: &HubHandle, capacity: usize) -> (MemberId, mpsc::Receiver<Bytes>) {
        let (member, rx) = Member::channel(capacity);
        let id = member.id();
        hub.admit(member).await.unwrap();
        (id, rx)
    }

    #[tokio::test]
    async fn test_fan_out_skips_sender() {
        let hub = spawn_default();
        let (a, mut rx_a) = join(&hub, 8).await;
        let (_b, mut rx_b) = join(&hub, 8).await;
        let (_c, mut rx_c) = join(&hub, 8).await;

        hub.broadcast(Message::from_member(a, "hello")).await.unwrap();
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.delivered, 2);

        assert_eq!(rx_b.try_recv().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(rx_c.try_recv().unwrap(), Bytes::from_static(b"hello"));
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_with_echo() {
        let hub = Hub::spawn(
            "echo",
            HubConfig {
                echo_to_sender: true,
                ..HubConfig::default()
            },
        );
        let (a, mut rx_a) = join(&hub, 8).await;
        let (_b, mut rx_b) = join(&hub, 8).await;

        hub.broadcast(Message::from_member(a, "hello")).await.unwrap();
        hub.stats().await.unwrap();

        assert_eq!(rx_a.try_recv().unwrap(), Bytes::from_static(b"hello"));
        assert_eq!(rx_b.try_recv().unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_recipients_match_membership_at_broadcast() {
        let hub = spawn_default();
        let (_a, mut rx_a) = join(&hub, 8).await;

        hub.broadcast(Message::new("first")).await.unwrap();
        let (b, mut rx_b) = join(&hub, 8).await;
        hub.broadcast(Message::new("second")).await.unwrap();
        hub.dismiss(b).await.unwrap();
        hub.broadcast(Message::new("third")).await.unwrap();
        hub.stats().await.unwrap();

        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"first"));
        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"second"));
        assert_eq!(rx_a.recv().await.unwrap(), Bytes::from_static(b"third"));

        // Joined after "first", dismissed before "third".
        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"second"));
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_slow_member_is_dropped() {
        let hub = spawn_default();
        let (a, _rx_a) = join(&hub, 8).await;
        let (_b, mut rx_b) = join(&hub, 1).await;
        let (_c, mut rx_c) = join(&hub, 8).await;

        // The first payload fills B's queue, the second overflows it.
        hub.broadcast(Message::from_member(a, "fill")).await.unwrap();
        hub.broadcast(Message::from_member(a, "x")).await.unwrap();
        hub.broadcast(Message::from_member(a, "after")).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.members, 2);
        assert_eq!(stats.dropped_slow, 1);

        assert_eq!(rx_b.recv().await.unwrap(), Bytes::from_static(b"fill"));
        assert!(rx_b.recv().await.is_none());

        assert_eq!(rx_c.recv().await.unwrap(), Bytes::from_static(b"fill"));
        assert_eq!(rx_c.recv().await.unwrap(), Bytes::from_static(b"x"));
        assert_eq!(rx_c.recv().await.unwrap(), Bytes::from_static(b"after"));
    }

    #[tokio::test]
    async fn test_slow_member_is_evicted_while_queue_is_full() {
        let hub = spawn_default();
        let (a, _rx_a) = join(&hub, 8).await;
        let (member, _rx_b, mut evicted) = Member::with_eviction(1);
        hub.admit(member).await.unwrap();

        hub.broadcast(Message::from_member(a, "fill")).await.unwrap();
        hub.stats().await.unwrap();
        assert!(!evicted.is_evicted());

        // Nobody drains B's queue, yet the signal still fires on overflow.
        hub.broadcast(Message::from_member(a, "x")).await.unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), evicted.wait())
            .await
            .unwrap();
        assert_eq!(hub.stats().await.unwrap().dropped_slow, 1);
    }

    #[tokio::test]
    async fn test_closed_member_is_removed() {
        let hub = spawn_default();
        let (_a, rx_a) = join(&hub, 8).await;
        drop(rx_a);

        hub.broadcast(Message::new("x")).await.unwrap();
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.members, 0);
        assert_eq!(stats.dropped_slow, 0);
    }

    #[tokio::test]
    async fn test_admit_then_dismiss_is_net_zero() {
        let hub = spawn_default();
        let (_a, _rx_a) = join(&hub, 8).await;
        let before = hub.member_count().await.unwrap();

        let (b, mut rx_b) = join(&hub, 8).await;
        hub.dismiss(b).await.unwrap();

        assert_eq!(hub.member_count().await.unwrap(), before);
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dismiss_is_idempotent() {
        let hub = spawn_default();
        let (a, _rx_a) = join(&hub, 8).await;

        hub.dismiss(a).await.unwrap();
        hub.dismiss(a).await.unwrap();
        hub.dismiss(MemberId::generate()).await.unwrap();

        assert_eq!(hub.member_count().await.unwrap(), 0);
        assert!(hub.is_running());
    }

    #[tokio::test]
    async fn test_per_member_order_is_preserved() {
        let hub = spawn_default();
        let (_a, mut rx_a) = join(&hub, 64).await;

        for i in 0..50u8 {
            hub.broadcast(Message::new(vec![i])).await.unwrap();
        }
        hub.stats().await.unwrap();

        for i in 0..50u8 {
            assert_eq!(rx_a.recv().await.unwrap()[..], [i]);
        }
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_hub() {
        let hub = spawn_default();
        hub.broadcast(Message::new("nobody")).await.unwrap();

        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.members, 0);
        assert_eq!(stats.broadcasts, 1);
        assert_eq!(stats.delivered, 0);
    }
}
