//! Message and member identity types for Beacon.
//!
//! Payloads are opaque bytes. The hub relays them verbatim and never looks
//! inside.

use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter backing member identifiers.
static MEMBER_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A process-unique identifier for one attached connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(u64);

impl MemberId {
    /// Generate a fresh identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(MEMBER_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw numeric value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "member_{}", self.0)
    }
}

/// A payload submitted to a hub for fan-out.
#[derive(Debug, Clone)]
pub struct Message {
    /// The member that sent the payload, if any.
    pub origin: Option<MemberId>,
    /// Message payload (reference counted, cloned per recipient without copying).
    pub payload: Bytes,
}

impl Message {
    /// Create a message with no originating member.
    #[must_use]
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            origin: None,
            payload: payload.into(),
        }
    }

    /// Create a message sent by a member.
    #[must_use]
    pub fn from_member(origin: MemberId, payload: impl Into<Bytes>) -> Self {
        Self {
            origin: Some(origin),
            payload: payload.into(),
        }
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_ids_are_unique() {
        let id1 = MemberId::generate();
        let id2 = MemberId::generate();
        assert_ne!(id1, id2);
        assert!(id2 > id1);
    }

    #[test]
    fn test_member_id_display() {
        let id = MemberId::generate();
        assert_eq!(id.to_string(), format!("member_{}", id.as_u64()));
    }

    #[test]
    fn test_message_origin() {
        let id = MemberId::generate();
        let msg = Message::from_member(id, b"hello".to_vec());
        assert_eq!(msg.origin, Some(id));
        assert_eq!(&msg.payload[..], b"hello");
        assert_eq!(msg.payload_size(), 5);

        assert!(Message::new("x").origin.is_none());
    }
}
