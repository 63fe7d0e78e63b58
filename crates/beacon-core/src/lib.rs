//! # beacon-core
//!
//! Session hubs and message fan-out for the Beacon relay.
//!
//! - **Hub** - Actor that owns one session's membership and fans out payloads
//! - **Registry** - Maps session keys to running hubs
//! - **Member** - Hub-side record of an attached connection
//! - **Message** - Opaque payloads tagged with their origin
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ admit/dismiss ┌─────────────┐  try_send   ┌─────────────┐
//! │  Connection │──────────────▶│     Hub     │────────────▶│   Member    │
//! │  (reader)   │   broadcast   │ (one task)  │  per member │  outbound   │
//! └─────────────┘               └─────────────┘             └─────────────┘
//!                                      ▲
//!                               ┌─────────────┐
//!                               │  Registry   │
//!                               └─────────────┘
//! ```

pub mod hub;
pub mod member;
pub mod message;
pub mod registry;
pub mod session;

pub use hub::{Hub, HubConfig, HubError, HubHandle, HubStats};
pub use member::{Evicted, Member, DEFAULT_OUTBOUND_CAPACITY};
pub use message::{MemberId, Message};
pub use registry::{RegistryConfig, RegistryError, SessionRegistry};
pub use session::{validate_session_key, SessionKey};
