//! # beacon-transport
//!
//! Connection adapters and transports for the Beacon relay.
//!
//! - **Adapter** - Runs the inbound and outbound loops of one connection
//! - **WebSocket** - Upgraded axum sockets
//! - **Memory** - In-process pairs for tests and benchmarks
//!
//! ## Transport Abstraction
//!
//! Transports implement [`Connection`], which splits into a [`FrameReader`]
//! and a [`FrameWriter`] so both directions can run as separate tasks.
//!
//! ```rust,ignore
//! use beacon_transport::{Adapter, WebSocketConnection};
//!
//! async fn attach(socket: WebSocket, hub: HubHandle) {
//!     let stats = Adapter::new(hub, 256).run(WebSocketConnection::new(socket)).await;
//!     tracing::debug!(?stats, "Connection finished");
//! }
//! ```

pub mod adapter;
pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use adapter::{Adapter, AdapterStats};
pub use traits::{Connection, FrameReader, FrameWriter, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketConnection;
