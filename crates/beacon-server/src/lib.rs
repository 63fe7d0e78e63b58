//! # beacon-server
//!
//! HTTP front end of the Beacon relay: device registration, the homepage,
//! and the WebSocket upgrade endpoint that attaches clients to session hubs.

pub mod config;
pub mod handlers;
pub mod metrics;

pub use config::Config;
pub use handlers::{app, run_server, serve, AppState};
