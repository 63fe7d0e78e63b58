//! # beacon-protocol
//!
//! JSON wire types used by the Beacon HTTP endpoints.
//!
//! Relayed session traffic has no protocol of its own: payloads are opaque
//! bytes forwarded verbatim. This crate only covers device registration.
//!
//! ## Example
//!
//! ```rust
//! use beacon_protocol::{Envelope, FindRequest};
//!
//! let body = br#"{"beacon":{"uuid":"abc","mac":"00:00:00:00:00:00","name":"hall"}}"#;
//! let mut request = FindRequest::from_body(body).unwrap();
//! request.beacon.session_url = Some("/session/abc".to_string());
//!
//! let response = Envelope::created(request.beacon);
//! assert!(!response.error);
//! ```

pub mod registration;

pub use registration::{Beacon, Envelope, FindRequest, ProtocolError};
