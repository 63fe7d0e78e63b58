//! Registration request and response types.
//!
//! A client registers a beacon by posting its details. The server answers
//! with the same record, its `session_url` filled in, wrapped in an envelope
//! that carries an error flag and a human readable message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message returned when a session was created.
pub const SESSION_CREATED: &str = "Session created!";

/// Message returned when the request body is empty.
pub const DETAILS_REQUIRED: &str = "Beacon details required";

/// Errors that can occur while decoding a registration request.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The request had no body.
    #[error("{}", DETAILS_REQUIRED)]
    MissingBody,

    /// The body is not a valid registration request.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// A registered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    /// Device identifier; also the session key.
    pub uuid: String,
    /// Hardware address.
    pub mac: String,
    /// Display name.
    pub name: String,
    /// Path of the session's upgrade endpoint, set on registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_url: Option<String>,
}

impl Beacon {
    /// Create a beacon record without a session URL.
    #[must_use]
    pub fn new(uuid: impl Into<String>, mac: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            mac: mac.into(),
            name: name.into(),
            session_url: None,
        }
    }
}

/// Body of a registration request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindRequest {
    /// The beacon to register.
    pub beacon: Beacon,
}

impl FindRequest {
    /// Decode a request body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is empty or is not a valid request.
    pub fn from_body(body: &[u8]) -> Result<Self, ProtocolError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ProtocolError::MissingBody);
        }
        Ok(serde_json::from_slice(body)?)
    }
}

/// Response envelope for registration and other HTTP endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Whether the request failed.
    pub error: bool,
    /// Human readable outcome.
    pub message: String,
    /// The registered record, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Beacon>,
}

impl Envelope {
    /// Create a success envelope carrying a record.
    #[must_use]
    pub fn created(record: Beacon) -> Self {
        Self {
            error: false,
            message: SESSION_CREATED.to_string(),
            record: Some(record),
        }
    }

    /// Create an error envelope.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            record: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_request() {
        let body = br#"{"beacon":{"uuid":"abc","mac":"00:11:22:33:44:55","name":"kitchen"}}"#;
        let req = FindRequest::from_body(body).unwrap();
        assert_eq!(req.beacon, Beacon::new("abc", "00:11:22:33:44:55", "kitchen"));
    }

    #[test]
    fn test_empty_body() {
        assert!(matches!(
            FindRequest::from_body(b""),
            Err(ProtocolError::MissingBody)
        ));
        assert!(matches!(
            FindRequest::from_body(b" \n"),
            Err(ProtocolError::MissingBody)
        ));
        assert_eq!(ProtocolError::MissingBody.to_string(), DETAILS_REQUIRED);
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            FindRequest::from_body(b"{\"beacon\":"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            FindRequest::from_body(b"{\"beacon\":{\"uuid\":\"abc\"}}"),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn test_envelope_json() {
        let mut beacon = Beacon::new("abc", "mac", "name");
        beacon.session_url = Some("/session/abc".to_string());

        let value = serde_json::to_value(Envelope::created(beacon)).unwrap();
        assert_eq!(value["error"], false);
        assert_eq!(value["message"], SESSION_CREATED);
        assert_eq!(value["record"]["session_url"], "/session/abc");

        let value = serde_json::to_value(Envelope::error("nope")).unwrap();
        assert_eq!(value["error"], true);
        assert!(value.get("record").is_none());
    }
}
