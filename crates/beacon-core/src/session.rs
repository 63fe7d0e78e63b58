//! Session keys.
//!
//! A session key names one hub. It is supplied by clients at registration
//! and later used verbatim as a single URL path segment, so only characters
//! that need no percent-encoding in a path are accepted.

/// Maximum session key length.
pub const MAX_SESSION_KEY_LENGTH: usize = 256;

/// A session key.
pub type SessionKey = String;

/// Validate a session key.
///
/// # Errors
///
/// Returns an error message if the key is invalid.
pub fn validate_session_key(key: &str) -> Result<(), &'static str> {
    if key.is_empty() {
        return Err("Session key cannot be empty");
    }
    if key.len() > MAX_SESSION_KEY_LENGTH {
        return Err("Session key too long");
    }
    if !key.bytes().all(is_unreserved) {
        return Err("Session key may only contain letters, digits, '.', '_', '~' and '-'");
    }
    Ok(())
}

/// RFC 3986 unreserved characters.
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_key_validation() {
        assert!(validate_session_key("0f8fad5b-d9cb-469f-a165-70867728950e").is_ok());
        assert!(validate_session_key("").is_err());
        assert!(validate_session_key("a/b").is_err());
        assert!(validate_session_key("with space").is_err());
        assert!(validate_session_key("caf\u{e9}").is_err());
        assert!(validate_session_key("dev.1_a~b-C").is_ok());

        let long_key = "a".repeat(MAX_SESSION_KEY_LENGTH);
        assert!(validate_session_key(&long_key).is_ok());

        let long_key = "a".repeat(MAX_SESSION_KEY_LENGTH + 1);
        assert!(validate_session_key(&long_key).is_err());
    }

    #[test]
    fn test_url_reserved_characters_rejected() {
        for key in ["a?b", "a#b", "a%41b", "a+b", "a&b", "a=b", "a:b", "a@b", "a\\b"] {
            assert!(validate_session_key(key).is_err(), "accepted {key:?}");
        }
    }
}
