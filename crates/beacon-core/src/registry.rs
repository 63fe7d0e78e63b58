//! Session registry.
//!
//! Maps session keys to running hubs. Hubs are spawned on first reference
//! and are never removed, so they live as long as the registry does.

use crate::hub::{Hub, HubConfig, HubHandle};
use crate::session::{validate_session_key, SessionKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, info};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid session key.
    #[error("Invalid session key: {0}")]
    InvalidKey(&'static str),

    /// Maximum number of sessions reached.
    #[error("Maximum sessions reached")]
    MaxSessionsReached,
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of sessions.
    pub max_sessions: usize,
    /// Configuration applied to every spawned hub.
    pub hub: HubConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 10_000,
            hub: HubConfig::default(),
        }
    }
}

/// Process-wide mapping from session key to hub.
pub struct SessionRegistry {
    sessions: DashMap<SessionKey, HubHandle>,
    config: RegistryConfig,
}

impl SessionRegistry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(config: RegistryConfig) -> Self {
        info!("Creating session registry with config: {:?}", config);
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Get the hub for `key`, spawning it if this is the first reference.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the session limit is reached.
    pub fn get_or_create(&self, key: &str) -> Result<HubHandle, RegistryError> {
        validate_session_key(key).map_err(RegistryError::InvalidKey)?;

        if let Some(hub) = self.sessions.get(key) {
            return Ok(hub.clone());
        }

        // Checked before taking the entry lock; the limit is advisory under races.
        if self.sessions.len() >= self.config.max_sessions {
            return Err(RegistryError::MaxSessionsReached);
        }

        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let hub = Hub::spawn(key, self.config.hub.clone());
                entry.insert(hub.clone());
                debug!(session = %key, "Created session");
                Ok(hub)
            }
        }
    }

    /// Look up the hub for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<HubHandle> {
        self.sessions.get(key).map(|hub| hub.clone())
    }

    /// Check if a session exists.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Get the number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if the registry has no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Get all session keys.
    #[must_use]
    pub fn keys(&self) -> Vec<SessionKey> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Member;

    #[tokio::test]
    async fn test_one_hub_per_key() {
        let registry = SessionRegistry::new();

        let hub1 = registry.get_or_create("device-1").unwrap();
        let hub2 = registry.get_or_create("device-1").unwrap();
        assert_eq!(registry.len(), 1);

        // Both handles drive the same control loop.
        let (member, _rx) = Member::channel(4);
        hub1.admit(member).await.unwrap();
        assert_eq!(hub2.member_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup() {
        let registry = SessionRegistry::new();
        assert!(registry.get("missing").is_none());
        assert!(registry.is_empty());

        registry.get_or_create("present").unwrap();
        assert!(registry.contains("present"));
        assert_eq!(registry.get("present").unwrap().key(), "present");
        assert_eq!(registry.keys(), vec!["present".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let registry = SessionRegistry::new();
        assert!(matches!(
            registry.get_or_create(""),
            Err(RegistryError::InvalidKey(_))
        ));
        assert!(matches!(
            registry.get_or_create("../etc"),
            Err(RegistryError::InvalidKey(_))
        ));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_max_sessions() {
        let registry = SessionRegistry::with_config(RegistryConfig {
            max_sessions: 2,
            ..RegistryConfig::default()
        });

        registry.get_or_create("a").unwrap();
        registry.get_or_create("b").unwrap();
        assert!(matches!(
            registry.get_or_create("c"),
            Err(RegistryError::MaxSessionsReached)
        ));

        // Existing sessions are still reachable at the limit.
        assert!(registry.get_or_create("a").is_ok());
    }
}
