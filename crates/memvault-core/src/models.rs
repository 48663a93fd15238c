//! Configuration and result types for the secrets store

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Vault tuning knobs (non-sensitive).
///
/// All values are supplied by the embedding application; nothing here is
/// read from the environment or disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Retrieval attempts allowed per key within one rate-limit window
    pub max_attempts: u32,

    /// Length of the rate-limit window
    pub window_duration: Duration,

    /// Minimum idle time before a decrypted entry is eligible for forced
    /// re-encryption
    pub reencryption_cooldown: Duration,

    /// Idle time after which a still-decrypted entry is treated as left
    /// behind by a misbehaving caller and swept back to encrypted
    pub expiry_timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_duration: Duration::from_secs(60),
            reencryption_cooldown: Duration::from_secs(300),
            expiry_timeout: Duration::from_secs(300),
        }
    }
}

/// Outcome of one key in a batched retrieval
pub enum SecretLookup {
    /// Decrypted plaintext; wiped when the batch is dropped
    Found(Zeroizing<String>),
    NotFound,
    RateLimited,
}

/// Result of a batched retrieval.
///
/// Every requested key is present with an explicit outcome, so a missing
/// secret can never be mistaken for an empty one.
#[derive(Default)]
pub struct SecretBatch {
    results: BTreeMap<String, SecretLookup>,
}

impl SecretBatch {
    pub(crate) fn insert(&mut self, key: &str, lookup: SecretLookup) {
        self.results.insert(key.to_string(), lookup);
    }

    /// Plaintext for `key`, if it was found and allowed
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.results.get(key) {
            Some(SecretLookup::Found(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Per-key outcome; `None` if the key was not part of the request
    pub fn lookup(&self, key: &str) -> Option<&SecretLookup> {
        self.results.get(key)
    }

    /// True when every requested key resolved to plaintext
    pub fn is_complete(&self) -> bool {
        self.results
            .values()
            .all(|lookup| matches!(lookup, SecretLookup::Found(_)))
    }

    /// Number of keys that resolved to plaintext
    pub fn found_count(&self) -> usize {
        self.results
            .values()
            .filter(|lookup| matches!(lookup, SecretLookup::Found(_)))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_outcomes() {
        let mut batch = SecretBatch::default();
        batch.insert("FOUND", SecretLookup::Found(Zeroizing::new("value".to_string())));
        batch.insert("MISSING", SecretLookup::NotFound);

        assert_eq!(batch.get("FOUND"), Some("value"));
        assert_eq!(batch.get("MISSING"), None);
        assert!(matches!(batch.lookup("MISSING"), Some(SecretLookup::NotFound)));
        assert!(batch.lookup("NEVER_ASKED").is_none());
        assert!(!batch.is_complete());
        assert_eq!(batch.found_count(), 1);
    }

    #[test]
    fn test_default_config_is_conservative() {
        let config = VaultConfig::default();
        assert!(config.max_attempts > 0);
        assert!(config.window_duration > Duration::ZERO);
    }
}
