//! The secret ledger: encrypted entries and their lifecycle
//!
//! Owns every state transition a secret goes through — bulk load, ad-hoc
//! store, the decrypt/wipe halves of a retrieval, cooldown re-encryption,
//! the expired-secret sweep, and batch re-encryption. Plaintext leaves
//! this module only as zeroize-on-drop buffers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::crypto::{self, CryptoEngine};
use crate::error::{VaultError, VaultResult};

/// One secret's encrypted state and lifecycle metadata.
///
/// `decrypted` is advisory: it marks the window between a retrieval's
/// decrypt step and its wipe step so the sweeps can spot entries whose
/// caller bypassed the guaranteed-cleanup path.
#[derive(Debug)]
struct SecretEntry {
    /// Hex of `nonce ‖ encrypted-bytes`
    ciphertext: String,
    /// Argon2id PHC string of the plaintext, computed once at load time
    /// and never recomputed on re-encryption
    fingerprint: String,
    decrypted: bool,
    last_accessed: Instant,
}

/// The in-memory map of secret key → encrypted entry.
pub struct SecretLedger {
    crypto: CryptoEngine,
    entries: HashMap<String, SecretEntry>,
}

impl SecretLedger {
    pub fn new(crypto: CryptoEngine) -> Self {
        Self {
            crypto,
            entries: HashMap::new(),
        }
    }

    /// Ingest a batch of plaintext secrets.
    ///
    /// Each value is fingerprinted, encrypted under a fresh nonce, and
    /// inserted, overwriting any previous entry for the key (the refresh
    /// path relies on this). The plaintext buffers wipe themselves on
    /// drop. An empty batch is fatal: no secrets means no safe startup.
    pub fn load(&mut self, secrets: Vec<(String, Zeroizing<String>)>) -> VaultResult<usize> {
        if secrets.is_empty() {
            return Err(VaultError::LoadFailed("bootstrap produced no secrets".into()));
        }

        let count = secrets.len();
        for (key, plaintext) in secrets {
            self.insert(key, &plaintext)?;
        }

        debug!(count, "secrets loaded into ledger");
        Ok(count)
    }

    /// Store a single runtime-generated secret through the same
    /// fingerprint-and-encrypt path as the bulk load.
    pub fn store(&mut self, key: &str, plaintext: String) -> VaultResult<()> {
        let plaintext = Zeroizing::new(plaintext);
        self.insert(key.to_string(), &plaintext)
    }

    fn insert(&mut self, key: String, plaintext: &str) -> VaultResult<()> {
        let fingerprint = crypto::fingerprint(plaintext)?;
        let ciphertext = self.crypto.encrypt(plaintext);

        self.entries.insert(
            key,
            SecretEntry {
                ciphertext,
                fingerprint,
                decrypted: false,
                last_accessed: Instant::now(),
            },
        );
        Ok(())
    }

    /// Decrypt `key` and mark it exposed.
    ///
    /// The facade pairs this with [`finish_retrieval`](Self::finish_retrieval)
    /// once the usage closure returns; the two halves together bound the
    /// exposure window to the closure's extent.
    pub(crate) fn begin_retrieval(
        &mut self,
        key: &str,
        now: Instant,
    ) -> VaultResult<Zeroizing<String>> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| VaultError::NotFound(key.to_string()))?;

        let plaintext = self.crypto.decrypt(&entry.ciphertext)?;
        entry.decrypted = true;
        entry.last_accessed = now;
        Ok(plaintext)
    }

    /// Wipe-side bookkeeping after a retrieval's usage closure returns.
    pub(crate) fn finish_retrieval(&mut self, key: &str, now: Instant) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.decrypted = false;
            entry.last_accessed = now;
        }
    }

    /// Rotate `key` onto a fresh nonce once it has sat decrypted past the
    /// cooldown. The fingerprint is never recomputed.
    pub fn reencrypt(&mut self, key: &str, cooldown: Duration, now: Instant) -> VaultResult<()> {
        let entry = self
            .entries
            .get_mut(key)
            .ok_or_else(|| VaultError::NotFound(key.to_string()))?;

        if !entry.decrypted || now.saturating_duration_since(entry.last_accessed) < cooldown {
            debug!(key, "secret not eligible for re-encryption");
            return Ok(());
        }

        let plaintext = self.crypto.decrypt(&entry.ciphertext)?;
        entry.ciphertext = self.crypto.encrypt(&plaintext);
        entry.decrypted = false;
        entry.last_accessed = now;
        debug!(key, "secret re-encrypted");
        Ok(())
    }

    /// Force entries that have sat decrypted past `timeout` back to
    /// encrypted; returns how many were swept.
    ///
    /// Each hit means a caller bypassed the guaranteed-cleanup path. The
    /// sweep heals the state but the warning should be treated as a bug
    /// report in monitoring.
    pub fn sweep_expired(&mut self, timeout: Duration, now: Instant) -> usize {
        let crypto = &self.crypto;
        let mut swept = 0;

        for (key, entry) in self.entries.iter_mut() {
            if !entry.decrypted || now.saturating_duration_since(entry.last_accessed) < timeout {
                continue;
            }

            warn!(
                key = key.as_str(),
                "secret remained decrypted past expiry; forcing re-encryption"
            );
            if let Ok(plaintext) = crypto.decrypt(&entry.ciphertext) {
                entry.ciphertext = crypto.encrypt(&plaintext);
            }
            entry.decrypted = false;
            entry.last_accessed = now;
            swept += 1;
        }

        swept
    }

    /// Unconditionally rotate every currently-decrypted entry; returns how
    /// many were rotated. Runs on a timer and on graceful shutdown.
    pub fn batch_reencrypt_all(&mut self) -> usize {
        let crypto = &self.crypto;
        let mut rotated = 0;

        for (key, entry) in self.entries.iter_mut() {
            if !entry.decrypted {
                continue;
            }

            debug!(key = key.as_str(), "re-encrypting secret");
            if let Ok(plaintext) = crypto.decrypt(&entry.ciphertext) {
                entry.ciphertext = crypto.encrypt(&plaintext);
            }
            entry.decrypted = false;
            entry.last_accessed = Instant::now();
            rotated += 1;
        }

        rotated
    }

    /// Forced nonce rotation and flag reset for the named keys, regardless
    /// of cooldowns. Unknown keys are logged and skipped.
    pub fn clear(&mut self, keys: &[&str]) -> usize {
        let mut cleared = 0;

        for &key in keys {
            let Some(entry) = self.entries.get_mut(key) else {
                warn!(key, "cannot clear unknown secret");
                continue;
            };

            if let Ok(plaintext) = self.crypto.decrypt(&entry.ciphertext) {
                entry.ciphertext = self.crypto.encrypt(&plaintext);
            }
            entry.decrypted = false;
            entry.last_accessed = Instant::now();
            cleared += 1;
        }

        cleared
    }

    /// Fingerprints of every held secret, for the redactor.
    pub fn fingerprints(&self) -> Vec<&str> {
        self.entries
            .values()
            .map(|entry| entry.fingerprint.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn crypto(&self) -> &CryptoEngine {
        &self.crypto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SecretLedger {
        SecretLedger::new(CryptoEngine::new("unit-test-master-key".to_string()).unwrap())
    }

    #[test]
    fn test_load_rejects_empty_batch() {
        let mut ledger = ledger();
        let result = ledger.load(Vec::new());
        assert!(matches!(result, Err(VaultError::LoadFailed(_))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_retrieval_lifecycle() {
        let mut ledger = ledger();
        ledger.store("API_KEY", "sk-12345".to_string()).unwrap();

        let now = Instant::now();
        let plaintext = ledger.begin_retrieval("API_KEY", now).unwrap();
        assert_eq!(plaintext.as_str(), "sk-12345");
        assert!(ledger.entries["API_KEY"].decrypted);

        drop(plaintext);
        ledger.finish_retrieval("API_KEY", now);
        assert!(!ledger.entries["API_KEY"].decrypted);
    }

    #[test]
    fn test_begin_retrieval_unknown_key() {
        let mut ledger = ledger();
        let result = ledger.begin_retrieval("NOT_A_KEY", Instant::now());
        assert!(matches!(result, Err(VaultError::NotFound(_))));
    }

    #[test]
    fn test_reencrypt_rotates_nonce_and_keeps_fingerprint() {
        let mut ledger = ledger();
        ledger.store("TOKEN", "tok-abc".to_string()).unwrap();

        let now = Instant::now();
        ledger.begin_retrieval("TOKEN", now).unwrap();
        let ciphertext_before = ledger.entries["TOKEN"].ciphertext.clone();
        let fingerprint_before = ledger.entries["TOKEN"].fingerprint.clone();

        let cooldown = Duration::from_secs(30);
        ledger
            .reencrypt("TOKEN", cooldown, now + Duration::from_secs(31))
            .unwrap();

        let entry = &ledger.entries["TOKEN"];
        assert_ne!(entry.ciphertext, ciphertext_before);
        assert_eq!(entry.fingerprint, fingerprint_before);
        assert!(!entry.decrypted);

        // The new ciphertext still decrypts, and the load-time fingerprint
        // still verifies after the rotation.
        let plaintext = ledger.begin_retrieval("TOKEN", now).unwrap();
        assert_eq!(plaintext.as_str(), "tok-abc");
        assert!(crypto::verify(&fingerprint_before, "tok-abc"));
    }

    #[test]
    fn test_reencrypt_respects_cooldown() {
        let mut ledger = ledger();
        ledger.store("TOKEN", "tok-abc".to_string()).unwrap();

        let now = Instant::now();
        ledger.begin_retrieval("TOKEN", now).unwrap();
        let ciphertext_before = ledger.entries["TOKEN"].ciphertext.clone();

        let cooldown = Duration::from_secs(30);
        ledger
            .reencrypt("TOKEN", cooldown, now + Duration::from_secs(5))
            .unwrap();

        assert_eq!(ledger.entries["TOKEN"].ciphertext, ciphertext_before);
        assert!(ledger.entries["TOKEN"].decrypted);
    }

    #[test]
    fn test_reencrypt_skips_encrypted_entries() {
        let mut ledger = ledger();
        ledger.store("TOKEN", "tok-abc".to_string()).unwrap();

        let ciphertext_before = ledger.entries["TOKEN"].ciphertext.clone();
        ledger
            .reencrypt("TOKEN", Duration::ZERO, Instant::now() + Duration::from_secs(60))
            .unwrap();

        assert_eq!(ledger.entries["TOKEN"].ciphertext, ciphertext_before);
    }

    #[test]
    fn test_sweep_forces_expired_entries() {
        let mut ledger = ledger();
        ledger.store("A", "value-a".to_string()).unwrap();
        ledger.store("B", "value-b".to_string()).unwrap();

        let now = Instant::now();
        ledger.begin_retrieval("A", now).unwrap();
        ledger.begin_retrieval("B", now).unwrap();

        let timeout = Duration::from_secs(10);
        let swept = ledger.sweep_expired(timeout, now + Duration::from_secs(11));
        assert_eq!(swept, 2);
        assert!(!ledger.entries["A"].decrypted);
        assert!(!ledger.entries["B"].decrypted);

        // Swept entries are intact: they decrypt to the original values.
        let plaintext = ledger.begin_retrieval("A", now).unwrap();
        assert_eq!(plaintext.as_str(), "value-a");
    }

    #[test]
    fn test_sweep_ignores_recent_entries() {
        let mut ledger = ledger();
        ledger.store("A", "value-a".to_string()).unwrap();

        let now = Instant::now();
        ledger.begin_retrieval("A", now).unwrap();

        let swept = ledger.sweep_expired(Duration::from_secs(10), now + Duration::from_secs(1));
        assert_eq!(swept, 0);
        assert!(ledger.entries["A"].decrypted);
    }

    #[test]
    fn test_batch_reencrypt_rotates_all_decrypted() {
        let mut ledger = ledger();
        ledger.store("A", "value-a".to_string()).unwrap();
        ledger.store("B", "value-b".to_string()).unwrap();

        let now = Instant::now();
        ledger.begin_retrieval("A", now).unwrap();

        assert_eq!(ledger.batch_reencrypt_all(), 1);
        assert!(!ledger.entries["A"].decrypted);
        assert_eq!(ledger.batch_reencrypt_all(), 0);
    }

    #[test]
    fn test_clear_rotates_named_keys() {
        let mut ledger = ledger();
        ledger.store("A", "value-a".to_string()).unwrap();

        let ciphertext_before = ledger.entries["A"].ciphertext.clone();
        assert_eq!(ledger.clear(&["A", "UNKNOWN"]), 1);
        assert_ne!(ledger.entries["A"].ciphertext, ciphertext_before);
    }

    #[test]
    fn test_load_overwrites_existing_keys() {
        let mut ledger = ledger();
        ledger.store("A", "old".to_string()).unwrap();

        ledger
            .load(vec![("A".to_string(), Zeroizing::new("new".to_string()))])
            .unwrap();

        let plaintext = ledger.begin_retrieval("A", Instant::now()).unwrap();
        assert_eq!(plaintext.as_str(), "new");
    }
}
