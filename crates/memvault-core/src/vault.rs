//! The vault facade
//!
//! One `Vault` per process, built by [`Vault::bootstrap`] and shared
//! behind an `Arc`. A single coarse lock guards the ledger, the access
//! limiter, and the sealed-passphrase slot: a retrieval's decrypt →
//! usage → wipe sequence is atomic with respect to the maintenance
//! sweeps. Usage closures run under that lock, so they must be short and
//! must not call back into the vault.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto::CryptoEngine;
use crate::error::{VaultError, VaultResult};
use crate::ledger::SecretLedger;
use crate::limiter::{AccessDecision, AccessLimiter};
use crate::loader::{self, SealerConfig};
use crate::models::{SecretBatch, SecretLookup, VaultConfig};
use crate::redact::Redactor;

struct VaultInner {
    ledger: SecretLedger,
    limiter: AccessLimiter,
    /// Bootstrap passphrase, encrypted under the vault key and re-sealed
    /// with a fresh nonce after every use. Never stored in the ledger.
    sealed_passphrase: Option<String>,
}

/// In-process encrypted secrets vault.
pub struct Vault {
    config: VaultConfig,
    sealer: SealerConfig,
    inner: Mutex<VaultInner>,
}

impl Vault {
    /// Run the full bootstrap: unseal the secrets file, encrypt every
    /// entry into the ledger, then seal the passphrase itself and wipe
    /// the caller's copy.
    ///
    /// Any failure is fatal — the vault never exists partially
    /// initialized.
    pub fn bootstrap(
        config: VaultConfig,
        sealer: SealerConfig,
        master_key: String,
        passphrase: String,
    ) -> VaultResult<Self> {
        let passphrase = Zeroizing::new(passphrase);
        let crypto = CryptoEngine::new(master_key)?;

        let blob = sealer.unseal(&passphrase)?;
        let secrets = loader::parse_bootstrap(&blob)?;

        let mut ledger = SecretLedger::new(crypto);
        let count = ledger.load(secrets)?;

        let sealed_passphrase = Some(ledger.crypto().encrypt(&passphrase));
        let limiter = AccessLimiter::new(config.max_attempts, config.window_duration);

        info!(count, "vault bootstrapped");

        Ok(Self {
            config,
            sealer,
            inner: Mutex::new(VaultInner {
                ledger,
                limiter,
                sealed_passphrase,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, VaultInner> {
        // The guarded state is flags and maps; a panicked usage closure
        // leaves at worst a decrypted=true flag, which the expiry sweep
        // heals and reports.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest a pre-decrypted map of secrets. The bootstrap path already
    /// wraps this; it is exposed for embedders that source the one-time
    /// blob themselves.
    pub fn load(&self, secrets: Vec<(String, String)>) -> VaultResult<usize> {
        let secrets = secrets
            .into_iter()
            .map(|(key, value)| (key, Zeroizing::new(value)))
            .collect();
        self.lock().ledger.load(secrets)
    }

    /// Store a single runtime-generated secret.
    pub fn store(&self, key: &str, plaintext: String) -> VaultResult<()> {
        self.lock().ledger.store(key, plaintext)
    }

    /// Decrypt `key` and hand the plaintext to `usage`.
    ///
    /// The plaintext lives only for the closure's extent: the buffer
    /// zeroizes itself and the entry is re-flagged before this returns.
    /// The closure is the only place plaintext is observable; the API
    /// never returns it by value.
    pub fn retrieve<T>(&self, key: &str, usage: impl FnOnce(&str) -> T) -> VaultResult<T> {
        let mut inner = self.lock();
        let now = Instant::now();

        if inner.limiter.check_and_record_at(key, now) == AccessDecision::RateLimited {
            warn!(key, "rate limit exceeded for secret");
            return Err(VaultError::RateLimited(key.to_string()));
        }

        let plaintext = match inner.ledger.begin_retrieval(key, now) {
            Ok(plaintext) => plaintext,
            Err(VaultError::NotFound(key)) => {
                warn!(key = key.as_str(), "secret not found");
                return Err(VaultError::NotFound(key));
            }
            Err(err) => return Err(err),
        };

        let output = usage(&plaintext);

        drop(plaintext);
        inner.ledger.finish_retrieval(key, Instant::now());
        Ok(output)
    }

    /// Batched retrieval. Every requested key gets an explicit outcome
    /// and a partial miss never fails the whole batch; found plaintexts
    /// are wiped when the batch is dropped.
    pub fn retrieve_many<T>(
        &self,
        keys: &[&str],
        usage: impl FnOnce(&SecretBatch) -> T,
    ) -> VaultResult<T> {
        let mut inner = self.lock();
        let now = Instant::now();
        let mut batch = SecretBatch::default();

        for &key in keys {
            if inner.limiter.check_and_record_at(key, now) == AccessDecision::RateLimited {
                warn!(key, "rate limit exceeded for secret");
                batch.insert(key, SecretLookup::RateLimited);
                continue;
            }

            match inner.ledger.begin_retrieval(key, now) {
                Ok(plaintext) => batch.insert(key, SecretLookup::Found(plaintext)),
                Err(VaultError::NotFound(_)) => {
                    warn!(key, "secret not found");
                    batch.insert(key, SecretLookup::NotFound);
                }
                Err(err) => {
                    // A corrupt entry stays an isolated per-key failure.
                    warn!(key, error = %err, "failed to decrypt secret");
                    batch.insert(key, SecretLookup::NotFound);
                }
            }
        }

        let output = usage(&batch);

        drop(batch);
        let done = Instant::now();
        for &key in keys {
            inner.ledger.finish_retrieval(key, done);
        }
        Ok(output)
    }

    /// Rotate `key` onto a fresh nonce once its re-encryption cooldown
    /// has elapsed.
    pub fn reencrypt(&self, key: &str) -> VaultResult<()> {
        self.lock()
            .ledger
            .reencrypt(key, self.config.reencryption_cooldown, Instant::now())
    }

    /// Force entries decrypted for longer than `timeout` back to
    /// encrypted; returns how many were swept.
    pub fn sweep_expired(&self, timeout: Duration) -> usize {
        self.lock().ledger.sweep_expired(timeout, Instant::now())
    }

    /// Unconditionally re-encrypt every currently-decrypted entry. Runs
    /// on a timer and on graceful shutdown.
    pub fn batch_reencrypt_all(&self) -> usize {
        self.lock().ledger.batch_reencrypt_all()
    }

    /// Forced rotation of the named keys regardless of cooldowns.
    pub fn clear(&self, keys: &[&str]) -> usize {
        self.lock().ledger.clear(keys)
    }

    /// Rebuild `value` with all secret occurrences replaced by the
    /// redaction placeholder. The logging pipeline calls this on every
    /// structured record before it reaches a sink.
    pub fn redact(&self, value: &Value) -> Value {
        let inner = self.lock();
        Redactor::new(inner.ledger.fingerprints()).redact(value)
    }

    /// Re-run the sealing tool with the sealed passphrase and re-load the
    /// ledger (additive, overwriting). Used when a caller observes
    /// unexpectedly missing secrets at runtime.
    pub fn refresh(&self) -> VaultResult<()> {
        let mut inner = self.lock();

        let sealed = inner.sealed_passphrase.clone().ok_or_else(|| {
            VaultError::BootstrapFailed("no sealed passphrase available for refresh".into())
        })?;
        let passphrase = inner.ledger.crypto().decrypt(&sealed)?;

        let blob = self.sealer.unseal(&passphrase)?;
        let secrets = loader::parse_bootstrap(&blob)?;
        let count = inner.ledger.load(secrets)?;

        inner.sealed_passphrase = Some(inner.ledger.crypto().encrypt(&passphrase));

        info!(count, "secrets refreshed");
        Ok(())
    }

    /// Graceful shutdown: re-encrypt any decrypted stragglers and wipe
    /// the sealed-passphrase slot.
    pub fn shutdown(&self) {
        let mut inner = self.lock();
        let rotated = inner.ledger.batch_reencrypt_all();
        if let Some(mut sealed) = inner.sealed_passphrase.take() {
            sealed.zeroize();
        }
        info!(rotated, "vault shut down");
    }

    /// Number of secrets currently held.
    pub fn len(&self) -> usize {
        self.lock().ledger.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().ledger.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().ledger.contains(key)
    }
}
