//! Cryptographic operations for the secrets store
//!
//! - AES-256-CTR for encrypting individual secret values held in memory
//! - SHA-256 derivation of the cipher key from the process master key
//! - Argon2id fingerprints for redaction matching
//! - Best-effort zeroization of plaintext buffers

use aes::Aes256;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use ctr::cipher::{KeyIvInit, StreamCipher};
use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Size of the derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-value CTR nonce in bytes
pub const NONCE_SIZE: usize = 16;

/// Argon2id memory cost for fingerprints, in KiB
pub const FINGERPRINT_MEMORY_KIB: u32 = 48_640;

/// Argon2id pass count for fingerprints
pub const FINGERPRINT_ITERATIONS: u32 = 4;

/// Argon2id lane count for fingerprints
pub const FINGERPRINT_PARALLELISM: u32 = 1;

/// Symmetric encryption of single secret values.
///
/// The caller-supplied master key is digested into an AES-256 key at
/// construction and the original material is wiped. Each encrypted value
/// carries its own fresh nonce, so re-encrypting the same plaintext never
/// reproduces the same ciphertext.
pub struct CryptoEngine {
    key: Secret<[u8; KEY_SIZE]>,
}

impl CryptoEngine {
    /// Derive the process cipher key from the master key material.
    ///
    /// Empty key material is fatal: no safe operation is possible without
    /// an encryption key. The supplied string is zeroized before return.
    pub fn new(mut master_key: String) -> CryptoResult<Self> {
        if master_key.trim().is_empty() {
            master_key.zeroize();
            return Err(CryptoError::KeyNotInitialized);
        }

        let mut digest = Sha256::new();
        digest.update(master_key.as_bytes());
        let key: [u8; KEY_SIZE] = digest.finalize().into();
        master_key.zeroize();

        Ok(Self {
            key: Secret::new(key),
        })
    }

    /// Encrypt a secret value under a fresh random nonce.
    ///
    /// Output is `hex(nonce) ‖ hex(ciphertext)`. There is no
    /// authentication tag; the ciphertext never leaves the process.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let mut buf = plaintext.as_bytes().to_vec();
        let mut cipher = Aes256Ctr::new(self.key.expose_secret().into(), (&nonce).into());
        cipher.apply_keystream(&mut buf);

        format!("{}{}", hex::encode(nonce), hex::encode(&buf))
    }

    /// Decrypt a stored `hex(nonce) ‖ hex(ciphertext)` value.
    ///
    /// The returned buffer zeroizes itself on drop.
    pub fn decrypt(&self, ciphertext: &str) -> CryptoResult<Zeroizing<String>> {
        let raw = ciphertext.as_bytes();
        if raw.len() < NONCE_SIZE * 2 {
            return Err(CryptoError::Malformed);
        }

        let nonce = hex::decode(&raw[..NONCE_SIZE * 2]).map_err(|_| CryptoError::Malformed)?;
        let mut buf = hex::decode(&raw[NONCE_SIZE * 2..]).map_err(|_| CryptoError::Malformed)?;

        let nonce: [u8; NONCE_SIZE] = nonce.try_into().map_err(|_| CryptoError::Malformed)?;
        let mut cipher = Aes256Ctr::new(self.key.expose_secret().into(), (&nonce).into());
        cipher.apply_keystream(&mut buf);

        match String::from_utf8(buf) {
            Ok(plaintext) => Ok(Zeroizing::new(plaintext)),
            Err(err) => {
                let mut bytes = err.into_bytes();
                bytes.zeroize();
                Err(CryptoError::Malformed)
            }
        }
    }
}

fn fingerprint_hasher() -> CryptoResult<Argon2<'static>> {
    let params = Params::new(
        FINGERPRINT_MEMORY_KIB,
        FINGERPRINT_ITERATIONS,
        FINGERPRINT_PARALLELISM,
        None,
    )
    .map_err(|e| CryptoError::Fingerprint(e.to_string()))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Compute the one-way fingerprint of a plaintext secret.
///
/// Memory-hard (Argon2id, 48640 KiB, 4 passes, 1 lane) with a random salt,
/// independent of the encryption key. Used only to detect occurrences of
/// the secret in log payloads, never to reconstruct it.
pub fn fingerprint(plaintext: &str) -> CryptoResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = fingerprint_hasher()?
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|e| CryptoError::Fingerprint(e.to_string()))?;

    Ok(hash.to_string())
}

/// Check whether a candidate string is the plaintext behind a fingerprint.
///
/// Unparseable fingerprints and mismatches both report `false`.
pub fn verify(fingerprint: &str, candidate: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(fingerprint) else {
        return false;
    };

    Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok()
}

/// Best-effort zeroization of a byte buffer
pub fn secure_clear(data: &mut [u8]) {
    data.zeroize();
}
