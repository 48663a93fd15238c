//! Error types for vault operations

use thiserror::Error;

/// Errors from the crypto engine
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Stored ciphertext could not be split into nonce and payload, was
    /// not valid hex, or did not decrypt to UTF-8
    #[error("malformed ciphertext")]
    Malformed,

    /// No usable master key material; nothing can be encrypted or
    /// decrypted safely without it
    #[error("master encryption key is not initialized")]
    KeyNotInitialized,

    #[error("fingerprint error: {0}")]
    Fingerprint(String),
}

/// Errors from vault operations
///
/// `BootstrapFailed` and `LoadFailed` are fatal: without its secrets the
/// vault cannot exist in a safe state and startup must abort. `NotFound`
/// and `RateLimited` are soft failures the caller decides how to handle.
/// Messages carry key names and outcome codes only, never secret values.
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("bootstrap failed: {0}")]
    BootstrapFailed(String),

    #[error("failed to load secrets: {0}")]
    LoadFailed(String),

    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("rate limit exceeded for secret: {0}")]
    RateLimited(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
pub type VaultResult<T> = Result<T, VaultError>;
