//! In-process encrypted secrets vault
//!
//! Secrets are ingested once from an external sealing tool, held
//! encrypted in memory, and decrypted per retrieval inside a caller
//! closure with a bounded exposure window. This crate provides:
//! - AES-256-CTR encryption of individual secret values at rest in memory
//! - Argon2id fingerprints for redacting secrets out of log payloads
//! - Sliding-window rate limiting on retrieval
//! - Cooldown-based re-encryption and an expired-secret sweep
//! - Best-effort zeroization of every plaintext buffer

pub mod crypto;
pub mod error;
pub mod ledger;
pub mod limiter;
pub mod loader;
pub mod models;
pub mod redact;
pub mod vault;

pub use crypto::*;
pub use error::*;
pub use ledger::*;
pub use limiter::*;
pub use loader::*;
pub use models::*;
pub use redact::*;
pub use vault::*;
