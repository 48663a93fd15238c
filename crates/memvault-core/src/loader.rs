//! One-time ingestion of sealed secrets
//!
//! Invokes the external sealing tool to obtain a plaintext JSON blob and
//! parses it strictly before the ledger encrypts it away. The subprocess
//! call is deliberately blocking: it runs at startup and on explicit
//! refresh, never on a request path.

use std::path::PathBuf;
use std::process::Command;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::{VaultError, VaultResult};

/// Attempts before an unseal failure becomes fatal
const UNSEAL_ATTEMPTS: u32 = 3;

/// Pause between unseal attempts
const UNSEAL_RETRY_DELAY: Duration = Duration::from_millis(500);

/// External sealing-tool invocation.
///
/// The tool owns the on-disk format; this side only runs
/// `<program> -d --output-type json --passphrase <pass> <path>` and
/// consumes the one-time plaintext blob it prints.
#[derive(Debug, Clone)]
pub struct SealerConfig {
    pub program: PathBuf,
    pub secrets_path: PathBuf,
}

impl SealerConfig {
    pub fn new(program: impl Into<PathBuf>, secrets_path: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            secrets_path: secrets_path.into(),
        }
    }

    /// Run the sealing tool and return the decrypted JSON blob.
    ///
    /// Non-zero exits and spawn failures are retried a bounded number of
    /// times; exhausting the attempts is fatal.
    pub(crate) fn unseal(&self, passphrase: &str) -> VaultResult<Zeroizing<String>> {
        let mut last_error = String::new();

        for attempt in 1..=UNSEAL_ATTEMPTS {
            let output = Command::new(&self.program)
                .arg("-d")
                .args(["--output-type", "json", "--passphrase"])
                .arg(passphrase)
                .arg(&self.secrets_path)
                .output();

            match output {
                Ok(out) if out.status.success() => {
                    debug!(attempt, "sealing tool produced secrets blob");
                    return match String::from_utf8(out.stdout) {
                        Ok(blob) => Ok(Zeroizing::new(blob)),
                        Err(_) => Err(VaultError::BootstrapFailed(
                            "sealing tool produced non-UTF-8 output".into(),
                        )),
                    };
                }
                Ok(out) => {
                    last_error = String::from_utf8_lossy(&out.stderr).trim().to_string();
                    warn!(attempt, "sealing tool exited non-zero");
                }
                Err(err) => {
                    last_error = err.to_string();
                    warn!(attempt, "failed to spawn sealing tool");
                }
            }

            if attempt < UNSEAL_ATTEMPTS {
                thread::sleep(UNSEAL_RETRY_DELAY);
            }
        }

        Err(VaultError::BootstrapFailed(format!(
            "sealing tool failed after {UNSEAL_ATTEMPTS} attempts: {last_error}"
        )))
    }
}

/// Parse the sealing tool's JSON blob into key/plaintext pairs.
///
/// The blob must be a top-level object. String, number and boolean values
/// are coerced to strings; nulls and nested structures mark the blob
/// malformed, naming only the offending key.
pub(crate) fn parse_bootstrap(blob: &str) -> VaultResult<Vec<(String, Zeroizing<String>)>> {
    let value: Value = serde_json::from_str(blob)
        .map_err(|err| VaultError::BootstrapFailed(format!("invalid secrets JSON: {err}")))?;

    let Value::Object(fields) = value else {
        return Err(VaultError::BootstrapFailed(
            "secrets JSON is not an object".into(),
        ));
    };

    let mut secrets = Vec::with_capacity(fields.len());
    for (key, value) in fields {
        let plaintext = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                return Err(VaultError::BootstrapFailed(format!(
                    "unsupported value type for secret {key}"
                )))
            }
        };
        secrets.push((key, Zeroizing::new(plaintext)));
    }

    Ok(secrets)
}
