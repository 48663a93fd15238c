//! Fingerprint-based redaction of structured log payloads
//!
//! Every string leaf of a log value is checked against the ledger's
//! fingerprints and replaced with a fixed placeholder on match. Matching
//! is one-way: the redactor never sees stored plaintext, only whether a
//! candidate string hashes to a known fingerprint.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::crypto;

/// Token substituted for any matched secret
pub const PLACEHOLDER: &str = "[REDACTED]";

/// Redacts secret occurrences out of arbitrary log values.
///
/// Holds the ledger's fingerprints for the duration of one redaction
/// pass. Cost is O(leaves × secrets), paid at log emission, off the
/// request path.
pub struct Redactor<'a> {
    fingerprints: Vec<&'a str>,
}

impl<'a> Redactor<'a> {
    pub fn new(fingerprints: Vec<&'a str>) -> Self {
        Self { fingerprints }
    }

    /// Rebuild `value` with every matched string leaf, or matched token
    /// within a leaf, replaced by [`PLACEHOLDER`]. The input is never
    /// mutated, so redaction cannot race with other readers of the
    /// original record.
    pub fn redact(&self, value: &Value) -> Value {
        match value {
            Value::String(leaf) => Value::String(self.redact_str(leaf)),
            Value::Array(items) => Value::Array(items.iter().map(|item| self.redact(item)).collect()),
            Value::Object(fields) => {
                let mut out = Map::with_capacity(fields.len());
                for (key, field) in fields {
                    out.insert(key.clone(), self.redact(field));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    fn redact_str(&self, leaf: &str) -> String {
        if self.matches_secret(leaf) {
            return PLACEHOLDER.to_string();
        }

        // A secret embedded in a longer message is caught token-wise; the
        // matched token is replaced everywhere in the leaf.
        let mut redacted: Option<String> = None;
        let mut seen = HashSet::new();
        for token in leaf.split_whitespace() {
            if !seen.insert(token) {
                continue;
            }
            if self.matches_secret(token) {
                let current = redacted.take().unwrap_or_else(|| leaf.to_string());
                redacted = Some(current.replace(token, PLACEHOLDER));
            }
        }

        redacted.unwrap_or_else(|| leaf.to_string())
    }

    fn matches_secret(&self, candidate: &str) -> bool {
        self.fingerprints
            .iter()
            .any(|fingerprint| crypto::verify(fingerprint, candidate))
    }
}
