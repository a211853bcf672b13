//! `Ledger` trait and the inquiry fingerprint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Deterministic digest over an inquiry's identifying metadata.
///
/// Two fetches of the same physical message yield the same fingerprint;
/// the digest covers `subject || from || date` so it survives IMAP UID
/// churn across sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute the fingerprint for an inquiry.
    pub fn compute(subject: &str, from: &str, date: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subject.as_bytes());
        hasher.update(from.as_bytes());
        hasher.update(date.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metadata stored alongside a processed fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedMeta {
    pub subject: String,
    pub from: String,
}

/// Backend-agnostic dedup ledger. The persisted record (fingerprint,
/// processing time, subject, sender) is an implementation detail of each
/// backend; callers only ever probe by fingerprint.
///
/// `mark_processed` is idempotent with last-write-wins semantics in both
/// backends: marking the same fingerprint twice overwrites the record and
/// never errors.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Has this fingerprint already been handled?
    async fn is_processed(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError>;

    /// Record a fingerprint as handled.
    async fn mark_processed(
        &self,
        fingerprint: &Fingerprint,
        meta: &ProcessedMeta,
    ) -> Result<(), LedgerError>;

    /// Delete records older than `max_age`. Returns the number removed.
    /// Advisory housekeeping; correctness of `is_processed` does not
    /// depend on it.
    async fn prune(&self, max_age: Duration) -> Result<usize, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable() {
        let a = Fingerprint::compute("Geburtstagsfeier", "kunde@example.com", "Mon, 1 Jan 2026");
        let b = Fingerprint::compute("Geburtstagsfeier", "kunde@example.com", "Mon, 1 Jan 2026");
        assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_differs_across_messages() {
        let a = Fingerprint::compute("Hochzeit", "a@example.com", "Mon, 1 Jan 2026");
        let b = Fingerprint::compute("Hochzeit", "b@example.com", "Mon, 1 Jan 2026");
        assert_ne!(a, b);
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        let fp = Fingerprint::compute("s", "f", "d");
        assert_eq!(fp.as_str().len(), 64);
        assert!(fp.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
