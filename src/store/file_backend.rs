//! Flat-file ledger backend, the degraded mode.
//!
//! Keeps an in-memory index loaded at startup and rewrites the whole JSON
//! file on every mutation. A missing or corrupt file starts the index
//! empty; construction never fails the pipeline. Entries past the TTL are
//! dropped at load time.
//!
//! File format: `{fingerprint: {processed_at, subject, from}}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::store::traits::{Fingerprint, Ledger, ProcessedMeta};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    processed_at: DateTime<Utc>,
    subject: String,
    from: String,
}

/// File-backed dedup ledger with an in-memory index.
pub struct FileLedger {
    path: PathBuf,
    // Serializes the read-then-rewrite cycle across concurrent callers.
    entries: Mutex<HashMap<String, FileEntry>>,
}

impl FileLedger {
    /// Load the ledger file, tolerating absence and corruption.
    pub fn load(path: &Path, ttl: Duration) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, FileEntry>>(&raw) {
                Ok(mut map) => {
                    let cutoff = Utc::now()
                        - chrono::Duration::from_std(ttl)
                            .unwrap_or_else(|_| chrono::Duration::days(7));
                    let before = map.len();
                    map.retain(|_, e| e.processed_at > cutoff);
                    if map.len() < before {
                        debug!(dropped = before - map.len(), "Dropped expired ledger entries at load");
                    }
                    map
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Corrupt ledger file, starting empty");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable ledger file, starting empty");
                HashMap::new()
            }
        };

        info!(path = %path.display(), entries = entries.len(), "File ledger loaded");

        Self {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &HashMap<String, FileEntry>) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LedgerError::Write(format!("Failed to create ledger directory: {e}")))?;
        }
        let raw = serde_json::to_string(entries)
            .map_err(|e| LedgerError::Write(format!("Failed to serialize ledger: {e}")))?;
        std::fs::write(&self.path, raw)
            .map_err(|e| LedgerError::Write(format!("Failed to write ledger file: {e}")))
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn is_processed(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError> {
        let entries = self.entries.lock().await;
        Ok(entries.contains_key(fingerprint.as_str()))
    }

    async fn mark_processed(
        &self,
        fingerprint: &Fingerprint,
        meta: &ProcessedMeta,
    ) -> Result<(), LedgerError> {
        let mut entries = self.entries.lock().await;
        // Last-write-wins: an existing entry is overwritten, never an error.
        entries.insert(
            fingerprint.as_str().to_string(),
            FileEntry {
                processed_at: Utc::now(),
                subject: meta.subject.clone(),
                from: meta.from.clone(),
            },
        );
        self.persist(&entries)
    }

    async fn prune(&self, max_age: Duration) -> Result<usize, LedgerError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::days(7));

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, e| e.processed_at > cutoff);
        let removed = before - entries.len();

        if removed > 0 {
            self.persist(&entries)?;
            info!(removed, "Pruned expired ledger records");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

    fn fp(n: u32) -> Fingerprint {
        Fingerprint::compute(&format!("subject-{n}"), "kunde@example.com", "date")
    }

    fn meta() -> ProcessedMeta {
        ProcessedMeta {
            subject: "Firmenfeier".into(),
            from: "kunde@example.com".into(),
        }
    }

    #[tokio::test]
    async fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(&dir.path().join("nope.json"), WEEK);
        assert!(!ledger.is_processed(&fp(1)).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();
        let ledger = FileLedger::load(&path, WEEK);
        assert!(!ledger.is_processed(&fp(1)).await.unwrap());
    }

    #[tokio::test]
    async fn mark_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = FileLedger::load(&path, WEEK);
        ledger.mark_processed(&fp(1), &meta()).await.unwrap();

        let reloaded = FileLedger::load(&path, WEEK);
        assert!(reloaded.is_processed(&fp(1)).await.unwrap());
        assert!(!reloaded.is_processed(&fp(2)).await.unwrap());
    }

    #[tokio::test]
    async fn mark_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(&dir.path().join("ledger.json"), WEEK);
        ledger.mark_processed(&fp(1), &meta()).await.unwrap();
        ledger.mark_processed(&fp(1), &meta()).await.unwrap();
        assert!(ledger.is_processed(&fp(1)).await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_dropped_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let ledger = FileLedger::load(&path, WEEK);
        ledger.mark_processed(&fp(1), &meta()).await.unwrap();

        // Reload with a zero TTL: everything is already expired.
        let reloaded = FileLedger::load(&path, Duration::ZERO);
        assert!(!reloaded.is_processed(&fp(1)).await.unwrap());
    }

    #[tokio::test]
    async fn prune_removes_expired_records() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::load(&dir.path().join("ledger.json"), WEEK);
        ledger.mark_processed(&fp(1), &meta()).await.unwrap();

        let removed = ledger.prune(Duration::ZERO).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!ledger.is_processed(&fp(1)).await.unwrap());
    }
}
