//! libSQL ledger backend, the durable keyed store.
//!
//! Supports local file and in-memory databases. `mark_processed` uses
//! `INSERT OR REPLACE`, so marking the same fingerprint twice is a
//! last-write-wins overwrite, never an error.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::LedgerError;
use crate::store::migrations;
use crate::store::traits::{Fingerprint, Ledger, ProcessedMeta};

/// libSQL-backed dedup ledger.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlLedger {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlLedger {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Open(format!("Failed to create ledger directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| LedgerError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| LedgerError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Ledger database opened");

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory ledger (for tests).
    pub async fn new_memory() -> Result<Self, LedgerError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| LedgerError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| LedgerError::Open(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;

        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }
}

#[async_trait]
impl Ledger for LibSqlLedger {
    async fn is_processed(&self, fingerprint: &Fingerprint) -> Result<bool, LedgerError> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM processed_inquiries WHERE fingerprint = ?1",
                params![fingerprint.as_str()],
            )
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?;

        let found = rows
            .next()
            .await
            .map_err(|e| LedgerError::Read(e.to_string()))?
            .is_some();
        Ok(found)
    }

    async fn mark_processed(
        &self,
        fingerprint: &Fingerprint,
        meta: &ProcessedMeta,
    ) -> Result<(), LedgerError> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO processed_inquiries
                    (fingerprint, processed_at, subject, sender)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    fingerprint.as_str(),
                    Utc::now().to_rfc3339(),
                    meta.subject.as_str(),
                    meta.from.as_str(),
                ],
            )
            .await
            .map_err(|e| LedgerError::Write(e.to_string()))?;

        debug!(fingerprint = %fingerprint, subject = %meta.subject, "Marked inquiry processed");
        Ok(())
    }

    async fn prune(&self, max_age: Duration) -> Result<usize, LedgerError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_age)
                .unwrap_or_else(|_| chrono::Duration::days(7));

        let removed = self
            .conn
            .execute(
                "DELETE FROM processed_inquiries WHERE processed_at < ?1",
                params![cutoff.to_rfc3339()],
            )
            .await
            .map_err(|e| LedgerError::Write(e.to_string()))?;

        if removed > 0 {
            info!(removed, "Pruned expired ledger records");
        }
        Ok(removed as usize)
    }
}
