//! Dedup ledger: persistent record of processed inquiries.
//!
//! Two backends implement the same [`Ledger`] trait: a durable libSQL
//! store and a flat-file fallback. The backend is selected once at
//! startup from [`crate::config::LedgerBackend`].

mod file_backend;
mod libsql_backend;
mod migrations;
mod traits;

pub use file_backend::FileLedger;
pub use libsql_backend::LibSqlLedger;
pub use traits::{Fingerprint, Ledger, ProcessedMeta};
