//! Error types for quoteflow.

use std::time::Duration;

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] MailboxError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dedup ledger errors.
///
/// Read errors are surfaced so the pipeline can fail open (treat the
/// inquiry as not yet processed). Write errors after a successful send are
/// the severe case; they risk a duplicate reply on the next poll.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Failed to open ledger store: {0}")]
    Open(String),

    #[error("Ledger read failed: {0}")]
    Read(String),

    #[error("Ledger write failed: {0}")]
    Write(String),

    #[error("Ledger migration failed: {0}")]
    Migration(String),
}

/// Mailbox gateway errors.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("IMAP connection failed: {0}")]
    Connect(String),

    #[error("IMAP login failed for {username}")]
    Login { username: String },

    #[error("Mailbox fetch failed: {0}")]
    Fetch(String),

    #[error("Failed to mark message {id} as handled: {reason}")]
    MarkHandled { id: String, reason: String },

    #[error("Failed to send reply to {to}: {reason}")]
    Send { to: String, reason: String },

    #[error("Fetch task panicked: {0}")]
    TaskPanic(String),
}

/// Quote generation errors.
///
/// The orchestrator performs at most one attempt; an unhandled message is
/// retried on the next scheduled poll, so none of these carry retry state.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Model call timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Upstream model error (status {status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Model returned an empty completion")]
    Empty,
}

/// Operations-channel notification errors. Notification is best-effort;
/// these are logged, never propagated into the dispatch outcome.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier request failed: {0}")]
    Request(String),

    #[error("Notifier API error: {0}")]
    Api(String),
}

/// Pipeline-level errors.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Mailbox fetch failed: {0}")]
    Fetch(String),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
