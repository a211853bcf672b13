//! Outbound SMTP via lettre. Blocking; callers run this in `spawn_blocking`.

use std::time::Duration;

use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::MailConfig;
use crate::error::MailboxError;

/// Send a plain-text reply. The alias is the From address.
pub fn send(config: &MailConfig, to: &str, subject: &str, body: &str) -> Result<(), MailboxError> {
    let creds = Credentials::new(config.username.clone(), config.password.clone());

    let transport = SmtpTransport::starttls_relay(&config.smtp_host)
        .map_err(|e| MailboxError::Send {
            to: to.to_string(),
            reason: format!("SMTP relay error: {e}"),
        })?
        .port(config.smtp_port)
        .credentials(creds)
        .timeout(Some(Duration::from_secs(30)))
        .build();

    let email = Message::builder()
        .from(config.alias.parse().map_err(|e| MailboxError::Send {
            to: to.to_string(),
            reason: format!("Invalid from address: {e}"),
        })?)
        .to(to.parse().map_err(|e| MailboxError::Send {
            to: to.to_string(),
            reason: format!("Invalid to address: {e}"),
        })?)
        .subject(subject)
        .body(body.to_string())
        .map_err(|e| MailboxError::Send {
            to: to.to_string(),
            reason: format!("Failed to build email: {e}"),
        })?;

    transport.send(&email).map_err(|e| MailboxError::Send {
        to: to.to_string(),
        reason: format!("SMTP send failed: {e}"),
    })?;

    tracing::info!(to = %to, "Reply sent");
    Ok(())
}
