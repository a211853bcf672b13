//! Reply composition and the send/record/notify sequence.
//!
//! Ordering is the whole point of this module: the ledger is written only
//! AFTER the reply left the SMTP relay. A send failure leaves the inquiry
//! unrecorded so the next poll retries it; a ledger write failure after a
//! successful send is logged at error severity because it risks a
//! duplicate reply.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::mailbox::{Mailbox, RawMessage};
use crate::notify::{Notifier, QuoteEvent};
use crate::quote::QuoteDraft;
use crate::store::{Fingerprint, Ledger, ProcessedMeta};

const SIGNATURE: &str = "\
Mit freundlichen Grüßen
Ihr Jasmin Catering Team

Jasmin Catering
Berlin, Deutschland";

pub struct Dispatcher {
    mailbox: Arc<dyn Mailbox>,
    ledger: Arc<dyn Ledger>,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        ledger: Arc<dyn Ledger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            mailbox,
            ledger,
            notifier,
        }
    }

    /// Send the quote reply, then record the inquiry as processed, mark
    /// the source message handled and mirror the event to the ops channel.
    ///
    /// Only the send itself is fatal. Everything after a successful send
    /// is logged but never returned as an error, since the reply is
    /// already on its way to the customer.
    pub async fn dispatch(
        &self,
        message: &RawMessage,
        fingerprint: &Fingerprint,
        draft: &QuoteDraft,
        tier_prices: BTreeMap<String, String>,
    ) -> Result<(), PipelineError> {
        let reply_subject = format!("Re: {}", message.subject);
        let reply_body = compose_reply(message, draft);

        self.mailbox
            .send_reply(&message.from, &reply_subject, &reply_body)
            .await
            .map_err(|e| PipelineError::Dispatch(e.to_string()))?;

        info!(
            to = %message.from,
            subject = %message.subject,
            "Quote reply sent"
        );

        let meta = ProcessedMeta {
            subject: message.subject.clone(),
            from: message.from.clone(),
        };
        if let Err(e) = self.ledger.mark_processed(fingerprint, &meta).await {
            // Reply is out but the dedup record is missing; the next poll
            // may answer this inquiry again.
            error!(
                fingerprint = %fingerprint,
                error = %e,
                "Ledger write failed after send, duplicate reply possible"
            );
        }

        if let Err(e) = self.mailbox.mark_handled(&message.id).await {
            warn!(id = %message.id, error = %e, "Failed to mark source message handled");
        }

        let event = QuoteEvent::from_draft(
            &message.subject,
            &message.from,
            &message.body,
            draft,
            tier_prices,
        );
        if let Err(e) = self.notifier.post_event(&event).await {
            warn!(error = %e, "Ops notification failed");
        }

        Ok(())
    }
}

/// Assemble the outbound reply: quote text, source attribution, signature
/// and a quote-back of the original inquiry.
pub fn compose_reply(message: &RawMessage, draft: &QuoteDraft) -> String {
    let mut reply = String::with_capacity(draft.raw_text.len() + 512);
    reply.push_str(draft.raw_text.trim_end());
    reply.push_str("\n\n");

    if !draft.documents_used.is_empty() {
        reply.push_str("---\n");
        reply.push_str("Diese Antwort wurde mit folgenden Wissensdokumenten erstellt:\n");
        for title in &draft.documents_used {
            reply.push_str(&format!("- {title}\n"));
        }
        reply.push_str("\n");
    }

    reply.push_str(SIGNATURE);
    reply.push_str("\n\n");

    reply.push_str("==============================\n");
    reply.push_str("URSPRÜNGLICHE ANFRAGE\n");
    reply.push_str("==============================\n");
    reply.push_str(&format!("Von: {}\n", message.from));
    reply.push_str(&format!("Datum: {}\n", message.date));
    reply.push_str(&format!("Betreff: {}\n", message.subject));
    reply.push_str("------------------------------\n");
    reply.push_str(&message.body);

    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;

    fn message() -> RawMessage {
        RawMessage {
            id: "42".into(),
            subject: "Catering für Geburtstagsfeier".into(),
            body: "Wir sind 40 Personen.".into(),
            from: "kunde@example.com".into(),
            date: "2026-08-28T09:00:00+00:00".into(),
            received_at: Utc::now(),
        }
    }

    fn draft() -> QuoteDraft {
        QuoteDraft {
            raw_text: "Gerne! Basis-Paket: 25-35€ pro Person.\n".into(),
            documents_used: vec!["Business Conditions".into()],
            latency: Duration::from_millis(900),
            token_usage: None,
        }
    }

    #[test]
    fn reply_contains_quote_sources_signature_and_quote_back() {
        let reply = compose_reply(&message(), &draft());

        let quote_pos = reply.find("Basis-Paket").unwrap();
        let sources_pos = reply.find("Wissensdokumenten").unwrap();
        let signature_pos = reply.find("Jasmin Catering Team").unwrap();
        let quote_back_pos = reply.find("URSPRÜNGLICHE ANFRAGE").unwrap();
        assert!(quote_pos < sources_pos);
        assert!(sources_pos < signature_pos);
        assert!(signature_pos < quote_back_pos);

        assert!(reply.contains("- Business Conditions"));
        assert!(reply.contains("Von: kunde@example.com"));
        assert!(reply.contains("Datum: 2026-08-28T09:00:00+00:00"));
        assert!(reply.contains("Betreff: Catering für Geburtstagsfeier"));
        assert!(reply.contains("Wir sind 40 Personen."));
    }

    #[test]
    fn reply_without_sources_skips_attribution() {
        let mut d = draft();
        d.documents_used.clear();
        let reply = compose_reply(&message(), &d);
        assert!(!reply.contains("Wissensdokumenten"));
        assert!(reply.contains("URSPRÜNGLICHE ANFRAGE"));
    }
}
