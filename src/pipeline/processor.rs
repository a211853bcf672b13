//! The per-run orchestrator: fetch, gate, dedup, retrieve, generate,
//! dispatch. One failed inquiry never aborts the batch.

use std::sync::Arc;

use tracing::{info, warn};

use crate::dispatch::Dispatcher;
use crate::error::PipelineError;
use crate::mailbox::Mailbox;
use crate::notify::Notifier;
use crate::pipeline::classifier;
use crate::pipeline::types::{Inquiry, InquiryOutcome, RunSummary};
use crate::quote::{extract_tier_prices, QuoteGenerator};
use crate::retrieval::Corpus;

/// Documents handed to the generator per inquiry.
const RETRIEVAL_TOP_K: usize = 3;

pub struct InquiryPipeline {
    mailbox: Arc<dyn Mailbox>,
    ledger: Arc<dyn crate::store::Ledger>,
    corpus: Corpus,
    generator: QuoteGenerator,
    dispatcher: Dispatcher,
    notifier: Arc<dyn Notifier>,
}

impl InquiryPipeline {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        ledger: Arc<dyn crate::store::Ledger>,
        corpus: Corpus,
        generator: QuoteGenerator,
        dispatcher: Dispatcher,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            mailbox,
            ledger,
            corpus,
            generator,
            dispatcher,
            notifier,
        }
    }

    /// Run the pipeline once over the current mailbox contents.
    pub async fn run_once(&self) -> Result<RunSummary, PipelineError> {
        let messages = self
            .mailbox
            .list_candidates()
            .await
            .map_err(|e| PipelineError::Fetch(e.to_string()))?;

        let mut summary = RunSummary {
            fetched: messages.len(),
            ..Default::default()
        };

        for message in messages {
            let inquiry = Inquiry::new(message);
            let subject = inquiry.message.subject.clone();
            let outcome = self.process(inquiry).await;
            info!(subject = %subject, outcome = outcome.label(), "Inquiry handled");

            if let InquiryOutcome::Failed(reason) = &outcome {
                warn!(subject = %subject, reason = %reason, "Inquiry failed, will retry next poll");
                let line = format!("Anfrage fehlgeschlagen: {subject} ({reason})");
                if let Err(e) = self.notifier.log(&line).await {
                    warn!(error = %e, "Failed to report inquiry error to ops channel");
                }
            }

            summary.record(&outcome);
        }

        info!(
            fetched = summary.fetched,
            relevant = summary.relevant,
            quoted = summary.quoted,
            sent = summary.sent,
            errors = summary.errors,
            "Pipeline run complete"
        );

        if summary.fetched > 0 {
            let line = format!(
                "Durchlauf abgeschlossen: {} abgerufen, {} relevant, {} beantwortet, {} Fehler",
                summary.fetched, summary.relevant, summary.sent, summary.errors
            );
            if let Err(e) = self.notifier.log(&line).await {
                warn!(error = %e, "Failed to post run summary to ops channel");
            }
        }

        Ok(summary)
    }

    async fn process(&self, inquiry: Inquiry) -> InquiryOutcome {
        let message = &inquiry.message;

        if classifier::is_reply(&message.subject) {
            self.mark_handled_quietly(&message.id).await;
            return InquiryOutcome::SkippedReply;
        }

        if !classifier::is_relevant(&message.subject, &message.body) {
            self.mark_handled_quietly(&message.id).await;
            return InquiryOutcome::SkippedIrrelevant;
        }

        // A ledger read failure fails open: better to risk one duplicate
        // quote than to silently drop a customer inquiry.
        match self.ledger.is_processed(&inquiry.fingerprint).await {
            Ok(true) => {
                self.mark_handled_quietly(&message.id).await;
                return InquiryOutcome::AlreadyProcessed;
            }
            Ok(false) => {}
            Err(e) => {
                warn!(
                    fingerprint = %inquiry.fingerprint,
                    error = %e,
                    "Ledger read failed, treating inquiry as new"
                );
            }
        }

        let query = format!("{} {}", message.subject, message.body);
        let context = self.corpus.retrieve(&query, RETRIEVAL_TOP_K);

        let draft = match self
            .generator
            .generate(&message.subject, &message.body, &context)
            .await
        {
            Ok(draft) => draft,
            Err(e) => return InquiryOutcome::Failed(e.to_string()),
        };

        let tier_prices = extract_tier_prices(&draft.raw_text);
        if tier_prices.is_empty() {
            warn!(subject = %message.subject, "No tier prices found in quote draft");
        }

        match self
            .dispatcher
            .dispatch(message, &inquiry.fingerprint, &draft, tier_prices)
            .await
        {
            Ok(()) => InquiryOutcome::Replied,
            Err(e) => InquiryOutcome::Failed(e.to_string()),
        }
    }

    /// Marking a skipped message as handled is housekeeping; failure only
    /// means the message is re-examined (and re-skipped) next poll.
    async fn mark_handled_quietly(&self, id: &str) {
        if let Err(e) = self.mailbox.mark_handled(id).await {
            warn!(id = %id, error = %e, "Failed to mark skipped message handled");
        }
    }
}
