//! Pipeline data types.

use crate::mailbox::RawMessage;
use crate::store::Fingerprint;

/// A fetched message together with its dedup identity.
#[derive(Debug, Clone)]
pub struct Inquiry {
    pub message: RawMessage,
    pub fingerprint: Fingerprint,
}

impl Inquiry {
    pub fn new(message: RawMessage) -> Self {
        let fingerprint = Fingerprint::compute(&message.subject, &message.from, &message.date);
        Self {
            message,
            fingerprint,
        }
    }
}

/// What happened to a single inquiry during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InquiryOutcome {
    /// Quote generated and reply sent.
    Replied,
    /// Subject carried a reply marker; never quoted.
    SkippedReply,
    /// No catering keyword matched.
    SkippedIrrelevant,
    /// Ledger already holds this fingerprint.
    AlreadyProcessed,
    /// Generation or dispatch failed; retried on the next poll.
    Failed(String),
}

impl InquiryOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Replied => "replied",
            Self::SkippedReply => "skipped_reply",
            Self::SkippedIrrelevant => "skipped_irrelevant",
            Self::AlreadyProcessed => "already_processed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages fetched from the mailbox.
    pub fetched: usize,
    /// Messages that passed the relevance gate.
    pub relevant: usize,
    /// Quote drafts produced.
    pub quoted: usize,
    /// Replies actually sent.
    pub sent: usize,
    /// Inquiries that ended in `Failed`.
    pub errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &InquiryOutcome) {
        match outcome {
            InquiryOutcome::Replied => {
                self.relevant += 1;
                self.quoted += 1;
                self.sent += 1;
            }
            InquiryOutcome::Failed(_) => {
                self.relevant += 1;
                self.errors += 1;
            }
            InquiryOutcome::SkippedReply
            | InquiryOutcome::SkippedIrrelevant
            | InquiryOutcome::AlreadyProcessed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_outcomes() {
        let mut summary = RunSummary::default();
        summary.fetched = 4;
        summary.record(&InquiryOutcome::Replied);
        summary.record(&InquiryOutcome::SkippedIrrelevant);
        summary.record(&InquiryOutcome::AlreadyProcessed);
        summary.record(&InquiryOutcome::Failed("model timeout".into()));

        assert_eq!(summary.relevant, 2);
        assert_eq!(summary.quoted, 1);
        assert_eq!(summary.sent, 1);
        assert_eq!(summary.errors, 1);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(InquiryOutcome::Replied.label(), "replied");
        assert_eq!(InquiryOutcome::Failed(String::new()).label(), "failed");
    }
}
