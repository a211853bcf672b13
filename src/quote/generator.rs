//! Assembles the grounded prompt and runs one bounded generation attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::info;

use crate::config::BusinessConfig;
use crate::error::GenerationError;
use crate::llm::{CompletionRequest, GenerativeModel, TokenUsage};
use crate::retrieval::RetrievalResult;

/// A generated quote plus the provenance the dispatcher and notifier need.
#[derive(Debug, Clone)]
pub struct QuoteDraft {
    pub raw_text: String,
    /// Titles of the knowledge documents fed into the prompt.
    pub documents_used: Vec<String>,
    pub latency: Duration,
    pub token_usage: Option<TokenUsage>,
}

/// Drafts quotes through an injected [`GenerativeModel`]. One attempt per
/// inquiry; a failed attempt surfaces as an error and the inquiry stays
/// unprocessed for the next poll.
pub struct QuoteGenerator {
    model: Arc<dyn GenerativeModel>,
    business: BusinessConfig,
    temperature: f32,
    max_tokens: u32,
    /// Outer wall-clock bound on the whole attempt, independent of any
    /// transport-level timeout inside the model.
    timeout: Duration,
}

impl QuoteGenerator {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        business: BusinessConfig,
        temperature: f32,
        max_tokens: u32,
        generation_timeout: Duration,
    ) -> Self {
        Self {
            model,
            business,
            temperature,
            max_tokens,
            timeout: generation_timeout,
        }
    }

    pub async fn generate(
        &self,
        subject: &str,
        body: &str,
        context: &[RetrievalResult],
    ) -> Result<QuoteDraft, GenerationError> {
        let request = CompletionRequest {
            system_prompt: self.system_prompt(context),
            user_prompt: format!("Betreff: {subject}\n\n{body}"),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let started = std::time::Instant::now();
        let response = timeout(self.timeout, self.model.complete(request))
            .await
            .map_err(|_| GenerationError::Timeout {
                timeout: self.timeout,
            })??;
        let latency = started.elapsed();

        if response.text.trim().is_empty() {
            return Err(GenerationError::Empty);
        }

        info!(
            latency_ms = latency.as_millis() as u64,
            documents = context.len(),
            "Quote draft generated"
        );

        Ok(QuoteDraft {
            raw_text: response.text,
            documents_used: context.iter().map(|r| r.document.title.clone()).collect(),
            latency,
            token_usage: response.usage,
        })
    }

    /// German system prompt grounding the model in the business constants
    /// and the retrieved knowledge excerpts.
    fn system_prompt(&self, context: &[RetrievalResult]) -> String {
        let biz = &self.business;
        let mut prompt = format!(
            "Du bist ein professioneller Catering-Berater für {name} in {location}.\n\
             Servicegebiet: {area}. Mindestbestellung: {min} Personen. \
             Vorlaufzeit: mindestens {notice} Stunden.\n\n\
             Erstelle für jede Anfrage IMMER drei Angebotsvarianten pro Person:\n\
             1. {basis}: {b0}-{b1}€ pro Person\n\
             2. {standard}: {s0}-{s1}€ pro Person\n\
             3. {premium}: {p0}-{p1}€ pro Person\n\n\
             Rabatte (kumulierbar bis maximal {cap}%): Werktage {wd}%, \
             Großgruppen {lg}%, gemeinnützige Organisationen {np}%, \
             Stammkunden {loy}%.\n\
             Zuschläge: Wochenende {we}%, kurzfristige Buchung {rush}%, \
             Feiertage {hol}%, Sommersaison {sum}%.\n\n\
             Antworte auf Deutsch, freundlich und konkret. Nenne immer \
             Preise pro Person in Euro.\n",
            name = biz.name,
            location = biz.location,
            area = biz.service_area,
            min = biz.min_order,
            notice = biz.advance_notice_hours,
            basis = biz.basis.name,
            b0 = biz.basis.price_range.0,
            b1 = biz.basis.price_range.1,
            standard = biz.standard.name,
            s0 = biz.standard.price_range.0,
            s1 = biz.standard.price_range.1,
            premium = biz.premium.name,
            p0 = biz.premium.price_range.0,
            p1 = biz.premium.price_range.1,
            cap = biz.discount_cap,
            wd = biz.discounts.weekday,
            lg = biz.discounts.large_group,
            np = biz.discounts.nonprofit,
            loy = biz.discounts.loyalty,
            we = biz.surcharges.weekend,
            rush = biz.surcharges.rush,
            hol = biz.surcharges.holiday,
            sum = biz.surcharges.summer,
        );

        if !context.is_empty() {
            prompt.push_str("\nWissensdokumente:\n");
            for result in context {
                prompt.push_str(&format!(
                    "\n## {} (Relevanz: {})\n{}\n",
                    result.document.title,
                    result.score,
                    result.snippet()
                ));
            }
        }

        prompt
    }
}
