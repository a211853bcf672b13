//! Knowledge retrieval: lexical scoring over a small static corpus.
//!
//! Term-frequency matching, not semantic search; the corpus is a handful
//! of static documents and results must be deterministic. Scores are raw
//! occurrence counts with no length or rarity normalization.

use std::path::Path;

use tracing::{info, warn};

/// Document id that must always reach the generator: the quote cannot be
/// priced without the business terms.
pub const PRICING_DOC_ID: &str = "business-conditions";

/// Query terms at or below this length are ignored when scoring.
const MIN_TERM_LEN: usize = 3;

/// Documents are excerpted to this many characters for the prompt.
const SNIPPET_LEN: usize = 1000;

/// Score assigned to the force-included pricing document when it did not
/// match lexically.
const FORCED_SCORE: usize = 1;

/// A knowledge document. Static, read-only during a run.
#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    pub id: String,
    pub title: String,
    pub category: String,
    pub content: String,
}

/// A scored retrieval hit, ordered by descending score.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub document: KnowledgeDocument,
    pub score: usize,
}

impl RetrievalResult {
    /// Excerpt used in the generation prompt.
    pub fn snippet(&self) -> &str {
        let content = &self.document.content;
        match content.char_indices().nth(SNIPPET_LEN) {
            Some((byte_idx, _)) => &content[..byte_idx],
            None => content,
        }
    }
}

/// The loaded corpus. Immutable and injected, never module-level state.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<KnowledgeDocument>,
}

impl Corpus {
    /// Build a corpus from pre-constructed documents (tests, embedded sets).
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Self {
        Self { documents }
    }

    /// Load all `*.md` files from a directory, sorted by file name so the
    /// corpus iteration order (the tie-breaker) is stable. A document that
    /// fails to load is logged and skipped; it never aborts the rest.
    pub fn load_dir(dir: &Path) -> Result<Self, std::io::Error> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            let id = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();
            match std::fs::read_to_string(&path) {
                Ok(content) => documents.push(KnowledgeDocument {
                    title: title_from_id(&id),
                    category: "knowledge".into(),
                    id,
                    content,
                }),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Knowledge document skipped");
                }
            }
        }

        info!(documents = documents.len(), dir = %dir.display(), "Knowledge corpus loaded");
        Ok(Self { documents })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Score every document against the query and return the top `top_k`,
    /// descending by score, ties broken by corpus order. The pricing
    /// document is force-appended with a nominal score when it did not
    /// place on its own.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Vec<RetrievalResult> {
        let query_lower = query.to_lowercase();
        let terms: Vec<&str> = query_lower
            .split_whitespace()
            .filter(|t| t.chars().count() > MIN_TERM_LEN)
            .collect();

        let mut scored: Vec<RetrievalResult> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let content_lower = doc.content.to_lowercase();
                let score: usize = terms
                    .iter()
                    .map(|term| content_lower.matches(term).count())
                    .sum();
                (score > 0).then(|| RetrievalResult {
                    document: doc.clone(),
                    score,
                })
            })
            .collect();

        // Stable sort keeps corpus order as the tie-breaker.
        scored.sort_by(|a, b| b.score.cmp(&a.score));
        scored.truncate(top_k);

        if !scored.iter().any(|r| r.document.id == PRICING_DOC_ID)
            && let Some(pricing) = self.documents.iter().find(|d| d.id == PRICING_DOC_ID)
        {
            scored.push(RetrievalResult {
                document: pricing.clone(),
                score: FORCED_SCORE,
            });
        }

        scored
    }
}

/// "business-conditions" → "Business Conditions".
fn title_from_id(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, content: &str) -> KnowledgeDocument {
        KnowledgeDocument {
            id: id.into(),
            title: title_from_id(id),
            category: "knowledge".into(),
            content: content.into(),
        }
    }

    fn corpus() -> Corpus {
        Corpus::from_documents(vec![
            doc(
                "catering-brief",
                "Unser Catering bietet Buffets für Hochzeiten und Firmenfeiern. \
                 Buffet Buffet Buffet.",
            ),
            doc(
                PRICING_DOC_ID,
                "Preise und Rabatte: Basis-Paket 25-35€, Standard-Paket 35-45€, \
                 Premium-Paket 50-70€. Rabatte für Werktage.",
            ),
            doc(
                "vegetarian-template",
                "Vegetarische Angebote mit Falafel, Hummus und Tabouleh.",
            ),
        ])
    }

    #[test]
    fn scores_by_term_frequency() {
        let results = corpus().retrieve("buffet anfrage", 3);
        assert_eq!(results[0].document.id, "catering-brief");
        assert_eq!(results[0].score, 4);
    }

    #[test]
    fn zero_score_documents_excluded() {
        let results = corpus().retrieve("falafel", 3);
        let ids: Vec<_> = results.iter().map(|r| r.document.id.as_str()).collect();
        assert!(ids.contains(&"vegetarian-template"));
        assert!(!ids.contains(&"catering-brief"));
    }

    #[test]
    fn short_terms_ignored() {
        // Every term is <= 3 chars, so nothing matches lexically.
        let results = corpus().retrieve("wir ein für", 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, PRICING_DOC_ID);
    }

    #[test]
    fn empty_query_returns_only_pricing_document() {
        let results = corpus().retrieve("", 3);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.id, PRICING_DOC_ID);
        assert_eq!(results[0].score, 1);
    }

    #[test]
    fn pricing_document_always_present() {
        let results = corpus().retrieve("buffet hochzeit", 1);
        assert!(results.iter().any(|r| r.document.id == PRICING_DOC_ID));
    }

    #[test]
    fn pricing_document_not_duplicated() {
        let results = corpus().retrieve("preise rabatte basis", 3);
        let pricing_hits = results
            .iter()
            .filter(|r| r.document.id == PRICING_DOC_ID)
            .count();
        assert_eq!(pricing_hits, 1);
    }

    #[test]
    fn retrieval_is_deterministic() {
        let c = corpus();
        let a: Vec<_> = c
            .retrieve("pricing discounts", 3)
            .into_iter()
            .map(|r| (r.document.id, r.score))
            .collect();
        let b: Vec<_> = c
            .retrieve("pricing discounts", 3)
            .into_iter()
            .map(|r| (r.document.id, r.score))
            .collect();
        assert_eq!(a, b);
    }

    #[test]
    fn truncates_to_top_k() {
        let c = Corpus::from_documents(vec![
            doc("a", "buffet buffet buffet"),
            doc("b", "buffet buffet"),
            doc("c", "buffet"),
            doc(PRICING_DOC_ID, "Preise"),
        ]);
        let results = c.retrieve("buffet", 2);
        // Two lexical hits plus the forced pricing doc.
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].document.id, "a");
        assert_eq!(results[1].document.id, "b");
    }

    #[test]
    fn snippet_truncates_long_documents() {
        let long = "ü".repeat(3000);
        let c = Corpus::from_documents(vec![doc("long-doc", &long)]);
        let results = c.retrieve("üüüü", 1);
        assert_eq!(results[0].snippet().chars().count(), 1000);
    }

    #[test]
    fn load_dir_skips_unreadable_and_keeps_rest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("business-conditions.md"), "Preise").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let corpus = Corpus::load_dir(dir.path()).unwrap();
        assert_eq!(corpus.len(), 1);
    }

    #[test]
    fn titles_from_file_stems() {
        assert_eq!(title_from_id("business-conditions"), "Business Conditions");
        assert_eq!(title_from_id("email_template"), "Email Template");
    }
}
