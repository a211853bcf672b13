//! Tier price extraction from generated quote text.
//!
//! The model is instructed to present three named packages; this module
//! pulls the per-person price (or range) back out of the free text so the
//! ops channel can show a structured summary. Extraction is best-effort:
//! a quote that names no recognizable price still ships.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

/// Patterns per tier, in order of preference. For each tier the first
/// pattern with any match wins, and within that pattern the LAST match in
/// the text wins, since totals and summaries come after itemized lines.
static TIER_PATTERNS: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    let range = r"(\d+(?:[.,]\d+)?\s*(?:-|bis)\s*\d+(?:[.,]\d+)?\s*€)";
    let single = r"(\d+(?:[.,]\d+)?\s*€)";
    let tier = |name: &str| {
        vec![
            Regex::new(&format!(r"(?i){name}[^\n€]*?{range}")).expect("tier range pattern"),
            Regex::new(&format!(r"(?i){name}[^\n€]*?{single}")).expect("tier price pattern"),
        ]
    };
    vec![
        ("Basis", tier("basis")),
        ("Standard", tier("standard")),
        ("Premium", tier("premium")),
    ]
});

/// Extract per-tier price strings from a quote draft. Returns only the
/// tiers that matched; callers must tolerate a partial (or empty) table.
pub fn extract_tier_prices(text: &str) -> BTreeMap<String, String> {
    let mut prices = BTreeMap::new();
    for (tier, patterns) in TIER_PATTERNS.iter() {
        for pattern in patterns {
            let mut last = None;
            for caps in pattern.captures_iter(text) {
                if let Some(m) = caps.get(1) {
                    last = Some(m);
                }
            }
            if let Some(m) = last {
                prices.insert(tier.to_string(), m.as_str().trim().to_string());
                break;
            }
        }
    }
    prices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_all_three_tiers() {
        let text = "\
Unsere Pakete:
- Basis-Paket: 25-35€ pro Person
- Standard-Paket: 35-45€ pro Person
- Premium-Paket: 50-70€ pro Person";
        let prices = extract_tier_prices(text);
        assert_eq!(prices.len(), 3);
        assert_eq!(prices["Basis"], "25-35€");
        assert_eq!(prices["Standard"], "35-45€");
        assert_eq!(prices["Premium"], "50-70€");
    }

    #[test]
    fn partial_table_is_fine() {
        let prices = extract_tier_prices("Standard: 40€");
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["Standard"], "40€");
    }

    #[test]
    fn no_prices_yields_empty_table() {
        assert!(extract_tier_prices("Vielen Dank für Ihre Anfrage.").is_empty());
    }

    #[test]
    fn last_match_wins_within_pattern() {
        let text = "\
Basis-Paket: 25-35€ pro Person
...
Zusammenfassung: Basis-Paket für 40 Gäste: 28-32€ pro Person";
        let prices = extract_tier_prices(text);
        assert_eq!(prices["Basis"], "28-32€");
    }

    #[test]
    fn range_pattern_preferred_over_single() {
        // A single price appearing later never displaces a range match.
        let text = "Premium-Paket: 50-70€, im Schnitt Premium etwa 60€";
        let prices = extract_tier_prices(text);
        assert_eq!(prices["Premium"], "50-70€");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let prices = extract_tier_prices("BASIS-PAKET: 30€");
        assert_eq!(prices["Basis"], "30€");
    }

    #[test]
    fn bis_ranges_and_decimal_commas() {
        let prices = extract_tier_prices("Standard-Paket: 35,50 bis 45,00 €");
        assert_eq!(prices["Standard"], "35,50 bis 45,00 €");
    }
}
