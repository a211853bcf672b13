//! Quote drafting: prompt assembly, bounded generation, tier price
//! extraction.

mod generator;
mod pricing;

pub use generator::{QuoteDraft, QuoteGenerator};
pub use pricing::extract_tier_prices;
