//! Relevance gate: decides whether an inbound message is a catering
//! inquiry worth quoting, and whether it is a reply to something we
//! already sent.

/// Keywords that mark a message as catering-related. Matched
/// case-insensitively against subject and body together.
const CATERING_KEYWORDS: &[&str] = &[
    "catering",
    "fest",
    "feier",
    "hochzeit",
    "geburtstag",
    "event",
    "mittagessen",
    "lunch",
    "dinner",
    "buffet",
    "gäste",
    "personen",
    "büro",
    "firma",
];

/// Subject prefixes that identify a reply thread. Replies are never
/// quoted again, regardless of content.
const REPLY_MARKERS: &[&str] = &["re:", "aw:"];

/// True when the subject or body contains at least one catering keyword.
pub fn is_relevant(subject: &str, body: &str) -> bool {
    let haystack = format!("{} {}", subject.to_lowercase(), body.to_lowercase());
    CATERING_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// True when the subject starts with a reply marker such as `Re:` or `AW:`.
pub fn is_reply(subject: &str) -> bool {
    let trimmed = subject.trim_start().to_lowercase();
    REPLY_MARKERS.iter().any(|m| trimmed.starts_with(m))
}
