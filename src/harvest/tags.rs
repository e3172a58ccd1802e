//! Topical tag inference.
//!
//! Maps a section label or title keywords to one of a fixed small set of
//! tags. Both lookups are explicit ordered data: a section-name table tried
//! exact-then-prefix, then a prioritized list of (tag, keyword-set) pairs
//! scanned against the title. Total and deterministic — always returns a
//! tag.

/// Fallback when neither the section nor the title matches anything.
pub const DEFAULT_TAG: &str = "Politics";

/// Known section names to canonical tags, in priority order.
const SECTION_TAGS: &[(&str, &str)] = &[
    ("politics", "Politics"),
    ("us", "Politics"),
    ("u.s.", "Politics"),
    ("world", "Politics"),
    ("business", "Economy"),
    ("economy", "Economy"),
    ("technology", "Technology"),
    ("tech", "Technology"),
    ("science", "Science"),
    ("health", "Health"),
];

/// Title keyword sets, scanned in this fixed priority order; the first set
/// with any hit wins.
const KEYWORD_TAGS: &[(&str, &[&str])] = &[
    (
        "Economy",
        &[
            "economy", "inflation", "market", "jobs", "gdp", "finance", "bank", "stocks",
            "wall street",
        ],
    ),
    (
        "Politics",
        &[
            "election", "congress", "president", "policy", "senate", "government", "politics",
            "white house",
        ],
    ),
    (
        "Technology",
        &[
            "tech",
            "technology",
            "ai",
            "artificial intelligence",
            "software",
            "apple",
            "google",
            "microsoft",
            "startup",
        ],
    ),
    (
        "Health",
        &[
            "health", "covid", "hospital", "medicine", "medical", "cdc", "virus", "disease",
        ],
    ),
    (
        "Science",
        &[
            "science", "space", "nasa", "research", "study", "physics", "biology", "chemistry",
        ],
    ),
];

/// Map an explicit section label to a tag: exact match first, then prefix
/// match against the same table. Case-insensitive.
pub fn section_tag(section: &str) -> Option<&'static str> {
    let s = section.trim().to_lowercase();
    if s.is_empty() {
        return None;
    }
    if let Some((_, tag)) = SECTION_TAGS.iter().find(|(key, _)| *key == s) {
        return Some(tag);
    }
    SECTION_TAGS
        .iter()
        .find(|(key, _)| s.starts_with(key))
        .map(|(_, tag)| *tag)
}

/// Infer the tag for a snapshot from its section label and title.
pub fn infer_tag(title: &str, section: Option<&str>) -> &'static str {
    if let Some(tag) = section.and_then(section_tag) {
        return tag;
    }
    let t = title.to_lowercase();
    for (tag, keywords) in KEYWORD_TAGS {
        if keywords.iter().any(|k| t.contains(k)) {
            return tag;
        }
    }
    DEFAULT_TAG
}
