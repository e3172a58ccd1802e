//! Content hashing and change classification.
//!
//! Each successful extraction produces a snapshot; whether the run counts
//! the link as new, updated, or unchanged is decided here by comparing the
//! body-content hash against the article's previous hash.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest over extracted body text.
pub fn body_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Run-level outcome flags for one processed link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkFlags {
    /// The article had no recorded snapshot before this run.
    pub is_new: bool,
    /// Not new, and the body hash differs from the previous one.
    pub is_updated: bool,
}

impl LinkFlags {
    /// Neither flag set: not-modified, unprocessable, or failed links.
    pub fn none() -> Self {
        Self::default()
    }

    /// Classify a successful extraction against the article's prior state.
    pub fn classify(had_snapshot: bool, prior_hash: Option<&str>, new_hash: &str) -> Self {
        let changed = prior_hash != Some(new_hash);
        Self {
            is_new: !had_snapshot,
            is_updated: had_snapshot && changed,
        }
    }
}
