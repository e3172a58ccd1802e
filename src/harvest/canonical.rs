//! URL canonicalization.
//!
//! A canonical URL is the stable identity key for an article across runs.
//! Two URLs that differ only by tracking parameters, a single trailing
//! slash, or a fragment must canonicalize identically, and canonicalization
//! is idempotent.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use url::Url;
use url::form_urlencoded::Serializer;

/// Query parameters stripped as tracking noise.
static STRIP_PARAMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "ref",
    ]
    .into_iter()
    .collect()
});

/// Normalize a raw URL into the dedup/identity key.
///
/// Rules: drop known tracking query parameters, re-encode the remaining
/// pairs in their original order, strip a single trailing slash from the
/// path, and drop any fragment. Malformed URLs pass through unchanged —
/// this is a pure function with no failure modes.
pub fn canonicalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !STRIP_PARAMS.contains(k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut query = Serializer::new(String::new());
        for (k, v) in &kept {
            query.append_pair(k, v);
        }
        let query = query.finish();
        url.set_query(Some(&query));
    }

    url.set_fragment(None);

    let path = url.path();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path[..path.len() - 1].to_string();
        url.set_path(&trimmed);
    }

    url.to_string()
}
