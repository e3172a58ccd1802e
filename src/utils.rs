//! Utility functions for string manipulation.
//!
//! This module provides small helpers used throughout the pipeline:
//! - Slugification for blob-store file names
//! - Title-casing for bylines derived from author-profile URLs

/// Convert a title to a URL-friendly slug.
///
/// Used to build readable raw-HTML archive file names. It lowercases the
/// text, removes special characters, and replaces spaces with hyphens.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slugify_title("Hello World"), "hello-world");
/// assert_eq!(slugify_title("Test-Article!"), "test-article");
/// ```
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .replace(' ', "-")
}

/// Capitalize the first character of a string.
pub fn upcase(s: &str) -> String {
    let mut c = s.chars();
    match c.next() {
        None => String::new(),
        Some(f) => f.to_uppercase().collect::<String>() + c.as_str(),
    }
}

/// Title-case every whitespace-separated word.
///
/// Used to derive a human name from the final path segment of an
/// author-profile URL (`john-doe` -> `John Doe` after hyphen replacement).
pub fn title_case_words(s: &str) -> String {
    s.split_whitespace()
        .map(upcase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify_title() {
        assert_eq!(slugify_title("Hello World"), "hello-world");
        assert_eq!(slugify_title("Test-Article!"), "test-article");
        assert_eq!(slugify_title("Multiple   Spaces"), "multiple---spaces");
        assert_eq!(slugify_title("Special@#$Characters"), "specialcharacters");
    }

    #[test]
    fn test_upcase() {
        assert_eq!(upcase("hello"), "Hello");
        assert_eq!(upcase(""), "");
        assert_eq!(upcase("a"), "A");
    }

    #[test]
    fn test_title_case_words() {
        assert_eq!(title_case_words("john doe"), "John Doe");
        assert_eq!(title_case_words("  maria  von trapp "), "Maria Von Trapp");
        assert_eq!(title_case_words(""), "");
    }

}
