//! Utility functions for text handling

use std::sync::OnceLock;
use url::Url;

/// Maximum number of characters of an error description surfaced to a
/// requester
pub const ERROR_PREVIEW_CHARS: usize = 200;

/// Truncate a string to at most `max_chars` characters
///
/// Operates on character boundaries, so multi-byte text is never split
/// mid-codepoint.
///
/// # Arguments
///
/// * `text` - The text to truncate
/// * `max_chars` - Maximum number of characters to keep
///
/// # Returns
///
/// Returns a prefix of `text` no longer than `max_chars` characters.
///
/// # Examples
///
/// ```
/// use media_dl::utils::truncate_chars;
///
/// assert_eq!(truncate_chars("hello", 10), "hello");
/// assert_eq!(truncate_chars("hello", 3), "hel");
/// ```
#[must_use]
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Extract the first HTTP(S) URL from free-form message text
///
/// Scans for an `http://` or `https://` token, strips trailing
/// punctuation that messaging clients commonly glue onto pasted links,
/// and validates the remainder as a URL with a host.
///
/// # Arguments
///
/// * `text` - Free-form message text
///
/// # Returns
///
/// Returns the first valid URL found, or `None` if the text contains no
/// usable link.
///
/// # Examples
///
/// ```
/// use media_dl::utils::extract_url;
///
/// let url = extract_url("check this: https://example.com/watch?v=abc !").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/watch?v=abc");
/// assert!(extract_url("no link here").is_none());
/// ```
#[must_use]
pub fn extract_url(text: &str) -> Option<Url> {
    static URL_RE: OnceLock<regex::Regex> = OnceLock::new();
    #[allow(clippy::expect_used)]
    let re = URL_RE.get_or_init(|| {
        regex::Regex::new(r"https?://\S+").expect("url pattern is valid")
    });

    for found in re.find_iter(text) {
        let candidate = found
            .as_str()
            .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '"', '\'']);
        if let Ok(url) = Url::parse(candidate)
            && url.host().is_some()
        {
            return Some(url);
        }
    }
    None
}
