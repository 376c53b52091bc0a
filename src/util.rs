//! Utility functions for IRC text handling.
//!
//! Safe string truncation, message splitting and `*`/`?` wildcard
//! matching.

/// Maximum length of one IRC line, including the trailing CRLF.
pub const MAX_LINE_LEN: usize = 512;

/// Characters that end or corrupt a line on the wire.
pub const PROTOCOL_CONTROL_CHARS: &[char] = &[
    '\x00', // NUL
    '\x0D', // CR
    '\x0A', // LF
];

/// True if `s` contains NUL, CR or LF and cannot be framed as one line.
///
/// ```
/// use slirc_client::util::has_protocol_control;
///
/// assert!(has_protocol_control("hi\r\nQUIT"));
/// assert!(!has_protocol_control("\x02bold\x02 is fine"));
/// ```
#[inline]
pub fn has_protocol_control(s: &str) -> bool {
    s.contains(PROTOCOL_CONTROL_CHARS)
}

/// Truncates a string to at most `max_bytes` bytes without breaking
/// a multi-byte UTF-8 codepoint at the end.
///
/// # Examples
///
/// ```
/// use slirc_client::util::truncate_utf8_safe;
///
/// assert_eq!(truncate_utf8_safe("hello world", 5), "hello");
///
/// // Multi-byte chars are not split
/// let emoji = "Hello 👋 World";
/// assert_eq!(truncate_utf8_safe(emoji, 8), "Hello ");
///
/// assert_eq!(truncate_utf8_safe("hi", 10), "hi");
/// ```
#[inline]
pub fn truncate_utf8_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// Wire length of `line` once CRLF is appended.
#[inline]
pub fn wire_len(line: &str) -> usize {
    line.len() + 2
}

/// Splits text into chunks of at most `max_bytes` bytes.
///
/// A chunk ends at the last space in the window when that space lies past
/// the middle of the window; otherwise it is cut at the last UTF-8
/// boundary. Chunks are trimmed and empty chunks are skipped.
///
/// # Examples
///
/// ```
/// use slirc_client::util::split_message_text;
///
/// let chunks = split_message_text("the quick brown fox jumps", 12);
/// assert_eq!(chunks, vec!["the quick", "brown fox", "jumps"]);
/// ```
pub fn split_message_text(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    if max_bytes == 0 {
        return chunks;
    }

    let mut remaining = text.trim();
    while !remaining.is_empty() {
        if remaining.len() <= max_bytes {
            chunks.push(remaining.to_owned());
            break;
        }

        let window = truncate_utf8_safe(remaining, max_bytes);
        let mut split = window.len();
        if let Some(space) = window.rfind(' ') {
            if space > max_bytes / 2 {
                split = space;
            }
        }
        if split == 0 {
            // A single character wider than the window.
            split = remaining.chars().next().map_or(remaining.len(), char::len_utf8);
        }

        let chunk = remaining[..split].trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_owned());
        }
        remaining = remaining[split..].trim();
    }
    chunks
}

/// Case-insensitive glob match supporting `*` and `?`.
///
/// # Examples
///
/// ```
/// use slirc_client::util::wildcard_match;
///
/// assert!(wildcard_match("*!*@spam.example", "Bot!bot@SPAM.example"));
/// assert!(wildcard_match("n?ck", "nick"));
/// assert!(!wildcard_match("n?ck", "nickname"));
/// ```
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().flat_map(char::to_lowercase).collect();
    let text: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

    let (mut p, mut t) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// Tokens of `text` that look like links: `http://`, `https://` or `www.`.
/// Trailing punctuation is dropped.
///
/// ```
/// use slirc_client::util::extract_urls;
///
/// let urls = extract_urls("see https://example.com/a, or www.rust-lang.org.");
/// assert_eq!(urls, vec!["https://example.com/a", "www.rust-lang.org"]);
/// ```
pub fn extract_urls(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.trim_start_matches(['(', '<', '[', '"', '\'']))
        .filter(|word| {
            let lower = word.to_ascii_lowercase();
            lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("www.")
        })
        .map(|word| {
            word.trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '>', ']', '"', '\''])
                .to_owned()
        })
        .filter(|url| url.len() > 4)
        .collect()
}
