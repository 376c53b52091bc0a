//! IRCv3 message tag escaping and value post-processing.

use std::borrow::Cow;
use std::fmt::{Result as FmtResult, Write};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use super::Tag;

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Unknown escapes drop the backslash; a lone trailing backslash is dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}

/// Split a raw tags section (without `@`) into owned, unescaped tags.
///
/// `key` alone and `key=` are both kept as boolean tags.
pub(crate) fn parse_tags(raw: &str) -> Vec<Tag> {
    raw.split(';')
        .filter(|item| !item.is_empty())
        .map(|item| match item.split_once('=') {
            Some((key, value)) if !value.is_empty() => {
                Tag(Cow::Owned(key.to_owned()), Some(unescape_tag_value(value)))
            }
            Some((key, _)) => Tag(Cow::Owned(key.to_owned()), None),
            None => Tag(Cow::Owned(item.to_owned()), None),
        })
        .collect()
}

/// A tag value after opportunistic decoding.
#[derive(Clone, Debug, PartialEq)]
pub enum TagValue {
    /// The tag was present without a value.
    Flag,
    /// Base64 payload that decoded to JSON.
    Json(serde_json::Value),
    /// Base64 payload that decoded to UTF-8 text.
    Text(String),
    /// The value as received.
    Raw(String),
}

impl TagValue {
    /// Decode a raw (already unescaped) tag value.
    ///
    /// Values that look like base64 are decoded; decoded text that looks
    /// like a JSON object or array is parsed. Anything that fails a step
    /// falls back to the previous representation.
    pub fn process(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Flag;
        };

        if !is_base64(raw) {
            return Self::Raw(raw.to_owned());
        }

        match decode_base64_text(raw) {
            Some(text) => {
                if looks_like_json(&text) {
                    if let Ok(value) = serde_json::from_str(&text) {
                        return Self::Json(value);
                    }
                }
                Self::Text(text)
            }
            None => Self::Raw(raw.to_owned()),
        }
    }

    /// The textual form, if this is not structured JSON.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Raw(s) => Some(s),
            Self::Flag | Self::Json(_) => None,
        }
    }
}

/// Syntactic base64 check: standard alphabet, padded length, and a
/// payload that actually decodes to at least one byte.
pub fn is_base64(s: &str) -> bool {
    if s.is_empty() || s.len() % 4 != 0 {
        return false;
    }
    if !s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
    {
        return false;
    }
    matches!(BASE64.decode(s), Ok(bytes) if !bytes.is_empty())
}

/// Decode base64 into UTF-8 text.
pub fn decode_base64_text(s: &str) -> Option<String> {
    let bytes = BASE64.decode(s).ok()?;
    if bytes.is_empty() {
        return None;
    }
    String::from_utf8(bytes).ok()
}

fn looks_like_json(s: &str) -> bool {
    let trimmed = s.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escaped(value: &str) -> String {
        let mut out = String::new();
        escape_tag_value(&mut out, value).unwrap();
        out
    }

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escaped("a;b c\\d"), "a\\:b\\sc\\\\d");
        assert_eq!(escaped("line\r\nend"), "line\\r\\nend");
    }

    #[test]
    fn test_unescape_sequences() {
        assert_eq!(unescape_tag_value("a\\:b\\sc\\\\d\\re\\nf"), "a;b c\\d\re\nf");
        assert_eq!(unescape_tag_value("test\\"), "test");
        assert_eq!(unescape_tag_value("a\\xb"), "axb");
    }

    #[test]
    fn test_semicolon_space_backslash_survive() {
        let original = "semi;colon with space and \\ slash";
        assert_eq!(unescape_tag_value(&escaped(original)), original);
    }

    #[test]
    fn test_parse_tags_mixed() {
        let tags = parse_tags("time=12:00;+draft/bot;msgid=abc\\sdef;empty=");
        assert_eq!(tags.len(), 4);
        assert_eq!(tags[0], Tag("time".into(), Some("12:00".into())));
        assert_eq!(tags[1], Tag("+draft/bot".into(), None));
        assert_eq!(tags[2].1.as_deref(), Some("abc def"));
        assert_eq!(tags[3].1, None);
    }

    #[test]
    fn test_is_base64() {
        assert!(is_base64("aGVsbG8="));
        assert!(!is_base64("aGVsbG8"));
        assert!(!is_base64("not base64!"));
        assert!(!is_base64(""));
    }

    #[test]
    fn test_process_json_payload() {
        let encoded = BASE64.encode(r#"{"emote":"wave","count":2}"#);
        match TagValue::process(Some(&encoded)) {
            TagValue::Json(value) => {
                assert_eq!(value["emote"], "wave");
                assert_eq!(value["count"], 2);
            }
            other => panic!("expected json, got {other:?}"),
        }
    }

    #[test]
    fn test_process_text_payload() {
        let encoded = BASE64.encode("plain words");
        assert_eq!(
            TagValue::process(Some(&encoded)),
            TagValue::Text("plain words".to_string())
        );
    }

    #[test]
    fn test_process_broken_json_falls_back_to_text() {
        let encoded = BASE64.encode("{not json");
        assert_eq!(
            TagValue::process(Some(&encoded)),
            TagValue::Text("{not json".to_string())
        );
    }

    #[test]
    fn test_process_verbatim_and_flag() {
        assert_eq!(
            TagValue::process(Some("2023-01-01T00:00:00.000Z")),
            TagValue::Raw("2023-01-01T00:00:00.000Z".to_string())
        );
        assert_eq!(TagValue::process(None), TagValue::Flag);
    }

    #[test]
    fn test_process_binary_base64_stays_raw() {
        let encoded = BASE64.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(TagValue::process(Some(&encoded)), TagValue::Raw(encoded.clone()));
    }
}
