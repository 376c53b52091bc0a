//! Text encodings for the wire.
//!
//! IRC has no negotiated charset. Servers and older clients still send
//! ISO-8859-1 or Windows-1252, so received bytes are decoded through a
//! [`StreamDecoder`] that can switch away from UTF-8 when it sees bytes
//! that cannot be UTF-8.

use std::fmt;

use encoding::{EncoderResult, WINDOWS_1252};
use tracing::debug;

/// Labels accepted by [`TextEncoding::from_label`].
pub fn supported_encodings() -> &'static [&'static str] {
    &["UTF-8", "ISO-8859-1", "LATIN1", "CP1252", "Windows-1252"]
}

/// A supported character encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// ISO-8859-1: one byte per code point, U+0000 to U+00FF.
    Latin1,
    Windows1252,
}

impl TextEncoding {
    /// Look up an encoding by label, case-insensitively.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_uppercase().as_str() {
            "UTF-8" | "UTF8" => Some(Self::Utf8),
            "ISO-8859-1" | "LATIN1" | "LATIN-1" => Some(Self::Latin1),
            "CP1252" | "WINDOWS-1252" => Some(Self::Windows1252),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Latin1 => "ISO-8859-1",
            Self::Windows1252 => "Windows-1252",
        }
    }

    /// Decode bytes. Invalid UTF-8 becomes U+FFFD.
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            Self::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
            Self::Latin1 => bytes.iter().map(|&b| char::from(b)).collect(),
            Self::Windows1252 => WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        }
    }

    /// Encode text. Characters the encoding cannot represent become `?`.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Windows1252 => encode_windows_1252(text),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn encode_windows_1252(text: &str) -> Vec<u8> {
    let mut encoder = WINDOWS_1252.new_encoder();
    let mut out = Vec::with_capacity(text.len());
    let mut buf = [0u8; 512];
    let mut src = text;

    loop {
        let (result, read, written) =
            encoder.encode_from_utf8_without_replacement(src, &mut buf, true);
        out.extend_from_slice(&buf[..written]);
        src = &src[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(_) => out.push(b'?'),
        }
    }
    out
}

/// Guess the encoding of a received buffer.
///
/// Valid UTF-8 (including pure ASCII) is UTF-8; anything else with a high
/// byte is taken to be ISO-8859-1.
pub fn detect(bytes: &[u8]) -> TextEncoding {
    if std::str::from_utf8(bytes).is_ok() {
        TextEncoding::Utf8
    } else if bytes.iter().any(|&b| b >= 0x80) {
        TextEncoding::Latin1
    } else {
        TextEncoding::Utf8
    }
}

/// Length of an unfinished UTF-8 sequence at the end of `bytes`.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            0xC0..=0xDF => 2,
            _ => 1,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Decodes a byte stream received in arbitrary pieces.
#[derive(Clone, Debug)]
pub struct StreamDecoder {
    encoding: TextEncoding,
    auto_detect: bool,
    pending: Vec<u8>,
}

impl StreamDecoder {
    pub fn new(encoding: TextEncoding, auto_detect: bool) -> Self {
        Self {
            encoding,
            auto_detect,
            pending: Vec::new(),
        }
    }

    pub fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    pub fn set_encoding(&mut self, encoding: TextEncoding) {
        self.encoding = encoding;
    }

    pub fn auto_detect(&self) -> bool {
        self.auto_detect
    }

    pub fn set_auto_detect(&mut self, auto_detect: bool) {
        self.auto_detect = auto_detect;
    }

    /// Drop any partial sequence carried over from the last call.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Decode the next piece of the stream.
    ///
    /// In UTF-8 mode a multi-byte sequence split across two pieces is held
    /// back until the rest arrives. Detection only runs in UTF-8 mode, and
    /// a detected legacy encoding sticks for the rest of the session.
    pub fn decode(&mut self, input: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(input);

        if self.encoding != TextEncoding::Utf8 {
            return self.encoding.decode(&buf);
        }

        let complete = buf.len() - incomplete_utf8_tail(&buf);
        if self.auto_detect {
            let detected = detect(&buf[..complete]);
            if detected != TextEncoding::Utf8 {
                debug!(encoding = %detected, "switching receive encoding");
                self.encoding = detected;
                return detected.decode(&buf);
            }
        }

        self.pending = buf.split_off(complete);
        TextEncoding::Utf8.decode(&buf)
    }
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(TextEncoding::Utf8, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels() {
        assert_eq!(TextEncoding::from_label("utf-8"), Some(TextEncoding::Utf8));
        assert_eq!(TextEncoding::from_label("LATIN1"), Some(TextEncoding::Latin1));
        assert_eq!(
            TextEncoding::from_label("windows-1252"),
            Some(TextEncoding::Windows1252)
        );
        assert_eq!(TextEncoding::from_label("koi8-r"), None);
        for label in supported_encodings() {
            assert!(TextEncoding::from_label(label).is_some());
        }
    }

    #[test]
    fn test_detect() {
        assert_eq!(detect(b"plain ascii"), TextEncoding::Utf8);
        assert_eq!(detect("café".as_bytes()), TextEncoding::Utf8);
        assert_eq!(detect(b"caf\xe9"), TextEncoding::Latin1);
    }

    #[test]
    fn test_latin1_round_trip() {
        let bytes = TextEncoding::Latin1.encode("café ü");
        assert_eq!(bytes, b"caf\xe9 \xfc");
        assert_eq!(TextEncoding::Latin1.decode(&bytes), "café ü");
        assert_eq!(TextEncoding::Latin1.encode("€"), b"?");
    }

    #[test]
    fn test_windows_1252() {
        assert_eq!(TextEncoding::Windows1252.decode(b"\x80 5"), "€ 5");
        assert_eq!(TextEncoding::Windows1252.encode("€ 5"), b"\x80 5");
        assert_eq!(TextEncoding::Windows1252.encode("日"), b"?");
    }

    #[test]
    fn test_stream_carries_partial_sequence() {
        let mut decoder = StreamDecoder::default();
        let bytes = "héllo".as_bytes();
        // Split inside the two-byte é.
        assert_eq!(decoder.decode(&bytes[..2]), "h");
        assert_eq!(decoder.decode(&bytes[2..]), "éllo");
        assert_eq!(decoder.encoding(), TextEncoding::Utf8);
    }

    #[test]
    fn test_stream_switches_to_latin1() {
        let mut decoder = StreamDecoder::default();
        assert_eq!(decoder.decode(b"caf\xe9 au lait"), "café au lait");
        assert_eq!(decoder.encoding(), TextEncoding::Latin1);
        // Sticky afterwards, even for valid UTF-8 input.
        assert_eq!(decoder.decode("é".as_bytes()), "Ã©");
    }

    #[test]
    fn test_stream_without_auto_detect_is_lossy() {
        let mut decoder = StreamDecoder::new(TextEncoding::Utf8, false);
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
        assert_eq!(decoder.encoding(), TextEncoding::Utf8);
    }
}
