//! mIRC text formatting codes.
//!
//! Bold, italic, underline, strikethrough, monospace, reverse, reset,
//! numeric colours (`\x03fg[,bg]`) and hex colours (`\x04RRGGBB`).

use std::iter::Peekable;
use std::str::Chars;

const BOLD: char = '\x02';
const COLOR: char = '\x03';
const HEX_COLOR: char = '\x04';
const RESET: char = '\x0F';
const MONOSPACE: char = '\x11';
const REVERSE: char = '\x16';
const ITALIC: char = '\x1D';
const STRIKETHROUGH: char = '\x1E';
const UNDERLINE: char = '\x1F';

/// Active style of a run of text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub monospace: bool,
    pub reverse: bool,
    /// mIRC palette index.
    pub foreground: Option<u8>,
    pub background: Option<u8>,
    /// `#RRGGBB`, from `\x04`.
    pub hex_color: Option<String>,
}

/// A run of text sharing one style.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormattedSegment {
    pub text: String,
    pub style: TextStyle,
}

/// Consume up to two ASCII digits.
fn take_digits(chars: &mut Peekable<Chars<'_>>) -> Option<u8> {
    let mut digits = String::new();
    while digits.len() < 2 {
        match chars.peek() {
            Some(c) if c.is_ascii_digit() => {
                digits.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    digits.parse().ok()
}

/// Consume the `fg[,bg]` tail of a colour code.
fn take_color(chars: &mut Peekable<Chars<'_>>) -> (Option<u8>, Option<u8>) {
    let fg = take_digits(chars);
    let mut bg = None;
    if chars.peek() == Some(&',') {
        let mut lookahead = chars.clone();
        lookahead.next();
        if lookahead.peek().is_some_and(char::is_ascii_digit) {
            chars.next();
            bg = take_digits(chars);
        }
    }
    (fg, bg)
}

/// Consume up to six hex digits.
fn take_hex(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut hex = String::new();
    while hex.len() < 6 {
        match chars.peek() {
            Some(c) if c.is_ascii_hexdigit() => {
                hex.push(*c);
                chars.next();
            }
            _ => break,
        }
    }
    hex
}

/// Remove every formatting code, keeping only the visible text.
pub fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            COLOR => {
                take_color(&mut chars);
            }
            HEX_COLOR => {
                take_hex(&mut chars);
            }
            BOLD | RESET | MONOSPACE | REVERSE | ITALIC | STRIKETHROUGH | UNDERLINE => {}
            c => out.push(c),
        }
    }
    out
}

/// Split formatted text into styled runs.
pub fn parse_formatting(text: &str) -> Vec<FormattedSegment> {
    let mut segments = Vec::new();
    let mut style = TextStyle::default();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !is_format_code(c) {
            current.push(c);
            continue;
        }

        if !current.is_empty() {
            segments.push(FormattedSegment {
                text: std::mem::take(&mut current),
                style: style.clone(),
            });
        }

        match c {
            COLOR => {
                let (fg, bg) = take_color(&mut chars);
                if fg.is_none() {
                    // A bare \x03 clears both colours.
                    style.foreground = None;
                    style.background = None;
                } else {
                    style.foreground = fg;
                    if bg.is_some() {
                        style.background = bg;
                    }
                }
            }
            HEX_COLOR => {
                let hex = take_hex(&mut chars);
                style.hex_color = (hex.len() == 6).then(|| format!("#{hex}"));
            }
            BOLD => style.bold = !style.bold,
            ITALIC => style.italic = !style.italic,
            UNDERLINE => style.underline = !style.underline,
            STRIKETHROUGH => style.strikethrough = !style.strikethrough,
            MONOSPACE => style.monospace = !style.monospace,
            REVERSE => style.reverse = !style.reverse,
            _ => style = TextStyle::default(),
        }
    }

    if !current.is_empty() {
        segments.push(FormattedSegment { text: current, style });
    }
    segments
}

fn is_format_code(c: char) -> bool {
    matches!(
        c,
        BOLD | COLOR
            | HEX_COLOR
            | RESET
            | MONOSPACE
            | REVERSE
            | ITALIC
            | STRIKETHROUGH
            | UNDERLINE
    )
}
