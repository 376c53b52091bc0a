//! Nom-based IRC line tokenizer.
//!
//! Splits one wire line into borrowed tags, prefix, command and parameter
//! slices. Tag unescaping and ownership happen one layer up in
//! [`Message`](super::Message).

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::char,
    combinator::opt,
    error::{context, ErrorKind, VerboseError},
    sequence::{preceded, terminated},
    IResult,
};

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

/// Tags section: `@` up to the first space. The space is required.
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        terminated(preceded(char('@'), take_until(" ")), char(' ')),
    )(input)
}

/// Prefix: `:` up to the first space. The space is required.
fn parse_prefix(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message prefix",
        terminated(
            preceded(char(':'), take_while1(|c| c != ' ')),
            char(' '),
        ),
    )(input)
}

fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRC command",
        take_while1(|c: char| c.is_ascii_alphanumeric()),
    )(input)
}

fn skip_spaces(input: &str) -> &str {
    input.trim_start_matches(' ')
}

/// Parse a complete IRC line into its components.
///
/// ```text
/// ["@" tags " "] [":" prefix " "] command {" " middle} [" :" trailing]
/// ```
///
/// The trailing parameter is taken verbatim up to CR/LF, so CTCP
/// delimiters and other control bytes survive.
pub fn parse_line(input: &str) -> ParseResult<&str, ParsedLine<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let input = skip_spaces(input);

    let (input, prefix) = opt(parse_prefix)(input)?;
    let input = skip_spaces(input);

    let (input, command) = parse_command(input)?;

    let mut params: Vec<&str> = Vec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = skip_spaces(rest);
        if rest.is_empty() {
            break;
        }

        if let Some(after_colon) = rest.strip_prefix(':') {
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    Ok((
        rest,
        ParsedLine {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A tokenized IRC line borrowing from its input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Raw prefix string (without the leading `:`), if present.
    pub prefix: Option<&'a str>,
    /// The command name or numeric.
    pub command: &'a str,
    /// Parameters, trailing last.
    pub params: Vec<&'a str>,
}

impl<'a> ParsedLine<'a> {
    /// Tokenize a line, reporting where and why tokenizing stopped.
    pub fn parse(input: &'a str) -> Result<Self, LineError> {
        match parse_line(input) {
            Ok((_rest, line)) => Ok(line),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut context_info = None;
                let mut position = input.len();
                let mut kind = ErrorKind::Tag;

                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    match error_kind {
                        nom::error::VerboseErrorKind::Context(ctx) => context_info = Some(*ctx),
                        nom::error::VerboseErrorKind::Nom(ek) => kind = *ek,
                        nom::error::VerboseErrorKind::Char(_) => kind = ErrorKind::Char,
                    }
                }

                Err(LineError {
                    position,
                    context: context_info,
                    kind,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(LineError {
                position: input.len(),
                context: Some("incomplete input"),
                kind: ErrorKind::Eof,
            }),
        }
    }
}

/// Where tokenizing a line stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// Byte offset of the failure.
    pub position: usize,
    /// What was being parsed.
    pub context: Option<&'static str>,
    /// The nom error kind.
    pub kind: ErrorKind,
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error at position {}", self.position)?;
        if let Some(ctx) = self.context {
            write!(f, " while {}", ctx)?;
        }
        write!(f, ": {:?}", self.kind)
    }
}

impl std::error::Error for LineError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_command() {
        let line = ParsedLine::parse("PING").unwrap();
        assert_eq!(line.command, "PING");
        assert!(line.tags.is_none());
        assert!(line.prefix.is_none());
        assert!(line.params.is_empty());
    }

    #[test]
    fn test_parse_full_line() {
        let line =
            ParsedLine::parse("@time=2023-01-01T00:00:00Z;+bot :nick!u@h PRIVMSG #ch :Hi there")
                .unwrap();
        assert_eq!(line.tags, Some("time=2023-01-01T00:00:00Z;+bot"));
        assert_eq!(line.prefix, Some("nick!u@h"));
        assert_eq!(line.command, "PRIVMSG");
        assert_eq!(line.params, vec!["#ch", "Hi there"]);
    }

    #[test]
    fn test_parse_numeric_with_middles() {
        let line = ParsedLine::parse(":irc.example.net 353 me = #rust :@alice +bob carol").unwrap();
        assert_eq!(line.command, "353");
        assert_eq!(line.params, vec!["me", "=", "#rust", "@alice +bob carol"]);
    }

    #[test]
    fn test_collapses_repeated_spaces() {
        let line = ParsedLine::parse("MODE  #chan   +o  alice").unwrap();
        assert_eq!(line.params, vec!["#chan", "+o", "alice"]);
    }

    #[test]
    fn test_trailing_keeps_control_bytes() {
        let line = ParsedLine::parse(":a!b@c PRIVMSG me :\x01VERSION\x01").unwrap();
        assert_eq!(line.params[1], "\x01VERSION\x01");
    }

    #[test]
    fn test_empty_trailing() {
        let line = ParsedLine::parse("TOPIC #channel :").unwrap();
        assert_eq!(line.params, vec!["#channel", ""]);
    }

    #[test]
    fn test_stops_at_crlf() {
        let line = ParsedLine::parse("PING :server\r\n").unwrap();
        assert_eq!(line.params, vec!["server"]);
    }

    #[test]
    fn test_tags_without_space_fail() {
        let err = ParsedLine::parse("@just-tags").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_prefix_without_space_fails() {
        assert!(ParsedLine::parse(":only.a.prefix").is_err());
    }

    #[test]
    fn test_error_display_mentions_context() {
        let err = ParsedLine::parse(":prefix").unwrap_err();
        assert!(err.to_string().starts_with("parse error at position"));
    }
}
