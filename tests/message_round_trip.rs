//! Integration tests for message parsing and serialization
//!
//! These tests verify that lines seen on real networks parse into the
//! expected parts and that serializing a parsed message and parsing it
//! again yields the same message.

use slirc_client::{ctcp, Message, Tag};

fn round_trip(line: &str) -> Message {
    let message: Message = line.parse().expect("parsing is infallible");
    let reparsed = Message::parse(&message.to_string());
    assert_eq!(message, reparsed, "round trip changed {line:?}");
    message
}

#[test]
fn test_message_round_trip_simple() {
    let message = round_trip("PING :irc.example.com");
    assert_eq!(message.command, "PING");
    assert_eq!(message.params, vec!["irc.example.com"]);
}

#[test]
fn test_message_round_trip_with_prefix() {
    let message = round_trip(":nick!user@host PRIVMSG #channel :Hello, world!");
    assert_eq!(message.prefix.as_deref(), Some("nick!user@host"));
    assert_eq!(message.trailing(), Some("Hello, world!"));
}

#[test]
fn test_message_round_trip_with_tags() {
    let message = round_trip(
        "@time=2023-01-01T00:00:00.000Z;msgid=abc123 :nick!user@host PRIVMSG #channel :Tagged message",
    );
    assert_eq!(message.tag("time"), Some("2023-01-01T00:00:00.000Z"));
    assert_eq!(message.tag("msgid"), Some("abc123"));
}

#[test]
fn test_message_round_trip_numeric_response() {
    let message = round_trip(":server 001 nickname :Welcome to the IRC Network");
    assert_eq!(message.numeric(), Some(1));
    assert_eq!(message.param(0), Some("nickname"));
}

#[test]
fn test_message_round_trip_complex_tags() {
    let message = round_trip(
        "@batch=abc123;msgid=def456;time=2023-01-01T12:00:00Z;+custom=value :nick BATCH +abc123 chathistory #channel",
    );
    assert_eq!(message.tag("+custom"), Some("value"));
    assert_eq!(message.params, vec!["+abc123", "chathistory", "#channel"]);
}

#[test]
fn test_escaped_tag_values_survive() {
    let message = round_trip("@note=semi\\:colon\\sspace\\\\slash :n!u@h TAGMSG #c");
    assert_eq!(message.tag("note"), Some("semi;colon space\\slash"));
}

#[test]
fn test_isupport_line() {
    let message = round_trip(
        ":irc.example.net 005 me CHANTYPES=# PREFIX=(ov)@+ CASEMAPPING=ascii :are supported by this server",
    );
    assert_eq!(message.params.len(), 5);
    assert_eq!(message.param(3), Some("CASEMAPPING=ascii"));
}

#[test]
fn test_trailing_with_leading_colon_and_empty_trailing() {
    let message = round_trip(":a!b@c PRIVMSG #c ::-)");
    assert_eq!(message.trailing(), Some(":-)"));

    let message = round_trip(":irc.test CAP * LS :");
    assert_eq!(message.params, vec!["*", "LS", ""]);
}

#[test]
fn test_ctcp_line() {
    let line = format!(":a!b@c PRIVMSG me :{}", ctcp::encode_ctcp("VERSION", ""));
    let message = round_trip(&line);
    assert_eq!(message.ctcp_command(), "VERSION");
    assert_eq!(message.ctcp_params(), "");
}

#[test]
fn test_built_message_wire_form() {
    let message = Message::privmsg("#rust", "hello")
        .with_tag("+draft/reply", Some("abc"))
        .with_prefix("me!me@host");
    assert_eq!(
        message.to_string(),
        "@+draft/reply=abc :me!me@host PRIVMSG #rust :hello"
    );
    assert_eq!(
        message.tags,
        Some(vec![Tag::new("+draft/reply", Some("abc".to_string()))])
    );
}

#[test]
fn test_crlf_is_not_part_of_message() {
    let message = Message::parse("PING :token\r\n");
    assert_eq!(message.params, vec!["token"]);
}

#[test]
fn test_garbage_parses_to_empty_command() {
    for line in ["", "@", ":", "@a=b", ":prefix", "   "] {
        assert!(
            Message::parse(line).command.is_empty(),
            "expected empty command for {line:?}"
        );
    }
}
