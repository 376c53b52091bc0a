//! Benchmarks for the line codec and the text paths around it.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use slirc_client::ctcp::Ctcp;
use slirc_client::encoding::StreamDecoder;
use slirc_client::util::split_message_text;
use slirc_client::{Message, TextEncoding};

/// Simple PING message
const SIMPLE_MESSAGE: &str = "PING :irc.example.com";

/// Message with prefix
const PREFIX_MESSAGE: &str = ":nick!user@host PRIVMSG #channel :Hello, world!";

/// Message with IRCv3 tags
const TAGGED_MESSAGE: &str = "@time=2023-01-01T00:00:00.000Z;msgid=abc123;+example/tag=value :nick!user@host PRIVMSG #channel :Hello with tags!";

/// Escaped tag values and a batch reference
const COMPLEX_TAGS: &str = "@time=2023-01-01T12:00:00Z;msgid=msg-12345;+draft/reply=parent-id;batch=batch001;note=a\\sb\\:c :nick!user@host.example.com PRIVMSG #long-channel-name :This is a longer message with more content to parse";

/// ISUPPORT burst line
const ISUPPORT_LINE: &str = ":irc.server.net 005 nickname CHANTYPES=# PREFIX=(qaohv)~&@%+ CASEMAPPING=rfc1459 NETWORK=Example MONITOR=100 :are supported by this server";

fn benchmark_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Parsing");

    for (name, line) in [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("with_tags", TAGGED_MESSAGE),
        ("complex_tags", COMPLEX_TAGS),
        ("isupport", ISUPPORT_LINE),
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| black_box(Message::parse(black_box(line))))
        });
    }

    group.finish();
}

fn benchmark_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Serialization");

    let parsed: Vec<(&str, Message)> = [
        ("simple_ping", SIMPLE_MESSAGE),
        ("with_prefix", PREFIX_MESSAGE),
        ("complex_tags", COMPLEX_TAGS),
    ]
    .into_iter()
    .map(|(name, line)| (name, Message::parse(line)))
    .collect();

    for (name, msg) in &parsed {
        group.bench_with_input(BenchmarkId::from_parameter(name), msg, |b, msg| {
            b.iter(|| black_box(black_box(msg).to_string()))
        });
    }

    group.bench_function("built_reply", |b| {
        b.iter(|| {
            let msg = Message::privmsg(black_box("#channel"), black_box("Hello!"))
                .with_tag("+draft/reply", Some("abc123"))
                .with_prefix("nick!user@host");
            black_box(msg.to_string())
        })
    });

    group.finish();
}

fn benchmark_ctcp(c: &mut Criterion) {
    c.bench_function("ctcp_parse", |b| {
        b.iter(|| black_box(Ctcp::parse(black_box("\x01DCC SEND file.txt 2130706433 5000 1024\x01"))))
    });
}

fn benchmark_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("Message Splitting");
    let words = "lorem ipsum dolor sit amet ".repeat(80);
    let unbroken = "x".repeat(2000);

    group.bench_function("words", |b| {
        b.iter(|| black_box(split_message_text(black_box(&words), 400)))
    });
    group.bench_function("no_spaces", |b| {
        b.iter(|| black_box(split_message_text(black_box(&unbroken), 400)))
    });

    group.finish();
}

fn benchmark_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("Stream Decoding");
    let burst = format!("{PREFIX_MESSAGE}\r\n").repeat(64);
    let latin1: Vec<u8> = burst
        .bytes()
        .chain(b":n!u@h PRIVMSG #c :caf\xe9\r\n".iter().copied())
        .collect();

    group.bench_function("utf8_burst", |b| {
        b.iter(|| {
            let mut decoder = StreamDecoder::new(TextEncoding::Utf8, true);
            black_box(decoder.decode(black_box(burst.as_bytes())))
        })
    });
    group.bench_function("latin1_detect", |b| {
        b.iter(|| {
            let mut decoder = StreamDecoder::new(TextEncoding::Utf8, true);
            black_box(decoder.decode(black_box(&latin1)))
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_parsing,
    benchmark_serialization,
    benchmark_ctcp,
    benchmark_split,
    benchmark_decoding,
);

criterion_main!(benches);
