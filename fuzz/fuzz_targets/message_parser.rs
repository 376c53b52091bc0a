//! Fuzz target for IRC message parsing
//!
//! Feeds arbitrary text to the parser, then serializes and parses the
//! result again. Neither step may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::Message;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if input.len() > 8192 {
        return;
    }

    let msg = Message::parse(input);
    if msg.command.is_empty() {
        return;
    }
    let _ = msg.tag_value("msgid");
    let _ = msg.ctcp();

    let _ = Message::parse(&msg.to_string());
});
