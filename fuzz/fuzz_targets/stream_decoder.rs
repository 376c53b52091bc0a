//! Fuzz target for the inbound byte decoder
//!
//! Splits the input at an arbitrary point and checks that decoding never
//! panics and never loses a line terminator.

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::encoding::StreamDecoder;
use slirc_client::TextEncoding;

fuzz_target!(|data: &[u8]| {
    let Some((&cut, bytes)) = data.split_first() else {
        return;
    };
    let at = usize::from(cut).min(bytes.len());

    let mut decoder = StreamDecoder::new(TextEncoding::Utf8, true);
    let mut text = decoder.decode(&bytes[..at]);
    text.push_str(&decoder.decode(&bytes[at..]));

    let newlines = bytes.iter().filter(|&&b| b == b'\n').count();
    assert_eq!(text.matches('\n').count(), newlines);
});
