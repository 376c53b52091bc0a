//! Fuzz target for CTCP and DCC offer parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use slirc_client::ctcp::Ctcp;
use slirc_client::dcc::{sanitize_filename, DccOffer, MAX_FILENAME_LEN};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    if let Some(ctcp) = Ctcp::parse(input) {
        let _ = ctcp.kind();
    }

    if let Ok(offer) = DccOffer::parse(input) {
        let clean = sanitize_filename(&offer.filename);
        assert!(!clean.is_empty() && clean.len() <= MAX_FILENAME_LEN);
        assert!(!clean.contains(['/', '\\']));
        let _ = offer.to_ctcp_params();
    }
});
