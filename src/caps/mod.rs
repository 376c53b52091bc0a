//! IRCv3 capability negotiation.
//!
//! [`CapNegotiator`] drives `CAP LS 302` / `REQ` / `ACK` / `NAK` and the
//! nested SASL exchange. [`StsCache`] remembers Strict Transport Security
//! policies advertised through the `sts` capability.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>
//! - IRCv3 STS: <https://ircv3.net/specs/extensions/sts>

mod negotiator;
mod sts;

pub use self::negotiator::{CapAction, CapNegotiator, CapPhase, Registration};
pub use self::sts::{StsCache, StsPolicy};

use std::collections::BTreeSet;

/// Capabilities requested by default.
pub const DEFAULT_CAPS: &[&str] = &[
    "multi-prefix",
    "sasl",
    "server-time",
    "message-tags",
    "batch",
    "echo-message",
    "account-tag",
    "extended-join",
    "away-notify",
    "chghost",
    "setname",
    "cap-notify",
    "monitor",
    "sts",
];

/// Split a CAP list parameter into `(name, value)` pairs.
///
/// `sasl=PLAIN,EXTERNAL` yields `("sasl", Some("PLAIN,EXTERNAL"))`.
/// A leading `-` (as in `CAP ACK :-foo`) is kept on the name.
pub fn parse_cap_list(list: &str) -> Vec<(String, Option<String>)> {
    list.split_whitespace()
        .map(|item| match item.split_once('=') {
            Some((name, value)) => (name.to_owned(), Some(value.to_owned())),
            None => (item.to_owned(), None),
        })
        .collect()
}

/// Apply `CAP ACK` style changes to an enabled set.
///
/// Changes prefixed with '-' remove capabilities, others add them.
/// Returns true if any changes were made.
pub fn apply_changes(capabilities: &mut BTreeSet<String>, changes: &[String]) -> bool {
    let mut modified = false;

    for change in changes {
        if let Some(cap_name) = change.strip_prefix('-') {
            if capabilities.remove(cap_name) {
                modified = true;
            }
        } else if capabilities.insert(change.clone()) {
            modified = true;
        }
    }

    modified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cap_list_values() {
        let caps = parse_cap_list("multi-prefix sasl=PLAIN,EXTERNAL sts=port=6697,duration=300");
        assert_eq!(caps.len(), 3);
        assert_eq!(caps[0], ("multi-prefix".to_string(), None));
        assert_eq!(caps[1].1.as_deref(), Some("PLAIN,EXTERNAL"));
        assert_eq!(caps[2].0, "sts");
        assert_eq!(caps[2].1.as_deref(), Some("port=6697,duration=300"));
    }

    #[test]
    fn test_apply_changes() {
        let mut caps = BTreeSet::new();
        assert!(apply_changes(
            &mut caps,
            &["batch".to_string(), "sasl".to_string()]
        ));
        assert!(!apply_changes(&mut caps, &["batch".to_string()]));
        assert!(apply_changes(&mut caps, &["-sasl".to_string()]));
        assert_eq!(caps.into_iter().collect::<Vec<_>>(), vec!["batch"]);
    }
}
