//! Sans-IO CAP and SASL negotiation.
//!
//! The negotiator does not perform I/O. It consumes parsed `CAP`,
//! `AUTHENTICATE` and SASL numeric messages and returns [`CapAction`]s for
//! the session to carry out.
//!
//! # Example
//!
//! ```
//! use slirc_client::caps::{CapAction, CapNegotiator, Registration};
//! use slirc_client::Message;
//!
//! let mut caps = CapNegotiator::new(vec!["multi-prefix".to_string()], None);
//! let actions = caps.start(Registration::new("bot", "bot", "A bot"));
//! assert_eq!(actions, vec![CapAction::Send("CAP LS 302".to_string())]);
//!
//! let ls = Message::parse(":server CAP * LS :multi-prefix batch");
//! let actions = caps.handle_cap(&ls);
//! assert!(actions.contains(&CapAction::Send("CAP REQ :multi-prefix".to_string())));
//! ```

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use super::{apply_changes, parse_cap_list};
use crate::event::Event;
use crate::message::Message;
use crate::sasl::{authenticate_lines, SaslConfig, SaslState};

/// Where negotiation stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CapPhase {
    /// `start()` not called yet.
    #[default]
    Idle,
    /// `CAP LS 302` sent, collecting the advertised list.
    Listing,
    /// `CAP REQ` sent, awaiting ACK or NAK.
    Requesting,
    /// SASL exchange in progress; `CAP END` deferred.
    Authenticating,
    /// `CAP END` and registration sent.
    Ended,
}

/// Something the session must do on behalf of the negotiator.
#[derive(Clone, Debug, PartialEq)]
pub enum CapAction {
    /// Send this line to the server.
    Send(String),
    /// Report this event to the host.
    Emit(Event),
    /// The server advertised an `sts` policy with this value.
    StsAdvertised(String),
}

/// Identity sent once negotiation ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Registration {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    /// Server password, sent as `PASS`.
    pub password: Option<String>,
}

impl Registration {
    pub fn new(
        nickname: impl Into<String>,
        username: impl Into<String>,
        realname: impl Into<String>,
    ) -> Self {
        Self {
            nickname: nickname.into(),
            username: username.into(),
            realname: realname.into(),
            password: None,
        }
    }

    /// Set the server password.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    /// `PASS`, `NICK` and `USER` lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3);
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!("PASS {password}"));
        }
        lines.push(format!("NICK {}", self.nickname));
        lines.push(format!("USER {} 0 * :{}", self.username, self.realname));
        lines
    }
}

/// CAP negotiation state machine.
///
/// This handles the CAP LS -> REQ -> ACK -> AUTHENTICATE -> CAP END flow.
#[derive(Clone, Debug, Default)]
pub struct CapNegotiator {
    phase: CapPhase,
    requested: Vec<String>,
    available: BTreeMap<String, Option<String>>,
    enabled: BTreeSet<String>,
    /// Capabilities named in a `CAP REQ` this connection.
    pending: BTreeSet<String>,
    sasl: Option<SaslConfig>,
    sasl_state: SaslState,
    registration: Registration,
    end_sent: bool,
}

impl CapNegotiator {
    /// Create a negotiator that will ask for `requested`.
    pub fn new(requested: Vec<String>, sasl: Option<SaslConfig>) -> Self {
        Self {
            requested,
            sasl,
            ..Self::default()
        }
    }

    pub fn phase(&self) -> CapPhase {
        self.phase
    }

    /// Capabilities advertised by the server, with their values.
    pub fn available(&self) -> &BTreeMap<String, Option<String>> {
        &self.available
    }

    /// Capabilities acknowledged by the server.
    pub fn enabled(&self) -> &BTreeSet<String> {
        &self.enabled
    }

    pub fn is_enabled(&self, cap: &str) -> bool {
        self.enabled.contains(cap)
    }

    pub fn requested(&self) -> &[String] {
        &self.requested
    }

    pub fn sasl_state(&self) -> &SaslState {
        &self.sasl_state
    }

    /// True once `CAP END` has gone out.
    pub fn has_ended(&self) -> bool {
        self.end_sent
    }

    pub fn set_sasl(&mut self, sasl: Option<SaslConfig>) {
        self.sasl = sasl;
    }

    pub fn sasl(&self) -> Option<&SaslConfig> {
        self.sasl.as_ref()
    }

    /// Replace the request list.
    pub fn set_requested(&mut self, requested: Vec<String>) {
        self.requested = requested;
    }

    /// Add a capability to the request list.
    ///
    /// After registration, a capability the server already advertises is
    /// requested straight away; the returned line must be sent.
    pub fn request_capability(&mut self, cap: &str) -> Option<String> {
        if !self.requested.iter().any(|c| c == cap) {
            self.requested.push(cap.to_owned());
        }
        if self.phase == CapPhase::Ended
            && self.available.contains_key(cap)
            && !self.enabled.contains(cap)
            && self.pending.insert(cap.to_owned())
        {
            return Some(format!("CAP REQ :{cap}"));
        }
        None
    }

    /// Forget all per-connection state, keeping the request list and SASL
    /// configuration.
    pub fn reset(&mut self) {
        self.phase = CapPhase::Idle;
        self.available.clear();
        self.enabled.clear();
        self.pending.clear();
        self.sasl_state = SaslState::Idle;
        self.end_sent = false;
    }

    /// Begin negotiation. Must be the first thing sent on a new connection.
    pub fn start(&mut self, registration: Registration) -> Vec<CapAction> {
        self.reset();
        self.registration = registration;
        self.phase = CapPhase::Listing;
        debug!("starting capability negotiation");
        vec![CapAction::Send("CAP LS 302".to_owned())]
    }

    /// Handle a `CAP` message from the server.
    pub fn handle_cap(&mut self, msg: &Message) -> Vec<CapAction> {
        let Some(subcommand) = msg.param(1) else {
            return Vec::new();
        };
        let subcommand = subcommand.to_ascii_uppercase();
        // A literal `*` before the list marks a continued multi-line reply.
        let more = msg.params.len() >= 4 && msg.param(2) == Some("*");
        let list = if msg.params.len() >= 3 {
            msg.trailing().unwrap_or("")
        } else {
            ""
        };

        match subcommand.as_str() {
            "LS" => self.handle_ls(list, more),
            "ACK" => self.handle_ack(list),
            "NAK" => self.handle_nak(list),
            "NEW" => self.handle_new(list),
            "DEL" => self.handle_del(list),
            "LIST" => {
                self.enabled
                    .extend(parse_cap_list(list).into_iter().map(|(name, _)| name));
                Vec::new()
            }
            other => {
                debug!(subcommand = other, "ignoring unknown CAP subcommand");
                Vec::new()
            }
        }
    }

    fn handle_ls(&mut self, list: &str, more: bool) -> Vec<CapAction> {
        let mut actions = Vec::new();
        for (name, value) in parse_cap_list(list) {
            if name == "sts" {
                if let Some(value) = &value {
                    actions.push(CapAction::StsAdvertised(value.clone()));
                }
            }
            self.available.insert(name, value);
        }

        if more {
            debug!(count = self.available.len(), "partial CAP LS, waiting for more");
            return actions;
        }

        actions.push(CapAction::Emit(Event::CapabilityList(
            self.available.keys().cloned().collect(),
        )));

        if self.phase != CapPhase::Listing {
            return actions;
        }

        let wanted = self.wanted();
        if wanted.is_empty() {
            actions.extend(self.end());
        } else {
            self.pending.extend(wanted.iter().cloned());
            self.phase = CapPhase::Requesting;
            actions.push(CapAction::Send(format!("CAP REQ :{}", wanted.join(" "))));
        }
        actions
    }

    fn handle_ack(&mut self, list: &str) -> Vec<CapAction> {
        let changes: Vec<String> = parse_cap_list(list).into_iter().map(|(n, _)| n).collect();
        apply_changes(&mut self.enabled, &changes);
        for cap in &changes {
            self.pending.remove(cap.trim_start_matches('-'));
        }
        debug!(caps = ?changes, "capabilities acknowledged");

        let mut actions = vec![CapAction::Emit(Event::CapabilityAcknowledged(
            changes.clone(),
        ))];
        if self.phase != CapPhase::Requesting {
            return actions;
        }

        let sasl_acked = changes.iter().any(|c| c == "sasl");
        match (&self.sasl, sasl_acked) {
            (Some(config), true) => {
                let mechanism = config.mechanism();
                debug!(%mechanism, "starting SASL");
                self.sasl_state = SaslState::MechanismSent(mechanism);
                self.phase = CapPhase::Authenticating;
                actions.push(CapAction::Send(format!("AUTHENTICATE {mechanism}")));
            }
            _ => actions.extend(self.end()),
        }
        actions
    }

    fn handle_nak(&mut self, list: &str) -> Vec<CapAction> {
        let denied: Vec<String> = parse_cap_list(list).into_iter().map(|(n, _)| n).collect();
        for cap in &denied {
            self.pending.remove(cap);
        }
        debug!(caps = ?denied, "capabilities denied");

        let mut actions = vec![CapAction::Emit(Event::CapabilityDenied(denied))];
        if self.phase == CapPhase::Requesting {
            actions.extend(self.end());
        }
        actions
    }

    fn handle_new(&mut self, list: &str) -> Vec<CapAction> {
        let mut actions = Vec::new();
        for (name, value) in parse_cap_list(list) {
            if name == "sts" {
                if let Some(value) = &value {
                    actions.push(CapAction::StsAdvertised(value.clone()));
                }
            }
            self.available.insert(name, value);
        }

        let wanted: Vec<String> = self
            .wanted()
            .into_iter()
            .filter(|cap| !self.pending.contains(cap))
            .collect();
        if !wanted.is_empty() {
            self.pending.extend(wanted.iter().cloned());
            actions.push(CapAction::Send(format!("CAP REQ :{}", wanted.join(" "))));
        }
        actions
    }

    fn handle_del(&mut self, list: &str) -> Vec<CapAction> {
        for (name, _) in parse_cap_list(list) {
            self.available.remove(&name);
            self.enabled.remove(&name);
            self.pending.remove(&name);
        }
        Vec::new()
    }

    /// Handle `AUTHENTICATE` from the server.
    pub fn handle_authenticate(&mut self, msg: &Message) -> Vec<CapAction> {
        if msg.param(0) != Some("+") {
            debug!("ignoring AUTHENTICATE challenge");
            return Vec::new();
        }
        if !matches!(self.sasl_state, SaslState::MechanismSent(_)) {
            return Vec::new();
        }
        let Some(config) = &self.sasl else {
            return Vec::new();
        };

        self.sasl_state = SaslState::CredentialsSent;
        authenticate_lines(&config.response())
            .into_iter()
            .map(CapAction::Send)
            .collect()
    }

    /// Handle a SASL result numeric (900, 903, 904, 905, 906).
    ///
    /// The first success numeric (900 or 903) ends the exchange; a later
    /// one is ignored. Failures carry the last parameter as the reason.
    pub fn handle_sasl_numeric(&mut self, code: u16, msg: &Message) -> Vec<CapAction> {
        if !self.sasl_state.in_progress() {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match code {
            900 | 903 => {
                debug!(code, "SASL authentication succeeded");
                self.sasl_state = SaslState::Succeeded;
                actions.push(CapAction::Emit(Event::SaslSuccess));
            }
            904..=906 => {
                let reason = msg.trailing().unwrap_or("SASL authentication failed").to_owned();
                debug!(code, %reason, "SASL authentication failed");
                self.sasl_state = SaslState::Failed(reason.clone());
                actions.push(CapAction::Emit(Event::SaslFailed(reason)));
            }
            _ => return actions,
        }
        actions.extend(self.end());
        actions
    }

    /// Send `CAP END` and the registration lines, at most once per
    /// connection.
    pub fn end(&mut self) -> Vec<CapAction> {
        if self.end_sent {
            return Vec::new();
        }
        self.end_sent = true;
        self.phase = CapPhase::Ended;
        debug!("ending capability negotiation");

        std::iter::once("CAP END".to_owned())
            .chain(self.registration.lines())
            .map(CapAction::Send)
            .collect()
    }

    /// Requested, advertised and not yet enabled, in request order.
    fn wanted(&self) -> Vec<String> {
        self.requested
            .iter()
            .filter(|cap| self.available.contains_key(*cap) && !self.enabled.contains(*cap))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sasl::encode_plain;

    fn sent(actions: &[CapAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                CapAction::Send(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }

    fn negotiator(sasl: Option<SaslConfig>) -> CapNegotiator {
        let mut caps = CapNegotiator::new(
            vec![
                "multi-prefix".to_string(),
                "sasl".to_string(),
                "batch".to_string(),
            ],
            sasl,
        );
        caps.start(Registration::new("tester", "tuser", "Test User"));
        caps
    }

    fn feed(caps: &mut CapNegotiator, line: &str) -> Vec<CapAction> {
        caps.handle_cap(&Message::parse(line))
    }

    #[test]
    fn test_start_sends_ls() {
        let mut caps = CapNegotiator::default();
        let actions = caps.start(Registration::new("n", "u", "r"));
        assert_eq!(sent(&actions), vec!["CAP LS 302"]);
        assert_eq!(caps.phase(), CapPhase::Listing);
    }

    #[test]
    fn test_multi_part_ls_waits_for_final() {
        let mut caps = negotiator(None);

        let actions = feed(&mut caps, ":irc.test CAP * LS * :multi-prefix extended-join");
        assert!(sent(&actions).is_empty());
        assert_eq!(caps.phase(), CapPhase::Listing);

        let actions = feed(&mut caps, ":irc.test CAP * LS :batch sasl=PLAIN");
        assert_eq!(sent(&actions), vec!["CAP REQ :multi-prefix sasl batch"]);
        assert_eq!(caps.available().get("sasl"), Some(&Some("PLAIN".to_string())));
        assert!(actions.contains(&CapAction::Emit(Event::CapabilityList(vec![
            "batch".to_string(),
            "extended-join".to_string(),
            "multi-prefix".to_string(),
            "sasl".to_string(),
        ]))));
    }

    #[test]
    fn test_empty_intersection_ends_immediately() {
        let mut caps = negotiator(None);
        let actions = feed(&mut caps, ":irc.test CAP * LS :away-notify");
        assert_eq!(
            sent(&actions),
            vec!["CAP END", "NICK tester", "USER tuser 0 * :Test User"]
        );
        assert!(caps.has_ended());
    }

    #[test]
    fn test_ack_without_sasl_config_ends() {
        let mut caps = negotiator(None);
        feed(&mut caps, ":irc.test CAP * LS :multi-prefix sasl");
        let actions = feed(&mut caps, ":irc.test CAP tester ACK :multi-prefix sasl");
        assert_eq!(sent(&actions)[0], "CAP END");
        assert!(caps.is_enabled("multi-prefix"));
        assert!(caps.is_enabled("sasl"));
    }

    #[test]
    fn test_nak_ends_negotiation() {
        let mut caps = negotiator(None);
        feed(&mut caps, ":irc.test CAP * LS :multi-prefix");
        let actions = feed(&mut caps, ":irc.test CAP tester NAK :multi-prefix");
        assert_eq!(
            actions[0],
            CapAction::Emit(Event::CapabilityDenied(vec!["multi-prefix".to_string()]))
        );
        assert_eq!(sent(&actions)[0], "CAP END");
        assert!(caps.enabled().is_empty());
    }

    #[test]
    fn test_sasl_plain_exchange() {
        let mut caps = negotiator(Some(SaslConfig::plain("tester", "hunter2")));
        feed(&mut caps, ":irc.test CAP * LS :sasl=PLAIN");
        let actions = feed(&mut caps, ":irc.test CAP tester ACK :sasl");
        assert_eq!(sent(&actions), vec!["AUTHENTICATE PLAIN"]);
        assert_eq!(caps.phase(), CapPhase::Authenticating);

        let actions = caps.handle_authenticate(&Message::parse("AUTHENTICATE +"));
        let expected = format!("AUTHENTICATE {}", encode_plain("tester", "hunter2"));
        assert_eq!(sent(&actions), vec![expected.as_str()]);

        let success = Message::parse(":irc.test 903 tester :SASL authentication successful");
        let actions = caps.handle_sasl_numeric(903, &success);
        assert_eq!(actions[0], CapAction::Emit(Event::SaslSuccess));
        assert_eq!(sent(&actions)[0], "CAP END");
        assert_eq!(caps.sasl_state(), &SaslState::Succeeded);
    }

    #[test]
    fn test_first_success_numeric_wins() {
        let mut caps = negotiator(Some(SaslConfig::External));
        feed(&mut caps, ":irc.test CAP * LS :sasl");
        feed(&mut caps, ":irc.test CAP tester ACK :sasl");
        let actions = caps.handle_authenticate(&Message::parse("AUTHENTICATE +"));
        assert_eq!(sent(&actions), vec!["AUTHENTICATE +"]);

        let logged_in = Message::parse(":irc.test 900 tester t!u@h tester :You are now logged in");
        let actions = caps.handle_sasl_numeric(900, &logged_in);
        assert_eq!(sent(&actions)[0], "CAP END");

        let success = Message::parse(":irc.test 903 tester :SASL authentication successful");
        assert!(caps.handle_sasl_numeric(903, &success).is_empty());
    }

    #[test]
    fn test_sasl_failure_reports_reason() {
        let mut caps = negotiator(Some(SaslConfig::plain("tester", "wrong")));
        feed(&mut caps, ":irc.test CAP * LS :sasl");
        feed(&mut caps, ":irc.test CAP tester ACK :sasl");
        caps.handle_authenticate(&Message::parse("AUTHENTICATE +"));

        let fail = Message::parse(":irc.test 904 tester :SASL authentication failed");
        let actions = caps.handle_sasl_numeric(904, &fail);
        assert_eq!(
            actions[0],
            CapAction::Emit(Event::SaslFailed("SASL authentication failed".to_string()))
        );
        assert_eq!(sent(&actions)[0], "CAP END");
    }

    #[test]
    fn test_end_sent_once() {
        let mut caps = negotiator(None);
        assert!(!caps.end().is_empty());
        assert!(caps.end().is_empty());
    }

    #[test]
    fn test_password_sent_before_nick() {
        let mut caps = CapNegotiator::default();
        caps.start(
            Registration::new("n", "u", "real name").with_password(Some("pw".to_string())),
        );
        let actions = caps.end();
        assert_eq!(
            sent(&actions),
            vec!["CAP END", "PASS pw", "NICK n", "USER u 0 * :real name"]
        );
    }

    #[test]
    fn test_sts_value_reported() {
        let mut caps = negotiator(None);
        let actions = feed(&mut caps, ":irc.test CAP * LS :sts=port=6697,duration=300");
        assert!(actions.contains(&CapAction::StsAdvertised(
            "port=6697,duration=300".to_string()
        )));
    }

    #[test]
    fn test_new_and_del_after_registration() {
        let mut caps = negotiator(None);
        feed(&mut caps, ":irc.test CAP * LS :multi-prefix");
        feed(&mut caps, ":irc.test CAP tester ACK :multi-prefix");
        assert!(caps.has_ended());

        let actions = feed(&mut caps, ":irc.test CAP tester NEW :batch");
        assert_eq!(sent(&actions), vec!["CAP REQ :batch"]);
        let actions = feed(&mut caps, ":irc.test CAP tester ACK :batch");
        assert_eq!(sent(&actions), Vec::<&str>::new());
        assert!(caps.is_enabled("batch"));

        feed(&mut caps, ":irc.test CAP tester DEL :batch");
        assert!(!caps.is_enabled("batch"));
        assert!(!caps.available().contains_key("batch"));
    }

    #[test]
    fn test_request_capability_after_registration() {
        let mut caps = negotiator(None);
        feed(&mut caps, ":irc.test CAP * LS :multi-prefix account-notify");
        feed(&mut caps, ":irc.test CAP tester ACK :multi-prefix");

        assert_eq!(
            caps.request_capability("account-notify"),
            Some("CAP REQ :account-notify".to_string())
        );
        assert_eq!(caps.request_capability("account-notify"), None);
        assert_eq!(caps.request_capability("unknown-cap"), None);
    }

    #[test]
    fn test_unknown_subcommand_ignored() {
        let mut caps = negotiator(None);
        assert!(feed(&mut caps, ":irc.test CAP tester FROB :x").is_empty());
        assert_eq!(caps.phase(), CapPhase::Listing);
    }
}
