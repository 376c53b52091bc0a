//! Timestamps for the IRCv3 `server-time` tag, CHATHISTORY and CTCP TIME.

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Format a Unix timestamp as an IRCv3 server-time string.
///
/// Returns an ISO 8601 timestamp like `2023-01-01T12:00:00.000Z`.
pub fn format_timestamp(unix_secs: u64) -> String {
    let secs = i64::try_from(unix_secs).unwrap_or(i64::MAX);
    match DateTime::from_timestamp(secs, 0) {
        Some(datetime) => datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => "1970-01-01T00:00:00.000Z".to_string(),
    }
}

/// Parse a server-time tag value.
///
/// Accepts RFC 3339 formatted timestamps like `2023-01-01T12:00:00.000Z`.
pub fn parse_server_time(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Local time as sent in a CTCP TIME reply.
pub fn local_time_rfc2822() -> String {
    Local::now().to_rfc2822()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00.000Z");
        assert_eq!(format_timestamp(1_672_574_400), "2023-01-01T12:00:00.000Z");
    }

    #[test]
    fn test_parse_server_time() {
        let parsed = parse_server_time("2023-01-01T12:00:00.000Z").unwrap();
        assert_eq!(parsed.timestamp(), 1_672_574_400);
        assert!(parse_server_time("yesterday").is_none());
    }

    #[test]
    fn test_local_time_is_rfc2822() {
        let now = local_time_rfc2822();
        assert!(DateTime::parse_from_rfc2822(&now).is_ok());
    }
}
