//! IRCv3 helpers that are not tied to a single module.

pub mod server_time;

pub use self::server_time::{format_timestamp, local_time_rfc2822, parse_server_time};
