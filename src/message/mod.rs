//! IRC wire codec: one line in, one [`Message`] out, and back.

mod nom_parser;
mod serialize;
pub mod tags;
mod types;

pub use self::nom_parser::{LineError, ParsedLine};
pub use self::serialize::format_tags;
pub use self::tags::TagValue;
pub use self::types::{Message, Tag};
