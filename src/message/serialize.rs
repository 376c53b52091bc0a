use std::fmt::{self, Display, Formatter, Write};

use super::tags::escape_tag_value;
use super::{Message, Tag};

/// Write `@k=v;k2` (without the trailing space) for a tag list.
pub(crate) fn write_tags(f: &mut dyn Write, tags: &[Tag]) -> fmt::Result {
    f.write_char('@')?;
    for (i, Tag(key, value)) in tags.iter().enumerate() {
        if i > 0 {
            f.write_char(';')?;
        }
        f.write_str(key)?;
        if let Some(value) = value {
            f.write_char('=')?;
            escape_tag_value(f, value)?;
        }
    }
    Ok(())
}

/// Render a tag list as a wire-format tags section, e.g. `@+typing=active`.
pub fn format_tags(tags: &[Tag]) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_tags(&mut out, tags);
    out
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(tags) = self.tags.as_deref().filter(|t| !t.is_empty()) {
            write_tags(f, tags)?;
            f.write_char(' ')?;
        }

        if let Some(prefix) = &self.prefix {
            write!(f, ":{} ", prefix)?;
        }

        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            write!(f, " :{}", last)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_param_always_colon_prefixed() {
        let msg = Message::parse("JOIN #rust");
        assert_eq!(msg.to_string(), "JOIN :#rust");

        let msg = Message::parse("USER guest 0 * :Real Name");
        assert_eq!(msg.to_string(), "USER guest 0 * :Real Name");
    }

    #[test]
    fn test_tags_escaped_and_flags_bare() {
        let msg = Message::tagmsg("#c")
            .with_tag("+draft/react", Some("id;👍"))
            .with_tag("+draft/bot", None::<String>);
        assert_eq!(msg.to_string(), "@+draft/react=id\\:👍;+draft/bot TAGMSG :#c");
    }

    #[test]
    fn test_prefix_written() {
        let msg = Message::privmsg("#c", "hi").with_prefix("n!u@h");
        assert_eq!(msg.to_string(), ":n!u@h PRIVMSG #c :hi");
    }

    #[test]
    fn test_no_params() {
        assert_eq!(Message::new("AWAY", Vec::<String>::new()).to_string(), "AWAY");
    }

    #[test]
    fn test_format_tags() {
        let tags = vec![Tag::new("+typing", Some("done".to_string()))];
        assert_eq!(format_tags(&tags), "@+typing=done");
    }
}
