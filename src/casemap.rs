//! IRC case mapping.
//!
//! Servers advertise how they fold nicknames through the ISUPPORT
//! `CASEMAPPING` token. The client uses it to recognise its own nick in
//! lines that echo it back with different case.

/// A server case-mapping rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CaseMapping {
    /// Only `A`-`Z` fold.
    Ascii,
    /// ASCII plus `[]\~` -> `{}|^`.
    #[default]
    Rfc1459,
    /// ASCII plus `[]\` -> `{}|`.
    StrictRfc1459,
}

impl CaseMapping {
    /// Map a `CASEMAPPING` value. Unknown names fall back to RFC 1459.
    pub fn from_isupport(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("ascii") => Self::Ascii,
            Some("strict-rfc1459") => Self::StrictRfc1459,
            _ => Self::Rfc1459,
        }
    }

    fn fold(self, c: char) -> char {
        match (self, c) {
            (_, 'A'..='Z') => c.to_ascii_lowercase(),
            (Self::Rfc1459 | Self::StrictRfc1459, '[') => '{',
            (Self::Rfc1459 | Self::StrictRfc1459, ']') => '}',
            (Self::Rfc1459 | Self::StrictRfc1459, '\\') => '|',
            (Self::Rfc1459, '~') => '^',
            _ => c,
        }
    }

    /// Lowercase `s` under this mapping.
    pub fn to_lower(self, s: &str) -> String {
        s.chars().map(|c| self.fold(c)).collect()
    }

    /// Compare two names under this mapping.
    pub fn equals(self, a: &str, b: &str) -> bool {
        a.len() == b.len() && a.chars().zip(b.chars()).all(|(x, y)| self.fold(x) == self.fold(y))
    }
}

/// RFC 1459 lowercase.
pub fn irc_to_lower(s: &str) -> String {
    CaseMapping::Rfc1459.to_lower(s)
}

/// RFC 1459 comparison.
pub fn irc_eq(a: &str, b: &str) -> bool {
    CaseMapping::Rfc1459.equals(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc1459_folds_brackets() {
        assert_eq!(irc_to_lower("Nick[Away]~"), "nick{away}^");
        assert!(irc_eq("FOO\\bar", "foo|BAR"));
        assert!(!irc_eq("foo", "fooo"));
    }

    #[test]
    fn test_mapping_from_isupport() {
        assert_eq!(CaseMapping::from_isupport(Some("ascii")), CaseMapping::Ascii);
        assert_eq!(
            CaseMapping::from_isupport(Some("STRICT-RFC1459")),
            CaseMapping::StrictRfc1459
        );
        assert_eq!(CaseMapping::from_isupport(None), CaseMapping::Rfc1459);

        assert!(!CaseMapping::Ascii.equals("a[", "a{"));
        assert!(CaseMapping::StrictRfc1459.equals("a[", "A{"));
        assert!(!CaseMapping::StrictRfc1459.equals("a~", "a^"));
    }
}
