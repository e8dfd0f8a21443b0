//! Field tag lookup and parsing.
//!
//! A tag is a `key = "value"` pair attached to a record field, for example
//! `#[tag(json = "user_id,omitempty")]`. The value's first comma-separated
//! component is the output key, the second one may be `omitempty`.

/// Literal that enables omit-if-empty in the second tag component.
pub const OMIT_EMPTY: &str = "omitempty";

/// Parsed view of one field's tag under the configured tag key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTag<'a> {
    /// Output key. May be empty when the tag says so (`",omitempty"`).
    pub name: &'a str,
    pub omit_empty: bool,
}

impl<'a> FieldTag<'a> {
    /// Parse a raw tag value.
    ///
    /// Only the second component is checked for `omitempty`; anything after
    /// it is ignored.
    pub fn parse(raw: &'a str) -> Self {
        let mut parts = raw.split(',');
        let name = parts.next().unwrap_or_default();
        let omit_empty = parts.next() == Some(OMIT_EMPTY);
        Self { name, omit_empty }
    }

    /// Tag for a field that carries none under the configured key.
    pub fn untagged(name: &'a str) -> Self {
        Self {
            name,
            omit_empty: false,
        }
    }
}

/// First tag value registered under `key`.
pub fn lookup<'t>(tags: &[(&str, &'t str)], key: &str) -> Option<&'t str> {
    tags.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("name", "name", false)]
    #[case("name,omitempty", "name", true)]
    #[case(",omitempty", "", true)]
    #[case("", "", false)]
    #[case("name,string", "name", false)]
    #[case("name,string,omitempty", "name", false)]
    #[case("name,omitempty,string", "name", true)]
    #[case("-", "-", false)]
    fn parse_tag(#[case] raw: &str, #[case] name: &str, #[case] omit_empty: bool) {
        let tag = FieldTag::parse(raw);
        assert_eq!(tag.name, name);
        assert_eq!(tag.omit_empty, omit_empty, "raw tag: {raw:?}");
    }

    #[test]
    fn lookup_first_match() {
        let tags = [("yaml", "y"), ("json", "j1"), ("json", "j2")];
        assert_eq!(lookup(&tags, "json"), Some("j1"));
        assert_eq!(lookup(&tags, "yaml"), Some("y"));
        assert_eq!(lookup(&tags, "toml"), None);
    }

    #[test]
    fn untagged_never_omits() {
        let tag = FieldTag::untagged("user_id");
        assert_eq!(tag.name, "user_id");
        assert!(!tag.omit_empty);
    }
}
