use serde::{Deserialize, Deserializer, Serialize};

/// Depth ceiling used when [`Options::max_depth`] is unset.
pub const DEFAULT_MAX_DEPTH: usize = 1024;

/// Tag namespace used when [`Options::tag_key`] is unset.
pub const DEFAULT_TAG_KEY: &str = "json";

/// Conversion options.
///
/// Unset values (`0`, `""`) fall back to the defaults when a conversion
/// starts, so `Options::default()` and a partially filled config document
/// both behave as expected. Embeddable in a host configuration:
///
/// ```ignore
/// let options = Options::from_json(r#"{ "max_depth": 32, "tag_key": "yaml" }"#)?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Nesting levels permitted below the root. `0` → [`DEFAULT_MAX_DEPTH`].
    /// Negative values in a config document also count as unset.
    #[serde(deserialize_with = "depth_or_unset")]
    pub max_depth: usize,

    /// Tag namespace looked up on record fields. Empty → [`DEFAULT_TAG_KEY`].
    pub tag_key: String,

    /// Convert nil maps and nil sequences to `Value::Nil` instead of empty
    /// containers. Off by default for compatibility with the nil-pointer
    /// asymmetry of the classic behavior.
    pub preserve_nil_containers: bool,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_tag_key(mut self, tag_key: impl Into<String>) -> Self {
        self.tag_key = tag_key.into();
        self
    }

    pub fn with_preserve_nil_containers(mut self, preserve: bool) -> Self {
        self.preserve_nil_containers = preserve;
        self
    }

    /// Fill unset values with their defaults.
    pub fn resolved(mut self) -> Self {
        if self.max_depth == 0 {
            self.max_depth = DEFAULT_MAX_DEPTH;
        }
        if self.tag_key.is_empty() {
            self.tag_key = DEFAULT_TAG_KEY.to_string();
        }
        self
    }

    /// Parse options from a JSON document. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

fn depth_or_unset<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let depth = i64::deserialize(deserializer)?;
    Ok(usize::try_from(depth).unwrap_or(0))
}
