/// Conversion error.
///
/// Both kinds are terminal: the first one raised anywhere in the tree aborts
/// the whole conversion and no partial result is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The node carries no type information (an untyped nil at the root,
    /// or a `Shape::Invalid` anywhere).
    #[error("invalid value")]
    InvalidValue,

    /// Traversal went deeper than the configured ceiling.
    /// Carries the limit that was in effect.
    #[error("overflow max depth ({0})")]
    MaxDepth(usize),
}

impl Error {
    pub fn is_invalid_value(&self) -> bool {
        matches!(self, Error::InvalidValue)
    }

    pub fn is_max_depth(&self) -> bool {
        matches!(self, Error::MaxDepth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(Error::InvalidValue.to_string(), "invalid value");
        assert_eq!(Error::MaxDepth(8).to_string(), "overflow max depth (8)");
    }

    #[test]
    fn kind_predicates() {
        assert!(Error::InvalidValue.is_invalid_value());
        assert!(!Error::InvalidValue.is_max_depth());
        assert!(Error::MaxDepth(1).is_max_depth());
    }
}
