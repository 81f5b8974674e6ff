//! Metadata predicates applied before top-k selection.

use crate::models::Metadata;
use crate::models::MetadataValue;

/// Conjunction of equality conditions over entry metadata.
///
/// An empty filter matches everything, so `Option<MetadataFilter>` and
/// `MetadataFilter::new()` behave identically on the query path.
#[derive(Debug, Clone, Default)]
pub struct MetadataFilter {
    conditions: Vec<(String, MetadataValue)>,
}

impl MetadataFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `key` to equal `value`.
    #[must_use]
    pub fn eq(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.conditions.push((key.into(), value.into()));
        self
    }

    /// Restrict to entries of the given type.
    #[must_use]
    pub fn entry_type(entry_type: crate::models::EntryType) -> Self {
        Self::new().eq(crate::models::META_TYPE, entry_type.as_str())
    }

    #[must_use]
    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.conditions
            .iter()
            .all(|(key, expected)| metadata.get(key) == Some(expected))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryType;

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), MetadataValue::from(*v)))
            .collect()
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(MetadataFilter::new().matches(&meta(&[])));
        assert!(MetadataFilter::new().matches(&meta(&[("type", "issue")])));
    }

    #[test]
    fn test_conjunction() {
        let filter = MetadataFilter::new()
            .eq("type", "organization")
            .eq("city", "Springfield");

        assert!(filter.matches(&meta(&[("type", "organization"), ("city", "Springfield")])));
        assert!(!filter.matches(&meta(&[("type", "organization"), ("city", "Shelbyville")])));
        assert!(!filter.matches(&meta(&[("type", "organization")])));
    }

    #[test]
    fn test_entry_type_shorthand() {
        let filter = MetadataFilter::entry_type(EntryType::Organization);
        assert!(filter.matches(&meta(&[("type", "organization")])));
        assert!(!filter.matches(&meta(&[("type", "issue")])));
    }
}
