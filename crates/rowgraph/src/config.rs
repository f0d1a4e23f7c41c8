//! Mapper configuration.

use serde::{Deserialize, Serialize};

/// What to do when a single-entity field resolves to more than one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbiguityPolicy {
    /// Fail the mapping call with `MapError::AmbiguousAssociation`.
    #[default]
    Error,
    /// Keep the first-seen entity and log the dropped ones at warn level.
    KeepFirst,
}

/// Configuration for a `RowMapper`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Handling of has-one fields that see several distinct entities.
    pub ambiguous_association: AmbiguityPolicy,
    /// Reuse mapper trees across calls with the same columns and destination.
    pub cache_trees: bool,
    /// Maximum entity nesting depth of a destination type.
    pub max_depth: usize,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            ambiguous_association: AmbiguityPolicy::Error,
            cache_trees: true,
            max_depth: 32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: MapperConfig =
            serde_json::from_str(r#"{ "ambiguous_association": "keep_first" }"#).unwrap();
        assert_eq!(config.ambiguous_association, AmbiguityPolicy::KeepFirst);
        assert!(config.cache_trees);
        assert_eq!(config.max_depth, 32);
    }
}
