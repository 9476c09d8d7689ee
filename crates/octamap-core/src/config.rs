//! Projected cube map configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::layout::MAX_LEVELS;

/// Configuration of an octahedral projected cube map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctahedralMapConfig {
    /// Upper bound on processed input levels (clamped to `1..=6`).
    pub max_levels: usize,
    /// Prefix for GPU object labels.
    pub label: String,
}

impl Default for OctahedralMapConfig {
    fn default() -> Self {
        Self {
            max_levels: MAX_LEVELS,
            label: "octahedral cube map".to_string(),
        }
    }
}

impl OctahedralMapConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Sets the level cap.
    pub fn with_max_levels(mut self, max_levels: usize) -> Self {
        self.max_levels = max_levels;
        self
    }

    /// Sets the label prefix.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Number of levels processed for `input_count` cube maps.
    pub fn level_count(&self, input_count: usize) -> usize {
        input_count.min(self.max_levels.clamp(1, MAX_LEVELS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OctahedralMapConfig::default();
        assert_eq!(config.max_levels, 6);
        assert_eq!(config.level_count(8), 6);
        assert_eq!(config.level_count(3), 3);
    }

    #[test]
    fn test_config_builder_clamps() {
        let config = OctahedralMapConfig::new().with_max_levels(10).with_label("sky");
        assert_eq!(config.label, "sky");
        assert_eq!(config.level_count(8), 6);

        let config = OctahedralMapConfig::new().with_max_levels(0);
        assert_eq!(config.level_count(4), 1);
    }

    #[test]
    fn test_config_from_json() {
        let config = OctahedralMapConfig::from_json(r#"{ "max_levels": 4 }"#).unwrap();
        assert_eq!(config.max_levels, 4);
        assert_eq!(config.label, "octahedral cube map");

        assert!(OctahedralMapConfig::from_json("{ not json").is_err());
    }
}
