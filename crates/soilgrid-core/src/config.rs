//! Run configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "base_rows": 6715,
//!   "base_cols": 13901,
//!   "attribute_match": { "mode": "exact" },
//!   "policy": { "link_tolerance": 0.01, "min_fusion_area": 16 }
//! }
//! ```
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aggregate::AttributeMatch;
use crate::error::{PyramidError, Result};
use crate::policy::PolicyConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PyramidConfig {
    pub base_rows: usize,
    pub base_cols: usize,
    #[serde(default)]
    pub attribute_match: AttributeMatch,
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl PyramidConfig {
    /// Exact matching, no linking, no fusion.
    pub fn new(base_rows: usize, base_cols: usize) -> Self {
        Self {
            base_rows,
            base_cols,
            attribute_match: AttributeMatch::default(),
            policy: PolicyConfig::default(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| PyramidError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_rows == 0 || self.base_cols == 0 {
            return Err(PyramidError::InvalidDimensions {
                rows: self.base_rows,
                cols: self.base_cols,
            });
        }
        if let AttributeMatch::Within { tolerance } = self.attribute_match {
            if !tolerance.is_finite() || tolerance < 0.0 {
                return Err(PyramidError::Config(format!(
                    "similarity tolerance must be a finite non-negative number, got {tolerance}"
                )));
            }
        }
        self.policy.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_json_uses_strict_defaults() {
        let cfg = PyramidConfig::from_json_str(r#"{"base_rows": 4, "base_cols": 8}"#).unwrap();
        assert_eq!(cfg, PyramidConfig::new(4, 8));
        assert_eq!(cfg.attribute_match, AttributeMatch::Exact);
        assert!(cfg.policy.link_tolerance.is_none());
    }

    #[test]
    fn full_json_round_trips_every_field() {
        let json = r#"{
            "base_rows": 6715,
            "base_cols": 13901,
            "attribute_match": { "mode": "within", "tolerance": 0.02 },
            "policy": { "link_tolerance": 0.01, "fusion_tolerance": 0.05, "min_fusion_area": 16 }
        }"#;
        let cfg = PyramidConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.attribute_match, AttributeMatch::Within { tolerance: 0.02 });
        assert_eq!(cfg.policy.link_tolerance, Some(0.01));
        assert_eq!(cfg.policy.fusion_tolerance, Some(0.05));
        assert_eq!(cfg.policy.min_fusion_area, Some(16));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert!(matches!(
            PyramidConfig::from_json_str(r#"{"base_rows": 0, "base_cols": 8}"#),
            Err(PyramidError::InvalidDimensions { .. })
        ));
        assert!(matches!(
            PyramidConfig::from_json_str(r#"{"base_rows": 2}"#),
            Err(PyramidError::Config(_))
        ));
        assert!(matches!(
            PyramidConfig::from_json_str(
                r#"{"base_rows": 2, "base_cols": 2,
                    "attribute_match": {"mode": "within", "tolerance": -0.5}}"#
            ),
            Err(PyramidError::Config(_))
        ));
    }

    #[test]
    fn missing_config_file_is_io_error() {
        assert!(matches!(
            PyramidConfig::from_path("/nonexistent/soilgrid/pyramid.json"),
            Err(PyramidError::Io(_))
        ));
    }
}
