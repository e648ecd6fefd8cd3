//! Processor Configuration - Serde-Defaulted Settings
//!
//! Every field has a default, so an empty JSON object is a valid config.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{ProcessError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorConfig {
    /// Canvas size used in reconstruction mode
    #[serde(default = "default_template_size")]
    pub template_size: u32,
    #[serde(default)]
    pub corner_adjustments: CornerAdjustments,
    /// Fraction of the larger side added on every edge before rotating
    #[serde(default = "default_rotation_padding")]
    pub rotation_padding: f64,
    #[serde(default = "default_alpha_threshold")]
    pub alpha_threshold: u8,
    /// Pixels each half of a diagonal split reaches past the midline
    #[serde(default = "default_seam_overlap")]
    pub seam_overlap: u32,
}

fn default_template_size() -> u32 {
    400
}

fn default_rotation_padding() -> f64 {
    0.1
}

fn default_alpha_threshold() -> u8 {
    128
}

fn default_seam_overlap() -> u32 {
    2
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            template_size: default_template_size(),
            corner_adjustments: CornerAdjustments::default(),
            rotation_padding: default_rotation_padding(),
            alpha_threshold: default_alpha_threshold(),
            seam_overlap: default_seam_overlap(),
        }
    }
}

impl ProcessorConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ProcessError::Configuration(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Same settings with every corner correction disabled.
    pub fn uncorrected(self) -> Self {
        Self {
            corner_adjustments: CornerAdjustments::identity(),
            ..self
        }
    }

    pub fn with_template_size(self, template_size: u32) -> Self {
        Self { template_size, ..self }
    }
}

/// The physical corner of the sheet a segment sits nearest to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Uniform scale about the canvas center plus an offset in canvas fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub scale: f64,
    pub offset: (f64, f64),
}

impl Adjustment {
    pub const IDENTITY: Self = Self { scale: 1.0, offset: (0.0, 0.0) };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

/// Registration drift introduced by folding, one entry per corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CornerAdjustments {
    pub top_left: Adjustment,
    pub top_right: Adjustment,
    pub bottom_left: Adjustment,
    pub bottom_right: Adjustment,
}

impl CornerAdjustments {
    pub fn identity() -> Self {
        Self {
            top_left: Adjustment::IDENTITY,
            top_right: Adjustment::IDENTITY,
            bottom_left: Adjustment::IDENTITY,
            bottom_right: Adjustment::IDENTITY,
        }
    }

    pub fn for_corner(&self, corner: Corner) -> Adjustment {
        match corner {
            Corner::TopLeft => self.top_left,
            Corner::TopRight => self.top_right,
            Corner::BottomLeft => self.bottom_left,
            Corner::BottomRight => self.bottom_right,
        }
    }
}

impl Default for CornerAdjustments {
    fn default() -> Self {
        Self {
            top_left: Adjustment { scale: 1.01, offset: (0.01, 0.01) },
            top_right: Adjustment { scale: 1.01, offset: (-0.01, 0.01) },
            bottom_left: Adjustment { scale: 1.01, offset: (0.01, -0.01) },
            bottom_right: Adjustment { scale: 1.01, offset: (-0.01, -0.01) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config: ProcessorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProcessorConfig::default());
        assert_eq!(config.template_size, 400);
        assert_eq!(config.alpha_threshold, 128);
    }

    #[test]
    fn test_partial_override() {
        let json = r#"{
            "templateSize": 800,
            "cornerAdjustments": {
                "topLeft": {"scale": 1.0, "offset": [0.0, 0.0]},
                "topRight": {"scale": 1.02, "offset": [-0.02, 0.0]},
                "bottomLeft": {"scale": 1.0, "offset": [0.0, 0.0]},
                "bottomRight": {"scale": 1.0, "offset": [0.0, 0.0]}
            }
        }"#;
        let config: ProcessorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.template_size, 800);
        assert!(config.corner_adjustments.top_left.is_identity());
        assert_eq!(config.corner_adjustments.for_corner(Corner::TopRight).scale, 1.02);
        assert_eq!(config.seam_overlap, 2);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let err = ProcessorConfig::load(Path::new("/nonexistent/fortune.json")).unwrap_err();
        assert!(matches!(err, ProcessError::Configuration(_)));
    }

    #[test]
    fn test_uncorrected_clears_table() {
        let config = ProcessorConfig::default().uncorrected();
        assert_eq!(config.corner_adjustments, CornerAdjustments::identity());
    }
}
