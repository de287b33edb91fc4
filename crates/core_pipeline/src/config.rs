//! Pipeline configuration
//!
//! Every section has working defaults; a JSON file only needs the keys it
//! wants to change.

use crate::confusion::ConfusionTable;
use crate::error::ConfigError;
use crate::repair::DEFAULT_MAX_SUBSTITUTIONS;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Characters the OCR engine may emit
pub const ALPHANUMERIC_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Largest bilateral or despeckle radius accepted
pub const MAX_FILTER_RADIUS: u32 = 50;

/// Top-level configuration for a [`Pipeline`](crate::pipeline::Pipeline)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocess: PreprocessConfig,
    pub ocr: OcrConfig,
    pub repair: RepairConfig,
}

impl PipelineConfig {
    /// Load from a JSON file; missing keys take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(contents)?;
        config.preprocess.validate()?;
        Ok(config)
    }
}

/// Image normalisation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Bilateral window radius in pixels (0 disables smoothing)
    pub bilateral_radius: u32,
    /// Intensity difference at which neighbours stop contributing
    pub bilateral_range_sigma: f32,
    pub bilateral_spatial_sigma: f32,
    /// Adaptive threshold window radius in pixels
    pub threshold_block_radius: u32,
    /// Subtracted from the local mean before comparing
    pub threshold_offset: i32,
    /// Median filter radius applied to the binary image (0 disables)
    pub despeckle_radius: u32,
}

impl PreprocessConfig {
    /// Reject filter windows that would cost more than the page itself
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("bilateral_radius", self.bilateral_radius),
            ("despeckle_radius", self.despeckle_radius),
        ] {
            if value > MAX_FILTER_RADIUS {
                return Err(ConfigError::OutOfRange {
                    field,
                    value,
                    max: MAX_FILTER_RADIUS,
                });
            }
        }
        Ok(())
    }
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            bilateral_radius: 2,
            bilateral_range_sigma: 30.0,
            bilateral_spatial_sigma: 2.0,
            threshold_block_radius: 15,
            threshold_offset: 10,
            despeckle_radius: 0,
        }
    }
}

/// Tesseract settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tessdata directory; `None` uses Tesseract's default lookup
    pub datapath: Option<String>,
    pub language: String,
    pub char_whitelist: String,
    /// Tesseract page segmentation mode; 6 is "single uniform block of text"
    pub page_seg_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            datapath: None,
            language: "eng".to_string(),
            char_whitelist: ALPHANUMERIC_WHITELIST.to_string(),
            page_seg_mode: 6,
        }
    }
}

/// Fuzzy repair and validation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    pub enabled: bool,
    /// Most positions a single repair may change
    pub max_substitutions: usize,
    /// Only accept U, J and Z as equipment category
    pub strict_category: bool,
    pub confusion: ConfusionTable,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_substitutions: DEFAULT_MAX_SUBSTITUTIONS,
            strict_category: false,
            confusion: ConfusionTable::default(),
        }
    }
}
