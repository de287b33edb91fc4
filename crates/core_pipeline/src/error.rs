//! Error types for the recognition pipeline
//!
//! Pipeline-level faults abort a run and are folded into a failed
//! [`PipelineResult`](crate::types::PipelineResult). Per-candidate problems
//! live in [`ValidationError`](crate::types::ValidationError) instead.

use std::path::PathBuf;
use thiserror::Error;

/// Faults that stop a recognition run before candidates are scanned
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input bytes are not a readable image
    #[error("decode failed: {0}")]
    Decode(String),

    /// The image decoded but has no pixels
    #[error("decode failed: image has zero width or height")]
    EmptyImage,

    /// The OCR backend was unavailable or errored
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        PipelineError::Decode(err.to_string())
    }
}

/// Failure reported by a [`TextExtractor`](crate::ocr::TextExtractor)
#[derive(Debug, Error)]
#[error("text extraction failed: {message}")]
pub struct ExtractionError {
    pub message: String,
}

impl ExtractionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ExtractionError {
    fn from(err: anyhow::Error) -> Self {
        // Keep the whole context chain, e.g. "Failed to initialize Tesseract: ..."
        Self::new(format!("{:#}", err))
    }
}

/// Problems loading or validating a [`PipelineConfig`](crate::config::PipelineConfig)
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{field} = {value} exceeds the maximum of {max}")]
    OutOfRange {
        field: &'static str,
        value: u32,
        max: u32,
    },

    #[error("invalid confusion table entry {observed:?} -> {corrected:?}: {reason}")]
    InvalidConfusion {
        observed: char,
        corrected: char,
        reason: &'static str,
    },
}
