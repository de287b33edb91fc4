//! Core pipeline for SmartScan
//!
//! This crate turns a photographed shipping manifest into validated
//! ISO 6346 container IDs: image normalisation, OCR, candidate scanning,
//! fuzzy repair of letter/digit misreads and check digit validation.

pub mod checksum;
pub mod config;
pub mod confusion;
pub mod error;
pub mod ocr;
pub mod pipeline;
pub mod preprocess;
pub mod repair;
pub mod scanner;
pub mod types;

pub use checksum::ChecksumValidator;
pub use config::PipelineConfig;
pub use confusion::ConfusionTable;
pub use error::{ConfigError, ExtractionError, PipelineError};
pub use ocr::{FixedTextExtractor, LazyTesseractExtractor, TesseractExtractor, TextExtractor};
pub use pipeline::Pipeline;
pub use repair::FuzzyRepairer;
pub use scanner::CandidateScanner;
pub use types::*;
