//! Recognition pipeline
//!
//! Decode → preprocess → extract → scan → validate/repair → pick best match.
//! One run is a single synchronous computation; a [`Pipeline`] holds only
//! read-only configuration, so independent runs can share it across threads.

use crate::checksum::ChecksumValidator;
use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::ocr::TextExtractor;
use crate::preprocess::{decode_image, preprocess_image};
use crate::repair::FuzzyRepairer;
use crate::scanner::CandidateScanner;
use crate::types::{PipelineResult, ValidationResult};
use image::DynamicImage;
use tracing::{debug, info, warn};

pub struct Pipeline {
    config: PipelineConfig,
    scanner: CandidateScanner,
    repairer: FuzzyRepairer,
    validator: ChecksumValidator,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        let validator = ChecksumValidator::new(config.repair.strict_category);
        let repairer = FuzzyRepairer::new(
            config.repair.confusion.clone(),
            config.repair.max_substitutions,
            validator,
        );
        let scanner = if config.repair.enabled {
            CandidateScanner::from_repairer(&repairer)
        } else {
            CandidateScanner::strict()
        };

        Self {
            config,
            scanner,
            repairer,
            validator,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run on encoded image bytes
    ///
    /// Never fails: decode and extraction faults come back as a result with
    /// `success == false` and `error` set.
    pub fn run(&self, bytes: &[u8], extractor: &mut dyn TextExtractor) -> PipelineResult {
        match decode_image(bytes) {
            Ok(image) => self.run_image(&image, extractor),
            Err(err) => abort(err),
        }
    }

    /// Run on an already decoded image
    pub fn run_image(
        &self,
        image: &DynamicImage,
        extractor: &mut dyn TextExtractor,
    ) -> PipelineResult {
        match self.extract(image, extractor) {
            Ok(raw_text) => self.run_text(raw_text),
            Err(err) => abort(err),
        }
    }

    /// Scan, validate and repair text that has already been extracted
    pub fn run_text(&self, raw_text: String) -> PipelineResult {
        let candidates = self.scanner.scan(&raw_text);
        debug!(count = candidates.len(), "Scanned candidates");
        if candidates.is_empty() {
            info!("No container ID candidates in text");
        }

        let mut validated: Vec<ValidationResult> = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let result = self.check(candidate);
            if result.is_valid && is_listed(&validated, &result) {
                debug!(
                    candidate = candidate.as_str(),
                    "Repair duplicates an ID already validated"
                );
                continue;
            }
            validated.push(result);
        }

        let result = PipelineResult::completed(raw_text, candidates, validated);
        match result.best_id() {
            Some(id) => info!(container_id = id, "Best match"),
            None if !result.candidates_found.is_empty() => {
                info!("Candidates found but none passed ISO 6346 validation")
            }
            None => {}
        }
        result
    }

    /// Validate one candidate, repairing it when allowed
    pub fn check(&self, candidate: &str) -> ValidationResult {
        let result = if self.config.repair.enabled {
            self.repairer.resolve(candidate)
        } else {
            self.validator.validate(candidate)
        };
        debug!(
            candidate,
            valid = result.is_valid,
            error = ?result.error,
            "Validated candidate"
        );
        result
    }

    fn extract(
        &self,
        image: &DynamicImage,
        extractor: &mut dyn TextExtractor,
    ) -> Result<String, PipelineError> {
        let binary = preprocess_image(image, &self.config.preprocess)?;
        let text = extractor.extract(&binary)?;
        Ok(text)
    }
}

fn is_listed(validated: &[ValidationResult], result: &ValidationResult) -> bool {
    validated
        .iter()
        .any(|v| v.is_valid && v.candidate_id == result.candidate_id)
}

fn abort(err: PipelineError) -> PipelineResult {
    warn!(error = %err, "Recognition run aborted");
    PipelineResult::failure(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractionError;
    use crate::ocr::FixedTextExtractor;
    use crate::types::ValidationError;
    use image::{GrayImage, ImageBuffer, Rgb};

    fn png_bytes() -> Vec<u8> {
        let img = ImageBuffer::from_pixel(16, 16, Rgb([250u8, 250, 250]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn run_with_text(text: &str) -> PipelineResult {
        let mut extractor = FixedTextExtractor::new(text);
        Pipeline::default().run(&png_bytes(), &mut extractor)
    }

    #[test]
    fn test_known_good_end_to_end() {
        let result = run_with_text("MANIFEST\nCONTAINER ID: TCKU7336934\nSEAL 12345");
        assert!(result.success);
        assert_eq!(result.candidates_found, vec!["TCKU7336934"]);
        let best = result.best_match.unwrap();
        assert_eq!(best.candidate_id.as_deref(), Some("TCKU7336934"));
        assert!(best.is_valid);
        assert_eq!(best.computed_check_digit, Some(4));
    }

    #[test]
    fn test_empty_text_is_success() {
        let result = run_with_text("");
        assert!(result.success);
        assert!(result.candidates_found.is_empty());
        assert!(result.validated.is_empty());
        assert!(result.best_match.is_none());
        assert_eq!(result.raw_text.as_deref(), Some(""));
    }

    #[test]
    fn test_garbage_text_never_fails() {
        let result = Pipeline::default().run_text("%%% ??? \u{fffd} 0000 llll".to_string());
        assert!(result.success);
        assert!(result.candidates_found.is_empty());
    }

    #[test]
    fn test_unrepairable_check_digit_misread_is_reported() {
        let result = run_with_text("TCKU733693S");
        assert!(result.success);
        assert_eq!(result.candidates_found, vec!["TCKU733693S"]);
        assert_eq!(result.validated.len(), 1);
        let entry = &result.validated[0];
        assert!(!entry.is_valid);
        assert_eq!(entry.error, Some(ValidationError::RepairExhausted));
        assert!(result.best_match.is_none());
    }

    #[test]
    fn test_repaired_candidate_replaces_original() {
        let result = run_with_text("BOX CSQU3O54383 ON DECK");
        assert_eq!(result.candidates_found, vec!["CSQU3O54383"]);
        let best = result.best_match.unwrap();
        assert_eq!(best.candidate_id.as_deref(), Some("CSQU3054383"));
        assert_eq!(best.repaired_from.as_deref(), Some("CSQU3O54383"));
        assert_eq!(best.corrections.len(), 1);
    }

    #[test]
    fn test_bad_candidate_does_not_hide_others() {
        let result = run_with_text("ABCD1234567 TCKU733693S MSKU9070323");
        assert_eq!(result.validated.len(), 3);
        assert_eq!(result.validated[0].error, Some(ValidationError::ChecksumMismatch));
        assert_eq!(result.validated[1].error, Some(ValidationError::RepairExhausted));
        assert!(result.validated[2].is_valid);
        assert_eq!(result.best_id(), Some("MSKU9070323"));
    }

    #[test]
    fn test_repair_to_known_id_is_not_listed_twice() {
        for text in ["TCKU7336934 TCKU733G934", "TCKU733G934 TCKU7336934"] {
            let result = Pipeline::default().run_text(text.to_string());
            assert_eq!(result.candidates_found.len(), 2, "{}", text);
            assert_eq!(result.validated.len(), 1, "{}", text);
            assert_eq!(result.best_id(), Some("TCKU7336934"));
        }
    }

    #[test]
    fn test_best_match_is_first_valid_in_scan_order() {
        let result = run_with_text("CSQU3054383 TCKU7336934");
        assert_eq!(result.best_id(), Some("CSQU3054383"));
    }

    #[test]
    fn test_repair_disabled() {
        let mut config = PipelineConfig::default();
        config.repair.enabled = false;
        let result = Pipeline::new(config).run_text("CSQU3O54383 tcku7336934".to_string());
        assert!(result.success);
        assert!(result.candidates_found.is_empty());
    }

    #[test]
    fn test_decode_failure() {
        let mut extractor = FixedTextExtractor::new("TCKU7336934");
        let pipeline = Pipeline::default();

        for bytes in [&b""[..], &b"\x89PNG\r\n\x1a\ncorrupt"[..]] {
            let result = pipeline.run(bytes, &mut extractor);
            assert!(!result.success);
            assert!(result.raw_text.is_none());
            assert!(result.candidates_found.is_empty());
            assert!(result.error.unwrap().starts_with("decode failed"));
        }
    }

    #[test]
    fn test_extraction_failure_is_captured() {
        let mut extractor =
            |_: &GrayImage| Err::<String, _>(ExtractionError::new("engine unavailable"));
        let result = Pipeline::default().run(&png_bytes(), &mut extractor);
        assert!(!result.success);
        assert!(result.raw_text.is_none());
        assert_eq!(
            result.error.as_deref(),
            Some("text extraction failed: engine unavailable")
        );
    }

    #[test]
    fn test_extractor_receives_binarized_image() {
        let mut seen = None;
        let mut extractor = |image: &GrayImage| {
            seen = Some((
                image.dimensions(),
                image.pixels().all(|p| p[0] == 0 || p[0] == 255),
            ));
            Ok::<_, ExtractionError>(String::new())
        };
        let result = Pipeline::default().run(&png_bytes(), &mut extractor);
        assert!(result.success);
        assert_eq!(seen, Some(((16, 16), true)));
    }

    #[test]
    fn test_pipeline_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }
}
