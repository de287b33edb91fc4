//! OCR module
//!
//! Text extraction sits behind the [`TextExtractor`] trait so the rest of the
//! pipeline can run without a recognition engine. The production backend is
//! Tesseract (via leptess), restricted to `A-Z0-9` and told to treat the
//! page as one block of text.
//!
//! Engine handles are owned by the caller and lent to each pipeline run.

use crate::config::OcrConfig;
use crate::error::ExtractionError;
use anyhow::{Context, Result};
use image::GrayImage;
use leptess::{LepTess, Variable};
use tracing::debug;

/// Turns a preprocessed page into raw text
pub trait TextExtractor {
    fn extract(&mut self, image: &GrayImage) -> Result<String, ExtractionError>;
}

impl<F> TextExtractor for F
where
    F: FnMut(&GrayImage) -> Result<String, ExtractionError>,
{
    fn extract(&mut self, image: &GrayImage) -> Result<String, ExtractionError> {
        self(image)
    }
}

/// Tesseract-backed extractor
pub struct TesseractExtractor {
    tesseract: LepTess,
}

impl TesseractExtractor {
    /// Initialise Tesseract with the language, whitelist and segmentation mode from `config`
    ///
    /// # Errors
    /// * Returns error if Tesseract or the language data is not installed
    pub fn new(config: &OcrConfig) -> Result<Self, ExtractionError> {
        Ok(Self::init(config)?)
    }

    fn init(config: &OcrConfig) -> Result<Self> {
        let mut tesseract = LepTess::new(config.datapath.as_deref(), &config.language)
            .context("Failed to initialize Tesseract. Is Tesseract installed?")?;

        tesseract
            .set_variable(Variable::TesseditCharWhitelist, &config.char_whitelist)
            .context("Failed to set Tesseract character whitelist")?;
        tesseract
            .set_variable(
                Variable::TesseditPagesegMode,
                &config.page_seg_mode.to_string(),
            )
            .context("Failed to set Tesseract page segmentation mode")?;

        debug!(
            language = %config.language,
            page_seg_mode = config.page_seg_mode,
            "Tesseract initialized"
        );
        Ok(Self { tesseract })
    }

    fn run(&mut self, input: &GrayImage) -> Result<String> {
        // leptess takes encoded image data, not raw pixels
        let mut png_bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut png_bytes);
        input
            .write_to(&mut cursor, image::ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        self.tesseract
            .set_image_from_mem(&png_bytes)
            .context("Failed to load image into Tesseract")?;

        let text = self
            .tesseract
            .get_utf8_text()
            .context("Failed to extract text from image")?;

        Ok(text)
    }
}

impl TextExtractor for TesseractExtractor {
    fn extract(&mut self, image: &GrayImage) -> Result<String, ExtractionError> {
        let text = self.run(image)?;
        debug!(chars = text.len(), "Tesseract returned text");
        Ok(text)
    }
}

/// Tesseract extractor that starts the engine on first use
///
/// Undecodable images never reach OCR, so a missing Tesseract install only
/// surfaces for images that actually need text extraction.
pub struct LazyTesseractExtractor {
    config: OcrConfig,
    engine: Option<TesseractExtractor>,
}

impl LazyTesseractExtractor {
    pub fn new(config: OcrConfig) -> Self {
        Self {
            config,
            engine: None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.engine.is_some()
    }
}

impl TextExtractor for LazyTesseractExtractor {
    fn extract(&mut self, image: &GrayImage) -> Result<String, ExtractionError> {
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => TesseractExtractor::new(&self.config)?,
        };
        self.engine.insert(engine).extract(image)
    }
}

/// Returns the same text for every image
///
/// Lets the deterministic stages run on text captured elsewhere (tests,
/// replaying stored OCR output).
#[derive(Debug, Clone, Default)]
pub struct FixedTextExtractor {
    text: String,
}

impl FixedTextExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextExtractor for FixedTextExtractor {
    fn extract(&mut self, _image: &GrayImage) -> Result<String, ExtractionError> {
        Ok(self.text.clone())
    }
}
