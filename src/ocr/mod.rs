pub mod engine;
pub mod parse;
pub mod preprocess;
pub mod setup;

pub use engine::{TesseractEngine, TextRecognizer};
pub use parse::{clock_seconds, Field, RawReading, TextParser};
pub use preprocess::{binarize_for_ocr, crop_roi};

use image::RgbaImage;

use crate::extract::ExtractError;

/// High-level reader: ROI crop → binarize → recognize → parse.
pub struct OcrReader<R> {
    recognizer: R,
    parser: TextParser,
}

impl<R: TextRecognizer> OcrReader<R> {
    pub fn new(recognizer: R, parser: TextParser) -> Self {
        Self { recognizer, parser }
    }

    /// Raw engine output for an already cropped ROI.
    pub fn read_text(&self, cropped: &RgbaImage) -> Result<String, ExtractError> {
        let binary = binarize_for_ocr(cropped);
        self.recognizer.recognize(&binary)
    }

    /// Reads one data block. Every error except
    /// [`ExtractError::OcrUnavailable`] is a per-frame failure.
    pub fn read(&self, cropped: &RgbaImage) -> Result<RawReading, ExtractError> {
        let text = self.read_text(cropped)?;
        self.parse(&text)
    }

    pub fn parse(&self, text: &str) -> Result<RawReading, ExtractError> {
        self.parser.parse(text)
    }
}
