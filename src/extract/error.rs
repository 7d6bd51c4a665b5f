//! Error taxonomy for the extraction pipeline.
//!
//! Per-frame faults are recovered by the fallback search; fatal faults
//! abort the run and are surfaced to the caller once.

use thiserror::Error;

use crate::ocr::Field;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("frame {index} is out of range (video has {total} frames)")]
    FrameOutOfRange { index: u64, total: u64 },

    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },

    #[error("region x={x} y={y} w={w} h={h} does not fit in {image_width}x{image_height} frame")]
    InvalidRegion {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("{0} not found in OCR text")]
    FieldNotFound(Field),

    #[error("incomplete reading, missing: {}", format_fields(.missing))]
    IncompleteReading { missing: Vec<Field> },

    #[error("OCR engine produced no usable output: {0}")]
    RecognitionFailed(String),

    #[error("reading out of range: {0}")]
    ValidationFailed(String),

    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),
}

impl ExtractError {
    /// Fatal errors abort the whole run instead of triggering a fallback search.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExtractError::OcrUnavailable(_) | ExtractError::FrameOutOfRange { .. }
        )
    }
}

fn format_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ExtractError::OcrUnavailable("missing".into()).is_fatal());
        assert!(ExtractError::FrameOutOfRange { index: 5, total: 5 }.is_fatal());
        assert!(!ExtractError::Decode { index: 1, reason: "eof".into() }.is_fatal());
        assert!(!ExtractError::IncompleteReading { missing: vec![Field::MagVolts] }.is_fatal());
        assert!(!ExtractError::ValidationFailed("x".into()).is_fatal());
    }

    #[test]
    fn test_incomplete_reading_message_lists_fields() {
        let err = ExtractError::IncompleteReading {
            missing: vec![Field::Current, Field::ElapsedTime],
        };
        assert_eq!(
            err.to_string(),
            "incomplete reading, missing: ACTUAL CURRENT, Elapsed Time"
        );
    }
}
