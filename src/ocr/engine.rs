use image::GrayImage;
use std::io::ErrorKind;
use std::process::Command;
use tempfile::NamedTempFile;

use super::setup::{locate_tesseract, TesseractPaths};
use crate::config::OcrConfig;
use crate::extract::ExtractError;

/// Turns a preprocessed crop into raw text.
pub trait TextRecognizer {
    fn recognize(&self, img: &GrayImage) -> Result<String, ExtractError>;
}

/// Tesseract driven as a subprocess, one invocation per crop.
pub struct TesseractEngine {
    paths: TesseractPaths,
    language: String,
    page_segmentation_mode: u8,
}

impl TesseractEngine {
    /// Locates Tesseract and checks it can be started.
    ///
    /// This is the single place where a missing engine is detected; a
    /// failure here is [`ExtractError::OcrUnavailable`] and ends the run.
    pub fn new(config: &OcrConfig) -> Result<Self, ExtractError> {
        let paths = locate_tesseract(config)?;

        let output = Command::new(&paths.executable)
            .arg("--version")
            .output()
            .map_err(|e| {
                ExtractError::OcrUnavailable(format!(
                    "cannot run {}: {}",
                    paths.executable.display(),
                    e
                ))
            })?;
        if !output.status.success() {
            return Err(ExtractError::OcrUnavailable(format!(
                "{} --version exited with {}",
                paths.executable.display(),
                output.status
            )));
        }

        Ok(Self {
            paths,
            language: config.language.clone(),
            page_segmentation_mode: config.page_segmentation_mode,
        })
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage) -> Result<String, ExtractError> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")
            .map_err(|e| ExtractError::RecognitionFailed(format!("temp file: {}", e)))?;
        img.save(temp_input.path())
            .map_err(|e| ExtractError::RecognitionFailed(format!("write crop: {}", e)))?;

        let mut cmd = Command::new(&self.paths.executable);
        cmd.arg(temp_input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.page_segmentation_mode.to_string());
        if let Some(tessdata) = &self.paths.tessdata {
            cmd.arg("--tessdata-dir").arg(tessdata);
        }

        let output = cmd.output().map_err(|e| match e.kind() {
            ErrorKind::NotFound | ErrorKind::PermissionDenied => ExtractError::OcrUnavailable(
                format!("cannot run {}: {}", self.paths.executable.display(), e),
            ),
            _ => ExtractError::RecognitionFailed(e.to_string()),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::RecognitionFailed(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
