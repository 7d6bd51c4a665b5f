//! Project configuration stored in `config/roi.json`.
//!
//! Holds the ROI rectangle chosen for a recording plus the tunables of the
//! extraction run. Every section except `roi` falls back to defaults, so a
//! file written by an older version keeps loading.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Region of interest in absolute pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoiRect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width in pixels, > 0
    pub w: u32,
    /// Height in pixels, > 0
    pub h: u32,
}

impl RoiRect {
    /// Checks the rectangle is non-empty and lies inside a `width`x`height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && self.x.checked_add(self.w).is_some_and(|r| r <= width)
            && self.y.checked_add(self.h).is_some_and(|b| b <= height)
    }
}

/// Video properties recorded when the ROI was chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub frame_count: u64,
}

/// Plausibility limits for a parsed reading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub current_min: f64,
    pub current_max: f64,
    pub voltage_min: f64,
    pub voltage_max: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            current_min: -10.0,
            current_max: 600.0,
            voltage_min: -10.0,
            voltage_max: 15.0,
        }
    }
}

/// Sampling parameters of a full extraction run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Process every Nth frame
    pub stride: u64,
    /// Maximum distance searched around a failed frame
    pub fallback_radius: u64,
    /// Readings with current strictly above this are dropped (calibration artifact)
    pub skip_current_above: f64,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            stride: 10,
            fallback_radius: 5,
            skip_current_above: 550.0,
        }
    }
}

/// How to find and run Tesseract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Explicit executable; searched for when unset
    pub tesseract_path: Option<PathBuf>,
    pub tessdata_dir: Option<PathBuf>,
    pub language: String,
    /// Tesseract `--psm`; 6 = single uniform block of text
    pub page_segmentation_mode: u8,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_path: None,
            tessdata_dir: None,
            language: "eng".to_string(),
            page_segmentation_mode: 6,
        }
    }
}

/// Complete project configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub roi: RoiRect,
    #[serde(default)]
    pub video: Option<VideoMetadata>,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub extraction: ExtractionSettings,
    #[serde(default)]
    pub ocr: OcrConfig,
}

impl ProjectConfig {
    pub fn new(roi: RoiRect, video: Option<VideoMetadata>) -> Self {
        Self {
            roi,
            video,
            validation: ValidationConfig::default(),
            extraction: ExtractionSettings::default(),
            ocr: OcrConfig::default(),
        }
    }

    /// Loads the config, failing with a hint when it has not been created yet.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Err(anyhow!(
                "ROI configuration not found: {}. Run `ramp-reader set-roi` first.",
                config_path.display()
            ));
        }

        let contents = fs::read_to_string(config_path)
            .context(format!("Failed to read {}", config_path.display()))?;
        let config: ProjectConfig = serde_json::from_str(&contents)
            .context(format!("Failed to parse {}", config_path.display()))?;

        crate::log(&format!("Config loaded from {}", config_path.display()));
        Ok(config)
    }

    /// Config to save after choosing a new ROI.
    ///
    /// An existing file keeps its tunables and only gets `roi` and `video`
    /// replaced. A file that exists but cannot be read is an error, never
    /// silently replaced by defaults.
    pub fn with_roi(config_path: &Path, roi: RoiRect, video: Option<VideoMetadata>) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new(roi, video));
        }

        let mut config = Self::load(config_path).context(format!(
            "Existing config {} is unreadable; fix or remove it before running set-roi",
            config_path.display()
        ))?;
        config.roi = roi;
        config.video = video;
        Ok(config)
    }

    pub fn save(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, json)
            .context(format!("Failed to write {}", config_path.display()))?;

        crate::log(&format!("Config saved to {}", config_path.display()));
        Ok(())
    }
}
