//! Full-video extraction: sampling, fallback, validation and series assembly.

pub mod controller;
pub mod error;
pub mod export;
pub mod fallback;
pub mod series;
pub mod validation;

pub use controller::{Extractor, FramePipeline};
pub use error::ExtractError;
pub use export::{load_result, write_result};
pub use series::{ExtractionResult, SeriesAssembler};

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::ProjectConfig;
use crate::log;
use crate::ocr::{OcrReader, TesseractEngine, TextParser};
use crate::video::{FfmpegVideo, FrameSource};

/// Runs the extraction of one video and writes the JSON result.
///
/// `stride` and `radius` override the values stored in the config.
pub fn run_extract(
    video_path: &Path,
    config_path: &Path,
    output_path: &Path,
    stride: Option<u64>,
    radius: Option<u64>,
) -> Result<()> {
    let mut config = ProjectConfig::load(config_path)?;
    if let Some(stride) = stride {
        config.extraction.stride = stride;
    }
    if let Some(radius) = radius {
        config.extraction.fallback_radius = radius;
    }

    let mut video = FfmpegVideo::open(video_path)?;
    let metadata = video.metadata().clone();
    if let Some(expected) = &config.video {
        if (expected.width, expected.height) != (metadata.width, metadata.height) {
            log(&format!(
                "Warning: ROI was set on a {}x{} video, this one is {}x{}",
                expected.width, expected.height, metadata.width, metadata.height
            ));
        }
    }
    log(&format!(
        "ROI: x={}, y={}, w={}, h={}",
        config.roi.x, config.roi.y, config.roi.w, config.roi.h
    ));

    let engine = TesseractEngine::new(&config.ocr)?;
    let parser = TextParser::new().context("Failed to compile field patterns")?;
    let reader = OcrReader::new(engine, parser);

    let extractor = Extractor::new(config.extraction.stride, config.extraction.fallback_radius);
    let fps = video.frame_rate();
    let total_frames = video.frame_count();
    let mut pipeline = FramePipeline::new(&mut video, config.roi, &reader, &config.validation);

    log("Estimating experiment time range...");
    let (experiment_start_time, experiment_end_time) = extractor.clock_range(&mut pipeline)?;

    let mut assembler = SeriesAssembler::new(fps, config.extraction.skip_current_above);
    let stats = match extractor.run(&mut pipeline, &mut assembler) {
        Ok(stats) => stats,
        Err(e) => {
            log(&format!(
                "Extraction aborted: {} ({} samples collected, {} skipped before the error)",
                e,
                assembler.samples().len(),
                assembler.skipped()
            ));
            return Err(e.into());
        }
    };

    let video_name = video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| video_path.display().to_string());

    let result = ExtractionResult {
        video: video_name,
        fps,
        frame_interval: extractor.stride(),
        fallback_radius: extractor.radius(),
        total_frames,
        processed_frames: stats.processed_frames,
        successful_parses: stats.successful_parses,
        failed_parses: stats.failed_parses,
        fallback_used: stats.fallback_used,
        skipped_over_limit: stats.skipped_over_limit,
        validation_config: config.validation.clone(),
        experiment_start_time,
        experiment_end_time,
        data: assembler.into_samples(),
    };

    write_result(&result, output_path)?;
    log(&format!(
        "Saved {} samples to {}",
        result.data.len(),
        output_path.display()
    ));

    Ok(())
}
