//! OCR verification on a handful of frames before a full run.
//!
//! Saves the ROI crop and an ROI-marked full frame for each sampled frame
//! and prints what the reader made of it.

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba};
use std::fs;
use std::path::Path;

use crate::config::{ProjectConfig, RoiRect};
use crate::extract::validation::validate_reading;
use crate::extract::ExtractError;
use crate::log;
use crate::ocr::{crop_roi, OcrReader, RawReading, TesseractEngine, TextParser};
use crate::video::{FfmpegVideo, FrameSource};

/// ROI outline color on saved full frames.
pub const COLOR_ROI: Rgba<u8> = Rgba([0, 255, 0, 255]); // Green

/// Outcome of reading one test frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Ok(RawReading),
    /// Valid, but the full run would drop it for being over the current limit
    Skipped(RawReading),
    Failed(String),
}

/// Applies validation and the skip rule the same way a full run does.
pub fn judge(
    reading: Result<RawReading, ExtractError>,
    config: &ProjectConfig,
) -> Verdict {
    let reading = match reading {
        Ok(reading) => reading,
        Err(e) => return Verdict::Failed(e.to_string()),
    };
    if let Err(e) = validate_reading(&reading, &config.validation) {
        return Verdict::Failed(e.to_string());
    }
    if reading.current_a > config.extraction.skip_current_above {
        return Verdict::Skipped(reading);
    }
    Verdict::Ok(reading)
}

/// Counts of test-ocr outcomes. `parsed` includes readings the skip rule would drop.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub parsed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn add(&mut self, verdict: &Verdict) {
        match verdict {
            Verdict::Ok(_) => self.parsed += 1,
            Verdict::Skipped(_) => {
                self.parsed += 1;
                self.skipped += 1;
            }
            Verdict::Failed(_) => self.failed += 1,
        }
    }
}

/// One line of the results table.
pub fn format_row(frame: u64, verdict: &Verdict) -> String {
    match verdict {
        Verdict::Ok(r) | Verdict::Skipped(r) => {
            let status = if matches!(verdict, Verdict::Ok(_)) {
                "OK"
            } else {
                "SKIPPED"
            };
            format!(
                "{:>8}  {:<8} {:>8.1} A {:>8.3} V {:>8.3} V  {}",
                frame, status, r.current_a, r.mps_v, r.mag_v, r.elapsed_time
            )
        }
        Verdict::Failed(reason) => format!("{:>8}  {:<8} {}", frame, "FAILED", reason),
    }
}

/// Draws a rectangle outline on an image.
pub fn draw_rect(
    img: &mut ImageBuffer<Rgba<u8>, Vec<u8>>,
    roi: &RoiRect,
    color: Rgba<u8>,
    thickness: u32,
) {
    let (img_w, img_h) = img.dimensions();
    let mut put = |px: u32, py: u32| {
        if px < img_w && py < img_h {
            img.put_pixel(px, py, color);
        }
    };

    for d in 0..thickness.min(roi.h) {
        for dx in 0..roi.w {
            // Top and bottom edges
            put(roi.x + dx, roi.y + d);
            put(roi.x + dx, roi.y + roi.h - 1 - d);
        }
    }
    for d in 0..thickness.min(roi.w) {
        for dy in 0..roi.h {
            // Left and right edges
            put(roi.x + d, roi.y + dy);
            put(roi.x + roi.w - 1 - d, roi.y + dy);
        }
    }
}

/// Runs OCR on `frames` evenly spread frames of `video_path`, saving images to `out_dir`.
pub fn run_test_ocr(video_path: &Path, config_path: &Path, frames: usize, out_dir: &Path) -> Result<()> {
    let config = ProjectConfig::load(config_path)?;
    let mut video = FfmpegVideo::open(video_path)?;
    let engine = TesseractEngine::new(&config.ocr)?;
    let parser = TextParser::new().context("Failed to compile field patterns")?;
    let reader = OcrReader::new(engine, parser);

    fs::create_dir_all(out_dir)
        .context(format!("Failed to create {}", out_dir.display()))?;

    let indices = video.sample_indices(frames);
    log(&format!(
        "Testing OCR on {} frames of {}",
        indices.len(),
        video_path.display()
    ));

    let mut rows = Vec::with_capacity(indices.len());
    let mut tally = Tally::default();
    for index in indices {
        let verdict = match test_frame(&mut video, &reader, &config, index, out_dir) {
            Ok(verdict) => verdict,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => Verdict::Failed(e.to_string()),
        };
        tally.add(&verdict);
        rows.push(format_row(index, &verdict));
    }

    log(&format!(
        "{:>8}  {:<8} {:>10} {:>10} {:>10}  {}",
        "frame", "status", "current", "MPS", "MAG", "time"
    ));
    for row in &rows {
        log(row);
    }
    log(&format!(
        "Parsed: {}, failed: {}, would be skipped (> {} A): {}",
        tally.parsed,
        tally.failed,
        config.extraction.skip_current_above,
        tally.skipped
    ));
    log(&format!("Images saved to {}", out_dir.display()));

    Ok(())
}

fn test_frame<S: FrameSource>(
    video: &mut S,
    reader: &OcrReader<TesseractEngine>,
    config: &ProjectConfig,
    index: u64,
    out_dir: &Path,
) -> Result<Verdict, ExtractError> {
    let mut frame = video.get_frame(index)?;
    let cropped = crop_roi(&frame, &config.roi)?;

    let crop_path = out_dir.join(format!("frame_{:06}_roi.png", index));
    if let Err(e) = cropped.save(&crop_path) {
        log(&format!("Could not save {}: {}", crop_path.display(), e));
    }
    draw_rect(&mut frame, &config.roi, COLOR_ROI, 3);
    let full_path = out_dir.join(format!("frame_{:06}_full.png", index));
    if let Err(e) = frame.save(&full_path) {
        log(&format!("Could not save {}: {}", full_path.display(), e));
    }

    let text = reader.read_text(&cropped)?;
    log(&format!("Frame {} raw text: {:?}", index, text.trim()));
    Ok(judge(reader.parse(&text), config))
}
