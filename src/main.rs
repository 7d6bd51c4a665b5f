//! Ramp Reader
//!
//! Reads the current and voltage readout of a magnet power supply display
//! out of a recorded video, frame by frame, and writes it as a time series.

mod config;
mod extract;
mod inspect;
mod ocr;
mod paths;
mod plot;
mod video;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::{ProjectConfig, RoiRect};
use crate::video::FfmpegVideo;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("ramp_reader.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding config/, result/ and logs/
    #[arg(long, global = true, default_value = ".")]
    workdir: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the ROI rectangle of the display for a video
    SetRoi {
        video: PathBuf,
        #[arg(long)]
        x: u32,
        #[arg(long)]
        y: u32,
        #[arg(long)]
        w: u32,
        #[arg(long)]
        h: u32,
    },
    /// Run OCR on a few frames and save the crops for inspection
    TestOcr {
        video: PathBuf,
        #[arg(short, long, default_value_t = 5)]
        frames: usize,
    },
    /// Extract the full time series of a video
    Extract {
        video: PathBuf,
        #[arg(short, long, default_value = "result/output.json")]
        output: PathBuf,
        /// Process every Nth frame (overrides the config)
        #[arg(long)]
        stride: Option<u64>,
        /// Fallback search radius in frames (overrides the config)
        #[arg(long)]
        radius: Option<u64>,
    },
    /// Plot an extraction result
    Plot {
        #[arg(short, long, default_value = "result/output.json")]
        input: PathBuf,
        #[arg(short, long, default_value = "result/graph.png")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    paths::init_workdir(&cli.workdir);

    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("ramp_reader.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    // Ensure output directories exist
    paths::ensure_directories()?;

    let outcome = match &cli.command {
        Commands::SetRoi { video, x, y, w, h } => set_roi(
            &paths::resolve(video),
            RoiRect {
                x: *x,
                y: *y,
                w: *w,
                h: *h,
            },
        ),
        Commands::TestOcr { video, frames } => inspect::run_test_ocr(
            &paths::resolve(video),
            &paths::get_config_path(),
            *frames,
            &paths::get_test_frames_dir(),
        ),
        Commands::Extract {
            video,
            output,
            stride,
            radius,
        } => extract::run_extract(
            &paths::resolve(video),
            &paths::get_config_path(),
            &paths::resolve(output),
            *stride,
            *radius,
        ),
        Commands::Plot { input, output } => {
            plot::run_plot(&paths::resolve(input), &paths::resolve(output))
        }
    };

    if let Err(e) = &outcome {
        log(&format!("Error: {:#}", e));
    }
    outcome
}

/// Validates `roi` against the video's frame size and saves it with the video metadata.
fn set_roi(video_path: &Path, roi: RoiRect) -> Result<()> {
    let video = FfmpegVideo::open(video_path)?;
    let metadata = video.metadata().clone();

    if !roi.fits_within(metadata.width, metadata.height) {
        return Err(anyhow!(
            "ROI x={}, y={}, w={}, h={} does not fit in a {}x{} frame",
            roi.x,
            roi.y,
            roi.w,
            roi.h,
            metadata.width,
            metadata.height
        ));
    }

    let config_path = paths::get_config_path();
    let config = ProjectConfig::with_roi(&config_path, roi, Some(metadata))?;
    config.save(&config_path)?;

    log(&format!(
        "ROI set: x={}, y={}, w={}, h={}",
        roi.x, roi.y, roi.w, roi.h
    ));
    Ok(())
}
