//! Frame source backed by the `ffprobe` / `ffmpeg` command line tools.
//!
//! Metadata comes from one ffprobe call at open time. Each frame request
//! spawns ffmpeg, seeks to the frame's timestamp and pipes a single PNG back.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::source::{check_index, FrameSource};
use crate::config::VideoMetadata;
use crate::extract::ExtractError;

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    nb_read_packets: Option<String>,
    duration: Option<String>,
}

pub struct FfmpegVideo {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl FfmpegVideo {
    /// Probes the file and prepares it for random-access decoding.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Video file not found: {}", path.display()));
        }

        let output = Command::new("ffprobe")
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-count_packets")
            .arg("-show_entries")
            .arg("stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,nb_read_packets,duration")
            .arg("-of")
            .arg("json")
            .arg(path)
            .output()
            .context("Failed to run ffprobe. Is ffmpeg installed?")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("ffprobe failed: {}", stderr.trim()));
        }

        let metadata = parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
            .context(format!("Could not read video metadata of {}", path.display()))?;

        crate::log(&format!(
            "Opened {}: {}x{}, {:.3} fps, {} frames",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps,
            metadata.frame_count
        ));

        Ok(Self {
            path: path.to_path_buf(),
            metadata,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }
}

impl FrameSource for FfmpegVideo {
    fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    fn frame_rate(&self) -> f64 {
        self.metadata.fps
    }

    fn get_frame(&mut self, index: u64) -> Result<RgbaImage, ExtractError> {
        check_index(index, self.metadata.frame_count)?;

        let timestamp = index as f64 / self.metadata.fps;
        let output = Command::new("ffmpeg")
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-ss")
            .arg(format!("{:.6}", timestamp))
            .arg("-i")
            .arg(&self.path)
            .arg("-frames:v")
            .arg("1")
            .arg("-f")
            .arg("image2pipe")
            .arg("-vcodec")
            .arg("png")
            .arg("-")
            .output()
            .map_err(|e| ExtractError::Decode {
                index,
                reason: format!("failed to run ffmpeg: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Decode {
                index,
                reason: stderr.trim().to_string(),
            });
        }
        if output.stdout.is_empty() {
            return Err(ExtractError::Decode {
                index,
                reason: "ffmpeg returned no frame".to_string(),
            });
        }

        image::load_from_memory(&output.stdout)
            .map(|img| img.to_rgba8())
            .map_err(|e| ExtractError::Decode {
                index,
                reason: e.to_string(),
            })
    }
}

/// Extracts dimensions, frame rate and frame count from ffprobe's JSON output.
fn parse_ffprobe_json(json: &str) -> Result<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_str(json).context("Invalid ffprobe output")?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let width = stream.width.ok_or_else(|| anyhow!("Missing frame width"))?;
    let height = stream.height.ok_or_else(|| anyhow!("Missing frame height"))?;

    let fps = stream
        .r_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.avg_frame_rate.as_deref().and_then(parse_rate))
        .ok_or_else(|| anyhow!("Missing frame rate"))?;

    let counted = |value: &Option<String>| {
        value
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|&n| n > 0)
    };
    let frame_count = counted(&stream.nb_frames)
        .or_else(|| counted(&stream.nb_read_packets))
        .or_else(|| {
            stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .map(|secs| (secs * fps).round() as u64)
                .filter(|&n| n > 0)
        })
        .ok_or_else(|| anyhow!("Could not determine frame count"))?;

    Ok(VideoMetadata {
        width,
        height,
        fps,
        frame_count,
    })
}

/// Parses "30000/1001" or "25" into frames per second. Zero rates are rejected.
fn parse_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => rate.trim().parse().ok()?,
    };
    (value > 0.0 && value.is_finite()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert_eq!(parse_rate("25"), Some(25.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("abc"), None);
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let json = r#"{
            "programs": [],
            "streams": [{
                "width": 1920,
                "height": 1080,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "duration": "1800.000000",
                "nb_frames": "54000",
                "nb_read_packets": "54000"
            }]
        }"#;

        let meta = parse_ffprobe_json(json).unwrap();
        assert_eq!(meta.width, 1920);
        assert_eq!(meta.height, 1080);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.frame_count, 54000);
    }

    #[test]
    fn test_frame_count_falls_back_to_packets_then_duration() {
        let json = r#"{"streams": [{"width": 640, "height": 480,
            "r_frame_rate": "0/0", "avg_frame_rate": "25/1",
            "nb_read_packets": "250"}]}"#;
        let meta = parse_ffprobe_json(json).unwrap();
        assert_eq!(meta.fps, 25.0);
        assert_eq!(meta.frame_count, 250);

        let json = r#"{"streams": [{"width": 640, "height": 480,
            "r_frame_rate": "10/1", "duration": "12.0"}]}"#;
        assert_eq!(parse_ffprobe_json(json).unwrap().frame_count, 120);
    }

    #[test]
    fn test_no_video_stream() {
        assert!(parse_ffprobe_json(r#"{"streams": []}"#).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        let err = FfmpegVideo::open(Path::new("/definitely/not/here.mp4")).err().unwrap();
        assert!(err.to_string().contains("not found"));
    }
}
