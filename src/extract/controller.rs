//! Sampling and fallback controller.
//!
//! Walks base frames `0, S, 2S, …`; when a base frame cannot be read it
//! tries neighbours `i-1, i+1, …, i-R, i+R` and keeps the first that works.
//! Per-frame failures never leave this module; fatal ones end the run.

use crate::config::{RoiRect, ValidationConfig};
use crate::extract::fallback::fallback_candidates;
use crate::extract::series::{Admission, RunStats, SeriesAssembler};
use crate::extract::validation::validate_reading;
use crate::extract::ExtractError;
use crate::log;
use crate::ocr::{clock_seconds, crop_roi, OcrReader, RawReading, TextRecognizer};
use crate::video::FrameSource;

/// Number of frames sampled at each end to estimate the experiment clock range.
const CLOCK_RANGE_SAMPLES: u64 = 5;

/// Reads one frame index into a validated reading.
pub trait ReadingProbe {
    fn frame_count(&self) -> u64;
    fn probe(&mut self, index: u64) -> Result<RawReading, ExtractError>;
}

/// Decode → crop → OCR → parse → validate for a single frame.
pub struct FramePipeline<'a, S, R> {
    source: &'a mut S,
    roi: RoiRect,
    reader: &'a OcrReader<R>,
    limits: &'a ValidationConfig,
}

impl<'a, S: FrameSource, R: TextRecognizer> FramePipeline<'a, S, R> {
    pub fn new(
        source: &'a mut S,
        roi: RoiRect,
        reader: &'a OcrReader<R>,
        limits: &'a ValidationConfig,
    ) -> Self {
        Self {
            source,
            roi,
            reader,
            limits,
        }
    }
}

impl<S: FrameSource, R: TextRecognizer> ReadingProbe for FramePipeline<'_, S, R> {
    fn frame_count(&self) -> u64 {
        self.source.frame_count()
    }

    fn probe(&mut self, index: u64) -> Result<RawReading, ExtractError> {
        let frame = self.source.get_frame(index)?;
        let cropped = crop_roi(&frame, &self.roi)?;
        let reading = self.reader.read(&cropped)?;
        validate_reading(&reading, self.limits)?;
        Ok(reading)
    }
}

/// A base frame that yielded a reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Located {
    pub base: u64,
    /// Frame the reading came from; differs from `base` after a fallback
    pub used: u64,
    pub reading: RawReading,
}

impl Located {
    pub fn offset(&self) -> i64 {
        self.used as i64 - self.base as i64
    }
}

pub struct Extractor {
    stride: u64,
    radius: u64,
}

impl Extractor {
    /// A zero stride is treated as 1.
    pub fn new(stride: u64, radius: u64) -> Self {
        Self {
            stride: stride.max(1),
            radius,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn radius(&self) -> u64 {
        self.radius
    }

    /// Base frames `0, S, 2S, …` below `total`.
    pub fn base_indices(&self, total: u64) -> impl Iterator<Item = u64> {
        (0..total).step_by(self.stride as usize)
    }

    /// Tries `base`, then its neighbours in fallback order.
    ///
    /// Returns `Ok(None)` when nothing within the radius could be read.
    pub fn locate<P: ReadingProbe>(
        &self,
        probe: &mut P,
        base: u64,
    ) -> Result<Option<Located>, ExtractError> {
        let total = probe.frame_count();
        let candidates = std::iter::once(base).chain(fallback_candidates(base, self.radius, total));

        for index in candidates {
            match probe.probe(index) {
                Ok(reading) => {
                    return Ok(Some(Located {
                        base,
                        used: index,
                        reading,
                    }));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(_) => continue,
            }
        }

        Ok(None)
    }

    /// Runs the full sampling loop, streaming accepted samples into `assembler`.
    ///
    /// On a fatal error the samples gathered so far stay in `assembler`.
    pub fn run<P: ReadingProbe>(
        &self,
        probe: &mut P,
        assembler: &mut SeriesAssembler,
    ) -> Result<RunStats, ExtractError> {
        let total = probe.frame_count();
        let base_count = total.div_ceil(self.stride);
        let mut stats = RunStats::default();

        log(&format!(
            "Processing {} base frames (every {} of {}, fallback ±{})",
            base_count, self.stride, total, self.radius
        ));
        if self.stride <= 2 * self.radius {
            log("Note: stride <= 2 x fallback radius, neighbouring base frames may share a fallback frame");
        }

        for base in self.base_indices(total) {
            stats.processed_frames += 1;

            let Some(located) = self.locate(probe, base)? else {
                stats.failed_parses += 1;
                if stats.failed_parses % 10 == 0 {
                    log(&format!(
                        "  Failed to parse {} frames so far...",
                        stats.failed_parses
                    ));
                }
                continue;
            };

            if located.used != base {
                log(&format!(
                    "  Frame {}: used fallback frame {} (offset: {:+})",
                    base,
                    located.used,
                    located.offset()
                ));
            }

            let current = located.reading.current_a;
            match assembler.offer(located.used, located.reading) {
                Admission::Accepted => {
                    stats.successful_parses += 1;
                    if located.used != base {
                        stats.fallback_used += 1;
                    }
                    if stats.successful_parses % 50 == 0 {
                        log(&format!(
                            "  Processed {}/{} frames...",
                            stats.successful_parses, base_count
                        ));
                    }
                }
                Admission::SkippedOverLimit => {
                    stats.skipped_over_limit += 1;
                    log(&format!(
                        "  Frame {}: skipped, current {}A over limit",
                        located.used, current
                    ));
                }
            }
        }

        log(&format!(
            "Run complete: {} ok, {} failed, {} fallback, {} skipped over limit",
            stats.successful_parses,
            stats.failed_parses,
            stats.fallback_used,
            stats.skipped_over_limit
        ));

        Ok(stats)
    }

    /// Estimates when the experiment clock starts and ends, in seconds.
    ///
    /// Reads the on-screen clock on frames from 5% into the video and on the
    /// last frames, stepping by the stride, and takes the median of each set.
    /// Unreadable frames are ignored; only fatal errors propagate.
    pub fn clock_range<P: ReadingProbe>(
        &self,
        probe: &mut P,
    ) -> Result<(Option<f64>, Option<f64>), ExtractError> {
        let total = probe.frame_count();
        if total == 0 {
            return Ok((None, None));
        }

        let start_at = (total as f64 * 0.05) as u64;
        let start_frames: Vec<u64> = (0..CLOCK_RANGE_SAMPLES)
            .map(|i| start_at + i * self.stride)
            .filter(|&f| f < total)
            .collect();
        let end_frames: Vec<u64> = (0..CLOCK_RANGE_SAMPLES)
            .map(|i| (total - 1).saturating_sub(i * self.stride))
            .collect();

        let start = median_clock(probe, &start_frames)?;
        let end = median_clock(probe, &end_frames)?;

        match (start, end) {
            (Some(s), Some(e)) if e > s => log(&format!(
                "Experiment time range: {:.0}s - {:.0}s (duration: {:.0}s)",
                s,
                e,
                e - s
            )),
            _ => log("Could not extract experiment time range"),
        }

        Ok((start, end))
    }
}

/// Upper median of the clock values read on `frames`.
fn median_clock<P: ReadingProbe>(probe: &mut P, frames: &[u64]) -> Result<Option<f64>, ExtractError> {
    let mut times = Vec::new();
    for &frame in frames {
        match probe.probe(frame) {
            Ok(reading) => {
                if let Some(secs) = clock_seconds(&reading.elapsed_time) {
                    times.push(secs as f64);
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(_) => {}
        }
    }

    if times.is_empty() {
        return Ok(None);
    }
    times.sort_by(|a, b| a.total_cmp(b));
    Ok(Some(times[times.len() / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Probe where only the listed frames are readable.
    struct ScriptedProbe {
        total: u64,
        readable: HashMap<u64, RawReading>,
        visited: Vec<u64>,
        fatal_at: Option<u64>,
    }

    impl ScriptedProbe {
        fn new(total: u64) -> Self {
            Self {
                total,
                readable: HashMap::new(),
                visited: Vec::new(),
                fatal_at: None,
            }
        }

        fn readable(mut self, frame: u64, current_a: f64) -> Self {
            self.readable.insert(frame, reading(current_a, "00:00:00"));
            self
        }

        fn with_clock(mut self, frame: u64, clock: &str) -> Self {
            self.readable.insert(frame, reading(100.0, clock));
            self
        }
    }

    impl ReadingProbe for ScriptedProbe {
        fn frame_count(&self) -> u64 {
            self.total
        }

        fn probe(&mut self, index: u64) -> Result<RawReading, ExtractError> {
            self.visited.push(index);
            if index >= self.total {
                return Err(ExtractError::FrameOutOfRange {
                    index,
                    total: self.total,
                });
            }
            if self.fatal_at == Some(index) {
                return Err(ExtractError::OcrUnavailable("engine vanished".into()));
            }
            self.readable
                .get(&index)
                .cloned()
                .ok_or(ExtractError::IncompleteReading {
                    missing: vec![crate::ocr::Field::Current],
                })
        }
    }

    fn reading(current_a: f64, clock: &str) -> RawReading {
        RawReading {
            current_a,
            mps_v: 1.0,
            mag_v: 0.5,
            elapsed_time: clock.to_string(),
        }
    }

    #[test]
    fn test_fallback_search_order() {
        let extractor = Extractor::new(10, 3);
        let mut probe = ScriptedProbe::new(100);

        assert_eq!(extractor.locate(&mut probe, 50).unwrap(), None);
        assert_eq!(probe.visited, vec![50, 49, 51, 48, 52, 47, 53]);
    }

    #[test]
    fn test_selects_plus_two_and_times_it() {
        let extractor = Extractor::new(10, 5);
        let mut probe = ScriptedProbe::new(100).readable(42, 100.0);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        let stats = extractor.run(&mut probe, &mut assembler).unwrap();

        let samples = assembler.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].frame, 42);
        assert_eq!(samples[0].time_sec, 42.0 / 30.0);
        assert_eq!(stats.fallback_used, 1);
        assert_eq!(stats.successful_parses, 1);
    }

    #[test]
    fn test_base_frame_preferred_over_neighbours() {
        let extractor = Extractor::new(10, 5);
        let mut probe = ScriptedProbe::new(100).readable(20, 1.0).readable(19, 2.0);

        let located = extractor.locate(&mut probe, 20).unwrap().unwrap();
        assert_eq!(located.used, 20);
        assert_eq!(located.offset(), 0);
        assert_eq!(probe.visited, vec![20]);
    }

    #[test]
    fn test_all_failures_give_empty_result_without_error() {
        let extractor = Extractor::new(10, 5);
        let mut probe = ScriptedProbe::new(95);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        let stats = extractor.run(&mut probe, &mut assembler).unwrap();

        assert!(assembler.samples().is_empty());
        assert_eq!(stats.processed_frames, 10);
        assert_eq!(stats.failed_parses, 10);
    }

    #[test]
    fn test_never_probes_outside_video() {
        let extractor = Extractor::new(10, 5);
        let mut probe = ScriptedProbe::new(23);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        extractor.run(&mut probe, &mut assembler).unwrap();
        assert!(probe.visited.iter().all(|&f| f < 23));
        assert!(probe.visited.contains(&0));
        assert!(probe.visited.contains(&22));
    }

    #[test]
    fn test_over_limit_reading_is_skipped_not_failed() {
        let extractor = Extractor::new(10, 2);
        let mut probe = ScriptedProbe::new(30)
            .readable(0, 349.8)
            .readable(10, 551.0)
            .readable(20, 550.0);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        let stats = extractor.run(&mut probe, &mut assembler).unwrap();

        let frames: Vec<u64> = assembler.samples().iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![0, 20]);
        assert_eq!(stats.skipped_over_limit, 1);
        assert_eq!(stats.failed_parses, 0);
        assert!(assembler.samples().iter().all(|s| s.current_a <= 550.0));
    }

    #[test]
    fn test_frames_strictly_increasing_when_stride_exceeds_twice_radius() {
        let extractor = Extractor::new(10, 3);
        let mut probe = ScriptedProbe::new(60)
            .readable(3, 1.0)
            .readable(7, 1.0)
            .readable(27, 1.0)
            .readable(50, 1.0);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        extractor.run(&mut probe, &mut assembler).unwrap();

        let frames: Vec<u64> = assembler.samples().iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![3, 7, 27, 50]);
        assert!(frames.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_shared_fallback_frame_kept_twice() {
        // stride == 2 * radius: bases 0 and 10 can both land on frame 5
        let extractor = Extractor::new(10, 5);
        let mut probe = ScriptedProbe::new(11).readable(5, 1.0);
        let mut assembler = SeriesAssembler::new(10.0, 550.0);

        extractor.run(&mut probe, &mut assembler).unwrap();

        let frames: Vec<u64> = assembler.samples().iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![5, 5]);
    }

    #[test]
    fn test_fatal_error_aborts_and_keeps_partial_samples() {
        let extractor = Extractor::new(10, 2);
        let mut probe = ScriptedProbe::new(50).readable(0, 1.0).readable(10, 1.0);
        probe.fatal_at = Some(20);
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        let err = extractor.run(&mut probe, &mut assembler).unwrap_err();

        assert!(matches!(err, ExtractError::OcrUnavailable(_)));
        assert_eq!(assembler.samples().len(), 2);
        assert!(!probe.visited.contains(&30));
    }

    #[test]
    fn test_zero_stride_treated_as_one() {
        let extractor = Extractor::new(0, 0);
        assert_eq!(extractor.stride(), 1);
        assert_eq!(extractor.base_indices(3).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_clock_range_uses_median() {
        let extractor = Extractor::new(10, 0);
        // 5% of 1000 = 50 → start frames 50, 60, 70, 80, 90
        // end frames 999, 989, 979, 969, 959
        let mut probe = ScriptedProbe::new(1000)
            .with_clock(50, "00:00:10")
            .with_clock(60, "00:00:11")
            .with_clock(70, "00:05:00")
            .with_clock(999, "00:30:00")
            .with_clock(989, "00:29:59");

        let (start, end) = extractor.clock_range(&mut probe).unwrap();
        assert_eq!(start, Some(11.0));
        assert_eq!(end, Some(1800.0));
    }

    #[test]
    fn test_clock_range_unreadable() {
        let extractor = Extractor::new(10, 0);
        let mut probe = ScriptedProbe::new(100);
        assert_eq!(extractor.clock_range(&mut probe).unwrap(), (None, None));
    }

    mod pipeline {
        use super::*;
        use crate::ocr::TextParser;
        use image::{GrayImage, ImageBuffer, Rgba, RgbaImage};

        const BLOCK: &str = "ACTUAL CURRENT 349.8 A\nMPS VOLTS 1.766 V\nMAG VOLTS 0.808 V\nElapsed Time 00:29:04";

        /// 30 fps video where only `decodable` frames decode.
        struct SyntheticVideo {
            total: u64,
            decodable: Vec<u64>,
        }

        impl FrameSource for SyntheticVideo {
            fn frame_count(&self) -> u64 {
                self.total
            }

            fn frame_rate(&self) -> f64 {
                30.0
            }

            fn get_frame(&mut self, index: u64) -> Result<RgbaImage, ExtractError> {
                crate::video::source::check_index(index, self.total)?;
                if !self.decodable.contains(&index) {
                    return Err(ExtractError::Decode {
                        index,
                        reason: "corrupt".into(),
                    });
                }
                Ok(ImageBuffer::from_pixel(64, 32, Rgba([30, 30, 30, 255])))
            }
        }

        struct FixedText;

        impl TextRecognizer for FixedText {
            fn recognize(&self, _img: &GrayImage) -> Result<String, ExtractError> {
                Ok(BLOCK.to_string())
            }
        }

        #[test]
        fn test_decode_failure_falls_back_to_neighbour() {
            let mut video = SyntheticVideo {
                total: 14890,
                decodable: vec![14881],
            };
            let reader = OcrReader::new(FixedText, TextParser::new().unwrap());
            let limits = ValidationConfig::default();
            let roi = RoiRect { x: 0, y: 0, w: 32, h: 16 };
            let mut pipeline = FramePipeline::new(&mut video, roi, &reader, &limits);

            let located = Extractor::new(10, 5).locate(&mut pipeline, 14880).unwrap().unwrap();
            assert_eq!(located.used, 14881);
            assert_eq!(located.offset(), 1);
        }

        #[test]
        fn test_pipeline_reading_becomes_sample() {
            let mut video = SyntheticVideo {
                total: 14890,
                decodable: vec![14880],
            };
            let reader = OcrReader::new(FixedText, TextParser::new().unwrap());
            let limits = ValidationConfig::default();
            let roi = RoiRect { x: 0, y: 0, w: 32, h: 16 };
            let mut pipeline = FramePipeline::new(&mut video, roi, &reader, &limits);

            let located = Extractor::new(10, 5).locate(&mut pipeline, 14880).unwrap().unwrap();
            assert_eq!(located.used, 14880);

            let mut assembler = SeriesAssembler::new(30.0, 550.0);
            assembler.offer(located.used, located.reading);
            let sample = &assembler.samples()[0];
            assert_eq!(sample.time_sec, 496.0);
            assert_eq!(sample.current_a, 349.8);
            assert_eq!(sample.mps_v, 1.766);
            assert_eq!(sample.mag_v, 0.808);
            assert_eq!(sample.time, "00:29:04");
        }

        #[test]
        fn test_roi_outside_frame_is_silent_gap() {
            let mut video = SyntheticVideo {
                total: 40,
                decodable: (0..40).collect(),
            };
            let reader = OcrReader::new(FixedText, TextParser::new().unwrap());
            let limits = ValidationConfig::default();
            let roi = RoiRect { x: 60, y: 0, w: 32, h: 16 };
            let mut pipeline = FramePipeline::new(&mut video, roi, &reader, &limits);
            let mut assembler = SeriesAssembler::new(30.0, 550.0);

            let stats = Extractor::new(10, 5).run(&mut pipeline, &mut assembler).unwrap();

            assert!(assembler.samples().is_empty());
            assert_eq!(stats.failed_parses, 4);
        }

        #[test]
        fn test_validation_failure_triggers_fallback() {
            struct Sequence(std::cell::Cell<u32>);

            impl TextRecognizer for Sequence {
                fn recognize(&self, _img: &GrayImage) -> Result<String, ExtractError> {
                    let n = self.0.get();
                    self.0.set(n + 1);
                    // First read is an implausible 3498 A (dropped decimal point)
                    let current = if n == 0 { "3498" } else { "349.8" };
                    Ok(format!(
                        "ACTUAL CURRENT {} A\nMPS VOLTS 1.0 V\nMAG VOLTS 1.0 V\nElapsed Time 00:00:01",
                        current
                    ))
                }
            }

            let mut video = SyntheticVideo {
                total: 20,
                decodable: (0..20).collect(),
            };
            let reader = OcrReader::new(Sequence(std::cell::Cell::new(0)), TextParser::new().unwrap());
            let limits = ValidationConfig::default();
            let roi = RoiRect { x: 0, y: 0, w: 32, h: 16 };
            let mut pipeline = FramePipeline::new(&mut video, roi, &reader, &limits);

            let located = Extractor::new(10, 5).locate(&mut pipeline, 10).unwrap().unwrap();
            assert_eq!(located.used, 9);
            assert_eq!(located.reading.current_a, 349.8);
        }
    }
}
