//! Output series: samples, the accumulating assembler and the final record.

use serde::{Deserialize, Serialize};

use crate::config::ValidationConfig;
use crate::ocr::RawReading;

/// One point of the output series. Field names and order are read by the
/// plotting side and must stay stable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Frame index the reading was actually taken from
    pub frame: u64,
    /// `frame / fps`
    pub time_sec: f64,
    #[serde(rename = "current_A")]
    pub current_a: f64,
    #[serde(rename = "mps_V")]
    pub mps_v: f64,
    #[serde(rename = "mag_V")]
    pub mag_v: f64,
    /// On-screen elapsed time, "hh:mm:ss"
    pub time: String,
}

impl Sample {
    pub fn from_reading(frame: u64, frame_rate: f64, reading: RawReading) -> Self {
        Self {
            frame,
            time_sec: frame as f64 / frame_rate,
            current_a: reading.current_a,
            mps_v: reading.mps_v,
            mag_v: reading.mag_v,
            time: reading.elapsed_time,
        }
    }
}

/// What happened to a reading offered to the assembler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    Accepted,
    /// Current above the limit; dropped without counting as a failure
    SkippedOverLimit,
}

/// Collects accepted samples in arrival order.
///
/// Arrival order is frame order because the controller walks base frames
/// upwards. Samples are never reordered or deduplicated: two neighbouring
/// base frames may both fall back onto the same frame and both are kept.
pub struct SeriesAssembler {
    frame_rate: f64,
    skip_current_above: f64,
    samples: Vec<Sample>,
    skipped: u64,
}

impl SeriesAssembler {
    pub fn new(frame_rate: f64, skip_current_above: f64) -> Self {
        Self {
            frame_rate,
            skip_current_above,
            samples: Vec::new(),
            skipped: 0,
        }
    }

    /// Applies the skip rule (`current_A > limit` is dropped, equality is kept)
    /// and records the sample.
    pub fn offer(&mut self, frame: u64, reading: RawReading) -> Admission {
        if reading.current_a > self.skip_current_above {
            self.skipped += 1;
            return Admission::SkippedOverLimit;
        }

        self.samples
            .push(Sample::from_reading(frame, self.frame_rate, reading));
        Admission::Accepted
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Counters of one extraction run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Base frames visited
    pub processed_frames: u64,
    /// Base frames that produced an accepted sample
    pub successful_parses: u64,
    /// Base frames where neither the frame nor any neighbour could be read
    pub failed_parses: u64,
    /// Successful base frames whose sample came from a neighbour
    pub fallback_used: u64,
    /// Readings dropped by the skip rule
    pub skipped_over_limit: u64,
}

/// Everything written to the output JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub video: String,
    pub fps: f64,
    #[serde(default)]
    pub frame_interval: u64,
    #[serde(default)]
    pub fallback_radius: u64,
    #[serde(default)]
    pub total_frames: u64,
    #[serde(default)]
    pub processed_frames: u64,
    #[serde(default)]
    pub successful_parses: u64,
    #[serde(default)]
    pub failed_parses: u64,
    #[serde(default)]
    pub fallback_used: u64,
    #[serde(default)]
    pub skipped_over_limit: u64,
    #[serde(default)]
    pub validation_config: ValidationConfig,
    #[serde(default)]
    pub experiment_start_time: Option<f64>,
    #[serde(default)]
    pub experiment_end_time: Option<f64>,
    pub data: Vec<Sample>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(current_a: f64) -> RawReading {
        RawReading {
            current_a,
            mps_v: 1.766,
            mag_v: 0.808,
            elapsed_time: "00:29:04".to_string(),
        }
    }

    #[test]
    fn test_sample_timing_uses_frame_index() {
        let sample = Sample::from_reading(14880, 30.0, reading(349.8));
        assert_eq!(
            sample,
            Sample {
                frame: 14880,
                time_sec: 496.0,
                current_a: 349.8,
                mps_v: 1.766,
                mag_v: 0.808,
                time: "00:29:04".to_string(),
            }
        );
    }

    #[test]
    fn test_sample_json_field_names_and_order() {
        let sample = Sample::from_reading(14880, 30.0, reading(349.8));
        let json = serde_json::to_string(&sample).unwrap();
        assert_eq!(
            json,
            r#"{"frame":14880,"time_sec":496.0,"current_A":349.8,"mps_V":1.766,"mag_V":0.808,"time":"00:29:04"}"#
        );
    }

    #[test]
    fn test_skip_rule_boundary() {
        let mut assembler = SeriesAssembler::new(30.0, 550.0);

        assert_eq!(assembler.offer(0, reading(550.0)), Admission::Accepted);
        assert_eq!(assembler.offer(10, reading(551.0)), Admission::SkippedOverLimit);
        assert_eq!(assembler.offer(20, reading(550.01)), Admission::SkippedOverLimit);

        assert_eq!(assembler.samples().len(), 1);
        assert_eq!(assembler.samples()[0].frame, 0);
        assert_eq!(assembler.skipped(), 2);
    }

    #[test]
    fn test_duplicates_kept_in_arrival_order() {
        let mut assembler = SeriesAssembler::new(10.0, 550.0);
        assembler.offer(5, reading(1.0));
        assembler.offer(5, reading(2.0));
        assembler.offer(12, reading(3.0));

        let frames: Vec<u64> = assembler.samples().iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![5, 5, 12]);
        let samples = assembler.into_samples();
        assert_eq!(samples[1].current_a, 2.0);
    }
}
