use crate::config::ValidationConfig;
use crate::extract::ExtractError;
use crate::ocr::RawReading;

/// Rejects readings outside the configured plausibility limits.
///
/// A rejected reading counts as a per-frame failure, so the fallback search
/// moves on to the next neighbour.
pub fn validate_reading(reading: &RawReading, limits: &ValidationConfig) -> Result<(), ExtractError> {
    if !(limits.current_min..=limits.current_max).contains(&reading.current_a) {
        return Err(ExtractError::ValidationFailed(format!(
            "current {}A out of range [{}, {}]",
            reading.current_a, limits.current_min, limits.current_max
        )));
    }

    let voltages = [("MPS", reading.mps_v), ("MAG", reading.mag_v)];
    for (name, value) in voltages {
        if !(limits.voltage_min..=limits.voltage_max).contains(&value) {
            return Err(ExtractError::ValidationFailed(format!(
                "{} voltage {}V out of range [{}, {}]",
                name, value, limits.voltage_min, limits.voltage_max
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(current_a: f64, mps_v: f64, mag_v: f64) -> RawReading {
        RawReading {
            current_a,
            mps_v,
            mag_v,
            elapsed_time: "00:00:00".to_string(),
        }
    }

    #[test]
    fn test_within_limits() {
        let limits = ValidationConfig::default();
        assert!(validate_reading(&reading(349.8, 1.766, 0.808), &limits).is_ok());
        // The skip band above 550 A still passes validation
        assert!(validate_reading(&reading(551.0, 1.0, 1.0), &limits).is_ok());
        assert!(validate_reading(&reading(600.0, 15.0, -10.0), &limits).is_ok());
    }

    #[test]
    fn test_current_out_of_range() {
        let limits = ValidationConfig::default();
        let err = validate_reading(&reading(3498.0, 1.0, 1.0), &limits).unwrap_err();
        assert!(err.to_string().contains("current"));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_voltage_out_of_range() {
        let limits = ValidationConfig::default();
        let err = validate_reading(&reading(100.0, 1.0, 80.8), &limits).unwrap_err();
        assert!(err.to_string().contains("MAG"));
    }
}
