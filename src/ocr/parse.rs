use regex::Regex;
use std::fmt;

use crate::extract::ExtractError;

/// Signed decimal number, e.g. `349.8`, `-0.012`, `+1.766`.
const NUMBER_PATTERN: &str = r"[+-]?\d+(?:\.\d+)?";

/// Clock value shown next to "Elapsed Time".
const CLOCK_PATTERN: &str = r"\b(\d{2}):(\d{2}):(\d{2})\b";

/// The four labelled lines of the instrument data block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Current,
    MpsVolts,
    MagVolts,
    ElapsedTime,
}

impl Field {
    /// Fixed extraction order.
    pub const ALL: [Field; 4] = [
        Field::Current,
        Field::MpsVolts,
        Field::MagVolts,
        Field::ElapsedTime,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Current => "ACTUAL CURRENT",
            Field::MpsVolts => "MPS VOLTS",
            Field::MagVolts => "MAG VOLTS",
            Field::ElapsedTime => "Elapsed Time",
        }
    }

    /// Single keyword used when the full label was garbled by OCR.
    fn keyword(self) -> &'static str {
        match self {
            Field::Current => "CURRENT",
            Field::MpsVolts => "MPS",
            Field::MagVolts => "MAG",
            Field::ElapsedTime => "TIME",
        }
    }

    fn label_pattern(self) -> &'static str {
        match self {
            Field::Current => r"(?i)ACTUAL\s+CURRENT",
            Field::MpsVolts => r"(?i)MPS\s+VOLTS",
            Field::MagVolts => r"(?i)MAG\s+VOLTS",
            Field::ElapsedTime => r"(?i)Elapsed\s+Time",
        }
    }

    /// Value grammar: a whole signed number followed by its unit or the end
    /// of the line. Digits inside a garbled label ("V0LTS") or a number cut
    /// by a stray separator ("1,766") never match.
    fn value_pattern(self) -> String {
        let unit = match self {
            Field::Current => "[Aa]",
            Field::MpsVolts | Field::MagVolts => "[Vv]",
            Field::ElapsedTime => return CLOCK_PATTERN.to_string(),
        };
        format!(r"(?:^|[^\d.,+-])({})\s*(?:{}\b|$)", NUMBER_PATTERN, unit)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One successfully parsed data block. All four fields are always present.
#[derive(Clone, Debug, PartialEq)]
pub struct RawReading {
    pub current_a: f64,
    pub mps_v: f64,
    pub mag_v: f64,
    /// "hh:mm:ss" as displayed on screen
    pub elapsed_time: String,
}

/// Result of a single field rule.
#[derive(Clone, Debug, PartialEq)]
enum FieldValue {
    Number(f64),
    Clock(String),
}

struct FieldRule {
    field: Field,
    label: Regex,
    value: Regex,
}

impl FieldRule {
    fn new(field: Field) -> Result<Self, regex::Error> {
        Ok(Self {
            field,
            label: Regex::new(field.label_pattern())?,
            value: Regex::new(&field.value_pattern())?,
        })
    }

    /// Looks for the label on each line and reads the value that follows it.
    /// Lines where only the keyword survived OCR are tried second.
    fn apply(&self, lines: &[&str]) -> Result<FieldValue, ExtractError> {
        for line in lines {
            if let Some(m) = self.label.find(line) {
                if let Some(value) = self.read_value(&line[m.end()..]) {
                    return Ok(value);
                }
            }
        }

        let keyword = self.field.keyword();
        for line in lines {
            let upper = line.to_ascii_uppercase();
            if let Some(pos) = upper.find(keyword) {
                if let Some(value) = self.read_value(&line[pos + keyword.len()..]) {
                    return Ok(value);
                }
            }
        }

        Err(ExtractError::FieldNotFound(self.field))
    }

    fn read_value(&self, rest: &str) -> Option<FieldValue> {
        let caps = self.value.captures(rest)?;
        match self.field {
            Field::ElapsedTime => {
                let minutes: u32 = caps[2].parse().ok()?;
                let seconds: u32 = caps[3].parse().ok()?;
                if minutes >= 60 || seconds >= 60 {
                    return None;
                }
                Some(FieldValue::Clock(format!(
                    "{}:{}:{}",
                    &caps[1], &caps[2], &caps[3]
                )))
            }
            _ => caps[1].parse::<f64>().ok().map(FieldValue::Number),
        }
    }
}

/// Parses the OCR text of the data block into a [`RawReading`].
///
/// Each field is extracted by its own rule, independent of line order.
/// Either all four fields are found or the whole parse fails with
/// [`ExtractError::IncompleteReading`].
pub struct TextParser {
    rules: Vec<FieldRule>,
}

impl TextParser {
    pub fn new() -> Result<Self, regex::Error> {
        let rules = Field::ALL
            .iter()
            .map(|&field| FieldRule::new(field))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn parse(&self, raw_text: &str) -> Result<RawReading, ExtractError> {
        let lines: Vec<&str> = raw_text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();

        let results: Vec<(Field, Result<FieldValue, ExtractError>)> = self
            .rules
            .iter()
            .map(|rule| (rule.field, rule.apply(&lines)))
            .collect();

        let missing: Vec<Field> = results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(f, _)| *f)
            .collect();
        if !missing.is_empty() {
            return Err(ExtractError::IncompleteReading { missing });
        }

        let mut numbers = [0.0f64; 3];
        let mut clock = String::new();
        for (field, result) in results {
            match (field, result) {
                (Field::Current, Ok(FieldValue::Number(v))) => numbers[0] = v,
                (Field::MpsVolts, Ok(FieldValue::Number(v))) => numbers[1] = v,
                (Field::MagVolts, Ok(FieldValue::Number(v))) => numbers[2] = v,
                (Field::ElapsedTime, Ok(FieldValue::Clock(s))) => clock = s,
                (field, _) => {
                    return Err(ExtractError::IncompleteReading {
                        missing: vec![field],
                    });
                }
            }
        }

        Ok(RawReading {
            current_a: numbers[0],
            mps_v: numbers[1],
            mag_v: numbers[2],
            elapsed_time: clock,
        })
    }
}

/// Converts an "hh:mm:ss" clock string to seconds.
pub fn clock_seconds(clock: &str) -> Option<u32> {
    let mut parts = clock.split(':');
    let hours: u32 = parts.next()?.trim().parse().ok()?;
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(hours * 3600 + minutes * 60 + seconds)
}
