//! JSON persistence of extraction results.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use super::series::ExtractionResult;

/// Writes the result as pretty-printed JSON, creating the parent directory.
pub fn write_result(result: &ExtractionResult, output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)
            .context(format!("Failed to create output directory: {}", parent.display()))?;
    }

    let json =
        serde_json::to_string_pretty(result).context("Failed to serialize extraction result")?;

    let mut file = File::create(output_path)
        .context(format!("Failed to create JSON file: {}", output_path.display()))?;

    file.write_all(json.as_bytes())
        .context("Failed to write JSON data")?;

    Ok(())
}

/// Reads a result written by [`write_result`].
pub fn load_result(input_path: &Path) -> Result<ExtractionResult> {
    let contents = fs::read_to_string(input_path)
        .context(format!("Failed to read {}", input_path.display()))?;
    serde_json::from_str(&contents).context(format!("Failed to parse {}", input_path.display()))
}
