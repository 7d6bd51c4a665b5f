use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::OcrConfig;
use crate::extract::ExtractError;
use crate::log;

/// Where Tesseract is usually installed when it is not on PATH.
const COMMON_EXECUTABLES: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

const COMMON_TESSDATA: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    /// `None` lets Tesseract use its compiled-in default.
    pub tessdata: Option<PathBuf>,
}

/// Per-user directory for a private Tesseract install
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ramp-reader")
        .join("tesseract")
}

/// Resolves the Tesseract executable and language data directory.
///
/// An explicit path in the config wins; otherwise PATH, the per-user
/// directory and the common install locations are tried in that order.
pub fn locate_tesseract(config: &OcrConfig) -> Result<TesseractPaths, ExtractError> {
    let executable = find_tesseract_executable(config.tesseract_path.as_deref())?;
    let tessdata = find_tessdata_dir(config.tessdata_dir.as_deref(), &config.language);

    log(&format!("Tesseract executable: {}", executable.display()));
    match &tessdata {
        Some(dir) => log(&format!("Tesseract data: {}", dir.display())),
        None => log("Tesseract data: engine default"),
    }

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable, checking the configured path first.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf, ExtractError> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(ExtractError::OcrUnavailable(format!(
            "configured tesseract_path does not exist: {}",
            path.display()
        )));
    }

    if responds_to_version(Path::new("tesseract")) {
        return Ok(PathBuf::from("tesseract"));
    }

    let local_name = if cfg!(windows) { "tesseract.exe" } else { "tesseract" };
    let local_exe = get_tesseract_dir().join(local_name);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    for path in COMMON_EXECUTABLES {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(ExtractError::OcrUnavailable(
        "Tesseract not found. Install tesseract-ocr or set ocr.tesseract_path in config/roi.json"
            .to_string(),
    ))
}

/// Finds a tessdata directory holding `<language>.traineddata`.
pub fn find_tessdata_dir(configured: Option<&Path>, language: &str) -> Option<PathBuf> {
    if let Some(dir) = configured {
        return Some(dir.to_path_buf());
    }

    let traineddata = format!("{}.traineddata", language);

    // TESSDATA_PREFIX is honoured by tesseract itself
    if std::env::var_os("TESSDATA_PREFIX").is_some() {
        return None;
    }

    let local = get_tesseract_dir().join("tessdata");
    if local.join(&traineddata).exists() {
        return Some(local);
    }

    COMMON_TESSDATA
        .iter()
        .map(PathBuf::from)
        .find(|p| p.join(&traineddata).exists())
}

fn responds_to_version(executable: &Path) -> bool {
    Command::new(executable)
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_configured_executable_is_unavailable() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("no-such-tesseract");

        match find_tesseract_executable(Some(&missing)) {
            Err(ExtractError::OcrUnavailable(msg)) => assert!(msg.contains("tesseract_path")),
            other => panic!("expected OcrUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_configured_executable_used_verbatim() {
        let dir = tempdir().unwrap();
        let exe = dir.path().join("tesseract");
        std::fs::write(&exe, "").unwrap();

        assert_eq!(find_tesseract_executable(Some(&exe)).unwrap(), exe);
    }

    #[test]
    fn test_configured_tessdata_wins() {
        let dir = tempdir().unwrap();
        assert_eq!(
            find_tessdata_dir(Some(dir.path()), "eng"),
            Some(dir.path().to_path_buf())
        );
    }
}
