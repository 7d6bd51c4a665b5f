use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static WORKDIR: OnceLock<PathBuf> = OnceLock::new();

/// Sets the working directory all project paths are resolved against.
/// Only the first call has an effect.
pub fn init_workdir(dir: &Path) {
    let _ = WORKDIR.set(dir.to_path_buf());
}

/// Returns the working directory, `.` when not initialized.
pub fn get_workdir() -> &'static PathBuf {
    WORKDIR.get_or_init(|| PathBuf::from("."))
}

/// Returns the logs directory: `<workdir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_workdir().join("logs")
}

/// Returns the ROI config file: `<workdir>/config/roi.json`
pub fn get_config_path() -> PathBuf {
    get_workdir().join("config").join("roi.json")
}

/// Returns the result directory: `<workdir>/result/`
pub fn get_result_dir() -> PathBuf {
    get_workdir().join("result")
}

/// Returns the OCR test output directory: `<workdir>/result/test_frames/`
pub fn get_test_frames_dir() -> PathBuf {
    get_result_dir().join("test_frames")
}

/// Resolves a user-supplied path: absolute paths are kept, relative ones
/// are taken from the working directory.
pub fn resolve(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        get_workdir().join(path)
    }
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_result_dir())?;
    Ok(())
}
