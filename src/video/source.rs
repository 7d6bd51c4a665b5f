use image::RgbaImage;

use crate::extract::ExtractError;

/// Random-access decoded frames of one recording.
///
/// Decoding may be slow; callers should expect every `get_frame` to cost
/// a seek plus a decode.
pub trait FrameSource {
    /// Total number of frames, > 0.
    fn frame_count(&self) -> u64;

    /// Frames per second, > 0.
    fn frame_rate(&self) -> f64;

    /// Decodes frame `index`.
    ///
    /// Fails with [`ExtractError::FrameOutOfRange`] when `index >= frame_count()`
    /// and with [`ExtractError::Decode`] when the frame cannot be decoded.
    fn get_frame(&mut self, index: u64) -> Result<RgbaImage, ExtractError>;

    /// `count` indices evenly spaced over the whole recording, starting at frame 0.
    fn sample_indices(&self, count: usize) -> Vec<u64> {
        sample_indices(self.frame_count(), count)
    }
}

/// Evenly spaced indices in `[0, total)`, first frame included, no duplicates.
pub fn sample_indices(total: u64, count: usize) -> Vec<u64> {
    if total == 0 || count == 0 {
        return Vec::new();
    }

    let count = count as u64;
    let mut indices: Vec<u64> = (0..count).map(|i| i * total / count).collect();
    indices.dedup();
    indices
}

/// Rejects indices past the end before any decode is attempted.
pub fn check_index(index: u64, total: u64) -> Result<(), ExtractError> {
    if index >= total {
        return Err(ExtractError::FrameOutOfRange { index, total });
    }
    Ok(())
}
