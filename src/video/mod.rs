pub mod ffmpeg;
pub mod source;

pub use ffmpeg::FfmpegVideo;
pub use source::FrameSource;
