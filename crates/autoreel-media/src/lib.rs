//! FFmpeg-backed rendering for AutoReel.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a cancellable runner
//! - Progress parsing from `-progress pipe:2`
//! - Caption text wrapping and filter graph layout
//! - The [`VideoRenderer`] seam and its ffmpeg implementation

pub mod caption;
pub mod command;
pub mod error;
pub mod layout;
pub mod output;
pub mod probe;
pub mod progress;
pub mod renderer;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use layout::{wrap, wrap_display, DEFAULT_MAX_CHARS_PER_LINE};
pub use output::{artifact_path, PartialOutput};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use renderer::{FfmpegRenderer, RendererConfig, VideoRenderer};
