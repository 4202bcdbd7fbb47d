//! Shared data models for the AutoReel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs and their iterations
//! - Background assets
//! - Render parameters
//! - Progress-channel events and batch reports

pub mod asset;
pub mod event;
pub mod iteration;
pub mod job;
pub mod render;

// Re-export common types
pub use asset::{BackgroundAsset, VideoFormat};
pub use event::{BatchEvent, BatchOutcome, BatchReport};
pub use iteration::{Iteration, IterationFailure, IterationOutcome, Stage};
pub use job::{Job, JobId};
pub use render::{CaptionStyle, FrameSize, RenderSettings, RenderSpec};
