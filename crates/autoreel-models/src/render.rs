//! Render parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Output frame dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    /// 9:16 portrait frame used for short-form video.
    pub const PORTRAIT_720: FrameSize = FrameSize {
        width: 720,
        height: 1280,
    };
}

impl Default for FrameSize {
    fn default() -> Self {
        Self::PORTRAIT_720
    }
}

/// Caption overlay styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    /// Font file; `None` lets the engine pick its default sans font
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_path: Option<PathBuf>,
    /// Preferred font size in pixels
    pub font_size: u32,
    /// Fill color (engine color name or hex)
    pub color: String,
    /// Outline color
    pub stroke_color: String,
    /// Outline width in pixels
    pub stroke_width: u32,
    /// Share of the frame width the caption box may occupy (0.0 - 1.0)
    pub width_fraction: f64,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: 50,
            color: "white".to_string(),
            stroke_color: "black".to_string(),
            stroke_width: 2,
            width_fraction: 0.9,
        }
    }
}

/// Render parameters shared by every iteration of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSettings {
    /// Output duration ceiling in seconds
    pub max_duration_secs: f64,
    pub frame: FrameSize,
    pub fps: u32,
    /// Canvas fill behind the scaled clip
    pub canvas_color: String,
    pub caption: CaptionStyle,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_duration_secs: 15.0,
            frame: FrameSize::default(),
            fps: 30,
            canvas_color: "black".to_string(),
            caption: CaptionStyle::default(),
        }
    }
}

/// Immutable parameters for one render.
///
/// Built fresh for each iteration and handed to the renderer by value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSpec {
    background: PathBuf,
    display_text: String,
    settings: RenderSettings,
}

impl RenderSpec {
    pub fn new(
        background: impl Into<PathBuf>,
        display_text: impl Into<String>,
        settings: RenderSettings,
    ) -> Self {
        Self {
            background: background.into(),
            display_text: display_text.into(),
            settings,
        }
    }

    pub fn background(&self) -> &Path {
        &self.background
    }

    pub fn display_text(&self) -> &str {
        &self.display_text
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn frame(&self) -> FrameSize {
        self.settings.frame
    }

    pub fn caption(&self) -> &CaptionStyle {
        &self.settings.caption
    }

    /// Duration to render for a source clip of `natural_secs`.
    pub fn target_duration(&self, natural_secs: f64) -> f64 {
        if natural_secs.is_finite() && natural_secs > 0.0 {
            natural_secs.min(self.settings.max_duration_secs)
        } else {
            self.settings.max_duration_secs
        }
    }
}
