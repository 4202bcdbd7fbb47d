//! Caption video rendering.

use async_trait::async_trait;
use chrono::Local;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use autoreel_models::RenderSpec;

use crate::caption::{build_filter_graph, OUTPUT_LABEL};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::output::{artifact_path, PartialOutput};
use crate::probe::{probe_video, VideoInfo};

/// Produces one video file from a [`RenderSpec`].
#[async_trait]
pub trait VideoRenderer: Send + Sync {
    /// Render and return the path of the finished artifact.
    async fn render(&self, spec: RenderSpec) -> MediaResult<PathBuf>;
}

/// Configuration for [`FfmpegRenderer`].
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Directory artifacts are written to
    pub output_dir: PathBuf,
    /// File name prefix (`<prefix>_<timestamp>.mp4`)
    pub output_prefix: String,
    pub video_codec: String,
    pub audio_codec: String,
    /// Explicit ffmpeg binary; resolved from PATH when unset
    pub ffmpeg_path: Option<PathBuf>,
    /// Kill ffmpeg after this many seconds
    pub timeout_secs: Option<u64>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            output_prefix: "tiktok".to_string(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            ffmpeg_path: None,
            timeout_secs: Some(900),
        }
    }
}

/// Renderer that drives the ffmpeg CLI.
pub struct FfmpegRenderer {
    config: RendererConfig,
    runner: FfmpegRunner,
}

impl FfmpegRenderer {
    pub fn new(config: RendererConfig) -> Self {
        let mut runner = FfmpegRunner::new();
        if let Some(path) = &config.ffmpeg_path {
            runner = runner.with_binary(path);
        }
        if let Some(secs) = config.timeout_secs {
            runner = runner.with_timeout(secs);
        }
        Self { config, runner }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    fn build_command(
        &self,
        spec: &RenderSpec,
        source: &VideoInfo,
        duration_secs: f64,
        caption_file: &Path,
        output: &Path,
    ) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(spec.background(), output)
            .duration(duration_secs)
            .filter_complex(build_filter_graph(spec, duration_secs, caption_file))
            .map(format!("[{}]", OUTPUT_LABEL));

        cmd = if source.has_audio {
            cmd.map("0:a:0").audio_codec(&self.config.audio_codec)
        } else {
            cmd.output_arg("-an")
        };

        cmd.video_codec(&self.config.video_codec)
            .output_args(["-pix_fmt", "yuv420p", "-movflags", "+faststart"])
            .frame_rate(spec.settings().fps)
            .output_arg("-t")
            .output_arg(format!("{:.3}", duration_secs))
    }
}

/// Write the caption text to a temporary file for `drawtext`.
///
/// The file is deleted when the handle drops.
fn write_caption_file(text: &str) -> MediaResult<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("autoreel-caption-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl VideoRenderer for FfmpegRenderer {
    async fn render(&self, spec: RenderSpec) -> MediaResult<PathBuf> {
        let started = Instant::now();

        let source = probe_video(spec.background()).await?;
        if source.width == 0 || source.height == 0 {
            return Err(MediaError::invalid_video(format!(
                "{} reports no frame size",
                spec.background().display()
            )));
        }
        let duration = spec.target_duration(source.duration);
        debug!(
            "Source {} is {:.2}s {}x{}, rendering {:.2}s",
            spec.background().display(),
            source.duration,
            source.width,
            source.height,
            duration
        );

        let caption = write_caption_file(spec.display_text())?;
        let target = artifact_path(&self.config.output_dir, &self.config.output_prefix, "mp4", Local::now());
        let partial = PartialOutput::new(target);

        let cmd = self.build_command(&spec, &source, duration, caption.path(), partial.temp_path());
        self.runner
            .run_with_progress(&cmd, move |p| {
                debug!("Render progress {:.0}%", p.fraction(duration) * 100.0);
            })
            .await?;

        let output = partial.commit().await?;
        info!(
            "Rendered {} in {:.1}s",
            output.display(),
            started.elapsed().as_secs_f64()
        );
        Ok(output)
    }
}
