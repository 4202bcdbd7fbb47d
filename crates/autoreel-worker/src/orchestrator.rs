//! Batch orchestration.
//!
//! A batch runs `count` iterations of asset selection, generation, layout,
//! rendering and optional publishing on one background task, with a
//! randomized cooldown between iterations. At most one batch (or manual
//! upload) runs at a time, and a stop request is honored at the top of each
//! iteration and on every cooldown tick.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use validator::Validate;

use autoreel_browser::{Publisher, UploadObserver, UploadState};
use autoreel_media::{wrap_display, VideoRenderer};
use autoreel_models::{
    BatchEvent, BatchOutcome, BatchReport, Iteration, IterationOutcome, Job, JobId, RenderSettings,
    RenderSpec, Stage,
};

use crate::assets::AssetLibrary;
use crate::config::{AppConfig, CooldownRange};
use crate::error::WorkerError;
use crate::events::EventSender;
use crate::generator::ContentGenerator;
use crate::logging::BatchLogger;
use crate::metrics;
use crate::stop::{StopHandle, StopToken};

/// Progress reported when each stage begins.
mod progress {
    pub const GENERATING: f32 = 0.1;
    pub const RENDERING: f32 = 0.4;
    pub const PUBLISHING: f32 = 0.8;
    pub const DONE: f32 = 1.0;
    pub const PUBLISH_FAILED: f32 = 0.5;
}

/// Per-batch tunables.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub max_chars_per_line: usize,
    pub cooldown: CooldownRange,
    /// Appended to generated text for publishing; empty for none
    pub hashtags: String,
    pub manual_description: String,
    pub render: RenderSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_chars_per_line: config.max_chars_per_line,
            cooldown: config.cooldown,
            hashtags: config.hashtags.clone(),
            manual_description: config.manual_description.clone(),
            render: config.render.clone(),
        }
    }

    /// Description posted with an auto-published video.
    pub fn description_for(&self, raw_text: &str) -> String {
        let hashtags = self.hashtags.trim();
        if hashtags.is_empty() {
            raw_text.to_string()
        } else {
            format!("{}\n\n{}", raw_text, hashtags)
        }
    }
}

/// The stage implementations a batch runs against.
pub struct Pipeline {
    pub generator: ContentGenerator,
    pub assets: AssetLibrary,
    pub renderer: Arc<dyn VideoRenderer>,
    pub publisher: Arc<dyn Publisher>,
    pub settings: PipelineSettings,
}

/// Runs batches and manual uploads, one at a time.
pub struct BatchOrchestrator {
    pipeline: Arc<Pipeline>,
    events: EventSender,
    stop: StopHandle,
    busy: Arc<AtomicBool>,
}

impl BatchOrchestrator {
    pub fn new(pipeline: Pipeline, events: EventSender) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            events,
            stop: StopHandle::new(),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a batch or manual upload is running.
    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Ask the running batch to stop at its next check.
    pub fn request_stop(&self) {
        if self.is_processing() {
            info!("Stop requested");
            self.events.status("Stopping...", None);
        }
        self.stop.request_stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    fn try_acquire(&self) -> bool {
        let acquired = self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok();
        if acquired {
            metrics::set_batch_active(true);
        }
        acquired
    }

    /// Start a batch on a background task.
    ///
    /// Returns `None` without spawning anything when the job is invalid or
    /// another batch or upload is already running.
    pub fn start(&self, job: Job) -> Option<JoinHandle<BatchReport>> {
        if let Err(e) = job.validate() {
            let err = WorkerError::invalid_job(e.to_string());
            warn!("{}", err);
            self.events.status(err.to_string(), None);
            return None;
        }
        if !self.try_acquire() {
            debug!("Batch already running, ignoring start request for {}", job.id);
            return None;
        }
        self.stop.reset();

        let guard = ProcessingGuard::new(
            self.busy.clone(),
            self.events.clone(),
            BatchEvent::BatchDone {
                job_id: job.id.clone(),
                outcome: BatchOutcome::CompletedWithErrors,
                completed: 0,
                failed: 0,
            },
        );
        let token = self.stop.token();
        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let logger = BatchLogger::new(&job.id, "batch");
        let span = logger.create_span();

        Some(tokio::spawn(
            async move {
                let report = run_batch(&pipeline, &job, token, &events, &logger).await;
                metrics::record_batch(report.outcome);
                guard.finish(BatchEvent::batch_done(&report));
                report
            }
            .instrument(span),
        ))
    }

    /// Publish an existing file with the manual description.
    ///
    /// Same single-active rule as [`BatchOrchestrator::start`].
    pub fn start_manual_upload(&self, video: impl Into<PathBuf>) -> Option<JoinHandle<bool>> {
        let video = video.into();
        if !self.try_acquire() {
            debug!("Busy, ignoring manual upload of {}", video.display());
            return None;
        }

        let guard = ProcessingGuard::new(
            self.busy.clone(),
            self.events.clone(),
            BatchEvent::UploadDone { success: false },
        );
        let pipeline = self.pipeline.clone();
        let events = self.events.clone();
        let logger = BatchLogger::new(&JobId::new(), "manual_upload");
        let span = logger.create_span();

        Some(tokio::spawn(
            async move {
                let name = video
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| video.display().to_string());
                logger.log_start(&name);
                events.status(format!("Preparing upload: {}", name), None);

                let observer = StatusObserver::new(events.clone(), "Upload".to_string());
                let success = pipeline
                    .publisher
                    .upload(&video, &pipeline.settings.manual_description, &observer)
                    .await;
                metrics::record_upload(success);

                if success {
                    events.status("Upload succeeded", Some(progress::DONE));
                    logger.log_completion(&name);
                } else {
                    events.status("Upload failed, see the log for details", None);
                    logger.log_warning(0, "manual upload failed");
                }
                guard.finish(BatchEvent::UploadDone { success });
                success
            }
            .instrument(span),
        ))
    }
}

/// Restores the idle state and sends the final event when the task ends,
/// including when it panics.
struct ProcessingGuard {
    busy: Arc<AtomicBool>,
    events: EventSender,
    final_event: Option<BatchEvent>,
}

impl ProcessingGuard {
    fn new(busy: Arc<AtomicBool>, events: EventSender, fallback: BatchEvent) -> Self {
        Self {
            busy,
            events,
            final_event: Some(fallback),
        }
    }

    fn finish(mut self, event: BatchEvent) {
        self.final_event = Some(event);
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        // Idle before the event goes out, so a subscriber can start again
        // as soon as it sees it.
        self.busy.store(false, Ordering::SeqCst);
        metrics::set_batch_active(false);
        if let Some(event) = self.final_event.take() {
            self.events.send(event);
        }
    }
}

/// Forwards upload state transitions as status lines.
struct StatusObserver {
    events: EventSender,
    label: String,
}

impl StatusObserver {
    fn new(events: EventSender, label: String) -> Self {
        Self { events, label }
    }
}

impl UploadObserver for StatusObserver {
    fn on_state(&self, state: UploadState) {
        let message = match state {
            UploadState::Navigate => "opening the upload page...",
            UploadState::AwaitLogin => "please log in to TikTok in the browser window to continue...",
            UploadState::AttachFile => "uploading video...",
            UploadState::FillCaption => "entering description...",
            UploadState::AwaitProcessing => "waiting for the video to be processed...",
            UploadState::Publish => "clicked publish",
            _ => return,
        };
        self.events.status(format!("{}: {}", self.label, message), None);
    }
}

struct IterationStep {
    iteration: Iteration,
    /// The batch cannot continue after this iteration
    fatal: bool,
}

async fn run_batch(
    pipeline: &Pipeline,
    job: &Job,
    mut stop: StopToken,
    events: &EventSender,
    logger: &BatchLogger,
) -> BatchReport {
    logger.log_start(&format!(
        "{} video(s), auto_publish={}",
        job.count, job.auto_publish
    ));
    let started_at = Utc::now();
    let mut iterations = Vec::new();
    let mut cooldowns = 0;
    let mut stopped = false;

    for index in 0..job.count {
        if stop.is_stopped() {
            let mut skipped = Iteration::new(index);
            skipped.mark_skipped();
            metrics::record_iteration(skipped.outcome);
            events.send(BatchEvent::iteration_finished(&skipped));
            iterations.push(skipped);
            stopped = true;
            break;
        }

        let step = run_iteration(pipeline, job, index, events, logger).await;
        metrics::record_iteration(step.iteration.outcome);
        events.send(BatchEvent::iteration_finished(&step.iteration));
        iterations.push(step.iteration);
        if step.fatal {
            break;
        }

        // A stop seen here skips the cooldown; the next pass records it.
        if !job.is_last(index) && !stop.is_stopped() {
            cooldowns += 1;
            let secs = pipeline.settings.cooldown.sample();
            if !cooldown(secs, &mut stop, events).await {
                debug!("Cooldown interrupted by stop request");
            }
        }
    }

    let had_errors = iterations.iter().any(Iteration::is_failed);
    let report = BatchReport {
        job_id: job.id.clone(),
        outcome: BatchOutcome::resolve(stopped, had_errors),
        iterations,
        cooldowns,
        started_at,
        finished_at: Utc::now(),
    };

    let summary = format!(
        "{}: {} saved, {} failed",
        report.outcome.as_str(),
        report.count_success(),
        report.count(IterationOutcome::Failed)
    );
    logger.log_completion(&summary);
    events.status(
        match report.outcome {
            BatchOutcome::CompletedClean => format!("All {} video(s) done", report.count_success()),
            BatchOutcome::CompletedWithErrors => format!("Finished with errors ({})", summary),
            BatchOutcome::Stopped => format!("Stopped ({})", summary),
        },
        None,
    );
    report
}

async fn run_iteration(
    pipeline: &Pipeline,
    job: &Job,
    index: u32,
    events: &EventSender,
    logger: &BatchLogger,
) -> IterationStep {
    let mut iteration = Iteration::new(index);
    let label = format!("Video {}/{}", index + 1, job.count);

    let fail = |mut iteration: Iteration, stage: Stage, cause: String, fatal: bool| {
        logger.log_error(index, stage.as_str(), &cause);
        events.status(format!("{}: {} failed: {}", label, stage, cause), None);
        iteration.mark_failed(stage, cause);
        IterationStep { iteration, fatal }
    };

    let Some(asset) = pipeline.assets.pick_random() else {
        let cause = WorkerError::NoAssets(pipeline.assets.dir().to_path_buf()).to_string();
        return fail(iteration, Stage::AssetSelection, cause, true);
    };
    iteration.set_background(asset.path.clone());

    events.status(format!("{}: generating content...", label), Some(progress::GENERATING));
    let started = Instant::now();
    let raw_text = match pipeline.generator.generate(&job.prompt).await {
        Ok(text) => text,
        Err(failure) => {
            let cause = WorkerError::from(failure).to_string();
            return fail(iteration, Stage::Generation, cause, true);
        }
    };
    metrics::record_stage_duration(Stage::Generation, started.elapsed().as_secs_f64());

    let display_text = wrap_display(&raw_text, pipeline.settings.max_chars_per_line);
    iteration.mark_generated(raw_text.clone(), display_text.clone());
    logger.log_progress(index, "content generated");

    events.status(format!("{}: rendering...", label), Some(progress::RENDERING));
    let started = Instant::now();
    let spec = RenderSpec::new(asset.path, display_text, pipeline.settings.render.clone());
    let output = match pipeline.renderer.render(spec).await {
        Ok(path) => path,
        Err(e) => {
            if let Some(stderr) = e.stderr() {
                debug!("ffmpeg stderr:\n{}", stderr);
            }
            let cause = WorkerError::from(e).to_string();
            return fail(iteration, Stage::Rendering, cause, true);
        }
    };
    metrics::record_stage_duration(Stage::Rendering, started.elapsed().as_secs_f64());
    iteration.mark_rendered(output.clone());
    logger.log_progress(index, &format!("saved {}", output.display()));

    if !job.auto_publish {
        events.status(
            format!("{}: saved {}", label, output.display()),
            Some(progress::DONE),
        );
        return IterationStep {
            iteration,
            fatal: false,
        };
    }

    events.status(format!("{}: publishing...", label), Some(progress::PUBLISHING));
    let started = Instant::now();
    let description = pipeline.settings.description_for(&raw_text);
    let observer = StatusObserver::new(events.clone(), label.clone());
    let published = pipeline.publisher.upload(&output, &description, &observer).await;
    metrics::record_stage_duration(Stage::Publishing, started.elapsed().as_secs_f64());
    metrics::record_upload(published);

    if published {
        iteration.mark_published();
        events.status(format!("{}: published", label), Some(progress::DONE));
        IterationStep {
            iteration,
            fatal: false,
        }
    } else {
        // The artifact is saved; the batch moves on.
        events.status(
            format!("{}: publish failed, video kept at {}", label, output.display()),
            Some(progress::PUBLISH_FAILED),
        );
        logger.log_warning(index, "publish failed");
        iteration.mark_failed(
            Stage::Publishing,
            format!("upload did not complete, video kept at {}", output.display()),
        );
        IterationStep {
            iteration,
            fatal: false,
        }
    }
}

/// Wait `secs` seconds, one tick per second. Returns `false` if a stop
/// request cut the wait short.
async fn cooldown(secs: u64, stop: &mut StopToken, events: &EventSender) -> bool {
    for remaining in (1..=secs).rev() {
        events.send(BatchEvent::cooldown(remaining as u32));
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = stop.stopped() => return false,
        }
    }
    true
}
