//! End-to-end batch runs against in-memory stage implementations.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use autoreel_browser::{Publisher, UploadObserver};
use autoreel_media::{MediaResult, VideoRenderer};
use autoreel_models::{
    BatchEvent, BatchOutcome, IterationOutcome, Job, RenderSettings, RenderSpec, Stage,
};
use autoreel_worker::{
    event_channel, AssetLibrary, BatchOrchestrator, ContentGenerator, CooldownRange,
    EventReceiver, Pipeline, PipelineSettings, ServiceError, StopHandle, TextGenerationService,
};

struct FixedText {
    reply: Option<&'static str>,
    calls: AtomicU32,
}

#[async_trait]
impl TextGenerationService for FixedText {
    async fn generate_text(&self, _model: &str, _prompt: &str) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.reply {
            Some(text) => Ok(text.to_string()),
            None => Err(ServiceError::Empty),
        }
    }
}

/// Writes a small file per render; can empty the input directory afterwards.
struct FakeRenderer {
    output_dir: PathBuf,
    clear_after_render: Option<PathBuf>,
    /// Requested after each render when set
    stop_after_render: Mutex<Option<StopHandle>>,
    renders: AtomicU32,
}

#[async_trait]
impl VideoRenderer for FakeRenderer {
    async fn render(&self, spec: RenderSpec) -> MediaResult<PathBuf> {
        assert!(spec.background().exists());
        let n = self.renders.fetch_add(1, Ordering::SeqCst);
        let output = self.output_dir.join(format!("tiktok_{}.mp4", n));
        std::fs::write(&output, spec.display_text())?;
        if let Some(dir) = &self.clear_after_render {
            for entry in std::fs::read_dir(dir)? {
                std::fs::remove_file(entry?.path())?;
            }
        }
        if let Some(stop) = self.stop_after_render.lock().unwrap().as_ref() {
            stop.request_stop();
        }
        Ok(output)
    }
}

/// Answers from a script of results, `true` once the script runs out.
#[derive(Default)]
struct FakePublisher {
    script: Mutex<VecDeque<bool>>,
    descriptions: Mutex<Vec<String>>,
}

#[async_trait]
impl Publisher for FakePublisher {
    async fn upload(&self, video: &Path, description: &str, _observer: &dyn UploadObserver) -> bool {
        assert!(video.is_file());
        self.descriptions.lock().unwrap().push(description.to_string());
        self.script.lock().unwrap().pop_front().unwrap_or(true)
    }
}

struct Harness {
    orchestrator: BatchOrchestrator,
    events: EventReceiver,
    text: Arc<FixedText>,
    renderer: Arc<FakeRenderer>,
    publisher: Arc<FakePublisher>,
    _input: TempDir,
    output_dir: TempDir,
}

struct Options {
    reply: Option<&'static str>,
    clips: usize,
    clear_after_render: bool,
    cooldown: CooldownRange,
    publish_script: Vec<bool>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reply: Some("\"Hôm nay trời mưa, tôi buồn quá đi thôi\""),
            clips: 2,
            clear_after_render: false,
            cooldown: CooldownRange::new(0, 0),
            publish_script: Vec::new(),
        }
    }
}

fn harness(options: Options) -> Harness {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    for i in 0..options.clips {
        std::fs::write(input.path().join(format!("clip{}.mp4", i)), b"video").unwrap();
    }

    let text = Arc::new(FixedText {
        reply: options.reply,
        calls: AtomicU32::new(0),
    });
    let renderer = Arc::new(FakeRenderer {
        output_dir: output.path().to_path_buf(),
        clear_after_render: options
            .clear_after_render
            .then(|| input.path().to_path_buf()),
        stop_after_render: Mutex::new(None),
        renders: AtomicU32::new(0),
    });
    let publisher = Arc::new(FakePublisher {
        script: Mutex::new(options.publish_script.into()),
        descriptions: Mutex::new(Vec::new()),
    });

    let pipeline = Pipeline {
        generator: ContentGenerator::new(text.clone(), vec!["gemini-2.0-flash".to_string()]),
        assets: AssetLibrary::new(input.path()),
        renderer: renderer.clone(),
        publisher: publisher.clone(),
        settings: PipelineSettings {
            max_chars_per_line: 22,
            cooldown: options.cooldown,
            hashtags: "#tamtrang".to_string(),
            manual_description: "Khoảnh khắc thú vị!".to_string(),
            render: RenderSettings::default(),
        },
    };
    let (tx, rx) = event_channel();

    Harness {
        orchestrator: BatchOrchestrator::new(pipeline, tx),
        events: rx,
        text,
        renderer,
        publisher,
        _input: input,
        output_dir: output,
    }
}

fn last_batch_done(events: &[BatchEvent]) -> Option<(BatchOutcome, u32, u32)> {
    match events.last() {
        Some(BatchEvent::BatchDone {
            outcome,
            completed,
            failed,
            ..
        }) => Some((*outcome, *completed, *failed)),
        _ => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_render_only_batch_completes_clean() {
    let mut h = harness(Options {
        cooldown: CooldownRange::new(1, 1),
        ..Options::default()
    });

    let report = h
        .orchestrator
        .start(Job::new("viết status", 3, false))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.outcome, BatchOutcome::CompletedClean);
    assert_eq!(report.count(IterationOutcome::Rendered), 3);
    assert_eq!(report.cooldowns, 2);
    assert_eq!(h.renderer.renders.load(Ordering::SeqCst), 3);
    assert!(h.publisher.descriptions.lock().unwrap().is_empty());

    let first = &report.iterations[0];
    assert_eq!(first.raw_text.as_deref(), Some("Hôm nay trời mưa, tôi buồn quá đi thôi"));
    assert_eq!(
        first.display_text.as_deref(),
        Some("Hôm nay trời mưa, tôi\nbuồn quá đi thôi")
    );
    assert!(first.output_path.as_ref().unwrap().is_file());

    let events = h.events.drain();
    assert_eq!(
        last_batch_done(&events),
        Some((BatchOutcome::CompletedClean, 3, 0))
    );
    let ticks = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Cooldown { .. }))
        .count();
    assert_eq!(ticks, 2);
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test]
async fn test_published_description_carries_hashtags() {
    let h = harness(Options::default());

    let report = h
        .orchestrator
        .start(Job::new("viết status", 1, true))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.count(IterationOutcome::Published), 1);
    assert_eq!(
        h.publisher.descriptions.lock().unwrap().as_slice(),
        ["Hôm nay trời mưa, tôi buồn quá đi thôi\n\n#tamtrang".to_string()]
    );
}

#[tokio::test]
async fn test_publish_failure_does_not_abort_batch() {
    let mut h = harness(Options {
        publish_script: vec![false, true],
        ..Options::default()
    });

    let report = h
        .orchestrator
        .start(Job::new("viết status", 2, true))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.iterations.len(), 2);
    let failed = &report.iterations[0];
    assert_eq!(failed.outcome, IterationOutcome::Failed);
    assert_eq!(failed.failure.as_ref().unwrap().stage, Stage::Publishing);
    // The artifact survives a failed publish.
    assert!(failed.output_path.as_ref().unwrap().is_file());
    assert_eq!(report.iterations[1].outcome, IterationOutcome::Published);
    assert_eq!(report.outcome, BatchOutcome::CompletedWithErrors);

    let events = h.events.drain();
    assert_eq!(
        last_batch_done(&events),
        Some((BatchOutcome::CompletedWithErrors, 1, 1))
    );
}

#[tokio::test]
async fn test_assets_removed_mid_batch() {
    let h = harness(Options {
        clips: 1,
        clear_after_render: true,
        ..Options::default()
    });

    let report = h
        .orchestrator
        .start(Job::new("viết status", 3, false))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.iterations.len(), 2);
    assert_eq!(report.iterations[0].outcome, IterationOutcome::Rendered);
    let second = &report.iterations[1];
    assert_eq!(second.outcome, IterationOutcome::Failed);
    assert_eq!(second.failure.as_ref().unwrap().stage, Stage::AssetSelection);
    assert_eq!(report.outcome, BatchOutcome::CompletedWithErrors);
    assert_eq!(h.text.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_generation_failure_ends_batch() {
    let mut h = harness(Options {
        reply: None,
        ..Options::default()
    });

    let report = h
        .orchestrator
        .start(Job::new("viết status", 3, true))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.iterations.len(), 1);
    assert_eq!(
        report.iterations[0].failure.as_ref().unwrap().stage,
        Stage::Generation
    );
    assert_eq!(report.cooldowns, 0);
    assert_eq!(h.renderer.renders.load(Ordering::SeqCst), 0);
    assert!(h.publisher.descriptions.lock().unwrap().is_empty());

    let events = h.events.drain();
    assert_eq!(
        last_batch_done(&events),
        Some((BatchOutcome::CompletedWithErrors, 0, 1))
    );
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_only_one_batch_at_a_time() {
    let h = harness(Options {
        cooldown: CooldownRange::new(60, 60),
        ..Options::default()
    });

    let first = h.orchestrator.start(Job::new("viết status", 2, false)).unwrap();
    assert!(h.orchestrator.is_processing());
    assert!(h.orchestrator.start(Job::new("khác", 1, false)).is_none());
    assert!(h.orchestrator.start_manual_upload("/tmp/any.mp4").is_none());

    h.orchestrator.request_stop();
    let report = first.await.unwrap();
    assert_eq!(report.outcome, BatchOutcome::Stopped);
    assert!(!h.orchestrator.is_processing());

    // Idle again, and the old stop request does not leak into the next run.
    let again = h
        .orchestrator
        .start(Job::new("viết status", 1, false))
        .unwrap()
        .await
        .unwrap();
    assert_eq!(again.outcome, BatchOutcome::CompletedClean);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_cooldown_is_prompt() {
    let mut h = harness(Options {
        cooldown: CooldownRange::new(60, 60),
        ..Options::default()
    });

    let handle = h.orchestrator.start(Job::new("viết status", 2, false)).unwrap();
    loop {
        match h.events.recv().await {
            Some(BatchEvent::Cooldown { .. }) => break,
            Some(_) => {}
            None => panic!("channel closed before cooldown"),
        }
    }
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let requested = tokio::time::Instant::now();
    h.orchestrator.request_stop();
    let report = handle.await.unwrap();
    assert!(requested.elapsed() <= Duration::from_secs(1));

    assert_eq!(report.outcome, BatchOutcome::Stopped);
    assert_eq!(report.cooldowns, 1);
    assert_eq!(report.iterations.len(), 2);
    assert_eq!(report.iterations[0].outcome, IterationOutcome::Rendered);
    assert_eq!(report.iterations[1].outcome, IterationOutcome::Skipped);
    assert_eq!(h.renderer.renders.load(Ordering::SeqCst), 1);

    let events = h.events.drain();
    assert_eq!(last_batch_done(&events), Some((BatchOutcome::Stopped, 1, 0)));
}

#[tokio::test]
async fn test_invalid_job_is_rejected() {
    let mut h = harness(Options::default());

    assert!(h.orchestrator.start(Job::new("viết status", 0, false)).is_none());
    assert!(!h.orchestrator.is_processing());

    let events = h.events.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], BatchEvent::Status { message, .. } if message.contains("Invalid job")));
}

#[tokio::test]
async fn test_manual_upload_uses_manual_description() {
    let mut h = harness(Options::default());
    let video = h.output_dir.path().join("existing.mp4");
    std::fs::write(&video, b"video").unwrap();

    let success = h
        .orchestrator
        .start_manual_upload(video.clone())
        .unwrap()
        .await
        .unwrap();

    assert!(success);
    assert_eq!(
        h.publisher.descriptions.lock().unwrap().as_slice(),
        ["Khoảnh khắc thú vị!".to_string()]
    );
    let events = h.events.drain();
    assert!(matches!(events.last(), Some(BatchEvent::UploadDone { success: true })));
    assert!(!h.orchestrator.is_processing());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_render_skips_cooldown() {
    let mut h = harness(Options {
        cooldown: CooldownRange::new(60, 60),
        ..Options::default()
    });
    *h.renderer.stop_after_render.lock().unwrap() = Some(h.orchestrator.stop_handle());

    let started = tokio::time::Instant::now();
    let report = h
        .orchestrator
        .start(Job::new("viết status", 3, false))
        .unwrap()
        .await
        .unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(report.outcome, BatchOutcome::Stopped);
    assert_eq!(report.cooldowns, 0);
    assert_eq!(report.iterations.len(), 2);
    assert_eq!(report.iterations[0].outcome, IterationOutcome::Rendered);
    assert_eq!(report.iterations[1].outcome, IterationOutcome::Skipped);

    let events = h.events.drain();
    assert!(!events
        .iter()
        .any(|e| matches!(e, BatchEvent::Cooldown { .. })));
    assert_eq!(last_batch_done(&events), Some((BatchOutcome::Stopped, 1, 0)));
}

#[tokio::test]
async fn test_huge_count_does_not_preallocate() {
    let h = harness(Options {
        clips: 0,
        ..Options::default()
    });

    let report = h
        .orchestrator
        .start(Job::new("viết status", u32::MAX, false))
        .unwrap()
        .await
        .unwrap();

    assert_eq!(report.iterations.len(), 1);
    assert_eq!(
        report.iterations[0].failure.as_ref().unwrap().stage,
        Stage::AssetSelection
    );
    assert_eq!(report.outcome, BatchOutcome::CompletedWithErrors);
    assert!(!h.orchestrator.is_processing());
}
