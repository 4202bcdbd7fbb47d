//! AutoReel batch worker.
//!
//! Generates status text, renders it onto background clips and publishes
//! the results, one batch at a time.

pub mod assets;
pub mod config;
pub mod error;
pub mod events;
pub mod gemini;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod stop;

use std::sync::Arc;

use autoreel_browser::{UploadStateMachine, WebDriverConfig, WebDriverEngine};
use autoreel_media::{FfmpegRenderer, RendererConfig};

pub use assets::AssetLibrary;
pub use config::{AppConfig, CooldownRange};
pub use error::{WorkerError, WorkerResult};
pub use events::{event_channel, EventReceiver, EventSender};
pub use gemini::{GeminiClient, ServiceError, TextGenerationService};
pub use generator::{sanitize, ContentGenerator, GenerationFailure};
pub use logging::{init_tracing, BatchLogger};
pub use orchestrator::{BatchOrchestrator, Pipeline, PipelineSettings};
pub use stop::{StopHandle, StopToken};

/// Wire the production stage implementations from `config`.
///
/// The API key is not checked here; manual uploads work without one.
pub fn build_pipeline(config: &AppConfig) -> WorkerResult<Pipeline> {
    let service = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone().unwrap_or_default(),
        config.gemini_base_url.clone(),
    ));
    let generator = ContentGenerator::new(service, config.gemini_models.clone());

    let renderer = Arc::new(FfmpegRenderer::new(RendererConfig {
        output_dir: config.output_dir.clone(),
        output_prefix: config.output_prefix.clone(),
        ..Default::default()
    }));

    let engine = Arc::new(WebDriverEngine::new(WebDriverConfig {
        server_url: config.webdriver_url.clone(),
        page_load_timeout: config.upload.navigation_timeout,
        ..Default::default()
    })?);
    let publisher = Arc::new(UploadStateMachine::new(
        engine,
        config.profile_dir.clone(),
        config.upload.clone(),
    ));

    Ok(Pipeline {
        generator,
        assets: AssetLibrary::new(config.input_dir.clone()),
        renderer,
        publisher,
        settings: PipelineSettings::from_config(config),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_pipeline_from_defaults() {
        let pipeline = build_pipeline(&AppConfig::default()).unwrap();
        assert_eq!(pipeline.generator.models().len(), 2);
        assert_eq!(pipeline.settings.max_chars_per_line, 22);
    }

    #[test]
    fn test_build_pipeline_rejects_bad_webdriver_url() {
        let config = AppConfig {
            webdriver_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(build_pipeline(&config), Err(WorkerError::Browser(_))));
    }
}
