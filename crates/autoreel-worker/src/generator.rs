//! Content generation with model fallback.

use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

use crate::gemini::TextGenerationService;
use crate::metrics;

/// Every configured model failed.
#[derive(Debug, Clone, Error)]
#[error("{cause} (after {attempts} attempt(s))")]
pub struct GenerationFailure {
    /// Human-readable cause, the last model's error
    pub cause: String,
    /// Number of models tried
    pub attempts: usize,
}

/// Generates status text through an ordered list of models.
#[derive(Clone)]
pub struct ContentGenerator {
    service: Arc<dyn TextGenerationService>,
    models: Vec<String>,
}

impl ContentGenerator {
    pub fn new(service: Arc<dyn TextGenerationService>, models: Vec<String>) -> Self {
        Self { service, models }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Try each model once, in order, and return the first answer.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationFailure> {
        let mut last_error = None;
        let mut attempts = 0;

        for model in &self.models {
            attempts += 1;
            info!(model = %model, "Attempting generation with model {}", model);
            let started = Instant::now();

            match self.service.generate_text(model, prompt).await {
                Ok(text) => {
                    metrics::record_generation_attempt(model, true, started.elapsed().as_secs_f64());
                    info!(model = %model, "Generated content with {}", model);
                    return Ok(sanitize(&text));
                }
                Err(e) => {
                    metrics::record_generation_attempt(model, false, started.elapsed().as_secs_f64());
                    warn!(model = %model, "Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(GenerationFailure {
            cause: last_error
                .map(|e| format!("all models failed, last error: {}", e))
                .unwrap_or_else(|| "no generation models configured".to_string()),
            attempts,
        })
    }
}

/// Trim surrounding whitespace and drop every double quote.
pub fn sanitize(text: &str) -> String {
    text.trim().replace('"', "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Answers with `reply` for models in `working`, fails otherwise.
    struct Scripted {
        working: Vec<&'static str>,
        reply: &'static str,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TextGenerationService for Scripted {
        async fn generate_text(&self, model: &str, _prompt: &str) -> Result<String, ServiceError> {
            self.calls.lock().unwrap().push(model.to_string());
            if self.working.iter().any(|w| *w == model) {
                Ok(self.reply.to_string())
            } else {
                Err(ServiceError::Status {
                    status: 503,
                    body: "overloaded".to_string(),
                })
            }
        }
    }

    fn generator(working: Vec<&'static str>, reply: &'static str) -> (ContentGenerator, Arc<Scripted>) {
        let service = Arc::new(Scripted {
            working,
            reply,
            calls: Mutex::new(Vec::new()),
        });
        let models = vec!["gemini-2.0-flash".to_string(), "gemini-2.5-flash".to_string()];
        (ContentGenerator::new(service.clone(), models), service)
    }

    #[tokio::test]
    async fn test_primary_model_answers() {
        let (content, service) = generator(vec!["gemini-2.0-flash"], "hello");
        assert_eq!(content.generate("p").await.unwrap(), "hello");
        assert_eq!(*service.calls.lock().unwrap(), vec!["gemini-2.0-flash"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_second_model() {
        let (content, service) = generator(vec!["gemini-2.5-flash"], "fallback");
        assert_eq!(content.generate("p").await.unwrap(), "fallback");
        assert_eq!(service.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_makes_one_attempt_per_model() {
        let (content, service) = generator(vec![], "");
        let failure = content.generate("p").await.unwrap_err();

        assert_eq!(failure.attempts, 2);
        assert_eq!(service.calls.lock().unwrap().len(), 2);
        assert!(failure.cause.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_no_models_configured() {
        let service = Arc::new(Scripted {
            working: vec![],
            reply: "",
            calls: Mutex::new(Vec::new()),
        });
        let content = ContentGenerator::new(service.clone(), Vec::new());
        let failure = content.generate("p").await.unwrap_err();

        assert_eq!(failure.attempts, 0);
        assert!(service.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generated_text_is_sanitized() {
        let (content, _) = generator(vec!["gemini-2.0-flash"], "  quote \"ok\", fine!  \n");
        let text = content.generate("p").await.unwrap();
        assert!(!text.contains('"'));
        assert_eq!(text, "quote ok, fine!");
    }

    #[test]
    fn test_sanitize_keeps_other_punctuation() {
        assert_eq!(sanitize("\"Trời ơi...\" - mình nói"), "Trời ơi... - mình nói");
    }
}
