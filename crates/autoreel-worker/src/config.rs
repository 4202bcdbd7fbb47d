//! Application configuration.

use rand::Rng;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use autoreel_browser::UploadConfig;
use autoreel_media::DEFAULT_MAX_CHARS_PER_LINE;
use autoreel_models::RenderSettings;

use crate::error::{WorkerError, WorkerResult};
use crate::gemini::DEFAULT_BASE_URL;

pub const DEFAULT_PROMPT: &str = "Hãy đóng vai một cô gái ngốc nghếch.\
Hãy viết một dòng trạng thái (status) than vãn, kể khổ về chủ đề: ngẫu nhiên. \
Yêu cầu: Giọng văn hay than thân trách phận. \
Sử dụng ngôn ngữ đời thường, độ dài khoảng 40-90 chữ. \
Chỉ trả về nội dung status bằng tiếng Việt, không thêm bất kỳ văn bản dẫn nhập nào khác.";

/// Appended to generated text when publishing.
pub const DEFAULT_HASHTAGS: &str = "#tamtrang #cuocsong #trend #tamsu";

/// Description used for manual uploads.
pub const DEFAULT_MANUAL_DESCRIPTION: &str = "Khoảnh khắc thú vị! #trending #xuhuong #dailyvlog #cuocsong";

pub const DEFAULT_MODELS: &[&str] = &["gemini-2.0-flash", "gemini-2.5-flash"];

/// Inclusive range of whole seconds to wait between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownRange {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl CooldownRange {
    /// Build a range; bounds given in the wrong order are swapped.
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            min_secs: min_secs.min(max_secs),
            max_secs: min_secs.max(max_secs),
        }
    }

    /// Draw a cooldown length uniformly from the range.
    pub fn sample(&self) -> u64 {
        rand::rng().random_range(self.min_secs..=self.max_secs)
    }
}

impl Default for CooldownRange {
    fn default() -> Self {
        Self::new(30, 60)
    }
}

/// Application configuration, built once at startup.
#[derive(Clone)]
pub struct AppConfig {
    /// Required before a batch can start
    pub gemini_api_key: Option<String>,
    /// Models tried in order
    pub gemini_models: Vec<String>,
    pub gemini_base_url: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Persistent browser profile (keeps the platform login)
    pub profile_dir: PathBuf,
    pub output_prefix: String,
    pub max_chars_per_line: usize,
    pub cooldown: CooldownRange,
    pub hashtags: String,
    pub manual_description: String,
    pub default_prompt: String,
    pub webdriver_url: String,
    /// Prometheus listener; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
    pub render: RenderSettings,
    pub upload: UploadConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            input_dir: PathBuf::from("input"),
            output_dir: PathBuf::from("output"),
            profile_dir: default_profile_dir(),
            output_prefix: "tiktok".to_string(),
            max_chars_per_line: DEFAULT_MAX_CHARS_PER_LINE,
            cooldown: CooldownRange::default(),
            hashtags: DEFAULT_HASHTAGS.to_string(),
            manual_description: DEFAULT_MANUAL_DESCRIPTION.to_string(),
            default_prompt: DEFAULT_PROMPT.to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            metrics_addr: None,
            render: RenderSettings::default(),
            upload: UploadConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|v| v.parse().ok())
}

fn default_profile_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("autoreel")
        .join("browser_profile")
}

impl AppConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let mut render = defaults.render.clone();
        if let Some(font) = get("AUTOREEL_FONT_PATH") {
            render.caption.font_path = Some(PathBuf::from(font));
        }

        let models: Vec<String> = get("GEMINI_MODELS")
            .map(|v| {
                v.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.gemini_models);

        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_models: models,
            gemini_base_url: get("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            input_dir: get("AUTOREEL_INPUT_DIR").map(PathBuf::from).unwrap_or(defaults.input_dir),
            output_dir: get("AUTOREEL_OUTPUT_DIR").map(PathBuf::from).unwrap_or(defaults.output_dir),
            profile_dir: get("AUTOREEL_PROFILE_DIR").map(PathBuf::from).unwrap_or(defaults.profile_dir),
            output_prefix: get("AUTOREEL_OUTPUT_PREFIX").unwrap_or(defaults.output_prefix),
            max_chars_per_line: parse_var(get("AUTOREEL_MAX_CHARS_PER_LINE"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_chars_per_line),
            cooldown: CooldownRange::new(
                parse_var(get("AUTOREEL_COOLDOWN_MIN_SECS")).unwrap_or(defaults.cooldown.min_secs),
                parse_var(get("AUTOREEL_COOLDOWN_MAX_SECS")).unwrap_or(defaults.cooldown.max_secs),
            ),
            hashtags: get("AUTOREEL_HASHTAGS").unwrap_or(defaults.hashtags),
            manual_description: defaults.manual_description,
            default_prompt: defaults.default_prompt,
            webdriver_url: get("AUTOREEL_WEBDRIVER_URL").unwrap_or(defaults.webdriver_url),
            metrics_addr: get("AUTOREEL_METRICS_ADDR").and_then(|v| SocketAddr::from_str(&v).ok()),
            render,
            upload: defaults.upload,
        }
    }

    /// The API key, or a configuration error when none is set.
    pub fn require_api_key(&self) -> WorkerResult<&str> {
        self.gemini_api_key
            .as_deref()
            .ok_or_else(|| WorkerError::config_error("GEMINI_API_KEY not set"))
    }

    /// Create the input, output and profile directories.
    pub fn ensure_directories(&self) -> WorkerResult<()> {
        for dir in [&self.input_dir, &self.output_dir, &self.profile_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("gemini_models", &self.gemini_models)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("profile_dir", &self.profile_dir)
            .field("output_prefix", &self.output_prefix)
            .field("max_chars_per_line", &self.max_chars_per_line)
            .field("cooldown", &self.cooldown)
            .field("webdriver_url", &self.webdriver_url)
            .field("metrics_addr", &self.metrics_addr)
            .finish_non_exhaustive()
    }
}
