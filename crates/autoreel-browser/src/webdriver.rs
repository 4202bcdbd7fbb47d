//! W3C WebDriver engine (chromedriver).

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::driver::{BrowserEngine, BrowserSession, ElementState, Key};
use crate::error::{BrowserError, BrowserResult};

/// Key under which WebDriver returns element references.
const ELEMENT_KEY: &str = "element-6066-11e4-a52f-4d26d65e1b4c";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Launch settings for the WebDriver engine.
#[derive(Debug, Clone)]
pub struct WebDriverConfig {
    /// chromedriver endpoint
    pub server_url: String,
    pub window_width: u32,
    pub window_height: u32,
    pub user_agent: String,
    /// Page-load timeout applied to every navigation
    pub page_load_timeout: Duration,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:9515".to_string(),
            window_width: 1280,
            window_height: 800,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            page_load_timeout: Duration::from_secs(120),
            headless: false,
            extra_args: Vec::new(),
        }
    }
}

impl WebDriverConfig {
    fn chrome_args(&self, profile_dir: &Path) -> Vec<String> {
        let mut args = vec![
            format!("--user-data-dir={}", profile_dir.display()),
            format!("--window-size={},{}", self.window_width, self.window_height),
            format!("--user-agent={}", self.user_agent),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--no-sandbox".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }

    fn capabilities(&self, profile_dir: &Path) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "eager",
                    "goog:chromeOptions": {
                        "args": self.chrome_args(profile_dir),
                        "excludeSwitches": ["enable-automation"],
                    }
                }
            }
        })
    }
}

/// Every WebDriver response wraps its payload in `value`.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct NewSession {
    #[serde(rename = "sessionId")]
    session_id: String,
}

/// Send one command and unwrap the `value` payload.
async fn execute(client: &Client, method: Method, url: &str, body: Option<Value>) -> BrowserResult<Value> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let wire: WireResponse = response.json().await?;

    if status.is_success() {
        return Ok(wire.value);
    }
    match serde_json::from_value::<WireError>(wire.value) {
        Ok(err) => Err(BrowserError::WebDriver {
            error: err.error,
            message: err.message,
        }),
        Err(_) => Err(BrowserError::protocol(format!("HTTP {} without error body", status))),
    }
}

/// [`BrowserEngine`] backed by a running chromedriver.
pub struct WebDriverEngine {
    client: Client,
    base_url: String,
    config: WebDriverConfig,
}

impl WebDriverEngine {
    pub fn new(config: WebDriverConfig) -> BrowserResult<Self> {
        let parsed = Url::parse(&config.server_url)?;
        let client = Client::builder()
            .timeout(config.page_load_timeout + Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            config,
        })
    }
}

#[async_trait]
impl BrowserEngine for WebDriverEngine {
    async fn launch_persistent(&self, profile_dir: &Path) -> BrowserResult<Box<dyn BrowserSession>> {
        let url = format!("{}/session", self.base_url);
        let value = execute(
            &self.client,
            Method::POST,
            &url,
            Some(self.config.capabilities(profile_dir)),
        )
        .await
        .map_err(|e| BrowserError::launch(e.to_string()))?;
        let created: NewSession = serde_json::from_value(value)?;
        info!(
            "Opened WebDriver session {} with profile {}",
            created.session_id,
            profile_dir.display()
        );

        let mut session = WebDriverSession {
            client: self.client.clone(),
            session_url: format!("{}/session/{}", self.base_url, created.session_id),
            closed: false,
        };
        let timeouts = json!({ "pageLoad": self.config.page_load_timeout.as_millis() as u64 });
        if let Err(e) = session.command(Method::POST, "/timeouts", Some(timeouts)).await {
            // The session exists now; hand it back so the caller can close it.
            warn!("Failed to set page load timeout: {}", e);
        }
        Ok(Box::new(session))
    }
}

/// One chromedriver session.
pub struct WebDriverSession {
    client: Client,
    session_url: String,
    closed: bool,
}

impl WebDriverSession {
    async fn command(&mut self, method: Method, path: &str, body: Option<Value>) -> BrowserResult<Value> {
        if self.closed {
            return Err(BrowserError::SessionClosed);
        }
        let url = format!("{}{}", self.session_url, path);
        execute(&self.client, method, &url, body).await
    }

    /// Element id of the first match, `None` when nothing matches.
    async fn find(&mut self, selector: &str) -> BrowserResult<Option<String>> {
        let body = json!({ "using": "css selector", "value": selector });
        match self.command(Method::POST, "/element", Some(body)).await {
            Ok(value) => value
                .get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| BrowserError::protocol("element reference missing")),
            Err(e) if e.is_missing_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn require(&mut self, selector: &str) -> BrowserResult<String> {
        self.find(selector)
            .await?
            .ok_or_else(|| BrowserError::ElementNotFound(selector.to_string()))
    }

    async fn element_bool(&mut self, id: &str, property: &str) -> BrowserResult<bool> {
        let value = self
            .command(Method::GET, &format!("/element/{}/{}", id, property), None)
            .await?;
        value
            .as_bool()
            .ok_or_else(|| BrowserError::protocol(format!("{} is not a boolean", property)))
    }

    async fn perform_keys(&mut self, actions: Vec<Value>) -> BrowserResult<()> {
        let body = json!({
            "actions": [{ "type": "key", "id": "keyboard", "actions": actions }]
        });
        self.command(Method::POST, "/actions", Some(body)).await?;
        Ok(())
    }
}

/// WebDriver key value for a key.
fn key_value(key: Key) -> String {
    match key {
        Key::Control => "\u{E009}".to_string(),
        Key::Backspace => "\u{E003}".to_string(),
        Key::Enter => "\u{E007}".to_string(),
        Key::Char(c) => c.to_string(),
    }
}

fn chord_actions(chord: &[Key]) -> Vec<Value> {
    let downs = chord
        .iter()
        .map(|k| json!({ "type": "keyDown", "value": key_value(*k) }));
    let ups = chord
        .iter()
        .rev()
        .map(|k| json!({ "type": "keyUp", "value": key_value(*k) }));
    downs.chain(ups).collect()
}

fn typing_actions(text: &str) -> Vec<Value> {
    text.chars()
        .filter(|c| *c != '\r')
        .flat_map(|c| {
            let key = if c == '\n' { Key::Enter } else { Key::Char(c) };
            chord_actions(&[key])
        })
        .collect()
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn goto(&mut self, url: &str) -> BrowserResult<()> {
        debug!("Navigating to {}", url);
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn current_url(&mut self) -> BrowserResult<String> {
        let value = self.command(Method::GET, "/url", None).await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::protocol("url is not a string"))
    }

    async fn element_state(&mut self, selector: &str) -> BrowserResult<ElementState> {
        let Some(id) = self.find(selector).await? else {
            return Ok(ElementState::DETACHED);
        };
        let probe = async {
            let visible = self.element_bool(&id, "displayed").await?;
            let enabled = self.element_bool(&id, "enabled").await?;
            Ok::<_, BrowserError>(ElementState {
                attached: true,
                visible,
                enabled,
            })
        };
        match probe.await {
            Ok(state) => Ok(state),
            Err(e) if e.is_missing_element() => Ok(ElementState::DETACHED),
            Err(e) => Err(e),
        }
    }

    async fn inner_text(&mut self, selector: &str) -> BrowserResult<String> {
        let id = self.require(selector).await?;
        let value = self
            .command(Method::GET, &format!("/element/{}/text", id), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn set_input_files(&mut self, selector: &str, file: &Path) -> BrowserResult<()> {
        let absolute = std::fs::canonicalize(file).map_err(|_| BrowserError::FileNotFound(file.to_path_buf()))?;
        let id = self.require(selector).await?;
        let body = json!({ "text": absolute.to_string_lossy() });
        self.command(Method::POST, &format!("/element/{}/value", id), Some(body))
            .await?;
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> BrowserResult<()> {
        let id = self.require(selector).await?;
        self.command(Method::POST, &format!("/element/{}/click", id), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn press(&mut self, chord: &[Key]) -> BrowserResult<()> {
        self.perform_keys(chord_actions(chord)).await
    }

    async fn type_text(&mut self, text: &str) -> BrowserResult<()> {
        if text.is_empty() {
            return Ok(());
        }
        self.perform_keys(typing_actions(text)).await
    }

    async fn close(&mut self) -> BrowserResult<()> {
        if self.closed {
            return Err(BrowserError::SessionClosed);
        }
        let result = self.command(Method::DELETE, "", None).await;
        self.closed = true;
        result.map(|_| ())
    }
}
