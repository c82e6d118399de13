use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SynodError;

/// Top-level configuration loaded from `.synod.toml`.
///
/// Resolution is layered: defaults < config file < environment variables.
/// The merged value is validated once at startup and treated as immutable
/// for the life of the process.
///
/// # Examples
///
/// ```
/// use synod_core::SynodConfig;
///
/// let config = SynodConfig::default();
/// assert_eq!(config.review.max_findings, 20);
/// assert_eq!(config.server.rate_limit_per_minute, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SynodConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Review pipeline settings.
    #[serde(default)]
    pub review: ReviewConfig,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

impl SynodConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Io`] if the file cannot be read, or
    /// [`SynodError::Toml`] if the content is not valid TOML.
    pub fn from_file(path: &Path) -> Result<Self, SynodError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use synod_core::SynodConfig;
    ///
    /// let toml = r#"
    /// [review]
    /// max_findings = 10
    /// "#;
    /// let config = SynodConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.review.max_findings, 10);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, SynodError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Overlay environment variables onto the configuration.
    ///
    /// Recognized variables: `LLM_PROVIDER`, `LLM_MODEL`, `LLM_BASE_URL`,
    /// `OPENAI_API_KEY`, `GROQ_API_KEY`, `REVIEW_API_KEY`,
    /// `REQUEST_TIMEOUT_SECONDS`, `MAX_FINDINGS_PER_REVIEW`,
    /// `MAX_DIFF_SIZE_BYTES`, `RATE_LIMIT_PER_MINUTE`.
    ///
    /// Unparseable numeric values are ignored in favor of the current value.
    pub fn apply_env(&mut self) {
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            self.llm.provider = provider;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(base_url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = Some(base_url);
        }
        let key_var = match self.llm.provider.as_str() {
            "groq" => "GROQ_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        if let Ok(key) = std::env::var(key_var) {
            if !key.is_empty() {
                self.llm.api_key = Some(key);
            }
        }
        if let Ok(key) = std::env::var("REVIEW_API_KEY") {
            if !key.is_empty() {
                self.server.api_key = Some(key);
            }
        }
        if let Some(v) = env_parse::<u64>("REQUEST_TIMEOUT_SECONDS") {
            self.review.request_timeout_seconds = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_FINDINGS_PER_REVIEW") {
            self.review.max_findings = v;
        }
        if let Some(v) = env_parse::<usize>("MAX_DIFF_SIZE_BYTES") {
            self.review.max_diff_bytes = v;
        }
        if let Some(v) = env_parse::<u32>("RATE_LIMIT_PER_MINUTE") {
            self.server.rate_limit_per_minute = v;
        }
    }

    /// Validate the merged configuration.
    ///
    /// Ranges match what the service is prepared to honor; rejecting them
    /// here keeps every later component free of limit checks.
    ///
    /// # Errors
    ///
    /// Returns [`SynodError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), SynodError> {
        match self.llm.provider.as_str() {
            "openai" | "groq" => {}
            other => {
                return Err(SynodError::Config(format!(
                    "unsupported LLM provider: {other} (expected \"openai\" or \"groq\")"
                )))
            }
        }
        if self.llm.model.is_empty() {
            return Err(SynodError::Config("llm.model must not be empty".into()));
        }
        if !(30..=300).contains(&self.review.request_timeout_seconds) {
            return Err(SynodError::Config(format!(
                "review.request_timeout_seconds must be within 30..=300, got {}",
                self.review.request_timeout_seconds
            )));
        }
        if !(1..=100).contains(&self.review.max_findings) {
            return Err(SynodError::Config(format!(
                "review.max_findings must be within 1..=100, got {}",
                self.review.max_findings
            )));
        }
        if !(1024..=10 * 1024 * 1024).contains(&self.review.max_diff_bytes) {
            return Err(SynodError::Config(format!(
                "review.max_diff_bytes must be within 1KiB..=10MiB, got {}",
                self.review.max_diff_bytes
            )));
        }
        if !(1..=100).contains(&self.server.rate_limit_per_minute) {
            return Err(SynodError::Config(format!(
                "server.rate_limit_per_minute must be within 1..=100, got {}",
                self.server.rate_limit_per_minute
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use synod_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.provider, "openai");
/// assert_eq!(config.model, "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider name (`"openai"` or `"groq"`).
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// API key for the provider.
    pub api_key: Option<String>,
    /// Custom base URL; overrides the provider default.
    pub base_url: Option<String>,
}

fn default_provider() -> String {
    "openai".into()
}

fn default_model() -> String {
    "gpt-4o-mini".into()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    /// Resolve the chat-completions base URL for the active provider.
    ///
    /// Both supported providers expose the OpenAI-compatible
    /// `/v1/chat/completions` endpoint under these roots.
    pub fn resolved_base_url(&self) -> &str {
        if let Some(url) = self.base_url.as_deref() {
            return url;
        }
        match self.provider.as_str() {
            "groq" => "https://api.groq.com/openai",
            _ => "https://api.openai.com",
        }
    }
}

/// Review pipeline configuration.
///
/// # Examples
///
/// ```
/// use synod_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.max_findings, 20);
/// assert_eq!(config.request_timeout_seconds, 120);
/// assert_eq!(config.max_diff_bytes, 1_048_576);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Maximum findings returned per review (default: 20).
    #[serde(default = "default_max_findings")]
    pub max_findings: usize,
    /// Maximum accepted diff size in bytes (default: 1 MiB).
    #[serde(default = "default_max_diff_bytes")]
    pub max_diff_bytes: usize,
    /// End-to-end deadline for one review in seconds (default: 120).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_max_findings() -> usize {
    20
}

fn default_max_diff_bytes() -> usize {
    1_048_576
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            max_findings: default_max_findings(),
            max_diff_bytes: default_max_diff_bytes(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default: `0.0.0.0:8000`).
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Credential callers must present as `Authorization: Bearer <key>`.
    ///
    /// `None` means the `/review` endpoint rejects every request; the
    /// gateway refuses to start without it.
    pub api_key: Option<String>,
    /// Maximum `/review` requests per minute per credential (default: 10).
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    /// Allowed CORS origins; `["*"]` allows any (default).
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

fn default_rate_limit() -> u32 {
    10
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_key: None,
            rate_limit_per_minute: default_rate_limit(),
            cors_origins: default_cors_origins(),
        }
    }
}
