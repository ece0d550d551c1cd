//! Configuration loading, validation, and management for the CourseLLM
//! IST service.
//!
//! Loads configuration from `~/.coursellm/config.toml` (optional) with
//! environment variable overrides. A `.env` file in the working directory
//! is read first. Model credentials are checked once at startup by
//! [`AppConfig::resolve_llm`]; a missing or placeholder key is fatal.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.coursellm/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai" or "gemini"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model override; provider default when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override for OpenAI-compatible proxies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Client-side timeout for one model call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            api_key: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Origins allowed by CORS (the tutoring frontend dev servers by default)
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".into(),
        "http://127.0.0.1:3000".into(),
        "http://localhost:9002".into(),
        "http://127.0.0.1:9002".into(),
    ]
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

/// The model backends this service knows how to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
}

impl ProviderKind {
    /// Parse a provider name as found in `LLM_PROVIDER`.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" => Ok(Self::Gemini),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Gemini => "gemini-1.5-flash",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
        }
    }

    /// Environment variables that carry this provider's key, in priority order.
    pub fn key_env_vars(&self) -> &'static [&'static str] {
        match self {
            Self::OpenAi => &["OPENAI_API_KEY"],
            Self::Gemini => &["GEMINI_API_KEY", "GOOGLE_API_KEY"],
        }
    }

    fn key_hint(&self) -> String {
        self.key_env_vars().join(" or ")
    }
}

/// LLM settings after validation — everything needed to build a provider.
#[derive(Clone)]
pub struct ResolvedLlm {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for ResolvedLlm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedLlm")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.coursellm/config.toml).
    ///
    /// Reads `.env` from the working directory (if any), then applies
    /// environment variable overrides:
    /// - `LLM_PROVIDER`, `LLM_MODEL`, `LLM_API_URL`
    /// - `OPENAI_API_KEY` / `GEMINI_API_KEY` / `GOOGLE_API_KEY`
    /// - `COURSELLM_HOST`, `COURSELLM_PORT`
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    ///
    /// Taking the lookup as a closure keeps tests independent of the
    /// process environment.
    pub fn apply_overrides<F>(&mut self, get: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(provider) = non_empty("LLM_PROVIDER") {
            self.llm.provider = provider.to_lowercase();
        }
        if let Some(model) = non_empty("LLM_MODEL") {
            self.llm.model = Some(model);
        }
        if let Some(url) = non_empty("LLM_API_URL") {
            self.llm.api_url = Some(url);
        }

        if self.llm.api_key.is_none() {
            // Unknown providers are reported by resolve_llm, not here.
            if let Ok(kind) = ProviderKind::parse(&self.llm.provider) {
                self.llm.api_key = kind.key_env_vars().iter().find_map(|var| non_empty(*var));
            }
        }

        if let Some(host) = non_empty("COURSELLM_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = non_empty("COURSELLM_PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("COURSELLM_PORT is not a valid port: {port}"))
            })?;
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".coursellm")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.temperature < 0.0 || self.llm.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "llm.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "llm.timeout_secs must be > 0".into(),
            ));
        }

        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_tokens must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Resolve the provider, model, and credential, refusing anything that
    /// would only fail later at request time.
    pub fn resolve_llm(&self) -> Result<ResolvedLlm, ConfigError> {
        let provider = ProviderKind::parse(&self.llm.provider)?;

        let api_key = self
            .llm
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingApiKey {
                provider: provider.name(),
                hint: provider.key_hint(),
            })?;

        if is_placeholder_key(api_key) {
            return Err(ConfigError::PlaceholderApiKey {
                provider: provider.name(),
                hint: provider.key_hint(),
            });
        }

        // Accept litellm-style names such as "openai/gpt-4o-mini".
        let model = match self.llm.model.as_deref().map(str::trim) {
            Some(m) if !m.is_empty() => m
                .strip_prefix(&format!("{}/", provider.name()))
                .unwrap_or(m)
                .to_string(),
            _ => provider.default_model().to_string(),
        };

        let base_url = self
            .llm
            .api_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        Ok(ResolvedLlm {
            provider,
            model,
            api_key: api_key.to_string(),
            base_url,
            temperature: self.llm.temperature,
            max_tokens: self.llm.max_tokens,
            timeout_secs: self.llm.timeout_secs,
        })
    }
}

/// Keys copied verbatim from a `.env.example` template.
fn is_placeholder_key(key: &str) -> bool {
    let upper = key.to_uppercase();
    upper.contains("PASTE") || upper.contains("HERE") || upper.starts_with("YOUR_")
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Unsupported LLM_PROVIDER '{0}'. Use 'openai' (default) or 'gemini'.")]
    UnsupportedProvider(String),

    #[error("No API key for provider '{provider}'. Set {hint} in your .env file or environment variables.")]
    MissingApiKey { provider: &'static str, hint: String },

    #[error("API key for provider '{provider}' appears to be a placeholder value. Set a real key in {hint}.")]
    PlaceholderApiKey { provider: &'static str, hint: String },
}
