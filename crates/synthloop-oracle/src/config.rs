//! Oracle backend configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

pub const DEFAULT_ANTHROPIC_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Which wire protocol the oracle speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Anthropic Messages API.
    Anthropic,
    /// OpenAI-compatible chat completions.
    #[serde(rename = "openai")]
    OpenAi,
}

impl Backend {
    /// Environment variable holding the API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Backend::Anthropic => "ANTHROPIC_API_KEY",
            Backend::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Backend::Anthropic => DEFAULT_MODEL,
            Backend::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Backend::Anthropic => DEFAULT_ANTHROPIC_ENDPOINT,
            Backend::OpenAi => DEFAULT_OPENAI_ENDPOINT,
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Anthropic => write!(f, "anthropic"),
            Backend::OpenAi => write!(f, "openai"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = OracleConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Backend::Anthropic),
            "openai" | "open_ai" => Ok(Backend::OpenAi),
            other => Err(OracleConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleConfigError {
    #[error("{var} is not set")]
    MissingApiKey { var: &'static str },

    #[error("unknown oracle backend: {0}")]
    UnknownBackend(String),

    #[error("invalid oracle setting: {0}")]
    Invalid(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// Connection and sampling settings for [`crate::LlmOracle`].
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    pub backend: Backend,
    pub model: String,
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// Overrides the backend's default URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout: Duration,
    /// Honour `HTTP(S)_PROXY` from the environment. Off by default.
    #[serde(default)]
    pub use_system_proxy: bool,
}

impl std::fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("backend", &self.backend)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout", &self.request_timeout)
            .field("use_system_proxy", &self.use_system_proxy)
            .finish()
    }
}

impl OracleConfig {
    pub fn new(backend: Backend, api_key: impl Into<String>) -> Self {
        Self {
            backend,
            model: backend.default_model().to_string(),
            api_key: api_key.into(),
            endpoint: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            use_system_proxy: false,
        }
    }

    /// Read the API key for `backend` from the process environment.
    pub fn from_env(backend: Backend) -> Result<Self, OracleConfigError> {
        Self::from_lookup(backend, |var| std::env::var(var).ok())
    }

    /// Like [`OracleConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(backend: Backend, lookup: F) -> Result<Self, OracleConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = backend.api_key_var();
        let api_key = lookup(var)
            .filter(|key| !key.trim().is_empty())
            .ok_or(OracleConfigError::MissingApiKey { var })?;
        Ok(Self::new(backend, api_key.trim()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_system_proxy(mut self, enabled: bool) -> Self {
        self.use_system_proxy = enabled;
        self
    }

    /// Full request URL for the configured backend.
    pub fn url(&self) -> String {
        let endpoint = self
            .endpoint
            .as_deref()
            .unwrap_or(self.backend.default_endpoint())
            .trim_end_matches('/');
        let suffix = match self.backend {
            Backend::Anthropic => "/messages",
            Backend::OpenAi => "/chat/completions",
        };
        if endpoint.ends_with(suffix) {
            endpoint.to_string()
        } else {
            format!("{endpoint}{suffix}")
        }
    }

    pub fn validate(&self) -> Result<(), OracleConfigError> {
        if self.model.trim().is_empty() {
            return Err(OracleConfigError::Invalid("model must not be empty".into()));
        }
        if self.max_tokens == 0 {
            return Err(OracleConfigError::Invalid("max_tokens must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(OracleConfigError::Invalid(format!(
                "temperature {} outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.request_timeout.is_zero() {
            return Err(OracleConfigError::Invalid("request_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_backend() {
        let config = OracleConfig::new(Backend::Anthropic, "k");
        assert_eq!(config.model, "claude-3-5-sonnet-latest");
        assert_eq!(config.max_tokens, 2000);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.url(), DEFAULT_ANTHROPIC_ENDPOINT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_key_is_reported_by_variable() {
        let err = OracleConfig::from_lookup(Backend::OpenAi, |_| None).unwrap_err();
        assert_eq!(err, OracleConfigError::MissingApiKey { var: "OPENAI_API_KEY" });

        let err = OracleConfig::from_lookup(Backend::Anthropic, |_| Some("  ".into())).unwrap_err();
        assert_eq!(err, OracleConfigError::MissingApiKey { var: "ANTHROPIC_API_KEY" });
    }

    #[test]
    fn key_comes_from_lookup() {
        let config = OracleConfig::from_lookup(Backend::OpenAi, |var| {
            (var == "OPENAI_API_KEY").then(|| "sk-test".to_string())
        })
        .unwrap();
        assert_eq!(config.api_key, "sk-test");
        assert_eq!(config.model, DEFAULT_OPENAI_MODEL);
    }

    #[test]
    fn endpoint_gets_protocol_suffix() {
        let config =
            OracleConfig::new(Backend::OpenAi, "k").with_endpoint("http://localhost:8080/v1/");
        assert_eq!(config.url(), "http://localhost:8080/v1/chat/completions");

        let config = OracleConfig::new(Backend::Anthropic, "k")
            .with_endpoint("http://127.0.0.1:9/v1/messages");
        assert_eq!(config.url(), "http://127.0.0.1:9/v1/messages");
    }

    #[test]
    fn backend_parses_aliases() {
        assert_eq!("Claude".parse::<Backend>().unwrap(), Backend::Anthropic);
        assert_eq!("openai".parse::<Backend>().unwrap(), Backend::OpenAi);
        assert!("gemini".parse::<Backend>().is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let config = OracleConfig::new(Backend::Anthropic, "secret-key");
        assert!(!format!("{config:?}").contains("secret-key"));
    }

    #[test]
    fn validate_rejects_bad_sampling() {
        let config = OracleConfig::new(Backend::Anthropic, "k").with_temperature(3.5);
        assert!(matches!(config.validate(), Err(OracleConfigError::Invalid(_))));
        let config = OracleConfig::new(Backend::Anthropic, "k").with_max_tokens(0);
        assert!(config.validate().is_err());
    }
}
