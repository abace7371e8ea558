//! Runner configuration.
//!
//! A YAML document with a handful of recognised keys; every other key is passed
//! through verbatim to the provider as a generation parameter.
//!
//! ```yaml
//! endpoint_host: localhost
//! endpoint_port: 8000
//! concurrent_requests: 16
//! model: Qwen/Qwen3-8B      # generation parameter
//! temperature: 0.6          # generation parameter
//! max_tokens: 4096          # generation parameter
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::executor::RetryPolicy;
use crate::{Error, ErrorContext, Result};

/// Caller-supplied generation parameters (temperature, token limits, ...).
pub type GenerationConfig = Map<String, Value>;

pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI-style `/v1/chat/completions` (vLLM, OpenAI, compatible servers).
    #[serde(rename = "openai", alias = "open_ai", alias = "vllm")]
    OpenAi,
    /// Google `generateContent`.
    #[serde(rename = "gemini")]
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Environment variable consulted when the config carries no `api_key`.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Self-hosted servers get a long timeout; the hosted API a short one.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ProviderKind::OpenAi => Duration::from_secs(900),
            ProviderKind::Gemini => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_attempts() -> u32 {
    1
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    #[serde(default)]
    pub provider: Option<ProviderKind>,
    #[serde(default, alias = "hostname")]
    pub endpoint_host: Option<String>,
    #[serde(default, alias = "port")]
    pub endpoint_port: Option<u16>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_concurrency")]
    pub concurrent_requests: usize,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub retry_min_delay_ms: Option<u64>,
    #[serde(default)]
    pub retry_max_delay_ms: Option<u64>,
    /// Everything not recognised above.
    #[serde(flatten)]
    pub generation: GenerationConfig,
}

/// Fully resolved connection settings for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSettings {
    pub provider: ProviderKind,
    pub url: Url,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout: Duration,
}

impl RunnerConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("cannot read config file: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: RunnerConfig = serde_yaml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrent_requests == 0 {
            return Err(Error::configuration_with_context(
                "concurrent_requests must be at least 1",
                ErrorContext::new()
                    .with_field_path("concurrent_requests")
                    .with_source("config_loader"),
            ));
        }
        if self.max_attempts == 0 {
            return Err(Error::configuration_with_context(
                "max_attempts must be at least 1",
                ErrorContext::new()
                    .with_field_path("max_attempts")
                    .with_source("config_loader"),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(Error::configuration_with_context(
                "request_timeout_secs must be positive",
                ErrorContext::new()
                    .with_field_path("request_timeout_secs")
                    .with_source("config_loader"),
            ));
        }
        Ok(())
    }

    /// Explicit `provider` wins; otherwise host/port selects the OpenAI-style
    /// server and api_key/model_name selects Gemini.
    pub fn provider_kind(&self) -> Result<ProviderKind> {
        if let Some(p) = self.provider {
            return Ok(p);
        }
        if self.endpoint_host.is_some() || self.endpoint_port.is_some() {
            return Ok(ProviderKind::OpenAi);
        }
        if self.api_key.is_some() || self.model_name.is_some() {
            return Ok(ProviderKind::Gemini);
        }
        Err(Error::configuration_with_context(
            "cannot determine provider",
            ErrorContext::new()
                .with_details("set endpoint_host + endpoint_port, or api_key + model_name")
                .with_source("config_loader"),
        ))
    }

    pub fn resolve_endpoint(&self) -> Result<EndpointSettings> {
        self.resolve_endpoint_with(|name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_endpoint_with<F>(&self, env: F) -> Result<EndpointSettings>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = self.provider_kind()?;
        let api_key = self
            .api_key
            .clone()
            .or_else(|| env(provider.api_key_env()))
            .filter(|k| !k.is_empty());
        let timeout = self
            .request_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or_else(|| provider.default_timeout());

        let (url, model) = match provider {
            ProviderKind::OpenAi => {
                let root = match (&self.base_url, &self.endpoint_host, self.endpoint_port) {
                    (Some(base), _, _) => base.trim_end_matches('/').to_string(),
                    (None, Some(host), Some(port)) => format!("http://{}:{}", host, port),
                    _ => {
                        return Err(Error::configuration_with_context(
                            "OpenAI-style endpoint requires endpoint_host and endpoint_port",
                            ErrorContext::new()
                                .with_field_path("endpoint_port")
                                .with_source("config_loader"),
                        ))
                    }
                };
                (
                    parse_url(&format!("{}/v1/chat/completions", root))?,
                    self.model_name.clone(),
                )
            }
            ProviderKind::Gemini => {
                if api_key.is_none() {
                    return Err(Error::configuration_with_context(
                        "missing Gemini credentials",
                        ErrorContext::new()
                            .with_field_path("api_key")
                            .with_details(format!(
                                "set api_key in the config or {}",
                                provider.api_key_env()
                            ))
                            .with_source("config_loader"),
                    ));
                }
                let model = self
                    .model_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string());
                let root = self
                    .base_url
                    .as_deref()
                    .unwrap_or(GEMINI_BASE_URL)
                    .trim_end_matches('/');
                (
                    parse_url(&format!(
                        "{}/v1beta/models/{}:generateContent",
                        root, model
                    ))?,
                    Some(model),
                )
            }
        };

        Ok(EndpointSettings {
            provider,
            url,
            api_key,
            model,
            timeout,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let mut policy = RetryPolicy::new(self.max_attempts);
        if let Some(ms) = self.retry_min_delay_ms {
            policy = policy.with_min_delay(Duration::from_millis(ms));
        }
        if let Some(ms) = self.retry_max_delay_ms {
            policy = policy.with_max_delay(Duration::from_millis(ms));
        }
        policy
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid endpoint URL: {}", e),
            ErrorContext::new()
                .with_details(raw.to_string())
                .with_source("config_loader"),
        )
    })
}
