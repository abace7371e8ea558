//! Provider 驱动抽象层 — 通过 trait 实现多厂商 API 适配的动态分发
//!
//! Provider driver abstraction. Each backend translates a generic request into
//! its own wire payload and extracts a normalized result from its own response
//! shape. Uses `Box<dyn ProviderDriver>` so the executor and dispatcher stay
//! provider-agnostic.

pub mod gemini;

use serde_json::{json, Value};
use std::collections::HashMap;
use url::Url;

use crate::config::{EndpointSettings, GenerationConfig, ProviderKind};
use crate::error::RequestError;
use crate::types::Attachment;

pub use gemini::GeminiDriver;

/// Provider-specific HTTP request, ready to send.
#[derive(Debug, Clone)]
pub struct DriverRequest {
    /// Full endpoint URL.
    pub url: Url,
    /// Request headers (auth etc.). `content-type` is set by the transport.
    pub headers: HashMap<String, String>,
    /// Serialized JSON request body.
    pub body: Value,
}

/// Normalized result of a structurally successful call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverResponse {
    /// Generated text; `None` when the provider produced no content.
    pub content: Option<String>,
    /// Separated reasoning / thinking text, when the provider exposes it.
    pub reasoning: Option<String>,
    /// Finish reason as reported by the provider.
    pub finish_reason: Option<String>,
}

/// Core trait for provider-specific API adaptation.
///
/// Both methods are pure: all I/O happens in the transport.
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    fn provider(&self) -> ProviderKind;

    /// Model name used for reporting, if known.
    fn model(&self) -> Option<&str>;

    /// Merge generation parameters with the prompt (and attachment, if any).
    fn build_request(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
        generation: &GenerationConfig,
    ) -> DriverRequest;

    /// Extract content, reasoning and finish reason from a decoded 2xx body.
    fn parse_response(&self, body: &Value) -> Result<DriverResponse, RequestError>;
}

/// Absent content is fine after a normal stop; any other finish reason means
/// generation was cut off with nothing usable.
pub(crate) fn check_stopped(
    response: DriverResponse,
    normal_stop: &str,
) -> Result<DriverResponse, RequestError> {
    if response.content.is_some() {
        return Ok(response);
    }
    match response.finish_reason.as_deref() {
        Some(r) if r == normal_stop => Ok(response),
        Some(r) => Err(RequestError::GenerationStopped(r.to_string())),
        None => Err(RequestError::GenerationStopped("unknown".to_string())),
    }
}

/// OpenAI-compatible chat-completions driver (vLLM, OpenAI, DeepSeek, ...).
#[derive(Debug)]
pub struct OpenAiDriver {
    endpoint: Url,
    api_key: Option<String>,
    model: Option<String>,
}

impl OpenAiDriver {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            api_key: None,
            model: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn user_content(prompt: &str, attachment: Option<&Attachment>) -> Value {
        let Some(att) = attachment else {
            return Value::String(prompt.to_string());
        };
        let mut blocks = Vec::with_capacity(2);
        if !prompt.is_empty() {
            blocks.push(json!({ "type": "text", "text": prompt }));
        }
        if att.is_image() {
            blocks.push(json!({
                "type": "image_url",
                "image_url": { "url": att.data_url() },
            }));
        } else {
            blocks.push(json!({
                "type": "file",
                "file": {
                    "filename": att.file_name.clone().unwrap_or_else(|| "attachment".into()),
                    "file_data": att.data_url(),
                },
            }));
        }
        Value::Array(blocks)
    }
}

impl ProviderDriver for OpenAiDriver {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    fn build_request(
        &self,
        prompt: &str,
        attachment: Option<&Attachment>,
        generation: &GenerationConfig,
    ) -> DriverRequest {
        let mut body = generation.clone();
        if let Some(ref model) = self.model {
            body.entry("model")
                .or_insert_with(|| Value::String(model.clone()));
        }
        body.insert(
            "messages".into(),
            json!([{ "role": "user", "content": Self::user_content(prompt, attachment) }]),
        );
        body.insert("stream".into(), Value::Bool(false));

        let mut headers = HashMap::new();
        if let Some(ref key) = self.api_key {
            headers.insert("authorization".to_string(), format!("Bearer {}", key));
        }

        DriverRequest {
            url: self.endpoint.clone(),
            headers,
            body: Value::Object(body),
        }
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse, RequestError> {
        let choice = body
            .pointer("/choices/0")
            .ok_or_else(|| RequestError::EmptyCandidate {
                feedback: body
                    .get("prompt_filter_results")
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "{}".to_string()),
            })?;

        let message = choice.get("message");
        let content = message
            .and_then(|m| m.get("content"))
            .and_then(|v| v.as_str())
            .map(String::from);
        // vLLM reasoning parsers emit `reasoning_content`; newer servers use `reasoning`.
        let reasoning = message
            .and_then(|m| m.get("reasoning_content").or_else(|| m.get("reasoning")))
            .and_then(|v| v.as_str())
            .map(String::from);
        let finish_reason = choice
            .get("finish_reason")
            .and_then(|v| v.as_str())
            .map(String::from);

        check_stopped(
            DriverResponse {
                content,
                reasoning,
                finish_reason,
            },
            "stop",
        )
    }
}

/// Build the driver for resolved endpoint settings.
pub fn create_driver(settings: &EndpointSettings) -> Box<dyn ProviderDriver> {
    match settings.provider {
        ProviderKind::OpenAi => {
            let mut driver = OpenAiDriver::new(settings.url.clone());
            if let Some(ref key) = settings.api_key {
                driver = driver.with_api_key(key);
            }
            if let Some(ref model) = settings.model {
                driver = driver.with_model(model);
            }
            Box::new(driver)
        }
        ProviderKind::Gemini => {
            let mut driver = GeminiDriver::new(settings.url.clone());
            if let Some(ref key) = settings.api_key {
                driver = driver.with_api_key(key);
            }
            if let Some(ref model) = settings.model {
                driver = driver.with_model(model);
            }
            Box::new(driver)
        }
    }
}
