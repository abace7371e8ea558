//! Gemini Generate API 驱动 — 实现 Google Gemini 特有的请求/响应格式转换
//!
//! Google Gemini generateContent API driver. Key differences:
//! - Uses `contents` with `parts` instead of `messages`.
//! - Attachments travel as `inline_data { mime_type, data }` parts (base64).
//! - Generation parameters are wrapped in `generationConfig`.
//! - Response: `candidates[0].content.parts[*].text`; parts flagged `thought` carry reasoning.
//! - An empty `candidates` list means the prompt was blocked; `promptFeedback` says why.
//! - API key is passed in the `x-goog-api-key` header.

use serde_json::{json, Value};
use std::collections::HashMap;
use url::Url;

use crate::config::{GenerationConfig, ProviderKind};
use crate::error::RequestError;
use crate::types::Attachment;

use super::{check_stopped, DriverRequest, DriverResponse, ProviderDriver};

/// Google Gemini generateContent API driver.
#[derive(Debug)]
pub struct GeminiDriver {
    endpoint: Url,
    api_key: Option<String>,
    model: Option<String>,
}

impl GeminiDriver {
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

    /// File part first, then the instruction text.
    fn parts(prompt: &str, attachment: Option<&Attachment>) -> Vec<Value> {
        let mut parts = Vec::with_capacity(2);
        if let Some(att) = attachment {
            parts.push(json!({
                "inline_data": {
                    "mime_type": att.media_type,
                    "data": att.base64_data(),
                }
            }));
        }
        if !prompt.is_empty() || parts.is_empty() {
            parts.push(json!({ "text": prompt }));
        }
        parts
    }

    /// Split candidate parts into (answer text, thought text).
    fn collect_text(parts: &[Value]) -> (Option<String>, Option<String>) {
        let mut answer: Option<String> = None;
        let mut thoughts: Option<String> = None;
        for part in parts {
            let Some(text) = part.get("text").and_then(|t| t.as_str()) else {
                continue;
            };
            let is_thought = part
                .get("thought")
                .and_then(|t| t.as_bool())
                .unwrap_or(false);
            let slot = if is_thought { &mut thoughts } else { &mut answer };
            slot.get_or_insert_with(String::new).push_str(text);
        }
        (answer, thoughts)
    }
}

impl ProviderDriver for GeminiDriver {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
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
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": Self::parts(prompt, attachment),
            }],
        });
        if !generation.is_empty() {
            body["generationConfig"] = Value::Object(generation.clone());
        }

        let mut headers = HashMap::new();
        if let Some(ref key) = self.api_key {
            headers.insert("x-goog-api-key".to_string(), key.clone());
        }

        DriverRequest {
            url: self.endpoint.clone(),
            headers,
            body,
        }
    }

    fn parse_response(&self, body: &Value) -> Result<DriverResponse, RequestError> {
        let candidate = body
            .get("candidates")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| RequestError::EmptyCandidate {
                feedback: body
                    .get("promptFeedback")
                    .map(|f| f.to_string())
                    .unwrap_or_else(|| "{}".to_string()),
            })?;

        let finish_reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .map(String::from);

        let (content, reasoning) = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array())
            .map(|parts| Self::collect_text(parts))
            .unwrap_or((None, None));

        check_stopped(
            DriverResponse {
                content,
                reasoning,
                finish_reason,
            },
            "STOP",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> GeminiDriver {
        GeminiDriver::new(
            Url::parse(
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent",
            )
            .unwrap(),
        )
        .with_api_key("test-key")
        .with_model("gemini-2.0-flash")
    }

    #[test]
    fn test_gemini_build_request() {
        let mut gen = GenerationConfig::new();
        gen.insert("temperature".into(), json!(0.5));
        gen.insert("maxOutputTokens".into(), json!(2048));
        let req = driver().build_request("Hello", None, &gen);
        assert_eq!(req.body["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(req.body["generationConfig"]["temperature"], 0.5);
        assert_eq!(req.body["generationConfig"]["maxOutputTokens"], 2048);
        assert_eq!(req.headers["x-goog-api-key"], "test-key");
    }

    #[test]
    fn test_gemini_empty_generation_config_omitted() {
        let req = driver().build_request("Hello", None, &GenerationConfig::new());
        assert!(req.body.get("generationConfig").is_none());
    }

    #[test]
    fn test_gemini_inline_data() {
        let pdf = Attachment::new("application/pdf", b"%PDF-1.7".to_vec());
        let req = driver().build_request("Extract triplets", Some(&pdf), &GenerationConfig::new());
        let parts = req.body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inline_data"]["mime_type"], "application/pdf");
        assert_eq!(parts[0]["inline_data"]["data"], "JVBERi0xLjc=");
        assert_eq!(parts[1]["text"], "Extract triplets");

        let req = driver().build_request("", Some(&pdf), &GenerationConfig::new());
        assert_eq!(req.body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_gemini_parse_response() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [{"text": "Hi!"}], "role": "model" },
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 8}
        });
        let resp = driver().parse_response(&body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("Hi!"));
        assert_eq!(resp.reasoning, None);
        assert_eq!(resp.finish_reason.as_deref(), Some("STOP"));
    }

    #[test]
    fn test_gemini_thought_parts_become_reasoning() {
        let body = json!({
            "candidates": [{
                "content": { "parts": [
                    {"text": "Let me think.", "thought": true},
                    {"text": "{\"a\": "},
                    {"text": "1}"}
                ]},
                "finishReason": "STOP"
            }]
        });
        let resp = driver().parse_response(&body).unwrap();
        assert_eq!(resp.content.as_deref(), Some("{\"a\": 1}"));
        assert_eq!(resp.reasoning.as_deref(), Some("Let me think."));
    }

    #[test]
    fn test_gemini_blocked_prompt() {
        let body = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        let err = driver().parse_response(&body).unwrap_err();
        assert_eq!(err.kind(), "empty_candidate");
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_gemini_safety_stop_without_content() {
        let body = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let err = driver().parse_response(&body).unwrap_err();
        assert_eq!(err, RequestError::GenerationStopped("SAFETY".into()));
    }

    #[test]
    fn test_gemini_normal_stop_without_content() {
        let body = json!({"candidates": [{"finishReason": "STOP"}]});
        let resp = driver().parse_response(&body).unwrap();
        assert_eq!(resp.content, None);
        assert_eq!(resp.finish_reason.as_deref(), Some("STOP"));
    }
}
