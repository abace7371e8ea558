use crate::drivers::DriverRequest;
use crate::error::RequestError;
use crate::Result;
use reqwest::Proxy;
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::warn;

/// Thin wrapper over a pooled `reqwest::Client` with a fixed per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("BATCH_INFER_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(32),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Ok(proxy_url) = env::var("BATCH_INFER_PROXY_URL") {
            if let Some(proxy) = parse_proxy(&proxy_url) {
                builder = builder.proxy(proxy);
            }
        }

        let client = builder.build().map_err(TransportError::from)?;

        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST the request body and decode a 2xx JSON response.
    ///
    /// Connection failures and timeouts map to `RequestError::Transport`,
    /// non-2xx statuses to `RequestError::Status`, undecodable bodies to
    /// `RequestError::MalformedBody`.
    pub async fn post_json(&self, request: &DriverRequest) -> std::result::Result<Value, RequestError> {
        let mut req = self.client.post(request.url.clone()).json(&request.body);
        for (k, v) in &request.headers {
            req = req.header(k, v);
        }

        let response = req.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(RequestError::Status {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        serde_json::from_str(&text).map_err(|e| RequestError::MalformedBody(e.to_string()))
    }
}

fn parse_proxy(proxy_url: &str) -> Option<Proxy> {
    match Proxy::all(proxy_url) {
        Ok(proxy) => Some(proxy),
        Err(e) => {
            warn!(proxy_url, error = %e, "ignoring invalid BATCH_INFER_PROXY_URL");
            None
        }
    }
}

fn transport_error(e: reqwest::Error) -> RequestError {
    RequestError::Transport {
        timeout: e.is_timeout(),
        message: e.to_string(),
    }
}

/// Prefer the provider's `error.message` over the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| body.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
