use crate::transport::TransportError;
use thiserror::Error;

/// Structured error context for configuration and startup failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Configuration key or input location that caused the error (e.g., "config.api_key", "input:12")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "config_loader", "dataset_reader")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fatal errors. All of these happen before the dispatcher starts (or while
/// persisting its output); per-request failures are [`RequestError`]s instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("HTTP client error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Error::Configuration {
            message: msg.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } => Some(context),
            _ => None,
        }
    }
}

/// Outcome of a single failed request.
///
/// Every variant is recovered at the executor boundary and downgraded to the
/// `error` string of the request's [`ResultRecord`](crate::types::ResultRecord).
/// `Status` and `MalformedBody` together form the protocol-error group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("{message}")]
    Transport { message: String, timeout: bool },

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response body: {0}")]
    MalformedBody(String),

    #[error("No candidates returned. Feedback: {feedback}")]
    EmptyCandidate { feedback: String },

    #[error("Generation stopped due to: {0}")]
    GenerationStopped(String),

    #[error("Failed to read attachment {path}: {message}")]
    Attachment { path: String, message: String },
}

impl RequestError {
    /// Stable machine-readable code for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestError::Transport { timeout: true, .. } => "timeout",
            RequestError::Transport { .. } => "transport",
            RequestError::Status { .. } => "http_status",
            RequestError::MalformedBody(_) => "malformed_body",
            RequestError::EmptyCandidate { .. } => "empty_candidate",
            RequestError::GenerationStopped(_) => "generation_stopped",
            RequestError::Attachment { .. } => "attachment",
        }
    }

    /// Transient failures that another attempt may fix.
    pub fn is_retryable(&self) -> bool {
        match self {
            RequestError::Transport { .. } => true,
            RequestError::Status { status, .. } => {
                matches!(*status, 408 | 429) || (500..600).contains(status)
            }
            _ => false,
        }
    }
}
