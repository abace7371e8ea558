//! Request and result records exchanged between the reader, the dispatcher and the writer.

use base64::Engine as _;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::error::RequestError;

/// One unit of work submitted to the batch executor.
///
/// `passthrough` holds every field of the input line verbatim (including
/// `prompt` and `file_path`), so the result line can echo them unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub index: usize,
    pub prompt: String,
    pub attachment: Option<AttachmentSource>,
    pub passthrough: Map<String, Value>,
}

impl RequestRecord {
    pub fn new(index: usize, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        let mut passthrough = Map::new();
        passthrough.insert("prompt".into(), Value::String(prompt.clone()));
        Self {
            index,
            prompt,
            attachment: None,
            passthrough,
        }
    }

    /// Build a record from one decoded input line.
    ///
    /// The line must be a JSON object carrying a string `prompt`, a string
    /// `file_path`, or both.
    pub fn from_json(index: usize, value: Value) -> Result<Self, String> {
        let Value::Object(fields) = value else {
            return Err("input line is not a JSON object".to_string());
        };

        let prompt = match fields.get("prompt") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(_) => return Err("`prompt` must be a string".to_string()),
        };
        let file_path = match fields.get("file_path") {
            Some(Value::String(s)) => Some(PathBuf::from(s)),
            Some(Value::Null) | None => None,
            Some(_) => return Err("`file_path` must be a string".to_string()),
        };
        if prompt.is_none() && file_path.is_none() {
            return Err("missing `prompt` or `file_path`".to_string());
        }

        Ok(Self {
            index,
            prompt: prompt.unwrap_or_default(),
            attachment: file_path.map(AttachmentSource::File),
            passthrough: fields,
        })
    }

    pub fn with_attachment_path(mut self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.passthrough.insert(
            "file_path".into(),
            Value::String(path.to_string_lossy().into_owned()),
        );
        self.attachment = Some(AttachmentSource::File(path));
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(AttachmentSource::Inline(attachment));
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.passthrough.insert(key.into(), value.into());
        self
    }
}

/// Where a request's attachment comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum AttachmentSource {
    /// Local file, read by the executor right before the call.
    File(PathBuf),
    /// Bytes already in memory.
    Inline(Attachment),
}

/// A binary blob tagged with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub media_type: String,
    pub data: Vec<u8>,
    pub file_name: Option<String>,
}

impl Attachment {
    pub fn new(media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            media_type: media_type.into(),
            data,
            file_name: None,
        }
    }

    /// Read a local file, inferring its media type from the extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| RequestError::Attachment {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            media_type: media_type_for(path).to_string(),
            data,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
        })
    }

    pub fn base64_data(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data())
    }

    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

/// Media type for an attachment path, by extension (case-insensitive).
/// Unknown extensions map to `application/octet-stream`.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}

/// The one-to-one outcome of executing a [`RequestRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub index: usize,
    pub response: Option<String>,
    pub reasoning: Option<String>,
    pub finish_reason: Option<String>,
    pub error: Option<String>,
    pub passthrough: Map<String, Value>,
}

impl ResultRecord {
    pub fn success(
        record: &RequestRecord,
        response: Option<String>,
        reasoning: Option<String>,
        finish_reason: Option<String>,
    ) -> Self {
        Self {
            index: record.index,
            response,
            reasoning,
            finish_reason,
            error: None,
            passthrough: record.passthrough.clone(),
        }
    }

    pub fn failure(record: &RequestRecord, error: impl Into<String>) -> Self {
        Self {
            index: record.index,
            response: None,
            reasoning: None,
            finish_reason: None,
            error: Some(error.into()),
            passthrough: record.passthrough.clone(),
        }
    }

    /// A result counts as successful when it carries a response.
    pub fn is_success(&self) -> bool {
        self.response.is_some()
    }
}

/// Generated keys first, then every input field. An input field with the
/// same name as a generated key wins and the generated entry is left out.
impl Serialize for ResultRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let free = |key: &str| !self.passthrough.contains_key(key);
        let mut map = serializer.serialize_map(None)?;
        if free("request_id") {
            map.serialize_entry("request_id", &self.index)?;
        }
        if free("reasoning") {
            map.serialize_entry("reasoning", &self.reasoning)?;
        }
        if free("response") {
            map.serialize_entry("response", &self.response)?;
        }
        if let Some(ref reason) = self.finish_reason {
            if free("finish_reason") {
                map.serialize_entry("finish_reason", reason)?;
            }
        }
        if let Some(ref error) = self.error {
            if free("error") {
                map.serialize_entry("error", error)?;
            }
        }
        for (key, value) in &self.passthrough {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}
