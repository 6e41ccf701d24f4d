use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use validator::Validate;

use crate::error::IngestError;

/// Caller-supplied description of a course video. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct VideoMetadata {
    /// Video title shown in the course outline
    #[validate(length(
        min = 1,
        max = 255,
        message = "Title must be between 1 and 255 characters"
    ))]
    pub title: String,
    /// Optional long description
    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,
    /// Position of the video inside its course
    pub order: Option<u32>,
}

impl VideoMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            order: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Check the submission preconditions: a non-blank title within the length limits.
    pub fn check(&self) -> Result<(), IngestError> {
        if self.title.trim().is_empty() {
            return Err(IngestError::InvalidInput("Title is required".to_string()));
        }
        self.validate()?;
        Ok(())
    }
}

/// A local video file handed to an upload session.
///
/// The bytes are reference-counted, so moving the file into the transport does not copy it.
#[derive(Clone)]
pub struct VideoFile {
    name: String,
    content_type: String,
    data: Bytes,
}

impl Debug for VideoFile {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("VideoFile")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.data.len())
            .finish()
    }
}

impl VideoFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// Build a file whose MIME type is derived from the file name extension.
    pub fn from_name(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let content_type = content_type_for(&name).to_string();
        Self::new(name, content_type, data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

/// Map a video file extension to its MIME type. Unknown extensions fall back to
/// `application/octet-stream`.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "m4v" => "video/x-m4v",
        _ => "application/octet-stream",
    }
}

/// Request body for a one-time upload target.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub filename: String,
    pub content_type: String,
    pub file_size: u64,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
}

impl UploadUrlRequest {
    pub fn new(file: &VideoFile, metadata: &VideoMetadata) -> Self {
        Self {
            filename: file.name().to_string(),
            content_type: file.content_type().to_string(),
            file_size: file.size(),
            title: metadata.title.trim().to_string(),
            description: metadata.description.clone(),
            order: metadata.order,
        }
    }
}

/// Upload target issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    /// One-time URL accepting an HTTP PUT of the raw file
    #[serde(alias = "upload_url", alias = "url")]
    pub upload_url: String,
    /// Provider-side identifier of the video being created
    #[serde(alias = "video_id", alias = "id")]
    pub video_id: String,
}
