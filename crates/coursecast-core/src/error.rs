//! Error types module
//!
//! This module provides the error taxonomy shared by the upload coordinator and the
//! stream resolver. Upload failures are unified under `IngestError`; failures that
//! stop the stream resolution chain are described by `FatalCause`.
//!
//! Both implement `ErrorMetadata` so callers can pick user-facing wording and a log
//! level without matching on every variant.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a provider still working
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - defines how an error should be presented
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSFER_FAILED")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the caller may try again later)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Terminal failure of an upload session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Upload URL request failed: {0}")]
    UploadUrlRequest(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Processing failed for video {video_id}: {reason}")]
    ProcessingFailed { video_id: String, reason: String },

    #[error("Video {video_id} was still processing after {attempts} status checks")]
    ProcessingTimedOut { video_id: String, attempts: u32 },

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Static metadata for each variant: (error_code, recoverable, suggested_action, log_level).
fn ingest_error_static_metadata(
    err: &IngestError,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match err {
        IngestError::InvalidInput(_) => (
            "INVALID_INPUT",
            false,
            Some("Check the title and file, then submit again"),
            LogLevel::Debug,
        ),
        IngestError::Unauthorized(_) => (
            "UNAUTHORIZED",
            false,
            Some("Sign in again and retry the upload"),
            LogLevel::Warn,
        ),
        IngestError::UploadUrlRequest(_) => (
            "UPLOAD_URL_REQUEST_FAILED",
            false,
            Some("Retry the upload"),
            LogLevel::Error,
        ),
        IngestError::Transfer(_) => (
            "TRANSFER_FAILED",
            false,
            Some("Check the connection and submit the file again"),
            LogLevel::Error,
        ),
        IngestError::ProcessingFailed { .. } => (
            "PROCESSING_FAILED",
            false,
            Some("Upload a different file or re-encode the video"),
            LogLevel::Error,
        ),
        IngestError::ProcessingTimedOut { .. } => (
            "PROCESSING_TIMED_OUT",
            true,
            Some("Check again in a few minutes"),
            LogLevel::Warn,
        ),
        IngestError::Cancelled => ("CANCELLED", false, None, LogLevel::Debug),
        IngestError::Internal(_) => (
            "INTERNAL_ERROR",
            false,
            Some("Retry the upload"),
            LogLevel::Error,
        ),
    }
}

impl ErrorMetadata for IngestError {
    fn error_code(&self) -> &'static str {
        ingest_error_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        ingest_error_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        ingest_error_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        ingest_error_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            IngestError::InvalidInput(ref msg) => msg.clone(),
            IngestError::Unauthorized(_) => "You are not allowed to upload videos".to_string(),
            IngestError::UploadUrlRequest(_) => "Could not start the upload".to_string(),
            IngestError::Transfer(_) => "The video file could not be transferred".to_string(),
            IngestError::ProcessingFailed { .. } => {
                "The video could not be processed".to_string()
            }
            IngestError::ProcessingTimedOut { .. } => {
                "The video is still being processed".to_string()
            }
            IngestError::Cancelled => "Upload cancelled".to_string(),
            IngestError::Internal(_) => "Internal error".to_string(),
        }
    }
}

/// Reason a stream resolution strategy stopped the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalCause {
    #[error("Unauthorized (HTTP {status}): {message}")]
    Unauthorized { status: u16, message: String },

    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FatalCause {
    /// Build the cause for a non-success HTTP status other than 404 and the processing codes.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => FatalCause::Unauthorized { status, message },
            500..=599 => FatalCause::ServerError { status, message },
            _ => FatalCause::UnexpectedStatus { status, message },
        }
    }
}

fn fatal_cause_static_metadata(
    cause: &FatalCause,
) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match cause {
        FatalCause::Unauthorized { .. } => (
            "STREAM_UNAUTHORIZED",
            false,
            Some("Sign in again"),
            LogLevel::Warn,
        ),
        FatalCause::ServerError { .. } => (
            "STREAM_SERVER_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        FatalCause::UnexpectedStatus { .. } => (
            "STREAM_UNEXPECTED_STATUS",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
        FatalCause::MalformedResponse(_) => (
            "STREAM_MALFORMED_RESPONSE",
            false,
            Some("Contact support if this error persists"),
            LogLevel::Error,
        ),
        FatalCause::Network(_) => (
            "STREAM_NETWORK_ERROR",
            true,
            Some("Check the connection and retry"),
            LogLevel::Warn,
        ),
        FatalCause::InvalidRequest(_) => (
            "STREAM_INVALID_REQUEST",
            false,
            Some("Check the video identifier"),
            LogLevel::Debug,
        ),
    }
}

impl ErrorMetadata for FatalCause {
    fn error_code(&self) -> &'static str {
        fatal_cause_static_metadata(self).0
    }

    fn is_recoverable(&self) -> bool {
        fatal_cause_static_metadata(self).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        fatal_cause_static_metadata(self).2
    }

    fn log_level(&self) -> LogLevel {
        fatal_cause_static_metadata(self).3
    }

    fn client_message(&self) -> String {
        match self {
            FatalCause::Unauthorized { .. } => {
                "You are not allowed to watch this video".to_string()
            }
            FatalCause::InvalidRequest(ref msg) => msg.clone(),
            _ => "The video cannot be played right now".to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for IngestError {
    fn from(err: validator::ValidationErrors) -> Self {
        IngestError::InvalidInput(format!("Validation error: {}", err))
    }
}
