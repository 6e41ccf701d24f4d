//! Error type for provider API calls.

use coursecast_core::FatalCause;

/// Maximum number of response body characters kept in an error.
const MAX_BODY_CHARS: usize = 512;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    #[error("Failed to send request: {0}")]
    Network(String),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response as JSON: {0}")]
    Decode(String),
}

/// Result type for provider API calls
pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        ApiError::Status {
            status,
            body: truncate_body(body),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

impl From<ApiError> for FatalCause {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, body } => FatalCause::from_status(status, body),
            ApiError::Decode(msg) => FatalCause::MalformedResponse(msg),
            ApiError::Network(msg) => FatalCause::Network(msg),
            ApiError::Client(msg) => FatalCause::InvalidRequest(msg),
        }
    }
}

/// Keep error bodies short enough for a log line.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_BODY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_BODY_CHARS).collect();
        format!("{}...", head)
    }
}
