use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Status poll response: `{ "asset": { "status": ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetStatusResponse {
    pub asset: AssetInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssetInfo {
    pub status: String,
    /// Provider error details, present when the status is `errored`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<JsonValue>,
}

impl AssetInfo {
    pub fn classify(&self) -> AssetStatus {
        AssetStatus::classify(&self.status)
    }

    /// Human-readable failure reason taken from the provider's `errors` field.
    pub fn error_reason(&self) -> String {
        match &self.errors {
            Some(JsonValue::String(message)) => message.clone(),
            Some(JsonValue::Object(map)) => match map.get("messages") {
                Some(JsonValue::Array(messages)) => messages
                    .iter()
                    .filter_map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join("; "),
                _ => map
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("unknown error")
                    .to_string(),
            },
            Some(other) => other.to_string(),
            None => "provider reported the asset as errored".to_string(),
        }
    }
}

/// Three-way classification of a provider asset status.
///
/// Only `ready` and `errored` are decisive. Every other value, including ones the
/// provider adds later, means "keep waiting".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "status", rename_all = "lowercase")]
pub enum AssetStatus {
    Ready,
    Errored,
    Pending(String),
}

impl AssetStatus {
    pub fn classify(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "ready" => AssetStatus::Ready,
            "errored" => AssetStatus::Errored,
            _ => AssetStatus::Pending(normalized),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AssetStatus::Pending(_))
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Ready => write!(f, "ready"),
            AssetStatus::Errored => write!(f, "errored"),
            AssetStatus::Pending(status) => write!(f, "{}", status),
        }
    }
}
