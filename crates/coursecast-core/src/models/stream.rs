use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Body statuses that mean "known video, not playable yet" when no stream URL is present.
pub const PENDING_STREAM_STATUSES: &[&str] =
    &["processing", "preparing", "pending", "queued", "transcoding"];

/// Stream endpoint body: `{ streamUrl, video? }` on success, or a status/message
/// when the asset is not ready.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StreamPayload {
    #[serde(default, alias = "stream_url")]
    pub stream_url: Option<String>,
    #[serde(default)]
    pub video: Option<StreamVideo>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl StreamPayload {
    /// The stream URL, if present and non-blank.
    pub fn playable_url(&self) -> Option<&str> {
        self.stream_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether the body itself says the asset is still being prepared.
    pub fn signals_processing(&self) -> bool {
        self.status
            .as_deref()
            .map(|s| PENDING_STREAM_STATUSES.contains(&s.trim().to_lowercase().as_str()))
            .unwrap_or(false)
    }

    /// Provider status text for a processing response.
    pub fn provider_status(&self) -> String {
        self.status
            .clone()
            .or_else(|| self.message.clone())
            .unwrap_or_else(|| "processing".to_string())
    }
}

/// Video details that some deployments return alongside the stream URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamVideo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_with_video() {
        let payload: StreamPayload = serde_json::from_value(serde_json::json!({
            "streamUrl": "https://stream/v1.m3u8",
            "video": { "id": 42, "title": "Intro", "duration": 12.5 }
        }))
        .unwrap();
        assert_eq!(payload.playable_url(), Some("https://stream/v1.m3u8"));
        let video = payload.video.unwrap();
        assert_eq!(video.title.as_deref(), Some("Intro"));
        assert_eq!(video.extra.get("id"), Some(&serde_json::json!(42)));
    }

    #[test]
    fn test_blank_stream_url_is_not_playable() {
        let payload: StreamPayload = serde_json::from_str(r#"{"streamUrl":"  "}"#).unwrap();
        assert_eq!(payload.playable_url(), None);
    }

    #[test]
    fn test_processing_signal_in_body() {
        let payload: StreamPayload =
            serde_json::from_str(r#"{"status":"Preparing","message":"hold on"}"#).unwrap();
        assert!(payload.signals_processing());
        assert_eq!(payload.provider_status(), "Preparing");

        let payload: StreamPayload = serde_json::from_str(r#"{"message":"later"}"#).unwrap();
        assert!(!payload.signals_processing());
        assert_eq!(payload.provider_status(), "later");
    }
}
