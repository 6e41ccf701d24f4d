//! Configuration module
//!
//! Polling bounds, provider endpoint paths and the ordered list of stream
//! resolution endpoints. Values come from the environment (and `.env`), with
//! defaults for everything except credentials.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_UPLOAD_URL_PATH: &str = "/api/admin/courses/{course_id}/videos/upload-url";
pub const DEFAULT_ASSET_STATUS_PATH: &str = "/api/admin/videos/{video_id}/status";

pub const COURSE_ID_PLACEHOLDER: &str = "{course_id}";
pub const VIDEO_ID_PLACEHOLDER: &str = "{video_id}";

/// HTTP method used by a stream endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointMethod {
    #[default]
    Get,
    Post,
}

/// Whose credentials a stream endpoint is called with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallerMode {
    /// The caller's own credentials
    #[default]
    Caller,
    /// A synthetic anonymous viewer with no credentials
    Anonymous,
}

fn default_processing_statuses() -> Vec<u16> {
    vec![202]
}

/// One stream resolution endpoint. The order of these in the config is the
/// order the resolver tries them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEndpoint {
    pub id: String,
    #[serde(default)]
    pub method: EndpointMethod,
    /// Path template containing `{video_id}`
    pub path: String,
    #[serde(default)]
    pub caller: CallerMode,
    /// HTTP statuses that mean "known video, still processing"
    #[serde(default = "default_processing_statuses")]
    pub processing_statuses: Vec<u16>,
}

impl StreamEndpoint {
    pub fn new(id: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: EndpointMethod::Get,
            path: path.into(),
            caller: CallerMode::Caller,
            processing_statuses: default_processing_statuses(),
        }
    }

    pub fn anonymous(mut self) -> Self {
        self.caller = CallerMode::Anonymous;
        self
    }

    pub fn with_method(mut self, method: EndpointMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_processing_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.processing_statuses = statuses;
        self
    }

    pub fn render(&self, video_id: &str) -> String {
        render_template(&self.path, VIDEO_ID_PLACEHOLDER, video_id)
    }
}

/// The default resolution order: current admin shape, legacy admin shape, then the
/// user-facing endpoint as an anonymous viewer.
pub fn default_stream_endpoints() -> Vec<StreamEndpoint> {
    vec![
        StreamEndpoint::new("primary-admin", "/api/admin/videos/{video_id}/stream"),
        StreamEndpoint::new(
            "legacy-admin",
            "/api/admin/course-videos/{video_id}/stream-url",
        ),
        StreamEndpoint::new("user-fallback", "/api/videos/{video_id}/stream").anonymous(),
    ]
}

/// Substitute `placeholder` in `template` with the URL-encoded `value`.
pub fn render_template(template: &str, placeholder: &str, value: &str) -> String {
    template.replace(placeholder, &urlencoding::encode(value))
}

/// Ingestion and playback configuration.
#[derive(Clone, Debug)]
pub struct IngestConfig {
    pub api_url: String,
    pub api_token: Option<String>,
    pub environment: String,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: u32,
    pub request_timeout_secs: u64,
    /// Connection setup limit for the file transfer.
    pub connect_timeout_secs: u64,
    /// Optional cap on a whole file transfer. Unset means large files are
    /// never cut off while bytes keep flowing.
    pub transfer_timeout_secs: Option<u64>,
    pub upload_url_path: String,
    pub asset_status_path: String,
    pub stream_endpoints: Vec<StreamEndpoint>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            environment: "development".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            transfer_timeout_secs: None,
            upload_url_path: DEFAULT_UPLOAD_URL_PATH.to_string(),
            asset_status_path: DEFAULT_ASSET_STATUS_PATH.to_string(),
            stream_endpoints: default_stream_endpoints(),
        }
    }
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let stream_endpoints = match lookup("COURSECAST_STREAM_ENDPOINTS") {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                anyhow::anyhow!("COURSECAST_STREAM_ENDPOINTS must be a JSON array: {}", e)
            })?,
            _ => defaults.stream_endpoints,
        };

        let config = Self {
            api_url: lookup("COURSECAST_API_URL")
                .or_else(|| lookup("API_URL"))
                .unwrap_or(defaults.api_url)
                .trim_end_matches('/')
                .to_string(),
            api_token: lookup("COURSECAST_API_TOKEN")
                .or_else(|| lookup("API_TOKEN"))
                .filter(|t| !t.trim().is_empty()),
            environment: lookup("ENVIRONMENT")
                .or_else(|| lookup("APP_ENV"))
                .unwrap_or(defaults.environment),
            poll_interval_ms: lookup("COURSECAST_POLL_INTERVAL_MS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("COURSECAST_POLL_INTERVAL_MS must be a number"))?
                .unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            max_poll_attempts: lookup("COURSECAST_MAX_POLL_ATTEMPTS")
                .map(|v| v.trim().parse::<u32>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("COURSECAST_MAX_POLL_ATTEMPTS must be a number"))?
                .unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS),
            request_timeout_secs: lookup("COURSECAST_REQUEST_TIMEOUT_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("COURSECAST_REQUEST_TIMEOUT_SECS must be a number"))?
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: lookup("COURSECAST_CONNECT_TIMEOUT_SECS")
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("COURSECAST_CONNECT_TIMEOUT_SECS must be a number"))?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
            transfer_timeout_secs: lookup("COURSECAST_TRANSFER_TIMEOUT_SECS")
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().parse::<u64>())
                .transpose()
                .map_err(|_| {
                    anyhow::anyhow!("COURSECAST_TRANSFER_TIMEOUT_SECS must be a number")
                })?,
            upload_url_path: lookup("COURSECAST_UPLOAD_URL_PATH")
                .unwrap_or(defaults.upload_url_path),
            asset_status_path: lookup("COURSECAST_ASSET_STATUS_PATH")
                .unwrap_or(defaults.asset_status_path),
            stream_endpoints,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!(
                "COURSECAST_POLL_INTERVAL_MS must be greater than zero"
            ));
        }

        if self.max_poll_attempts == 0 {
            return Err(anyhow::anyhow!(
                "COURSECAST_MAX_POLL_ATTEMPTS must be greater than zero"
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "COURSECAST_REQUEST_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "COURSECAST_CONNECT_TIMEOUT_SECS must be greater than zero"
            ));
        }

        if self.transfer_timeout_secs == Some(0) {
            return Err(anyhow::anyhow!(
                "COURSECAST_TRANSFER_TIMEOUT_SECS must be greater than zero when set"
            ));
        }

        if !self.upload_url_path.contains(COURSE_ID_PLACEHOLDER) {
            return Err(anyhow::anyhow!(
                "Upload URL path must contain {}",
                COURSE_ID_PLACEHOLDER
            ));
        }

        if !self.asset_status_path.contains(VIDEO_ID_PLACEHOLDER) {
            return Err(anyhow::anyhow!(
                "Asset status path must contain {}",
                VIDEO_ID_PLACEHOLDER
            ));
        }

        if self.stream_endpoints.is_empty() {
            return Err(anyhow::anyhow!(
                "At least one stream endpoint must be configured"
            ));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.stream_endpoints {
            if !endpoint.path.contains(VIDEO_ID_PLACEHOLDER) {
                return Err(anyhow::anyhow!(
                    "Stream endpoint '{}' path must contain {}",
                    endpoint.id,
                    VIDEO_ID_PLACEHOLDER
                ));
            }
            if !seen.insert(endpoint.id.as_str()) {
                return Err(anyhow::anyhow!(
                    "Duplicate stream endpoint id '{}'",
                    endpoint.id
                ));
            }
        }

        Ok(())
    }

    /// Check if the client is running against production
    pub fn is_production(&self) -> bool {
        let environment = self.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn transfer_timeout(&self) -> Option<Duration> {
        self.transfer_timeout_secs.map(Duration::from_secs)
    }

    pub fn upload_url_path_for(&self, course_id: &str) -> String {
        render_template(&self.upload_url_path, COURSE_ID_PLACEHOLDER, course_id)
    }

    pub fn asset_status_path_for(&self, video_id: &str) -> String {
        render_template(&self.asset_status_path, VIDEO_ID_PLACEHOLDER, video_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IngestConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(5000));
        assert_eq!(config.max_poll_attempts, 60);
        assert_eq!(config.api_url, "http://localhost:3000");
        assert!(config.api_token.is_none());
        let ids: Vec<_> = config.stream_endpoints.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["primary-admin", "legacy-admin", "user-fallback"]);
        assert_eq!(config.stream_endpoints[2].caller, CallerMode::Anonymous);
        assert!(!config.is_production());
    }

    #[test]
    fn test_overrides() {
        let config = IngestConfig::from_lookup(lookup_from(&[
            ("COURSECAST_API_URL", "https://api.example.com/"),
            ("COURSECAST_API_TOKEN", "secret"),
            ("COURSECAST_POLL_INTERVAL_MS", "250"),
            ("COURSECAST_MAX_POLL_ATTEMPTS", "5"),
            ("ENVIRONMENT", "Production"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.max_poll_attempts, 5);
        assert!(config.is_production());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = IngestConfig::from_lookup(lookup_from(&[("COURSECAST_MAX_POLL_ATTEMPTS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_POLL_ATTEMPTS"));
    }

    #[test]
    fn test_non_numeric_interval_rejected() {
        assert!(
            IngestConfig::from_lookup(lookup_from(&[("COURSECAST_POLL_INTERVAL_MS", "soon")]))
                .is_err()
        );
    }

    #[test]
    fn test_request_timeout_must_be_a_positive_number() {
        let err = IngestConfig::from_lookup(lookup_from(&[(
            "COURSECAST_REQUEST_TIMEOUT_SECS",
            "abc",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("REQUEST_TIMEOUT_SECS"));

        let err = IngestConfig::from_lookup(lookup_from(&[(
            "COURSECAST_REQUEST_TIMEOUT_SECS",
            "0",
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_transfer_timeout_is_opt_in() {
        let config = IngestConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.transfer_timeout(), None);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));

        let config = IngestConfig::from_lookup(lookup_from(&[
            ("COURSECAST_TRANSFER_TIMEOUT_SECS", "3600"),
            ("COURSECAST_CONNECT_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.transfer_timeout(), Some(Duration::from_secs(3600)));
        assert_eq!(config.connect_timeout(), Duration::from_secs(3));

        assert!(IngestConfig::from_lookup(lookup_from(&[(
            "COURSECAST_TRANSFER_TIMEOUT_SECS",
            "0"
        )]))
        .is_err());
        assert!(IngestConfig::from_lookup(lookup_from(&[(
            "COURSECAST_TRANSFER_TIMEOUT_SECS",
            "forever"
        )]))
        .is_err());
    }

    #[test]
    fn test_stream_endpoints_from_json() {
        let config = IngestConfig::from_lookup(lookup_from(&[(
            "COURSECAST_STREAM_ENDPOINTS",
            r#"[
                {"id":"v2","path":"/v2/videos/{video_id}/playback","method":"POST"},
                {"id":"public","path":"/videos/{video_id}","caller":"anonymous",
                 "processing_statuses":[]}
            ]"#,
        )]))
        .unwrap();
        assert_eq!(config.stream_endpoints.len(), 2);
        assert_eq!(config.stream_endpoints[0].method, EndpointMethod::Post);
        assert_eq!(config.stream_endpoints[0].processing_statuses, vec![202]);
        assert!(config.stream_endpoints[1].processing_statuses.is_empty());
    }

    #[test]
    fn test_duplicate_endpoint_ids_rejected() {
        let mut config = IngestConfig::default();
        config
            .stream_endpoints
            .push(StreamEndpoint::new("primary-admin", "/x/{video_id}"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_without_placeholder_rejected() {
        let mut config = IngestConfig::default();
        config.stream_endpoints = vec![StreamEndpoint::new("broken", "/videos/stream")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_empty_endpoint_list_rejected() {
        let mut config = IngestConfig::default();
        config.stream_endpoints.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_templates_encode_identifiers() {
        let config = IngestConfig::default();
        assert_eq!(
            config.asset_status_path_for("a b/c"),
            "/api/admin/videos/a%20b%2Fc/status"
        );
        assert_eq!(
            config.upload_url_path_for("course-1"),
            "/api/admin/courses/course-1/videos/upload-url"
        );
        assert_eq!(
            config.stream_endpoints[0].render("v1"),
            "/api/admin/videos/v1/stream"
        );
    }
}
