#![allow(dead_code)]

use coursecast_api_client::ApiClient;
use coursecast_core::IngestConfig;

pub const ADMIN_TOKEN: &str = "admin-token";

/// Config pointed at a mock server, with fast polling.
pub fn test_config(server: &mockito::ServerGuard) -> IngestConfig {
    IngestConfig {
        api_url: server.url(),
        api_token: Some(ADMIN_TOKEN.to_string()),
        poll_interval_ms: 1,
        max_poll_attempts: 3,
        request_timeout_secs: 5,
        ..IngestConfig::default()
    }
}

pub fn test_client(config: &IngestConfig) -> ApiClient {
    ApiClient::from_config(config).expect("client should build")
}

pub fn bearer() -> String {
    format!("Bearer {}", ADMIN_TOKEN)
}
