//! Shared HTTP client for the course video provider API.
//!
//! Provides a minimal client with configurable auth (Bearer token, X-API-Key or an
//! anonymous viewer), JSON GET/POST helpers, a raw `send` that hands back the status
//! and body for callers that classify responses themselves, and domain methods for
//! upload targets, asset status and stream endpoints.

pub mod api;
pub mod error;

use coursecast_core::IngestConfig;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use error::{truncate_body, ApiError, ApiResult};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Authentication strategy for the API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
    /// No credentials
    Anonymous,
}

/// Status and body of a response, whatever the status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// HTTP client for the provider API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
}

impl ApiClient {
    pub fn new(base_url: String, auth: Auth) -> ApiResult<Self> {
        Self::with_timeout(base_url, auth, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: String, auth: Auth, timeout: Duration) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    /// Create a client from the ingest config. Uses Bearer auth when a token is set.
    pub fn from_config(config: &IngestConfig) -> ApiResult<Self> {
        let auth = match &config.api_token {
            Some(token) => Auth::Bearer(token.clone()),
            None => Auth::Anonymous,
        };
        Self::with_timeout(config.api_url.clone(), auth, config.request_timeout())
    }

    /// Same connection pool, different credentials.
    pub fn with_auth(&self, auth: Auth) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
            Auth::XApiKey(key) => request.header("X-API-Key", key.as_str()),
            Auth::Anonymous => request,
        }
    }

    /// Send a request and return the status and body without judging the status.
    ///
    /// Only transport failures (connection, timeout, unreadable body) are errors here.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> ApiResult<RawResponse> {
        let url = self.build_url(path);
        let mut request = self.apply_auth(self.client.request(method.clone(), &url));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(method = %method, url = %url, status, "API response");

        Ok(RawResponse { status, body })
    }

    /// GET request. Deserializes JSON response.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        let response = self.send(Method::GET, path, &[], None).await?;
        Self::expect_json(response)
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ApiResult<T> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Client(e.to_string()))?;
        let response = self.send(Method::POST, path, &[], Some(&body)).await?;
        Self::expect_json(response)
    }

    fn expect_json<T: DeserializeOwned>(response: RawResponse) -> ApiResult<T> {
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        response.json()
    }

    /// Raw client for requests outside the provider API (e.g. upload targets on another host).
    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[test]
    fn test_build_url_trims_trailing_slash() {
        let client = ApiClient::new("http://api.test/".to_string(), Auth::Anonymous).unwrap();
        assert_eq!(client.build_url("/x"), "http://api.test/x");
    }

    #[test]
    fn test_with_auth_keeps_base_url() {
        let client = ApiClient::new(
            "http://api.test".to_string(),
            Auth::Bearer("t".to_string()),
        )
        .unwrap();
        let anonymous = client.with_auth(Auth::Anonymous);
        assert_eq!(anonymous.base_url(), "http://api.test");
        assert_eq!(anonymous.auth(), &Auth::Anonymous);
        assert_eq!(client.auth(), &Auth::Bearer("t".to_string()));
    }

    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .match_header("authorization", "Bearer secret")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Bearer("secret".to_string())).unwrap();
        let body: serde_json::Value = client.get("/ping").await.unwrap();

        assert_eq!(body, serde_json::json!({"ok": true}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_reports_status_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("no such thing")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Anonymous).unwrap();
        let err = client
            .get::<serde_json::Value>("/missing")
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().contains("no such thing"));
    }

    #[tokio::test]
    async fn test_send_returns_non_success_without_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/processing")
            .match_header("authorization", Matcher::Missing)
            .match_header("x-extra", "1")
            .with_status(202)
            .with_body(r#"{"status":"processing"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Anonymous).unwrap();
        let response = client
            .send(Method::GET, "/processing", &[("X-Extra", "1")], None)
            .await
            .unwrap();

        assert_eq!(response.status, 202);
        assert!(response.is_success());
        assert!(response.body.contains("processing"));
    }

    #[tokio::test]
    async fn test_post_json_decodes_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/items")
            .match_header("x-api-key", "k")
            .match_body(Matcher::Json(serde_json::json!({"name": "a"})))
            .with_status(201)
            .with_body(r#"{"id":"1"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::XApiKey("k".to_string())).unwrap();
        let created: serde_json::Value = client
            .post_json("/items", &serde_json::json!({"name": "a"}))
            .await
            .unwrap();

        assert_eq!(created["id"], "1");
    }

    #[tokio::test]
    async fn test_get_reports_decode_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Anonymous).unwrap();
        let err = client
            .get::<serde_json::Value>("/garbage")
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Decode(_)));
    }
}
