//! Domain methods for the provider API client.
//!
//! Paths are passed in already rendered (see `coursecast_core::config`), so the
//! same client works against deployments with different endpoint shapes.

use crate::{ApiClient, ApiResult, Auth, RawResponse};
use coursecast_core::models::{AssetStatusResponse, UploadUrlRequest, UploadUrlResponse};
use coursecast_core::{CallerMode, EndpointMethod};
use reqwest::Method;

/// Header that marks a request made on behalf of a synthetic anonymous viewer.
pub const VIEWER_CONTEXT_HEADER: &str = "X-Viewer-Context";

impl ApiClient {
    /// Ask the provider for a one-time upload target for a course video.
    pub async fn request_upload_url(
        &self,
        path: &str,
        request: &UploadUrlRequest,
    ) -> ApiResult<UploadUrlResponse> {
        self.post_json(path, request).await
    }

    /// Read the provider-side asset status of a video.
    pub async fn get_asset_status(&self, path: &str) -> ApiResult<AssetStatusResponse> {
        self.get(path).await
    }

    /// Call a stream endpoint and return the raw response for classification.
    ///
    /// `CallerMode::Anonymous` drops the caller's credentials and tags the request
    /// with the anonymous viewer context.
    pub async fn fetch_stream(
        &self,
        method: EndpointMethod,
        path: &str,
        caller: CallerMode,
    ) -> ApiResult<RawResponse> {
        let method = match method {
            EndpointMethod::Get => Method::GET,
            EndpointMethod::Post => Method::POST,
        };
        // POST endpoints expect a JSON body even though they only read.
        let empty_body = serde_json::json!({});
        let body = (method == Method::POST).then_some(&empty_body);

        match caller {
            CallerMode::Caller => self.send(method, path, &[], body).await,
            CallerMode::Anonymous => {
                self.with_auth(Auth::Anonymous)
                    .send(method, path, &[(VIEWER_CONTEXT_HEADER, "anonymous")], body)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecast_core::models::{VideoFile, VideoMetadata};
    use mockito::Matcher;

    #[tokio::test]
    async fn test_request_upload_url_posts_metadata() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/courses/c1/upload-url")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "filename": "intro.mp4",
                "title": "Intro",
                "fileSize": 4
            })))
            .with_status(200)
            .with_body(r#"{"uploadUrl":"https://upload.test/abc","videoId":"v1"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Bearer("t".to_string())).unwrap();
        let file = VideoFile::from_name("intro.mp4", vec![0u8; 4]);
        let request = UploadUrlRequest::new(&file, &VideoMetadata::new("Intro"));
        let response = client
            .request_upload_url("/courses/c1/upload-url", &request)
            .await
            .unwrap();

        assert_eq!(response.video_id, "v1");
        assert_eq!(response.upload_url, "https://upload.test/abc");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_stream_anonymous_drops_credentials() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/videos/v1/stream")
            .match_header("authorization", Matcher::Missing)
            .match_header("x-viewer-context", "anonymous")
            .with_status(200)
            .with_body(r#"{"streamUrl":"https://cdn/v1.m3u8"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Bearer("t".to_string())).unwrap();
        let response = client
            .fetch_stream(
                EndpointMethod::Get,
                "/videos/v1/stream",
                CallerMode::Anonymous,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_fetch_stream_post_sends_empty_object() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v2/videos/v1/playback")
            .match_header("authorization", "Bearer t")
            .match_body(Matcher::Json(serde_json::json!({})))
            .with_status(404)
            .create_async()
            .await;

        let client = ApiClient::new(server.url(), Auth::Bearer("t".to_string())).unwrap();
        let response = client
            .fetch_stream(
                EndpointMethod::Post,
                "/v2/videos/v1/playback",
                CallerMode::Caller,
            )
            .await
            .unwrap();

        assert_eq!(response.status, 404);
        mock.assert_async().await;
    }
}
