//! Provider seam for the upload coordinator.

use async_trait::async_trait;
use coursecast_api_client::{ApiClient, ApiResult};
use coursecast_core::config::{render_template, COURSE_ID_PLACEHOLDER, VIDEO_ID_PLACEHOLDER};
use coursecast_core::models::{AssetStatusResponse, UploadUrlRequest, UploadUrlResponse};
use coursecast_core::IngestConfig;

/// Provider operations the coordinator needs: issue an upload target and report
/// processing status.
#[async_trait]
pub trait UploadProvider: Send + Sync {
    /// Ask for a one-time upload URL plus the provider's video identifier.
    async fn request_upload_target(
        &self,
        course_id: &str,
        request: &UploadUrlRequest,
    ) -> ApiResult<UploadUrlResponse>;

    /// Read the current asset status of a video.
    async fn fetch_asset_status(&self, video_id: &str) -> ApiResult<AssetStatusResponse>;
}

/// `UploadProvider` backed by the provider's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpUploadProvider {
    client: ApiClient,
    upload_url_path: String,
    asset_status_path: String,
}

impl HttpUploadProvider {
    pub fn new(
        client: ApiClient,
        upload_url_path: impl Into<String>,
        asset_status_path: impl Into<String>,
    ) -> Self {
        Self {
            client,
            upload_url_path: upload_url_path.into(),
            asset_status_path: asset_status_path.into(),
        }
    }

    pub fn from_config(config: &IngestConfig, client: ApiClient) -> Self {
        Self::new(
            client,
            config.upload_url_path.clone(),
            config.asset_status_path.clone(),
        )
    }

    fn upload_path(&self, course_id: &str) -> String {
        render_template(&self.upload_url_path, COURSE_ID_PLACEHOLDER, course_id)
    }

    fn status_path(&self, video_id: &str) -> String {
        render_template(&self.asset_status_path, VIDEO_ID_PLACEHOLDER, video_id)
    }
}

#[async_trait]
impl UploadProvider for HttpUploadProvider {
    async fn request_upload_target(
        &self,
        course_id: &str,
        request: &UploadUrlRequest,
    ) -> ApiResult<UploadUrlResponse> {
        let path = self.upload_path(course_id);
        tracing::debug!(course_id = %course_id, path = %path, "Requesting upload URL");
        self.client.request_upload_url(&path, request).await
    }

    async fn fetch_asset_status(&self, video_id: &str) -> ApiResult<AssetStatusResponse> {
        let path = self.status_path(video_id);
        self.client.get_asset_status(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coursecast_api_client::Auth;

    #[test]
    fn test_paths_are_rendered_with_encoded_ids() {
        let client = ApiClient::new("http://api.test".to_string(), Auth::Anonymous).unwrap();
        let provider = HttpUploadProvider::from_config(&IngestConfig::default(), client);

        assert_eq!(
            provider.upload_path("course 1"),
            "/api/admin/courses/course%201/videos/upload-url"
        );
        assert_eq!(provider.status_path("v1"), "/api/admin/videos/v1/status");
    }
}
