//! Byte transfer to a provider-issued upload URL.

use async_trait::async_trait;
use bytes::Bytes;
use coursecast_api_client::{truncate_body, ApiError, ApiResult};
use coursecast_core::models::VideoFile;
use coursecast_core::IngestConfig;
use reqwest::{Body, Client};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Size of each body chunk handed to the HTTP client.
const CHUNK_SIZE: usize = 256 * 1024;

/// Called with the cumulative number of bytes sent so far.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

#[async_trait]
pub trait ByteTransport: Send + Sync {
    /// Send the whole file to `upload_url`, reporting cumulative bytes through
    /// `progress`. Reports may arrive out of order; callers must not assume they
    /// are monotonic.
    async fn transfer(&self, upload_url: &str, file: VideoFile, progress: ProgressFn)
        -> ApiResult<()>;
}

/// Streams the file as a single `PUT` to a pre-signed URL.
///
/// The upload URL carries its own authorization, so no API credentials are sent.
/// Only connection setup is bounded by default; a transfer of any size may run
/// as long as the server keeps accepting bytes.
#[derive(Debug, Clone)]
pub struct HttpPutTransport {
    client: Client,
    transfer_timeout: Option<Duration>,
}

impl HttpPutTransport {
    pub fn new(connect_timeout: Duration, transfer_timeout: Option<Duration>) -> ApiResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self {
            client,
            transfer_timeout,
        })
    }

    pub fn from_config(config: &IngestConfig) -> ApiResult<Self> {
        Self::new(config.connect_timeout(), config.transfer_timeout())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            transfer_timeout: None,
        }
    }
}

fn chunk(data: &Bytes) -> Vec<Bytes> {
    let len = data.len();
    (0..len)
        .step_by(CHUNK_SIZE)
        .map(|start| data.slice(start..(start + CHUNK_SIZE).min(len)))
        .collect()
}

#[async_trait]
impl ByteTransport for HttpPutTransport {
    async fn transfer(
        &self,
        upload_url: &str,
        file: VideoFile,
        progress: ProgressFn,
    ) -> ApiResult<()> {
        let content_type = file.content_type().to_string();
        let total = file.size();
        let chunks = chunk(&file.into_bytes());

        let mut sent: u64 = 0;
        let body_stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress(sent);
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        let mut request = self
            .client
            .put(upload_url)
            .header("Content-Type", content_type)
            .header("Content-Length", total)
            .body(Body::wrap_stream(body_stream));
        if let Some(limit) = self.transfer_timeout {
            request = request.timeout(limit);
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        tracing::debug!(bytes = total, status = status.as_u16(), "Upload transfer finished");
        Ok(())
    }
}

/// Read a local video file, inferring its content type from the extension.
pub async fn load_video_file(path: impl AsRef<Path>) -> std::io::Result<VideoFile> {
    let path = path.as_ref();
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    Ok(VideoFile::from_name(name, data))
}
