//! Upload coordinator: runs one session per `begin_upload` call as a background task.
//!
//! The task owns the `UploadSession`. Observers get a `watch` channel with the latest
//! snapshot and a `broadcast` channel with state changes and progress ticks. Every
//! suspension point is raced against the session's cancellation token.

use super::provider::{HttpUploadProvider, UploadProvider};
use super::session::{
    InvalidTransition, PollObservation, UploadOutcome, UploadSession, UploadSnapshot, UploadState,
};
use super::transport::{ByteTransport, HttpPutTransport, ProgressFn};
use coursecast_api_client::{ApiClient, ApiError, ApiResult};
use coursecast_core::models::{AssetStatus, UploadUrlRequest, VideoFile, VideoMetadata};
use coursecast_core::{ErrorMetadata, IngestConfig, IngestError, LogLevel};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;
use uuid::Uuid;

const NOTIFICATION_CAPACITY: usize = 256;

/// How often and how many times the provider is asked about processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(coursecast_core::config::DEFAULT_POLL_INTERVAL_MS),
            max_attempts: coursecast_core::config::DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

impl From<&IngestConfig> for PollSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            interval: config.poll_interval(),
            max_attempts: config.max_poll_attempts,
        }
    }
}

/// Pushed to subscribers while a session runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadNotification {
    StateChanged { state: UploadState },
    /// Sent only when the whole-percent value moves
    Progress { percent: u8, bytes: u64, total: u64 },
}

/// Final result of a session, returned by `UploadHandle::wait`.
#[derive(Debug, Clone)]
pub struct UploadReport {
    pub session_id: Uuid,
    pub outcome: UploadOutcome,
    pub snapshot: UploadSnapshot,
}

impl UploadReport {
    pub fn states(&self) -> Vec<UploadState> {
        self.snapshot.states()
    }
}

pub struct UploadCoordinator {
    provider: Arc<dyn UploadProvider>,
    transport: Arc<dyn ByteTransport>,
    settings: PollSettings,
}

impl UploadCoordinator {
    pub fn new(
        provider: Arc<dyn UploadProvider>,
        transport: Arc<dyn ByteTransport>,
        settings: PollSettings,
    ) -> Self {
        Self {
            provider,
            transport,
            settings,
        }
    }

    /// HTTP provider and PUT transport built from the ingest config.
    pub fn from_config(config: &IngestConfig) -> ApiResult<Self> {
        let client = ApiClient::from_config(config)?;
        let provider = HttpUploadProvider::from_config(config, client);
        let transport = HttpPutTransport::from_config(config)?;
        Ok(Self::new(
            Arc::new(provider),
            Arc::new(transport),
            PollSettings::from(config),
        ))
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Validate the submission and start a session in the background.
    ///
    /// Must be called from within a Tokio runtime. Invalid input is rejected here and
    /// no session is created.
    pub fn begin_upload(
        &self,
        course_id: &str,
        metadata: VideoMetadata,
        file: VideoFile,
    ) -> Result<UploadHandle, IngestError> {
        let course_id = course_id.trim();
        if course_id.is_empty() {
            return Err(IngestError::InvalidInput("Course id is required".to_string()));
        }
        metadata.check()?;
        if file.is_empty() {
            return Err(IngestError::InvalidInput("Video file is empty".to_string()));
        }

        let request = UploadUrlRequest::new(&file, &metadata);
        let session = UploadSession::new(
            course_id,
            metadata,
            file,
            self.settings.max_attempts,
            self.settings.interval,
        );
        let session_id = session.id();

        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
        let (event_tx, first_event_rx) = broadcast::channel(NOTIFICATION_CAPACITY);
        let cancel = CancellationToken::new();

        tracing::info!(
            session_id = %session_id,
            course_id = %course_id,
            filename = %request.filename,
            file_size = request.file_size,
            "Starting video upload"
        );

        let span = tracing::info_span!(
            "upload_session",
            session_id = %session_id,
            course_id = %course_id
        );
        let driver = SessionDriver {
            session,
            request,
            provider: Arc::clone(&self.provider),
            transport: Arc::clone(&self.transport),
            snapshots: snapshot_tx,
            events: event_tx.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(driver.run().instrument(span));

        Ok(UploadHandle {
            session_id,
            snapshots: snapshot_rx,
            events: event_tx,
            first_events: Some(first_event_rx),
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            task,
        })
    }

    /// One-off status check for a video that already left the session (for example
    /// after a timeout).
    pub async fn check_status(&self, video_id: &str) -> ApiResult<AssetStatus> {
        if video_id.trim().is_empty() {
            return Err(ApiError::Client("Video id is required".to_string()));
        }
        let response = self.provider.fetch_asset_status(video_id).await?;
        Ok(response.asset.classify())
    }
}

/// Caller's side of a running session.
///
/// Dropping the handle cancels the session. Keep it (or call `wait`) for as long as
/// the upload should run.
pub struct UploadHandle {
    session_id: Uuid,
    snapshots: watch::Receiver<UploadSnapshot>,
    events: broadcast::Sender<UploadNotification>,
    first_events: Option<broadcast::Receiver<UploadNotification>>,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
    task: JoinHandle<UploadReport>,
}

impl UploadHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> UploadState {
        self.snapshots.borrow().state
    }

    pub fn transfer_progress(&self) -> u8 {
        self.snapshots.borrow().transfer_progress
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot.
    pub fn watch(&self) -> watch::Receiver<UploadSnapshot> {
        self.snapshots.clone()
    }

    /// Notification stream. The first call sees every notification since the session
    /// started; later calls only see what comes after.
    pub fn subscribe(&mut self) -> broadcast::Receiver<UploadNotification> {
        self.first_events
            .take()
            .unwrap_or_else(|| self.events.subscribe())
    }

    /// Request cancellation. The session moves to `Cancelled` at its next suspension
    /// point unless it already finished.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this session, for cancelling from another task while
    /// `wait` owns the handle.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> UploadReport {
        let report = match self.task.await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(session_id = %self.session_id, error = %err, "Upload task failed");
                UploadReport {
                    session_id: self.session_id,
                    outcome: UploadOutcome::Errored(IngestError::Internal(err.to_string())),
                    snapshot: self.snapshots.borrow().clone(),
                }
            }
        };
        // The session is over, nothing left to cancel.
        self.cancel_on_drop.disarm();
        report
    }
}

struct SessionDriver {
    session: UploadSession,
    request: UploadUrlRequest,
    provider: Arc<dyn UploadProvider>,
    transport: Arc<dyn ByteTransport>,
    snapshots: watch::Sender<UploadSnapshot>,
    events: broadcast::Sender<UploadNotification>,
    cancel: CancellationToken,
}

impl SessionDriver {
    async fn run(mut self) -> UploadReport {
        if let Err(err) = self.drive().await {
            tracing::error!(error = %err, "Upload session rejected a state change");
        }

        let outcome = self.session.outcome().unwrap_or_else(|| {
            UploadOutcome::Errored(IngestError::Internal(format!(
                "session stopped in state {}",
                self.session.state()
            )))
        });
        log_outcome(&outcome);

        UploadReport {
            session_id: self.session.id(),
            outcome,
            snapshot: self.session.snapshot(),
        }
    }

    async fn drive(&mut self) -> Result<(), InvalidTransition> {
        self.session.request_url()?;
        self.publish_state();

        let course_id = self.session.course_id().to_string();
        let target = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = self.provider.request_upload_target(&course_id, &self.request) => Some(result),
        };
        let target = match target {
            None => return self.cancel_session(),
            Some(Ok(target)) => target,
            Some(Err(err)) => {
                let error = if err.is_unauthorized() {
                    IngestError::Unauthorized(err.to_string())
                } else {
                    IngestError::UploadUrlRequest(err.to_string())
                };
                return self.fail(error);
            }
        };

        tracing::debug!(video_id = %target.video_id, "Upload URL issued");
        self.session.url_issued(target)?;
        self.publish_state();

        match self.transfer().await {
            None => return self.cancel_session(),
            Some(Err(err)) => return self.fail(IngestError::Transfer(err.to_string())),
            Some(Ok(())) => {}
        }

        self.session.transfer_complete()?;
        self.publish_state();
        tracing::info!(
            video_id = ?self.session.remote_video_id(),
            "Transfer complete, waiting for processing"
        );

        self.poll_until_settled().await
    }

    /// `None` when cancelled.
    async fn transfer(&mut self) -> Option<ApiResult<()>> {
        let Some(file) = self.session.take_file() else {
            return Some(Err(ApiError::Client("video file already consumed".to_string())));
        };
        let url = self.session.upload_url().unwrap_or_default().to_string();

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();
        let progress: ProgressFn = Arc::new(move |bytes| {
            let _ = progress_tx.send(bytes);
        });

        let transport = Arc::clone(&self.transport);
        let cancel = self.cancel.clone();
        let transfer = transport.transfer(&url, file, progress);
        tokio::pin!(transfer);

        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break None,
                Some(bytes) = progress_rx.recv() => self.record_progress(bytes),
                result = &mut transfer => break Some(result),
            }
        };

        if matches!(result, Some(Ok(()))) {
            while let Ok(bytes) = progress_rx.try_recv() {
                self.record_progress(bytes);
            }
        }
        result
    }

    async fn poll_until_settled(&mut self) -> Result<(), InvalidTransition> {
        let video_id = self.session.remote_video_id().unwrap_or_default().to_string();
        let interval = self.session.poll_interval();

        loop {
            let woke = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => false,
                _ = tokio::time::sleep(interval) => true,
            };
            if !woke {
                return self.cancel_session();
            }

            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.provider.fetch_asset_status(&video_id) => Some(result),
            };
            let observation = match polled {
                None => return self.cancel_session(),
                Some(Ok(response)) => PollObservation::Asset(response.asset),
                Some(Err(err)) => {
                    tracing::warn!(
                        video_id = %video_id,
                        attempt = self.session.poll_attempt() + 1,
                        error = %err,
                        "Asset status check failed"
                    );
                    PollObservation::Unavailable(err.to_string())
                }
            };

            let state = self.session.record_poll(&observation)?;
            if let PollObservation::Asset(info) = &observation {
                tracing::debug!(
                    video_id = %video_id,
                    attempt = self.session.poll_attempt(),
                    max_attempts = self.session.max_poll_attempts(),
                    status = %info.status,
                    "Asset status"
                );
            }

            if state.is_terminal() {
                self.publish_state();
                return Ok(());
            }
            self.publish_snapshot();
        }
    }

    fn record_progress(&mut self, bytes: u64) {
        if let Some(percent) = self.session.record_progress(bytes) {
            let snapshot = self.session.snapshot();
            let notification = UploadNotification::Progress {
                percent,
                bytes: snapshot.bytes_acknowledged,
                total: snapshot.total_bytes,
            };
            self.snapshots.send_replace(snapshot);
            let _ = self.events.send(notification);
        }
    }

    fn fail(&mut self, error: IngestError) -> Result<(), InvalidTransition> {
        self.session.fail(error)?;
        self.publish_state();
        Ok(())
    }

    fn cancel_session(&mut self) -> Result<(), InvalidTransition> {
        self.session.cancel()?;
        self.publish_state();
        Ok(())
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.session.snapshot());
    }

    fn publish_state(&self) {
        self.publish_snapshot();
        // No subscribers is fine.
        let _ = self.events.send(UploadNotification::StateChanged {
            state: self.session.state(),
        });
    }
}

fn log_outcome(outcome: &UploadOutcome) {
    match outcome {
        UploadOutcome::Ready { video_id } => {
            tracing::info!(video_id = %video_id, "Video ready for playback");
        }
        UploadOutcome::TimedOut { video_id, attempts } => {
            tracing::warn!(
                video_id = %video_id,
                attempts = attempts,
                "Video still processing after final status check"
            );
        }
        UploadOutcome::Cancelled => tracing::info!("Upload cancelled"),
        UploadOutcome::Errored(err) => match err.log_level() {
            LogLevel::Debug => {
                tracing::debug!(error = %err, code = err.error_code(), "Upload failed")
            }
            LogLevel::Warn => {
                tracing::warn!(error = %err, code = err.error_code(), "Upload failed")
            }
            LogLevel::Error => {
                tracing::error!(error = %err, code = err.error_code(), "Upload failed")
            }
        },
    }
}
