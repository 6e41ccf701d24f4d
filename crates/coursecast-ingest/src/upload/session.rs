//! Upload session state machine.
//!
//! `transition` is the single source of truth for which state changes are legal.
//! `UploadSession` owns everything one upload needs (file, counters, history) and
//! only changes state through `transition`, so an invalid order cannot be recorded.

use chrono::{DateTime, Utc};
use coursecast_core::models::{AssetInfo, AssetStatus, UploadUrlResponse, VideoFile, VideoMetadata};
use coursecast_core::IngestError;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    Created,
    UrlRequested,
    Transferring,
    AwaitingProcessing,
    Ready,
    Errored,
    TimedOut,
    Cancelled,
}

impl UploadState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadState::Ready
                | UploadState::Errored
                | UploadState::TimedOut
                | UploadState::Cancelled
        )
    }
}

impl Display for UploadState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            UploadState::Created => write!(f, "created"),
            UploadState::UrlRequested => write!(f, "url_requested"),
            UploadState::Transferring => write!(f, "transferring"),
            UploadState::AwaitingProcessing => write!(f, "awaiting_processing"),
            UploadState::Ready => write!(f, "ready"),
            UploadState::Errored => write!(f, "errored"),
            UploadState::TimedOut => write!(f, "timed_out"),
            UploadState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadEvent {
    RequestUrl,
    UrlIssued,
    TransferComplete,
    AssetReady,
    AssetErrored,
    PollPending,
    PollExhausted,
    Fail,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid upload transition from {from} on {event:?}")]
pub struct InvalidTransition {
    pub from: UploadState,
    pub event: UploadEvent,
}

/// Next state for `event` in `state`, or an error if the move would skip or
/// reverse a phase.
pub fn transition(
    state: UploadState,
    event: UploadEvent,
) -> Result<UploadState, InvalidTransition> {
    use UploadEvent as E;
    use UploadState::*;

    let next = match (state, event) {
        (Created, E::RequestUrl) => UrlRequested,
        (UrlRequested, E::UrlIssued) => Transferring,
        (Transferring, E::TransferComplete) => AwaitingProcessing,
        (AwaitingProcessing, E::AssetReady) => Ready,
        (AwaitingProcessing, E::AssetErrored) => Errored,
        (AwaitingProcessing, E::PollPending) => AwaitingProcessing,
        (AwaitingProcessing, E::PollExhausted) => TimedOut,
        (UrlRequested | Transferring, E::Fail) => Errored,
        (current, E::Cancel) if !current.is_terminal() => Cancelled,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}

/// What one status poll produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollObservation {
    /// The provider answered with an asset status
    Asset(AssetInfo),
    /// The status check itself failed (network, HTTP error, undecodable body)
    Unavailable(String),
}

/// Event for the poll that just brought the attempt count to `attempts`.
///
/// Only an explicit `ready` or `errored` is decisive; everything else waits until
/// the ceiling is reached.
pub fn poll_event(attempts: u32, max_attempts: u32, observation: &PollObservation) -> UploadEvent {
    match observation {
        PollObservation::Asset(info) => match info.classify() {
            AssetStatus::Ready => UploadEvent::AssetReady,
            AssetStatus::Errored => UploadEvent::AssetErrored,
            AssetStatus::Pending(_) if attempts >= max_attempts => UploadEvent::PollExhausted,
            AssetStatus::Pending(_) => UploadEvent::PollPending,
        },
        PollObservation::Unavailable(_) if attempts >= max_attempts => UploadEvent::PollExhausted,
        PollObservation::Unavailable(_) => UploadEvent::PollPending,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub state: UploadState,
    pub at: DateTime<Utc>,
}

/// Terminal result of an upload session.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    Ready { video_id: String },
    Errored(IngestError),
    TimedOut { video_id: String, attempts: u32 },
    Cancelled,
}

impl UploadOutcome {
    pub fn is_ready(&self) -> bool {
        matches!(self, UploadOutcome::Ready { .. })
    }

    pub fn video_id(&self) -> Option<&str> {
        match self {
            UploadOutcome::Ready { video_id } | UploadOutcome::TimedOut { video_id, .. } => {
                Some(video_id)
            }
            _ => None,
        }
    }
}

/// Point-in-time view of a session, published to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadSnapshot {
    pub session_id: Uuid,
    pub course_id: String,
    pub state: UploadState,
    pub transfer_progress: u8,
    pub bytes_acknowledged: u64,
    pub total_bytes: u64,
    pub poll_attempt: u32,
    pub max_poll_attempts: u32,
    pub upload_url: Option<String>,
    pub remote_video_id: Option<String>,
    pub failure: Option<IngestError>,
    pub history: Vec<StateChange>,
}

impl UploadSnapshot {
    pub fn states(&self) -> Vec<UploadState> {
        self.history.iter().map(|change| change.state).collect()
    }
}

#[derive(Debug)]
pub struct UploadSession {
    id: Uuid,
    course_id: String,
    metadata: VideoMetadata,
    file: Option<VideoFile>,
    total_bytes: u64,
    state: UploadState,
    upload_url: Option<String>,
    remote_video_id: Option<String>,
    bytes_acknowledged: u64,
    transfer_progress: u8,
    poll_attempt: u32,
    max_poll_attempts: u32,
    poll_interval: Duration,
    failure: Option<IngestError>,
    history: Vec<StateChange>,
}

impl UploadSession {
    pub fn new(
        course_id: impl Into<String>,
        metadata: VideoMetadata,
        file: VideoFile,
        max_poll_attempts: u32,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            course_id: course_id.into(),
            metadata,
            total_bytes: file.size(),
            file: Some(file),
            state: UploadState::Created,
            upload_url: None,
            remote_video_id: None,
            bytes_acknowledged: 0,
            transfer_progress: 0,
            poll_attempt: 0,
            max_poll_attempts,
            poll_interval,
            failure: None,
            history: vec![StateChange {
                state: UploadState::Created,
                at: Utc::now(),
            }],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn file(&self) -> Option<&VideoFile> {
        self.file.as_ref()
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn upload_url(&self) -> Option<&str> {
        self.upload_url.as_deref()
    }

    pub fn remote_video_id(&self) -> Option<&str> {
        self.remote_video_id.as_deref()
    }

    pub fn transfer_progress(&self) -> u8 {
        self.transfer_progress
    }

    pub fn poll_attempt(&self) -> u32 {
        self.poll_attempt
    }

    pub fn max_poll_attempts(&self) -> u32 {
        self.max_poll_attempts
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn failure(&self) -> Option<&IngestError> {
        self.failure.as_ref()
    }

    pub fn history(&self) -> &[StateChange] {
        &self.history
    }

    fn apply(&mut self, event: UploadEvent) -> Result<UploadState, InvalidTransition> {
        let next = transition(self.state, event)?;
        if next != self.state {
            self.state = next;
            self.history.push(StateChange {
                state: next,
                at: Utc::now(),
            });
            if next.is_terminal() {
                self.file = None;
            }
        }
        Ok(next)
    }

    /// `Created → UrlRequested`.
    pub fn request_url(&mut self) -> Result<UploadState, InvalidTransition> {
        self.apply(UploadEvent::RequestUrl)
    }

    /// `UrlRequested → Transferring`, recording the target the provider issued.
    pub fn url_issued(
        &mut self,
        target: UploadUrlResponse,
    ) -> Result<UploadState, InvalidTransition> {
        let state = self.apply(UploadEvent::UrlIssued)?;
        self.upload_url = Some(target.upload_url);
        self.remote_video_id = Some(target.video_id);
        Ok(state)
    }

    /// Hand the file to the transport. The session keeps no copy.
    pub fn take_file(&mut self) -> Option<VideoFile> {
        self.file.take()
    }

    /// Record bytes acknowledged by the transport. Returns the new percentage when it
    /// moved; stale or out-of-order reports never lower it.
    pub fn record_progress(&mut self, bytes: u64) -> Option<u8> {
        if self.state != UploadState::Transferring {
            return None;
        }
        let bytes = bytes.min(self.total_bytes);
        if bytes <= self.bytes_acknowledged {
            return None;
        }
        self.bytes_acknowledged = bytes;

        let percent = if self.total_bytes == 0 {
            100
        } else {
            ((bytes.saturating_mul(100)) / self.total_bytes).min(100) as u8
        };
        if percent > self.transfer_progress {
            self.transfer_progress = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// `Transferring → AwaitingProcessing`. All bytes count as acknowledged.
    pub fn transfer_complete(&mut self) -> Result<UploadState, InvalidTransition> {
        let state = self.apply(UploadEvent::TransferComplete)?;
        self.file = None;
        self.bytes_acknowledged = self.total_bytes;
        self.transfer_progress = 100;
        Ok(state)
    }

    /// Count one poll and classify it.
    pub fn record_poll(
        &mut self,
        observation: &PollObservation,
    ) -> Result<UploadState, InvalidTransition> {
        if self.state != UploadState::AwaitingProcessing {
            return Err(InvalidTransition {
                from: self.state,
                event: UploadEvent::PollPending,
            });
        }

        self.poll_attempt += 1;
        let event = poll_event(self.poll_attempt, self.max_poll_attempts, observation);
        let video_id = self.remote_video_id.clone().unwrap_or_default();

        match (event, observation) {
            (UploadEvent::AssetErrored, PollObservation::Asset(info)) => {
                self.failure = Some(IngestError::ProcessingFailed {
                    video_id,
                    reason: info.error_reason(),
                });
            }
            (UploadEvent::PollExhausted, _) => {
                self.failure = Some(IngestError::ProcessingTimedOut {
                    video_id,
                    attempts: self.poll_attempt,
                });
            }
            _ => {}
        }

        self.apply(event)
    }

    /// Fatal failure during the URL request or the transfer.
    pub fn fail(&mut self, error: IngestError) -> Result<UploadState, InvalidTransition> {
        let state = self.apply(UploadEvent::Fail)?;
        self.failure = Some(error);
        Ok(state)
    }

    pub fn cancel(&mut self) -> Result<UploadState, InvalidTransition> {
        self.apply(UploadEvent::Cancel)
    }

    /// Terminal outcome, or `None` while the session is still running.
    pub fn outcome(&self) -> Option<UploadOutcome> {
        let video_id = self.remote_video_id.clone().unwrap_or_default();
        match self.state {
            UploadState::Ready => Some(UploadOutcome::Ready { video_id }),
            UploadState::Errored => Some(UploadOutcome::Errored(
                self.failure
                    .clone()
                    .unwrap_or_else(|| IngestError::Internal("missing failure".to_string())),
            )),
            UploadState::TimedOut => Some(UploadOutcome::TimedOut {
                video_id,
                attempts: self.poll_attempt,
            }),
            UploadState::Cancelled => Some(UploadOutcome::Cancelled),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> UploadSnapshot {
        UploadSnapshot {
            session_id: self.id,
            course_id: self.course_id.clone(),
            state: self.state,
            transfer_progress: self.transfer_progress,
            bytes_acknowledged: self.bytes_acknowledged,
            total_bytes: self.total_bytes,
            poll_attempt: self.poll_attempt,
            max_poll_attempts: self.max_poll_attempts,
            upload_url: self.upload_url.clone(),
            remote_video_id: self.remote_video_id.clone(),
            failure: self.failure.clone(),
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(max_poll_attempts: u32) -> UploadSession {
        UploadSession::new(
            "course-1",
            VideoMetadata::new("Intro"),
            VideoFile::from_name("intro.mp4", vec![0u8; 1000]),
            max_poll_attempts,
            Duration::from_millis(10),
        )
    }

    fn asset(status: &str) -> PollObservation {
        PollObservation::Asset(AssetInfo {
            status: status.to_string(),
            errors: None,
        })
    }

    fn target() -> UploadUrlResponse {
        UploadUrlResponse {
            upload_url: "https://upload.test/abc".to_string(),
            video_id: "v1".to_string(),
        }
    }

    fn awaiting(max_poll_attempts: u32) -> UploadSession {
        let mut s = session(max_poll_attempts);
        s.request_url().unwrap();
        s.url_issued(target()).unwrap();
        s.take_file();
        s.transfer_complete().unwrap();
        s
    }

    #[test]
    fn test_transition_rejects_skipping_phases() {
        use UploadEvent as E;
        use UploadState::*;

        assert!(transition(Created, E::AssetReady).is_err());
        assert!(transition(Created, E::TransferComplete).is_err());
        assert!(transition(UrlRequested, E::TransferComplete).is_err());
        assert!(transition(Transferring, E::AssetReady).is_err());
        assert!(transition(Transferring, E::PollExhausted).is_err());
        assert!(transition(Created, E::Fail).is_err());
        assert!(transition(AwaitingProcessing, E::Fail).is_err());
    }

    #[test]
    fn test_transition_terminal_states_are_final() {
        use UploadEvent as E;
        use UploadState::*;

        for state in [Ready, Errored, TimedOut, Cancelled] {
            for event in [
                E::RequestUrl,
                E::UrlIssued,
                E::TransferComplete,
                E::AssetReady,
                E::AssetErrored,
                E::PollPending,
                E::PollExhausted,
                E::Fail,
                E::Cancel,
            ] {
                assert!(
                    transition(state, event).is_err(),
                    "{} accepted {:?}",
                    state,
                    event
                );
            }
        }
    }

    #[test]
    fn test_transition_happy_path() {
        use UploadEvent as E;
        use UploadState::*;

        assert_eq!(transition(Created, E::RequestUrl), Ok(UrlRequested));
        assert_eq!(transition(UrlRequested, E::UrlIssued), Ok(Transferring));
        assert_eq!(
            transition(Transferring, E::TransferComplete),
            Ok(AwaitingProcessing)
        );
        assert_eq!(
            transition(AwaitingProcessing, E::PollPending),
            Ok(AwaitingProcessing)
        );
        assert_eq!(transition(AwaitingProcessing, E::AssetReady), Ok(Ready));
    }

    #[test]
    fn test_poll_event_is_three_way() {
        assert_eq!(poll_event(1, 5, &asset("ready")), UploadEvent::AssetReady);
        assert_eq!(poll_event(1, 5, &asset("errored")), UploadEvent::AssetErrored);
        assert_eq!(poll_event(1, 5, &asset("preparing")), UploadEvent::PollPending);
        assert_eq!(poll_event(1, 5, &asset("brand_new")), UploadEvent::PollPending);
        assert_eq!(poll_event(5, 5, &asset("preparing")), UploadEvent::PollExhausted);
        // A decisive answer on the last allowed poll still counts.
        assert_eq!(poll_event(5, 5, &asset("ready")), UploadEvent::AssetReady);
        assert_eq!(
            poll_event(2, 5, &PollObservation::Unavailable("reset".to_string())),
            UploadEvent::PollPending
        );
        assert_eq!(
            poll_event(5, 5, &PollObservation::Unavailable("reset".to_string())),
            UploadEvent::PollExhausted
        );
    }

    #[test]
    fn test_session_records_full_history() {
        let mut s = awaiting(5);
        s.record_poll(&asset("processing")).unwrap();
        s.record_poll(&asset("ready")).unwrap();

        assert_eq!(
            s.snapshot().states(),
            vec![
                UploadState::Created,
                UploadState::UrlRequested,
                UploadState::Transferring,
                UploadState::AwaitingProcessing,
                UploadState::Ready,
            ]
        );
        assert_eq!(s.poll_attempt(), 2);
        assert_eq!(
            s.outcome(),
            Some(UploadOutcome::Ready {
                video_id: "v1".to_string()
            })
        );
    }

    #[test]
    fn test_session_times_out_after_exactly_max_polls() {
        let mut s = awaiting(3);
        assert_eq!(
            s.record_poll(&asset("preparing")).unwrap(),
            UploadState::AwaitingProcessing
        );
        assert_eq!(
            s.record_poll(&PollObservation::Unavailable("timeout".to_string()))
                .unwrap(),
            UploadState::AwaitingProcessing
        );
        assert_eq!(
            s.record_poll(&asset("preparing")).unwrap(),
            UploadState::TimedOut
        );
        assert_eq!(
            s.outcome(),
            Some(UploadOutcome::TimedOut {
                video_id: "v1".to_string(),
                attempts: 3
            })
        );
        assert!(s.record_poll(&asset("ready")).is_err());
        assert_eq!(s.poll_attempt(), 3);
    }

    #[test]
    fn test_session_errored_keeps_provider_reason() {
        let mut s = awaiting(5);
        let info = AssetInfo {
            status: "errored".to_string(),
            errors: Some(serde_json::json!({"messages": ["unsupported codec"]})),
        };
        s.record_poll(&PollObservation::Asset(info)).unwrap();
        assert_eq!(
            s.outcome(),
            Some(UploadOutcome::Errored(IngestError::ProcessingFailed {
                video_id: "v1".to_string(),
                reason: "unsupported codec".to_string()
            }))
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_bounded() {
        let mut s = session(5);
        assert_eq!(s.record_progress(100), None, "not transferring yet");
        s.request_url().unwrap();
        s.url_issued(target()).unwrap();

        assert_eq!(s.record_progress(250), Some(25));
        assert_eq!(s.record_progress(100), None);
        assert_eq!(s.transfer_progress(), 25);
        assert_eq!(s.record_progress(255), None, "same percentage");
        assert_eq!(s.record_progress(5000), Some(100));
        assert_eq!(s.transfer_progress(), 100);
    }

    #[test]
    fn test_file_released_on_failure() {
        let mut s = session(5);
        s.request_url().unwrap();
        assert!(s.file().is_some());
        s.fail(IngestError::UploadUrlRequest("500".to_string()))
            .unwrap();
        assert!(s.file().is_none());
        assert_eq!(
            s.snapshot().states(),
            vec![
                UploadState::Created,
                UploadState::UrlRequested,
                UploadState::Errored
            ]
        );
    }

    #[test]
    fn test_cancel_from_any_running_state() {
        let mut s = awaiting(5);
        assert_eq!(s.cancel().unwrap(), UploadState::Cancelled);
        assert_eq!(s.outcome(), Some(UploadOutcome::Cancelled));
        assert!(s.cancel().is_err());
    }
}
