//! Upload lifecycle: session state machine, provider and transport seams, and the
//! coordinator that drives one session per spawned task.

mod coordinator;
mod provider;
mod session;
mod transport;

pub use coordinator::{
    PollSettings, UploadCoordinator, UploadHandle, UploadNotification, UploadReport,
};
pub use provider::{HttpUploadProvider, UploadProvider};
pub use session::{
    poll_event, transition, InvalidTransition, PollObservation, StateChange, UploadEvent,
    UploadOutcome, UploadSession, UploadSnapshot, UploadState,
};
pub use transport::{load_video_file, ByteTransport, HttpPutTransport, ProgressFn};
