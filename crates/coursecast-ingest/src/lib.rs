//! Course video ingestion and playback resolution.
//!
//! - [`upload`]: drives a local file through upload target request, byte transfer
//!   and bounded provider-status polling, reporting progress and a typed terminal
//!   outcome.
//! - [`resolver`]: turns a video identifier into a playable stream URL by trying an
//!   ordered list of endpoint strategies with explicit short-circuit rules.
//!
//! Both are modelled as state machines with pure transition functions, so their
//! ordering rules can be tested without timers or HTTP.

pub mod resolver;
pub mod upload;

pub use resolver::{
    AttemptOutcome, HttpStreamStrategy, Resolution, ResolutionResult, ResolveContext,
    StreamResolutionAttempt, StreamResolver, StreamStrategy,
};
pub use upload::{
    load_video_file, ByteTransport, HttpPutTransport, HttpUploadProvider, PollSettings,
    ProgressFn, UploadCoordinator, UploadHandle, UploadNotification, UploadOutcome,
    UploadProvider, UploadReport, UploadSession, UploadSnapshot, UploadState,
};
