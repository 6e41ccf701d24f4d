//! Stream resolution: video id to playable URL through an ordered fallback chain.
//!
//! Each strategy answers with an [`AttemptOutcome`]. The chain walks strategies in
//! priority order: `NotFound` falls through to the next one; `Success`,
//! `StillProcessing` and `Fatal` all stop the walk.

mod chain;
mod strategy;

pub use chain::{step, Resolution, ResolutionResult, Step, StreamResolutionAttempt, StreamResolver};
pub use strategy::{
    classify_response, AttemptOutcome, HttpStreamStrategy, ResolveContext, StreamStrategy,
};
