//! Data models for the provider API
//!
//! Request and response shapes exchanged with the video provider, plus the
//! payload descriptor for a local video file.

mod asset;
mod stream;
mod upload;

pub use asset::*;
pub use stream::*;
pub use upload::*;
