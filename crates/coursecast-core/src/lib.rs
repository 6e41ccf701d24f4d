//! Coursecast Core Library
//!
//! This crate provides the error taxonomy, configuration and provider data models
//! shared by the upload coordinator, the stream resolver and their callers.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{CallerMode, EndpointMethod, IngestConfig, StreamEndpoint};
pub use error::{ErrorMetadata, FatalCause, IngestError, LogLevel};
