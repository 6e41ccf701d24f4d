use super::strategy::{AttemptOutcome, HttpStreamStrategy, ResolveContext, StreamStrategy};
use coursecast_api_client::ApiClient;
use coursecast_core::models::StreamVideo;
use coursecast_core::{ErrorMetadata, FatalCause, IngestConfig, IngestError, LogLevel};
use std::sync::Arc;
use std::time::Duration;

/// Result of one resolution across the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionResult {
    Success {
        url: String,
        source_strategy: String,
        video: Option<StreamVideo>,
    },
    StillProcessing {
        provider_status: String,
        strategy: String,
    },
    /// Every strategy answered 404
    NotFound,
    Fatal {
        cause: FatalCause,
        /// `None` when the request was rejected before any strategy ran
        strategy: Option<String>,
    },
}

impl ResolutionResult {
    pub fn is_playable(&self) -> bool {
        matches!(self, ResolutionResult::Success { .. })
    }

    /// Whether asking again later could give a different answer.
    pub fn is_retryable(&self) -> bool {
        match self {
            ResolutionResult::StillProcessing { .. } => true,
            ResolutionResult::Fatal { cause, .. } => cause.is_recoverable(),
            _ => false,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ResolutionResult::Success { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ResolutionResult::Success { .. } => "success",
            ResolutionResult::StillProcessing { .. } => "still_processing",
            ResolutionResult::NotFound => "not_found",
            ResolutionResult::Fatal { .. } => "fatal",
        }
    }

    /// Emit one event describing this result. `NotFound` and `Fatal` stay
    /// distinguishable here even when a player shows them the same way.
    pub fn log(&self, video_id: &str) {
        match self {
            ResolutionResult::Success {
                source_strategy, ..
            } => {
                tracing::info!(
                    video_id = %video_id,
                    strategy = %source_strategy,
                    "Stream resolved"
                );
            }
            ResolutionResult::StillProcessing {
                provider_status,
                strategy,
            } => {
                tracing::info!(
                    video_id = %video_id,
                    strategy = %strategy,
                    status = %provider_status,
                    "Video still processing"
                );
            }
            ResolutionResult::NotFound => {
                tracing::warn!(
                    video_id = %video_id,
                    outcome = "not_found",
                    "No stream strategy knows this video"
                );
            }
            ResolutionResult::Fatal { cause, strategy } => {
                let strategy = strategy.as_deref().unwrap_or("none");
                match cause.log_level() {
                    LogLevel::Debug => tracing::debug!(
                        video_id = %video_id,
                        strategy = %strategy,
                        code = cause.error_code(),
                        error = %cause,
                        "Stream resolution failed"
                    ),
                    LogLevel::Warn => tracing::warn!(
                        video_id = %video_id,
                        strategy = %strategy,
                        code = cause.error_code(),
                        error = %cause,
                        "Stream resolution failed"
                    ),
                    LogLevel::Error => tracing::error!(
                        video_id = %video_id,
                        strategy = %strategy,
                        code = cause.error_code(),
                        error = %cause,
                        "Stream resolution failed"
                    ),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamResolutionAttempt {
    pub strategy_id: String,
    pub outcome: AttemptOutcome,
}

/// A resolution result with the attempts that produced it, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub video_id: String,
    pub result: ResolutionResult,
    pub attempts: Vec<StreamResolutionAttempt>,
}

impl Resolution {
    pub fn attempted_strategies(&self) -> Vec<&str> {
        self.attempts
            .iter()
            .map(|attempt| attempt.strategy_id.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    TryNext(usize),
    Finish(ResolutionResult),
}

/// Decide what follows the outcome of strategy `index` out of `total`.
pub fn step(index: usize, strategy_id: &str, outcome: &AttemptOutcome, total: usize) -> Step {
    match outcome {
        AttemptOutcome::Success { url, video } => Step::Finish(ResolutionResult::Success {
            url: url.clone(),
            source_strategy: strategy_id.to_string(),
            video: video.clone(),
        }),
        AttemptOutcome::StillProcessing { provider_status } => {
            Step::Finish(ResolutionResult::StillProcessing {
                provider_status: provider_status.clone(),
                strategy: strategy_id.to_string(),
            })
        }
        AttemptOutcome::Fatal(cause) => Step::Finish(ResolutionResult::Fatal {
            cause: cause.clone(),
            strategy: Some(strategy_id.to_string()),
        }),
        AttemptOutcome::NotFound if index + 1 < total => Step::TryNext(index + 1),
        AttemptOutcome::NotFound => Step::Finish(ResolutionResult::NotFound),
    }
}

/// Ordered fallback chain of stream strategies.
#[derive(Debug, Clone)]
pub struct StreamResolver {
    strategies: Vec<Arc<dyn StreamStrategy>>,
}

impl StreamResolver {
    pub fn new(strategies: Vec<Arc<dyn StreamStrategy>>) -> Result<Self, IngestError> {
        if strategies.is_empty() {
            return Err(IngestError::InvalidInput(
                "At least one stream strategy is required".to_string(),
            ));
        }
        Ok(Self { strategies })
    }

    /// One `HttpStreamStrategy` per configured endpoint, in config order.
    pub fn from_config(config: &IngestConfig, client: ApiClient) -> Result<Self, IngestError> {
        let strategies = config
            .stream_endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(HttpStreamStrategy::new(endpoint.clone(), client.clone()))
                    as Arc<dyn StreamStrategy>
            })
            .collect();
        Self::new(strategies)
    }

    pub fn strategy_ids(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Walk the chain once for `video_id`.
    pub async fn resolve_stream(&self, video_id: &str, ctx: &ResolveContext) -> Resolution {
        let video_id = video_id.trim();
        if video_id.is_empty() {
            return Resolution {
                video_id: String::new(),
                result: ResolutionResult::Fatal {
                    cause: FatalCause::InvalidRequest("Video id is required".to_string()),
                    strategy: None,
                },
                attempts: Vec::new(),
            };
        }

        let total = self.strategies.len();
        let mut attempts = Vec::with_capacity(total);
        let mut index = 0;

        let result = loop {
            let strategy = &self.strategies[index];
            let outcome = strategy.attempt(video_id, ctx).await;
            tracing::debug!(
                request_id = %ctx.request_id,
                video_id = %video_id,
                strategy = %strategy.id(),
                outcome = outcome.label(),
                "Stream strategy attempted"
            );

            let next = step(index, strategy.id(), &outcome, total);
            attempts.push(StreamResolutionAttempt {
                strategy_id: strategy.id().to_string(),
                outcome,
            });

            match next {
                Step::TryNext(next_index) => index = next_index,
                Step::Finish(result) => break result,
            }
        };

        Resolution {
            video_id: video_id.to_string(),
            result,
            attempts,
        }
    }

    /// Resolve, and while the video is still processing, wait `retry_interval` and
    /// resolve again, at most `max_retries` more times. Returns the last resolution.
    pub async fn resolve_until_playable(
        &self,
        video_id: &str,
        ctx: &ResolveContext,
        retry_interval: Duration,
        max_retries: u32,
    ) -> Resolution {
        let mut retries = 0;
        loop {
            let resolution = self.resolve_stream(video_id, ctx).await;
            let provider_status = match &resolution.result {
                ResolutionResult::StillProcessing {
                    provider_status, ..
                } => provider_status.clone(),
                _ => return resolution,
            };

            if retries >= max_retries {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    video_id = %resolution.video_id,
                    status = %provider_status,
                    attempts = retries + 1,
                    "Giving up while video is still processing"
                );
                return resolution;
            }

            retries += 1;
            tracing::debug!(
                video_id = %resolution.video_id,
                status = %provider_status,
                retry = retries,
                "Video still processing, retrying"
            );
            tokio::time::sleep(retry_interval).await;
        }
    }
}
