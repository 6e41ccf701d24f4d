use async_trait::async_trait;
use coursecast_api_client::{truncate_body, ApiClient, Auth};
use coursecast_core::models::{StreamPayload, StreamVideo};
use coursecast_core::{CallerMode, FatalCause, StreamEndpoint};
use std::fmt::Debug;
use uuid::Uuid;

/// What a single strategy reported.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success {
        url: String,
        video: Option<StreamVideo>,
    },
    StillProcessing {
        provider_status: String,
    },
    NotFound,
    Fatal(FatalCause),
}

impl AttemptOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Success { .. } => "success",
            AttemptOutcome::StillProcessing { .. } => "still_processing",
            AttemptOutcome::NotFound => "not_found",
            AttemptOutcome::Fatal(_) => "fatal",
        }
    }
}

/// Per-call caller context.
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Caller credentials. `None` keeps whatever the client was configured with.
    pub auth: Option<Auth>,
    /// Correlates every attempt of one resolution in the logs
    pub request_id: Uuid,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self {
            auth: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new()
    }
}

/// One way of asking the provider for a stream URL.
#[async_trait]
pub trait StreamStrategy: Send + Sync + Debug {
    /// Stable identifier reported as the source of a result
    fn id(&self) -> &str;

    /// Query the provider once. Never panics on provider errors; they become
    /// `AttemptOutcome::Fatal`.
    async fn attempt(&self, video_id: &str, ctx: &ResolveContext) -> AttemptOutcome;
}

/// Strategy backed by one configured HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpStreamStrategy {
    endpoint: StreamEndpoint,
    client: ApiClient,
}

impl HttpStreamStrategy {
    pub fn new(endpoint: StreamEndpoint, client: ApiClient) -> Self {
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &StreamEndpoint {
        &self.endpoint
    }
}

#[async_trait]
impl StreamStrategy for HttpStreamStrategy {
    fn id(&self) -> &str {
        &self.endpoint.id
    }

    async fn attempt(&self, video_id: &str, ctx: &ResolveContext) -> AttemptOutcome {
        let path = self.endpoint.render(video_id);
        let client = match (self.endpoint.caller, &ctx.auth) {
            (CallerMode::Caller, Some(auth)) => self.client.with_auth(auth.clone()),
            _ => self.client.clone(),
        };

        match client
            .fetch_stream(self.endpoint.method, &path, self.endpoint.caller)
            .await
        {
            Ok(response) => classify_response(
                response.status,
                &response.body,
                &self.endpoint.processing_statuses,
            ),
            Err(err) => AttemptOutcome::Fatal(FatalCause::from(err)),
        }
    }
}

/// Classify a stream endpoint response.
///
/// Processing statuses are checked first, so a `202` is never mistaken for a
/// success even though it is in the 2xx range.
pub fn classify_response(status: u16, body: &str, processing_statuses: &[u16]) -> AttemptOutcome {
    if processing_statuses.contains(&status) {
        let provider_status = serde_json::from_str::<StreamPayload>(body)
            .map(|payload| payload.provider_status())
            .unwrap_or_else(|_| "processing".to_string());
        return AttemptOutcome::StillProcessing { provider_status };
    }

    match status {
        200..=299 => {
            let payload: StreamPayload = match serde_json::from_str(body) {
                Ok(payload) => payload,
                Err(e) => {
                    return AttemptOutcome::Fatal(FatalCause::MalformedResponse(format!(
                        "HTTP {} body is not a stream payload: {}",
                        status, e
                    )))
                }
            };
            if let Some(url) = payload.playable_url() {
                AttemptOutcome::Success {
                    url: url.to_string(),
                    video: payload.video.clone(),
                }
            } else if payload.signals_processing() {
                AttemptOutcome::StillProcessing {
                    provider_status: payload.provider_status(),
                }
            } else {
                AttemptOutcome::Fatal(FatalCause::MalformedResponse(format!(
                    "HTTP {} response has no streamUrl",
                    status
                )))
            }
        }
        404 => AttemptOutcome::NotFound,
        _ => AttemptOutcome::Fatal(FatalCause::from_status(status, truncate_body(body))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT_PROCESSING: &[u16] = &[202];

    #[test]
    fn test_classify_success() {
        let outcome = classify_response(
            200,
            r#"{"streamUrl":"https://cdn.test/v1.m3u8","video":{"title":"Intro"}}"#,
            DEFAULT_PROCESSING,
        );
        match outcome {
            AttemptOutcome::Success { url, video } => {
                assert_eq!(url, "https://cdn.test/v1.m3u8");
                assert_eq!(video.and_then(|v| v.title), Some("Intro".to_string()));
            }
            other => panic!("expected success, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_processing_status_wins_over_body() {
        assert_eq!(
            classify_response(202, r#"{"status":"preparing"}"#, DEFAULT_PROCESSING),
            AttemptOutcome::StillProcessing {
                provider_status: "preparing".to_string()
            }
        );
        assert_eq!(
            classify_response(202, "", DEFAULT_PROCESSING),
            AttemptOutcome::StillProcessing {
                provider_status: "processing".to_string()
            }
        );
        assert_eq!(
            classify_response(
                202,
                r#"{"message":"Video is being transcoded"}"#,
                DEFAULT_PROCESSING
            ),
            AttemptOutcome::StillProcessing {
                provider_status: "Video is being transcoded".to_string()
            }
        );
    }

    #[test]
    fn test_classify_202_without_processing_statuses_needs_a_url() {
        assert!(matches!(
            classify_response(202, r#"{"message":"accepted"}"#, &[]),
            AttemptOutcome::Fatal(FatalCause::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_classify_pending_word_in_200_body() {
        assert_eq!(
            classify_response(200, r#"{"status":"Transcoding"}"#, DEFAULT_PROCESSING),
            AttemptOutcome::StillProcessing {
                provider_status: "Transcoding".to_string()
            }
        );
    }

    #[test]
    fn test_classify_malformed_2xx() {
        assert!(matches!(
            classify_response(200, r#"{"streamUrl":"  "}"#, DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::MalformedResponse(_))
        ));
        assert!(matches!(
            classify_response(200, "<html></html>", DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_classify_error_statuses() {
        assert_eq!(
            classify_response(404, "", DEFAULT_PROCESSING),
            AttemptOutcome::NotFound
        );
        assert!(matches!(
            classify_response(401, "expired", DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::Unauthorized { status: 401, .. })
        ));
        assert!(matches!(
            classify_response(403, "", DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::Unauthorized { status: 403, .. })
        ));
        assert!(matches!(
            classify_response(502, "bad gateway", DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::ServerError { status: 502, .. })
        ));
        assert!(matches!(
            classify_response(410, "gone", DEFAULT_PROCESSING),
            AttemptOutcome::Fatal(FatalCause::UnexpectedStatus { status: 410, .. })
        ));
    }

    #[test]
    fn test_context_carries_auth() {
        let ctx = ResolveContext::new().with_auth(Auth::Bearer("viewer".to_string()));
        assert_eq!(ctx.auth, Some(Auth::Bearer("viewer".to_string())));
        assert_ne!(ctx.request_id, ResolveContext::new().request_id);
    }
}
