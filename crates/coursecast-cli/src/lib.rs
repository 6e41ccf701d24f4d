//! Helpers shared by the `coursecast` binary: tracing setup and JSON summaries of
//! upload reports and stream resolutions.

use coursecast_core::ErrorMetadata;
use coursecast_ingest::{
    AttemptOutcome, Resolution, ResolutionResult, UploadOutcome, UploadReport,
};
use serde_json::{json, Value};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

/// One-line text progress bar, e.g. `[#####-----]  50%`.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100) as usize;
    let filled = width * percent / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(width - filled),
        percent
    )
}

pub fn upload_summary(report: &UploadReport) -> Value {
    let history: Vec<Value> = report
        .snapshot
        .history
        .iter()
        .map(|change| json!({ "state": change.state, "at": change.at.to_rfc3339() }))
        .collect();

    let mut summary = json!({
        "session_id": report.session_id.to_string(),
        "course_id": report.snapshot.course_id,
        "state": report.snapshot.state,
        "video_id": report.snapshot.remote_video_id,
        "transfer_progress": report.snapshot.transfer_progress,
        "poll_attempts": report.snapshot.poll_attempt,
        "history": history,
    });

    if let UploadOutcome::Errored(err) = &report.outcome {
        summary["error"] = json!({
            "code": err.error_code(),
            "message": err.client_message(),
            "detail": err.to_string(),
            "suggested_action": err.suggested_action(),
        });
    }
    summary
}

fn attempt_summary(outcome: &AttemptOutcome) -> Value {
    match outcome {
        AttemptOutcome::Fatal(cause) => {
            json!({ "outcome": outcome.label(), "error": cause.to_string() })
        }
        _ => json!({ "outcome": outcome.label() }),
    }
}

pub fn resolution_summary(resolution: &Resolution) -> Value {
    let attempts: Vec<Value> = resolution
        .attempts
        .iter()
        .map(|attempt| {
            let mut entry = attempt_summary(&attempt.outcome);
            entry["strategy"] = json!(attempt.strategy_id);
            entry
        })
        .collect();

    let mut summary = json!({
        "video_id": resolution.video_id,
        "result": resolution.result.label(),
        "attempts": attempts,
    });

    match &resolution.result {
        ResolutionResult::Success {
            url,
            source_strategy,
            video,
        } => {
            summary["stream_url"] = json!(url);
            summary["strategy"] = json!(source_strategy);
            if let Some(video) = video {
                summary["video"] = serde_json::to_value(video).unwrap_or(Value::Null);
            }
        }
        ResolutionResult::StillProcessing {
            provider_status,
            strategy,
        } => {
            summary["status"] = json!(provider_status);
            summary["strategy"] = json!(strategy);
        }
        ResolutionResult::NotFound => {}
        ResolutionResult::Fatal { cause, strategy } => {
            summary["strategy"] = json!(strategy);
            summary["error"] = json!({
                "code": cause.error_code(),
                "message": cause.client_message(),
                "detail": cause.to_string(),
            });
        }
    }
    summary
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
