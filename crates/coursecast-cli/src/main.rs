//! CourseCast CLI: upload course videos and resolve their playback URLs.
//!
//! Reads COURSECAST_API_URL (or API_URL) and COURSECAST_API_TOKEN (or API_TOKEN);
//! see `IngestConfig::from_env` for the full list.

use anyhow::Context;
use clap::{Parser, Subcommand};
use coursecast_api_client::ApiClient;
use coursecast_cli::{
    init_tracing, progress_bar, resolution_summary, truncate_string, upload_summary,
};
use coursecast_core::models::VideoMetadata;
use coursecast_core::IngestConfig;
use coursecast_ingest::{
    load_video_file, ResolveContext, StreamResolver, UploadCoordinator, UploadNotification,
    UploadOutcome,
};
use serde_json::Value;
use std::io::Write;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "coursecast", about = "Course video upload and playback CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video file to a course and wait until it is playable
    Upload {
        /// Path to the video file
        file: std::path::PathBuf,
        /// Course the video belongs to
        #[arg(long)]
        course: String,
        /// Video title
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Position of the video within the course
        #[arg(long)]
        order: Option<u32>,
    },
    /// Resolve a playable stream URL for a video
    Stream {
        /// Video ID
        video_id: String,
        /// Keep retrying while the video is still processing
        #[arg(long)]
        wait: bool,
        /// Retries when --wait is set
        #[arg(long, default_value = "12")]
        retries: u32,
        /// Seconds between retries
        #[arg(long, default_value = "5")]
        interval: u64,
    },
    /// Check the processing status of a video once
    Status {
        /// Video ID
        video_id: String,
    },
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

async fn upload(
    config: &IngestConfig,
    file: std::path::PathBuf,
    course: String,
    metadata: VideoMetadata,
) -> anyhow::Result<bool> {
    let file = load_video_file(&file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let coordinator =
        UploadCoordinator::from_config(config).context("Failed to create upload coordinator")?;

    eprintln!(
        "Uploading {} ({} bytes) as \"{}\"",
        file.name(),
        file.size(),
        truncate_string(&metadata.title, 60)
    );

    let mut handle = coordinator
        .begin_upload(&course, metadata, file)
        .context("Upload rejected")?;
    let mut events = handle.subscribe();

    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                UploadNotification::Progress { percent, .. } => {
                    eprint!("\r{}", progress_bar(percent, 30));
                    let _ = std::io::stderr().flush();
                }
                UploadNotification::StateChanged { state } => {
                    eprintln!("\n{}", state);
                }
            }
        }
    });

    let token = handle.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, cancelling upload");
            token.cancel();
        }
    });

    let report = handle.wait().await;
    interrupt.abort();
    printer.abort();

    print_json(&upload_summary(&report))?;
    Ok(matches!(report.outcome, UploadOutcome::Ready { .. }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = IngestConfig::from_env()
        .context("Invalid configuration. Check COURSECAST_API_URL and COURSECAST_* settings")?;
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Upload {
            file,
            course,
            title,
            description,
            order,
        } => {
            let mut metadata = VideoMetadata::new(title);
            if let Some(description) = description {
                metadata = metadata.with_description(description);
            }
            if let Some(order) = order {
                metadata = metadata.with_order(order);
            }
            upload(&config, file, course, metadata).await?
        }
        Commands::Stream {
            video_id,
            wait,
            retries,
            interval,
        } => {
            let client = ApiClient::from_config(&config).context("Failed to create API client")?;
            let resolver = StreamResolver::from_config(&config, client)
                .context("Failed to create stream resolver")?;
            let ctx = ResolveContext::new();

            let resolution = if wait {
                let interval = Duration::from_secs(interval);
                resolver
                    .resolve_until_playable(&video_id, &ctx, interval, retries)
                    .await
            } else {
                resolver.resolve_stream(&video_id, &ctx).await
            };
            resolution.result.log(&resolution.video_id);
            print_json(&resolution_summary(&resolution))?;
            resolution.result.is_playable()
        }
        Commands::Status { video_id } => {
            let coordinator = UploadCoordinator::from_config(&config)
                .context("Failed to create upload coordinator")?;
            let status = coordinator
                .check_status(&video_id)
                .await
                .with_context(|| format!("Status check for {} failed", video_id))?;
            print_json(&serde_json::json!({
                "video_id": video_id,
                "status": status.to_string(),
                "terminal": status.is_terminal(),
            }))?;
            true
        }
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
