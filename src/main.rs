//! Vowel tracking service binary
//!
//! Replays a landmark recording (or a built-in demo sequence) through the
//! tracker and logs every detected vowel until Ctrl-C.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use vowel_tracker::{LandmarkRecording, ReplayCamera, ReplayLandmarker, TrackerConfig, VowelTracker};

#[tokio::main]
async fn main() {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vowel_tracker=debug,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting vowel tracking service v{}", vowel_tracker::VERSION);

    if let Err(e) = run().await {
        error!("Vowel tracking service failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Vowel tracking service stopped");
}

async fn run() -> anyhow::Result<()> {
    let config = load_config()?.with_callback(|vowel| info!("Callback: {}", vowel));
    let debug = config.debug;

    let recording = match std::env::var("VOWEL_RECORDING") {
        Ok(path) => LandmarkRecording::load(&path)
            .with_context(|| format!("loading recording {}", path))?,
        Err(_) => {
            warn!("VOWEL_RECORDING not set, using the demo sequence");
            LandmarkRecording::demo()
        }
    };

    let tracker = VowelTracker::new(
        config,
        ReplayLandmarker::new(Arc::new(recording)),
        ReplayCamera::new(),
    )?;

    tracker.initialize().await?;
    let frames = tracker.start_camera().await?;
    tracker.start(frames).await?;

    info!("Vowel tracker running. Press Ctrl-C to stop...");

    let mut snapshot = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            event = tracker.recv_event() => match event {
                Some(event) => info!(
                    "Vowel: {} (confidence={:.2}, timestamp={})",
                    event.vowel, event.confidence, event.timestamp
                ),
                None => {
                    info!("Event channel closed, shutting down");
                    break;
                }
            },
            _ = snapshot.tick(), if debug => {
                if let Some(info) = tracker.debug_info().await {
                    info!("Debug: {}", serde_json::to_string(&info)?);
                }
            }
        }
    }

    let stats = tracker.stats().await;
    info!(
        "Processed {} frames, {} discarded, {} transitions",
        stats.frames_processed, stats.frames_discarded, stats.transitions
    );

    tracker.dispose().await;
    Ok(())
}

/// Load configuration from `VOWEL_TRACKER_CONFIG` (if set) and `VOWEL_*`
/// environment overrides
fn load_config() -> anyhow::Result<TrackerConfig> {
    let base = match std::env::var("VOWEL_TRACKER_CONFIG") {
        Ok(path) => TrackerConfig::from_json_file(&path)
            .with_context(|| format!("reading config file {}", path))?,
        Err(_) => TrackerConfig::default(),
    };

    let config = base.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}
