//! Vowel tracker main module
//!
//! Owns the landmark source and camera, runs the periodic detection loop and
//! publishes a notification each time the detected vowel changes.

use crate::config::TrackerConfig;
use crate::detector::Vowel;
use crate::features::FeatureError;
use crate::pipeline::{DebugInfo, DetectionPipeline, TickOutcome, VowelCallback};
use crate::smoothing::SmoothingError;
use crate::source::{CameraSource, FrameSource, LandmarkSource, SourceError};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Vowel events buffered for [`VowelTracker::recv_event`]; newer events are
/// dropped while the queue is full
pub const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("VowelTracker is not initialized. Call initialize() first.")]
    NotInitialized,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    InvalidInput(#[from] FeatureError),

    #[error("Smoothing error: {0}")]
    Smoothing(#[from] SmoothingError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Coarse classification of [`TrackerError`] for callers that branch on it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    CameraNotAvailable,
    CameraPermissionDenied,
    ModelLoadFailed,
    NotInitialized,
    DetectionFailed,
    InvalidInput,
    InvalidConfig,
}

impl TrackerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TrackerError::NotInitialized => ErrorCode::NotInitialized,
            TrackerError::InvalidInput(_) => ErrorCode::InvalidInput,
            TrackerError::InvalidConfig(_)
            | TrackerError::Smoothing(_)
            | TrackerError::Io(_)
            | TrackerError::Parse(_) => ErrorCode::InvalidConfig,
            TrackerError::Source(source) => match source {
                SourceError::CameraNotAvailable(_) => ErrorCode::CameraNotAvailable,
                SourceError::CameraPermissionDenied(_) => ErrorCode::CameraPermissionDenied,
                SourceError::ModelLoadFailed(_) => ErrorCode::ModelLoadFailed,
                SourceError::DetectionFailed(_) => ErrorCode::DetectionFailed,
                SourceError::NotInitialized => ErrorCode::NotInitialized,
            },
        }
    }
}

/// Tracker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerState {
    /// Landmark source not loaded
    Idle,

    /// Ready to start
    Initialized,

    /// Detection loop active
    Running,

    /// Loop stopped; can be started again
    Stopped,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackerState::Idle => "idle",
            TrackerState::Initialized => "initialized",
            TrackerState::Running => "running",
            TrackerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Vowel transition published on the event channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VowelEvent {
    pub vowel: Vowel,

    /// Score of the vowel on the frame that triggered the transition
    pub confidence: f64,

    /// Microseconds since the Unix epoch
    pub timestamp: i64,
}

/// Tracker statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStats {
    pub state: TrackerState,

    /// Frames in which a face was found, this session
    pub frames_processed: u64,

    /// Frames dropped for low confidence, this session
    pub frames_discarded: u64,

    /// Vowel changes notified, this session
    pub transitions: u64,

    pub last_vowel: Option<Vowel>,
}

/// State shared between the tracker handle and its detection loop
struct TrackerInner {
    state: TrackerState,
    landmarker: Box<dyn LandmarkSource>,
    pipeline: DetectionPipeline,
    frames_processed: u64,
    frames_discarded: u64,
    transitions: u64,
    debug: bool,
}

impl TrackerInner {
    /// Run one detection tick; returns an event on a vowel change
    fn tick(&mut self, frames: &mut dyn FrameSource) -> Option<VowelEvent> {
        if self.state != TrackerState::Running {
            return None;
        }

        let started = Instant::now();

        let frame = frames.current_frame()?;

        let landmarks = match self.landmarker.detect(&frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => {
                trace!("No face in frame {}", frame.sequence);
                return None;
            }
            Err(e) => {
                self.report_failure(&e);
                return None;
            }
        };

        self.frames_processed += 1;

        match self.pipeline.process(&landmarks, started) {
            Ok(TickOutcome::Changed(result)) => {
                self.transitions += 1;
                info!(
                    "Vowel detected: {} (confidence: {:.2})",
                    result.vowel, result.confidence
                );
                Some(VowelEvent {
                    vowel: result.vowel,
                    confidence: result.confidence,
                    timestamp: current_timestamp_micros(),
                })
            }
            Ok(TickOutcome::Unchanged(_)) => None,
            Ok(TickOutcome::Discarded(_)) => {
                self.frames_discarded += 1;
                None
            }
            Err(e) => {
                self.report_failure(&e);
                None
            }
        }
    }

    fn report_failure(&self, err: &dyn std::error::Error) {
        if self.debug {
            warn!("Detection error: {}", err);
        } else {
            debug!("Detection error: {}", err);
        }
    }

    fn reset_counters(&mut self) {
        self.frames_processed = 0;
        self.frames_discarded = 0;
        self.transitions = 0;
    }
}

/// Handle to a running detection loop
struct Session {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Real-time vowel tracker
pub struct VowelTracker {
    config: TrackerConfig,
    inner: Arc<Mutex<TrackerInner>>,
    camera: Mutex<Box<dyn CameraSource>>,
    session: Mutex<Option<Session>>,
    event_tx: mpsc::Sender<VowelEvent>,
    event_rx: Mutex<mpsc::Receiver<VowelEvent>>,
}

impl VowelTracker {
    /// Create a new tracker in the `Idle` state
    pub fn new<L, C>(config: TrackerConfig, landmarker: L, camera: C) -> Result<Self, TrackerError>
    where
        L: LandmarkSource + 'static,
        C: CameraSource + 'static,
    {
        Self::with_sources(config, Box::new(landmarker), Box::new(camera))
    }

    /// Create a new tracker from boxed collaborators
    pub fn with_sources(
        config: TrackerConfig,
        landmarker: Box<dyn LandmarkSource>,
        camera: Box<dyn CameraSource>,
    ) -> Result<Self, TrackerError> {
        config.validate()?;

        info!("Creating vowel tracker");
        info!("Model: {}", config.model_path);
        info!("Confidence threshold: {}", config.confidence_threshold);
        info!("Detection interval: {}ms", config.detection_interval_ms);
        info!("Smoothing window: {}", config.smoothing_window_size);

        let pipeline = DetectionPipeline::new(&config)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);

        let inner = TrackerInner {
            state: TrackerState::Idle,
            landmarker,
            pipeline,
            frames_processed: 0,
            frames_discarded: 0,
            transitions: 0,
            debug: config.debug,
        };

        Ok(Self {
            config,
            inner: Arc::new(Mutex::new(inner)),
            camera: Mutex::new(camera),
            session: Mutex::new(None),
            event_tx,
            event_rx: Mutex::new(event_rx),
        })
    }

    /// Load the landmark model; no-op once initialized
    pub async fn initialize(&self) -> Result<(), TrackerError> {
        let mut inner = self.inner.lock().await;

        if inner.state != TrackerState::Idle {
            debug!("Tracker already initialized");
            return Ok(());
        }

        inner.landmarker.initialize(&self.config.model_path).await?;
        inner.state = TrackerState::Initialized;
        info!("Vowel tracker initialized");

        Ok(())
    }

    /// Open the camera with the configured constraints
    ///
    /// The returned stream is what [`VowelTracker::start`] reads frames from.
    pub async fn start_camera(&self) -> Result<Box<dyn FrameSource>, TrackerError> {
        let mut camera = self.camera.lock().await;
        let frames = camera.start(&self.config.camera).await?;
        info!(
            "Camera started ({}x{} @ {} fps)",
            self.config.camera.width, self.config.camera.height, self.config.camera.frame_rate
        );
        Ok(frames)
    }

    pub async fn stop_camera(&self) {
        self.camera.lock().await.stop();
    }

    /// Start the detection loop over `frames`
    ///
    /// Fails with [`TrackerError::NotInitialized`] before `initialize`;
    /// no-op while already running.
    pub async fn start(&self, frames: Box<dyn FrameSource>) -> Result<(), TrackerError> {
        let mut session = self.session.lock().await;
        let mut inner = self.inner.lock().await;

        match inner.state {
            TrackerState::Idle => return Err(TrackerError::NotInitialized),
            TrackerState::Running => {
                warn!("Tracker already running");
                return Ok(());
            }
            TrackerState::Initialized | TrackerState::Stopped => {}
        }

        inner.pipeline.reset_session();
        inner.reset_counters();
        inner.state = TrackerState::Running;
        drop(inner);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_detection_loop(
            Arc::clone(&self.inner),
            frames,
            self.config.detection_interval(),
            self.config.on_vowel_detected.clone(),
            cancel.clone(),
            self.event_tx.clone(),
        ));

        *session = Some(Session { cancel, handle });
        info!("Vowel tracker started");

        Ok(())
    }

    /// Stop the detection loop; no-op when not running
    ///
    /// Returns once the loop has exited. A tick already in progress
    /// completes first.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;

        let Some(Session { cancel, handle }) = session.take() else {
            debug!("Tracker not running");
            return;
        };

        cancel.cancel();
        if let Err(e) = handle.await {
            warn!("Detection loop ended abnormally: {}", e);
        }

        let mut inner = self.inner.lock().await;
        inner.state = TrackerState::Stopped;
        inner.pipeline.clear_last_vowel();
        info!("Vowel tracker stopped");
    }

    /// Stop everything and release the landmark source and camera
    ///
    /// Leaves the tracker `Idle`; safe to call repeatedly.
    pub async fn dispose(&self) {
        self.stop().await;
        self.stop_camera().await;

        let mut inner = self.inner.lock().await;
        if inner.state != TrackerState::Idle {
            inner.landmarker.release();
        }
        inner.pipeline.reset_filters();
        inner.state = TrackerState::Idle;
        info!("Vowel tracker disposed");
    }

    /// Latest debug snapshot; `None` unless `debug` is enabled and a
    /// full FPS window has elapsed
    pub async fn debug_info(&self) -> Option<DebugInfo> {
        self.inner.lock().await.pipeline.debug_info().cloned()
    }

    pub async fn state(&self) -> TrackerState {
        self.inner.lock().await.state
    }

    /// Get current statistics
    pub async fn stats(&self) -> TrackerStats {
        let inner = self.inner.lock().await;

        TrackerStats {
            state: inner.state,
            frames_processed: inner.frames_processed,
            frames_discarded: inner.frames_discarded,
            transitions: inner.transitions,
            last_vowel: inner.pipeline.last_vowel(),
        }
    }

    /// Get the next vowel event (non-blocking)
    pub async fn try_recv_event(&self) -> Option<VowelEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.try_recv().ok()
    }

    /// Wait for the next vowel event
    pub async fn recv_event(&self) -> Option<VowelEvent> {
        let mut rx = self.event_rx.lock().await;
        rx.recv().await
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }
}

impl Drop for VowelTracker {
    fn drop(&mut self) {
        // Let a still-running loop exit on its next tick
        if let Some(session) = self.session.get_mut().take() {
            session.cancel.cancel();
        }
    }
}

/// Periodic tick driver; one task per running session
async fn run_detection_loop(
    inner: Arc<Mutex<TrackerInner>>,
    mut frames: Box<dyn FrameSource>,
    period: Duration,
    callback: Option<VowelCallback>,
    cancel: CancellationToken,
    events: mpsc::Sender<VowelEvent>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Detection loop started (interval: {:?})", period);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            _ = ticker.tick() => {
                let outcome = {
                    let mut inner = inner.lock().await;
                    panic::catch_unwind(AssertUnwindSafe(|| inner.tick(frames.as_mut())))
                };

                match outcome {
                    Ok(Some(event)) => publish(event, callback.as_ref(), &events),
                    Ok(None) => {}
                    Err(_) => error!("Detection tick panicked; continuing with the next tick"),
                }
            }
        }
    }

    debug!("Detection loop exited");
}

/// Hand a transition to the callback, then to the event queue
fn publish(event: VowelEvent, callback: Option<&VowelCallback>, events: &mpsc::Sender<VowelEvent>) {
    if let Some(callback) = callback {
        callback.notify(event.vowel);
    }

    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => trace!("Event queue full, dropping {}", event.vowel),
        Err(TrySendError::Closed(_)) => trace!("Event receiver dropped"),
    }
}

fn current_timestamp_micros() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or_default()
}
