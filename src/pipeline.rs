//! Per-tick detection pipeline
//!
//! Turns one frame of landmarks into at most one vowel notification:
//! extract features, optionally smooth them, classify, apply the confidence
//! threshold and suppress repeats of the last emitted vowel.

use crate::config::TrackerConfig;
use crate::detector::{Vowel, VowelDetectionResult, VowelDetector};
use crate::features::{extract_features, FeatureError, LandmarkSet, MouthFeatures};
use crate::smoothing::{FeatureSmoother, SmoothingError};
use serde::Serialize;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, trace};

/// Width of the rolling window used for the debug FPS figure
const FPS_WINDOW: Duration = Duration::from_secs(1);

/// Listener invoked once per vowel transition
///
/// Runs on the detection task after the tracker state lock is released, so
/// it may call back into the tracker.
#[derive(Clone)]
pub struct VowelCallback(Arc<dyn Fn(Vowel) + Send + Sync>);

impl VowelCallback {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(Vowel) + Send + Sync + 'static,
    {
        Self(Arc::new(callback))
    }

    /// Invoke the listener; a panic is logged and swallowed
    pub fn notify(&self, vowel: Vowel) {
        if panic::catch_unwind(AssertUnwindSafe(|| (self.0)(vowel))).is_err() {
            error!("Vowel callback panicked while handling '{}'", vowel);
        }
    }
}

impl fmt::Debug for VowelCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VowelCallback")
    }
}

/// What a processed frame led to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Best score was under the confidence threshold; nothing changed
    Discarded(VowelDetectionResult),

    /// Same vowel as the last emitted one; no notification
    Unchanged(VowelDetectionResult),

    /// New vowel; listeners should be notified
    Changed(VowelDetectionResult),
}

impl TickOutcome {
    pub fn result(&self) -> &VowelDetectionResult {
        match self {
            TickOutcome::Discarded(r) | TickOutcome::Unchanged(r) | TickOutcome::Changed(r) => r,
        }
    }
}

/// Snapshot of the most recent processed frame, for diagnostics only
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub fps: u32,
    pub landmarks: LandmarkSet,
    pub mouth_features: MouthFeatures,
    pub detection_result: VowelDetectionResult,
    /// Milliseconds spent on the tick that produced this snapshot
    pub processing_time: f64,
}

struct Telemetry {
    frame_count: u32,
    window_start: Instant,
    latest: Option<DebugInfo>,
}

impl Telemetry {
    fn new() -> Self {
        Self {
            frame_count: 0,
            window_start: Instant::now(),
            latest: None,
        }
    }

    fn reset(&mut self) {
        self.frame_count = 0;
        self.window_start = Instant::now();
    }

    fn record_at(
        &mut self,
        now: Instant,
        landmarks: &LandmarkSet,
        result: &VowelDetectionResult,
        processing_time: Duration,
    ) {
        self.frame_count += 1;
        let elapsed = now.saturating_duration_since(self.window_start);

        if elapsed < FPS_WINDOW {
            return;
        }

        let fps = (self.frame_count as f64 / elapsed.as_secs_f64()).round() as u32;
        self.frame_count = 0;
        self.window_start = now;

        self.latest = Some(DebugInfo {
            fps,
            landmarks: landmarks.clone(),
            mouth_features: result.features,
            detection_result: *result,
            processing_time: processing_time.as_secs_f64() * 1000.0,
        });
    }
}

/// Stateful classification step driven once per tick
pub struct DetectionPipeline {
    detector: VowelDetector,
    smoother: Option<FeatureSmoother>,
    confidence_threshold: f64,
    last_vowel: Option<Vowel>,
    debug: bool,
    telemetry: Telemetry,
}

impl DetectionPipeline {
    pub fn new(config: &TrackerConfig) -> Result<Self, SmoothingError> {
        let smoother = match config.smoothing_window_size {
            0 => None,
            window => Some(FeatureSmoother::new(window)?),
        };

        Ok(Self {
            detector: VowelDetector::new(),
            smoother,
            confidence_threshold: config.confidence_threshold,
            last_vowel: None,
            debug: config.debug,
            telemetry: Telemetry::new(),
        })
    }

    /// Process one frame of landmarks
    ///
    /// `tick_started` marks the beginning of the tick, for the debug
    /// processing time.
    pub fn process(
        &mut self,
        landmarks: &LandmarkSet,
        tick_started: Instant,
    ) -> Result<TickOutcome, FeatureError> {
        let raw = extract_features(landmarks)?;
        let features = match self.smoother.as_mut() {
            Some(smoother) => smoother.smooth(&raw),
            None => raw,
        };

        let result = self.detector.classify(features);

        if result.confidence < self.confidence_threshold {
            trace!(
                "Discarding {} (confidence {:.3} < {:.3})",
                result.vowel, result.confidence, self.confidence_threshold
            );
            return Ok(TickOutcome::Discarded(result));
        }

        let outcome = if self.last_vowel != Some(result.vowel) {
            debug!(
                "Vowel changed: {:?} -> {} (confidence {:.3})",
                self.last_vowel, result.vowel, result.confidence
            );
            self.last_vowel = Some(result.vowel);
            TickOutcome::Changed(result)
        } else {
            TickOutcome::Unchanged(result)
        };

        if self.debug {
            let now = Instant::now();
            self.telemetry
                .record_at(now, landmarks, &result, now.saturating_duration_since(tick_started));
        }

        Ok(outcome)
    }

    pub fn last_vowel(&self) -> Option<Vowel> {
        self.last_vowel
    }

    pub fn clear_last_vowel(&mut self) {
        self.last_vowel = None;
    }

    /// Forget the last vowel and restart the FPS window
    pub fn reset_session(&mut self) {
        self.last_vowel = None;
        self.telemetry.reset();
    }

    /// Empty all smoothing buffers
    pub fn reset_filters(&mut self) {
        if let Some(smoother) = self.smoother.as_mut() {
            smoother.reset();
        }
    }

    pub fn is_smoothing(&self) -> bool {
        self.smoother.is_some()
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.telemetry.latest.as_ref()
    }
}
