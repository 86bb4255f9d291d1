//! Tracker configuration
//!
//! Loaded from a JSON file and/or environment variables; every field has a
//! default so partial configs are fine.

use crate::pipeline::VowelCallback;
use crate::smoothing::DEFAULT_WINDOW_SIZE;
use crate::source::CameraConstraints;
use crate::tracker::TrackerError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MODEL_PATH: &str = "./models/face_landmarker.task";
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_DETECTION_INTERVAL_MS: u64 = 100;

/// Longest accepted tick period (one hour)
pub const MAX_DETECTION_INTERVAL_MS: u64 = 3_600_000;

/// Configuration for [`crate::VowelTracker`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Path handed to the landmark source on initialization
    pub model_path: String,

    /// Minimum score (0.0 - 1.0) for a frame to count
    pub confidence_threshold: f64,

    /// Tick period in milliseconds
    pub detection_interval_ms: u64,

    /// Frames averaged per feature; 0 disables smoothing
    pub smoothing_window_size: usize,

    pub camera: CameraConstraints,

    /// Record debug snapshots and log per-tick failures
    pub debug: bool,

    /// Called once per vowel transition
    #[serde(skip)]
    pub on_vowel_detected: Option<VowelCallback>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            detection_interval_ms: DEFAULT_DETECTION_INTERVAL_MS,
            smoothing_window_size: DEFAULT_WINDOW_SIZE,
            camera: CameraConstraints::default(),
            debug: false,
            on_vowel_detected: None,
        }
    }
}

impl TrackerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(TrackerError::InvalidConfig(
                "confidence_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.detection_interval_ms == 0 {
            return Err(TrackerError::InvalidConfig(
                "detection_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.detection_interval_ms > MAX_DETECTION_INTERVAL_MS {
            return Err(TrackerError::InvalidConfig(format!(
                "detection_interval_ms must be at most {}",
                MAX_DETECTION_INTERVAL_MS
            )));
        }

        if !Path::new(&self.model_path).exists() {
            // The landmark source decides whether the path matters
            debug!("Model file not found locally: {}", self.model_path);
        }

        Ok(())
    }

    pub fn detection_interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval_ms)
    }

    /// Set the transition callback
    pub fn with_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(crate::Vowel) + Send + Sync + 'static,
    {
        self.on_vowel_detected = Some(VowelCallback::new(callback));
        self
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: TrackerConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// Defaults overlaid with `VOWEL_*` environment variables
    pub fn from_env() -> Result<Self, TrackerError> {
        Self::default().with_env_overrides()
    }

    /// Overlay `VOWEL_*` environment variables onto this configuration
    pub fn with_env_overrides(mut self) -> Result<Self, TrackerError> {
        if let Ok(path) = std::env::var("VOWEL_MODEL_PATH") {
            self.model_path = path;
        }

        if let Some(threshold) = parse_env::<f64>("VOWEL_CONFIDENCE_THRESHOLD")? {
            self.confidence_threshold = threshold;
        }

        if let Some(interval) = parse_env::<u64>("VOWEL_DETECTION_INTERVAL_MS")? {
            self.detection_interval_ms = interval;
        }

        if let Some(window) = parse_env::<usize>("VOWEL_SMOOTHING_WINDOW")? {
            self.smoothing_window_size = window;
        }

        if let Some(debug) = parse_env::<bool>("VOWEL_DEBUG")? {
            self.debug = debug;
        }

        Ok(self)
    }
}

fn parse_env<T>(key: &str) -> Result<Option<T>, TrackerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            warn!("Invalid value for {}: {}", key, raw);
            TrackerError::InvalidConfig(format!("{}: {}", key, e))
        }),
        Err(_) => Ok(None),
    }
}
