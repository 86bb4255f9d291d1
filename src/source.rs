//! External collaborators of the tracker
//!
//! Camera capture and face-landmark inference live outside this crate.
//! The tracker only sees them through these traits.

use crate::features::LandmarkSet;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    #[error("Camera not available: {0}")]
    CameraNotAvailable(String),

    #[error("Camera permission denied: {0}")]
    CameraPermissionDenied(String),

    #[error("Failed to load landmark model: {0}")]
    ModelLoadFailed(String),

    #[error("Landmark detection failed: {0}")]
    DetectionFailed(String),

    #[error("Landmark source is not initialized")]
    NotInitialized,
}

/// One captured video frame
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VideoFrame {
    /// Monotonic frame number within the stream
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Capture time relative to stream start
    pub timestamp: Duration,
    /// Raw pixel data; may be empty for synthetic streams
    pub data: Vec<u8>,
}

/// Capture hints passed to the camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub facing_mode: FacingMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    User,
    Environment,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            frame_rate: 30,
            facing_mode: FacingMode::User,
        }
    }
}

/// A live stream of frames
pub trait FrameSource: Send {
    /// Latest frame, or `None` while the stream has nothing ready
    fn current_frame(&mut self) -> Option<VideoFrame>;
}

/// Face-landmark detector (model inference happens behind this trait)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LandmarkSource: Send {
    /// Load the model; called once before any detection
    async fn initialize(&mut self, model_path: &str) -> Result<(), SourceError>;

    /// Landmarks of the first face in `frame`, or `None` when no face is found
    ///
    /// Must return within one tick interval.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, SourceError>;

    /// Release model resources
    fn release(&mut self);
}

/// Camera device
#[async_trait]
pub trait CameraSource: Send {
    /// Open the device and return its frame stream
    async fn start(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn FrameSource>, SourceError>;

    /// Close the device; no-op when already stopped
    fn stop(&mut self);

    fn is_active(&self) -> bool;
}
