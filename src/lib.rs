//! Vowel tracker library
//!
//! Classifies mouth shapes (closed, a, i, u, e, o) from streamed 468-point
//! face landmarks, with temporal smoothing and change-only notifications.

pub mod config;
pub mod detector;
pub mod features;
pub mod geometry;
pub mod pipeline;
pub mod replay;
pub mod smoothing;
pub mod source;
pub mod tracker;

// Re-export main types
pub use config::TrackerConfig;
pub use detector::{ScoredVowel, Vowel, VowelDetectionResult, VowelDetector};
pub use features::{extract_features, FeatureError, LandmarkSet, MouthFeatures, LANDMARK_COUNT, MOUTH_LANDMARKS};
pub use geometry::{angle, centroid, distance, normalize_distance, Point3};
pub use pipeline::{DebugInfo, DetectionPipeline, TickOutcome, VowelCallback};
pub use replay::{LandmarkRecording, ReplayCamera, ReplayLandmarker};
pub use smoothing::{FeatureSmoother, MovingAverageFilter, SmoothingError};
pub use source::{CameraConstraints, CameraSource, FacingMode, FrameSource, LandmarkSource, SourceError, VideoFrame};
pub use tracker::{ErrorCode, EVENT_QUEUE_CAPACITY, TrackerError, TrackerState, TrackerStats, VowelEvent, VowelTracker};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
