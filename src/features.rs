//! Mouth feature extraction
//!
//! Derives a small geometric feature vector from a 468-point face mesh.
//! Every feature is a pure function of the current frame.

use crate::geometry::{distance, Point3};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

/// Number of points in a full face mesh
pub const LANDMARK_COUNT: usize = 468;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Invalid landmarks: expected {expected} points, got {actual}")]
    InvalidInput { expected: usize, actual: usize },
}

/// Face mesh indices of the points used for mouth analysis
#[derive(Debug, Clone, Copy)]
pub struct MouthLandmarkIndices {
    pub upper_lip_top: usize,
    pub upper_lip_bottom: usize,
    pub lower_lip_top: usize,
    pub lower_lip_bottom: usize,
    pub mouth_left: usize,
    pub mouth_right: usize,
    pub mouth_center_top: usize,
    pub mouth_center_bottom: usize,
    pub jaw_bottom: usize,
    pub jaw_top: usize,
}

pub const MOUTH_LANDMARKS: MouthLandmarkIndices = MouthLandmarkIndices {
    upper_lip_top: 13,
    upper_lip_bottom: 312,
    lower_lip_top: 308,
    lower_lip_bottom: 14,
    mouth_left: 61,
    mouth_right: 291,
    mouth_center_top: 0,
    mouth_center_bottom: 17,
    jaw_bottom: 152,
    jaw_top: 10,
};

/// One frame of face landmarks, in detector order
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet(Vec<Point3>);

impl LandmarkSet {
    pub fn new(points: Vec<Point3>) -> Self {
        Self(points)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn points(&self) -> &[Point3] {
        &self.0
    }

    /// Build a neutral face mesh whose mouth points reproduce `features`
    ///
    /// Vertical opening, width, roundness and jaw opening are placed
    /// directly; the aspect ratio follows from the first two.
    pub fn from_features(features: &MouthFeatures) -> Self {
        const CENTER: f64 = 0.5;
        // Separation of the outer center points, the roundness reference
        const CENTER_SPAN: f64 = 0.1;

        let idx = MOUTH_LANDMARKS;
        let mut points = vec![Point3::planar(CENTER, CENTER); LANDMARK_COUNT];

        let half_v = features.vertical_opening.max(0.0) / 2.0;
        let half_w = features.horizontal_width.max(0.0) / 2.0;
        let half_j = features.jaw_opening.max(0.0) / 2.0;
        let half_inner = features.roundness.clamp(0.0, 1.0) * CENTER_SPAN / 2.0;

        points[idx.upper_lip_top] = Point3::planar(CENTER, CENTER - half_v);
        points[idx.lower_lip_bottom] = Point3::planar(CENTER, CENTER + half_v);
        points[idx.mouth_left] = Point3::planar(CENTER - half_w, CENTER);
        points[idx.mouth_right] = Point3::planar(CENTER + half_w, CENTER);
        points[idx.jaw_top] = Point3::planar(CENTER, CENTER - half_j);
        points[idx.jaw_bottom] = Point3::planar(CENTER, CENTER + half_j);
        points[idx.mouth_center_top] = Point3::planar(0.3, CENTER - CENTER_SPAN / 2.0);
        points[idx.mouth_center_bottom] = Point3::planar(0.3, CENTER + CENTER_SPAN / 2.0);
        points[idx.upper_lip_bottom] = Point3::planar(0.7, CENTER - half_inner);
        points[idx.lower_lip_top] = Point3::planar(0.7, CENTER + half_inner);

        Self(points)
    }
}

impl From<Vec<Point3>> for LandmarkSet {
    fn from(points: Vec<Point3>) -> Self {
        Self(points)
    }
}

/// Geometric description of the mouth in one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MouthFeatures {
    pub vertical_opening: f64,
    pub horizontal_width: f64,
    /// vertical / horizontal, 0 when the width is 0
    pub aspect_ratio: f64,
    /// Lip rounding in [0, 1]
    pub roundness: f64,
    pub jaw_opening: f64,
}

/// Extract mouth features from a full face mesh
pub fn extract_features(landmarks: &LandmarkSet) -> Result<MouthFeatures, FeatureError> {
    if landmarks.len() < LANDMARK_COUNT {
        return Err(FeatureError::InvalidInput {
            expected: LANDMARK_COUNT,
            actual: landmarks.len(),
        });
    }

    let points = landmarks.points();
    let idx = MOUTH_LANDMARKS;

    let vertical_opening = distance(&points[idx.upper_lip_top], &points[idx.lower_lip_bottom]);
    let horizontal_width = distance(&points[idx.mouth_left], &points[idx.mouth_right]);
    let aspect_ratio = if horizontal_width > 0.0 {
        vertical_opening / horizontal_width
    } else {
        0.0
    };
    let jaw_opening = distance(&points[idx.jaw_top], &points[idx.jaw_bottom]);
    let roundness = roundness(points);

    let features = MouthFeatures {
        vertical_opening,
        horizontal_width,
        aspect_ratio,
        roundness,
        jaw_opening,
    };

    trace!("Extracted mouth features: {:?}", features);
    Ok(features)
}

/// Inner lip gap relative to the outer center span, capped at 1
fn roundness(points: &[Point3]) -> f64 {
    let idx = MOUTH_LANDMARKS;
    let center_distance = distance(
        &points[idx.mouth_center_top],
        &points[idx.mouth_center_bottom],
    );
    let lip_distance = distance(&points[idx.upper_lip_bottom], &points[idx.lower_lip_top]);

    if center_distance == 0.0 {
        return 0.0;
    }

    (lip_distance / center_distance).min(1.0)
}
