//! Geometry primitives over landmark points
//!
//! Pure, stateless helpers used by the feature extractor.

use serde::{Deserialize, Serialize};

/// A single 3D landmark point in the detector's normalized coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,

    /// Depth; absent in 2D input and treated as 0
    #[serde(default)]
    pub z: f64,
}

impl Point3 {
    pub const ORIGIN: Point3 = Point3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Point on the image plane (z = 0)
    pub fn planar(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Euclidean distance between two points
pub fn distance(p1: &Point3, p2: &Point3) -> f64 {
    let dx = p2.x - p1.x;
    let dy = p2.y - p1.y;
    let dz = p2.z - p1.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Angle in radians at vertex `p2` formed by `p1` and `p3` (x/y plane)
///
/// Returns 0 when either arm has zero length.
pub fn angle(p1: &Point3, p2: &Point3, p3: &Point3) -> f64 {
    let (v1x, v1y) = (p1.x - p2.x, p1.y - p2.y);
    let (v2x, v2y) = (p3.x - p2.x, p3.y - p2.y);

    let dot = v1x * v2x + v1y * v2y;
    let mag1 = (v1x * v1x + v1y * v1y).sqrt();
    let mag2 = (v2x * v2x + v2y * v2y).sqrt();

    if mag1 == 0.0 || mag2 == 0.0 {
        return 0.0;
    }

    // Rounding can push the cosine slightly outside [-1, 1]
    let cos_angle = (dot / (mag1 * mag2)).clamp(-1.0, 1.0);
    cos_angle.acos()
}

/// Per-axis mean of a set of points; the origin for an empty slice
pub fn centroid(points: &[Point3]) -> Point3 {
    if points.is_empty() {
        return Point3::ORIGIN;
    }

    let sum = points.iter().fold(Point3::ORIGIN, |acc, p| Point3 {
        x: acc.x + p.x,
        y: acc.y + p.y,
        z: acc.z + p.z,
    });

    let n = points.len() as f64;
    Point3::new(sum.x / n, sum.y / n, sum.z / n)
}

/// Scale a distance into [0, 1] relative to `max_distance`
pub fn normalize_distance(distance: f64, max_distance: f64) -> f64 {
    if max_distance <= 0.0 {
        return 0.0;
    }
    (distance / max_distance).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_distance_pythagorean() {
        let d = distance(&Point3::planar(0.0, 0.0), &Point3::planar(3.0, 4.0));
        assert_relative_eq!(d, 5.0);
    }

    #[test]
    fn test_distance_includes_depth() {
        let d = distance(&Point3::ORIGIN, &Point3::new(1.0, 2.0, 2.0));
        assert_relative_eq!(d, 3.0);
    }

    #[test]
    fn test_distance_symmetric_and_triangle_inequality() {
        let a = Point3::new(0.1, 0.7, -0.2);
        let b = Point3::new(0.9, 0.3, 0.05);
        let c = Point3::new(0.4, 0.4, 0.4);

        assert_relative_eq!(distance(&a, &b), distance(&b, &a));
        assert!(distance(&a, &c) <= distance(&a, &b) + distance(&b, &c) + 1e-12);
    }

    #[test]
    fn test_distance_missing_depth_deserializes_as_zero() {
        let p: Point3 = serde_json::from_str(r#"{"x": 3.0, "y": 4.0}"#).unwrap();
        assert_eq!(p.z, 0.0);
        assert_relative_eq!(distance(&Point3::ORIGIN, &p), 5.0);
    }

    #[test]
    fn test_right_angle() {
        let a = angle(
            &Point3::planar(1.0, 0.0),
            &Point3::planar(0.0, 0.0),
            &Point3::planar(0.0, 1.0),
        );
        assert_relative_eq!(a, FRAC_PI_2, epsilon = 1e-5);
    }

    #[test]
    fn test_straight_angle_is_clamped() {
        let a = angle(
            &Point3::planar(-1.0, 0.0),
            &Point3::planar(0.0, 0.0),
            &Point3::planar(1e-9, 0.0),
        );
        assert_relative_eq!(a, PI, epsilon = 1e-9);
        assert!(!a.is_nan());
    }

    #[test]
    fn test_degenerate_angle() {
        let p = Point3::planar(0.5, 0.5);
        assert_eq!(angle(&p, &p, &Point3::planar(1.0, 1.0)), 0.0);
        assert_eq!(angle(&Point3::planar(1.0, 1.0), &p, &p), 0.0);
    }

    #[test]
    fn test_centroid_empty_is_origin() {
        assert_eq!(centroid(&[]), Point3::ORIGIN);
    }

    #[test]
    fn test_centroid_of_scaled_square() {
        let square = [
            Point3::planar(0.0, 0.0),
            Point3::planar(2.0, 0.0),
            Point3::planar(2.0, 2.0),
            Point3::planar(0.0, 2.0),
        ];
        let c = centroid(&square);
        assert_relative_eq!(c.x, 1.0);
        assert_relative_eq!(c.y, 1.0);
        assert_relative_eq!(c.z, 0.0);
    }

    #[test]
    fn test_normalize_distance() {
        assert_relative_eq!(normalize_distance(0.25, 0.5), 0.5);
        assert_eq!(normalize_distance(2.0, 1.0), 1.0);
        assert_eq!(normalize_distance(-1.0, 1.0), 0.0);
        assert_eq!(normalize_distance(1.0, 0.0), 0.0);
    }
}
