//! Vowel scoring
//!
//! Scores every mouth-shape category from a feature vector with hand-tuned
//! piecewise-linear heuristics and picks the best one. Scores are
//! independent per vowel and do not sum to 1.

use crate::features::{extract_features, FeatureError, LandmarkSet, MouthFeatures};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::trace;

/// Mouth-shape category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vowel {
    Closed,
    A,
    I,
    U,
    E,
    O,
}

impl Vowel {
    /// Evaluation order; the earlier vowel wins a tie
    pub const ALL: [Vowel; 6] = [Vowel::Closed, Vowel::A, Vowel::I, Vowel::U, Vowel::E, Vowel::O];

    pub fn as_str(&self) -> &'static str {
        match self {
            Vowel::Closed => "closed",
            Vowel::A => "a",
            Vowel::I => "i",
            Vowel::U => "u",
            Vowel::E => "e",
            Vowel::O => "o",
        }
    }
}

impl fmt::Display for Vowel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Vowel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Vowel::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Unknown vowel: {}", s))
    }
}

/// Score of a single vowel for one frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredVowel {
    pub vowel: Vowel,
    pub score: f64,
}

/// Best vowel for one frame together with the features it came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VowelDetectionResult {
    pub vowel: Vowel,
    pub confidence: f64,
    pub features: MouthFeatures,
}

/// 1 at zero, falling linearly by `slope`; 0 at or above `limit`
fn below(value: f64, limit: f64, slope: f64) -> f64 {
    if value < limit {
        1.0 - value * slope
    } else {
        0.0
    }
}

/// 0 at or below `limit`, otherwise `(value - offset) * slope` capped at 1
fn above(value: f64, limit: f64, offset: f64, slope: f64) -> f64 {
    if value > limit {
        ((value - offset) * slope).min(1.0)
    } else {
        0.0
    }
}

/// Triangular peak at `center` inside `[low, high]`, 0 outside
fn within(value: f64, low: f64, high: f64, center: f64, slope: f64) -> f64 {
    if (low..=high).contains(&value) {
        1.0 - (value - center).abs() * slope
    } else {
        0.0
    }
}

/// Feature-based vowel classifier
///
/// Stateless: identical features always give an identical result.
#[derive(Debug, Clone, Copy, Default)]
pub struct VowelDetector;

impl VowelDetector {
    pub fn new() -> Self {
        Self
    }

    /// Extract features from landmarks and classify them
    pub fn detect(&self, landmarks: &LandmarkSet) -> Result<VowelDetectionResult, FeatureError> {
        let features = extract_features(landmarks)?;
        Ok(self.classify(features))
    }

    /// Pick the highest scoring vowel for a feature vector
    pub fn classify(&self, features: MouthFeatures) -> VowelDetectionResult {
        let scores = self.score_all(&features);
        let best = Self::best(&scores);

        trace!("Vowel scores: {:?} -> {}", scores, best.vowel);

        VowelDetectionResult {
            vowel: best.vowel,
            confidence: best.score,
            features,
        }
    }

    /// Score every vowel, in evaluation order
    pub fn score_all(&self, features: &MouthFeatures) -> [ScoredVowel; 6] {
        Vowel::ALL.map(|vowel| ScoredVowel {
            vowel,
            score: Self::score(vowel, features),
        })
    }

    /// First maximum wins
    pub fn best(scores: &[ScoredVowel; 6]) -> ScoredVowel {
        scores
            .iter()
            .skip(1)
            .fold(scores[0], |best, s| if s.score > best.score { *s } else { best })
    }

    /// Heuristic score in [0, 1] of one vowel
    pub fn score(vowel: Vowel, f: &MouthFeatures) -> f64 {
        match vowel {
            Vowel::Closed => {
                let vertical = below(f.vertical_opening, 0.02, 50.0);
                let jaw = below(f.jaw_opening, 0.1, 10.0);
                (vertical + jaw) / 2.0
            }
            Vowel::A => {
                let vertical = above(f.vertical_opening, 0.15, 0.15, 5.0);
                let aspect = above(f.aspect_ratio, 0.8, 0.0, 1.25);
                let jaw = above(f.jaw_opening, 0.3, 0.3, 2.0);
                vertical * 0.4 + aspect * 0.3 + jaw * 0.3
            }
            Vowel::I => {
                let vertical = below(f.vertical_opening, 0.08, 12.5);
                let width = above(f.horizontal_width, 0.3, 0.3, 5.0);
                let aspect = below(f.aspect_ratio, 0.3, 3.33);
                vertical * 0.3 + width * 0.4 + aspect * 0.3
            }
            Vowel::U => {
                let vertical = below(f.vertical_opening, 0.1, 10.0);
                let width = below(f.horizontal_width, 0.2, 5.0);
                let round = above(f.roundness, 0.7, 0.7, 3.33);
                vertical * 0.3 + width * 0.3 + round * 0.4
            }
            Vowel::E => {
                let vertical = within(f.vertical_opening, 0.08, 0.12, 0.1, 20.0);
                let width = above(f.horizontal_width, 0.25, 0.25, 4.0);
                let aspect = within(f.aspect_ratio, 0.4, 0.6, 0.5, 10.0);
                vertical * 0.4 + width * 0.3 + aspect * 0.3
            }
            Vowel::O => {
                let vertical = within(f.vertical_opening, 0.1, 0.15, 0.125, 20.0);
                let width = below(f.horizontal_width, 0.25, 4.0);
                let round = above(f.roundness, 0.6, 0.6, 2.5);
                vertical * 0.3 + width * 0.3 + round * 0.4
            }
        }
    }
}
