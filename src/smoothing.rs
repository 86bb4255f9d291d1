//! Temporal smoothing of mouth features
//!
//! Moving-average filters over a fixed window of recent frames, used to
//! damp landmark jitter before scoring.

use crate::features::MouthFeatures;
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use thiserror::Error;
use tracing::debug;

/// Default number of frames averaged per feature
pub const DEFAULT_WINDOW_SIZE: usize = 5;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothingError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Moving average over the last `window_size` values
pub struct MovingAverageFilter {
    buffer: HeapRb<f64>,
}

impl MovingAverageFilter {
    /// Create a filter; the window must hold at least one value
    pub fn new(window_size: usize) -> Result<Self, SmoothingError> {
        if window_size == 0 {
            return Err(SmoothingError::InvalidConfig(
                "window size must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            buffer: HeapRb::new(window_size),
        })
    }

    /// Push a value, dropping the oldest once full, and return the new mean
    pub fn add(&mut self, value: f64) -> f64 {
        self.buffer.push_overwrite(value);
        self.average()
    }

    /// Mean of the buffered values without modifying them; 0 when empty
    pub fn average(&self) -> f64 {
        let len = self.buffer.occupied_len();
        if len == 0 {
            return 0.0;
        }

        let sum: f64 = self.buffer.iter().sum();
        sum / len as f64
    }

    /// Drop all buffered values
    pub fn reset(&mut self) {
        let occupied = self.buffer.occupied_len();
        self.buffer.skip(occupied);
    }

    pub fn len(&self) -> usize {
        self.buffer.occupied_len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.buffer.capacity().get()
    }
}

/// One moving-average filter per mouth feature
pub struct FeatureSmoother {
    vertical_opening: MovingAverageFilter,
    horizontal_width: MovingAverageFilter,
    aspect_ratio: MovingAverageFilter,
    roundness: MovingAverageFilter,
    jaw_opening: MovingAverageFilter,
}

impl FeatureSmoother {
    pub fn new(window_size: usize) -> Result<Self, SmoothingError> {
        debug!("Creating feature smoother with window size: {}", window_size);

        Ok(Self {
            vertical_opening: MovingAverageFilter::new(window_size)?,
            horizontal_width: MovingAverageFilter::new(window_size)?,
            aspect_ratio: MovingAverageFilter::new(window_size)?,
            roundness: MovingAverageFilter::new(window_size)?,
            jaw_opening: MovingAverageFilter::new(window_size)?,
        })
    }

    /// Feed one frame of features and return the smoothed features
    pub fn smooth(&mut self, features: &MouthFeatures) -> MouthFeatures {
        MouthFeatures {
            vertical_opening: self.vertical_opening.add(features.vertical_opening),
            horizontal_width: self.horizontal_width.add(features.horizontal_width),
            aspect_ratio: self.aspect_ratio.add(features.aspect_ratio),
            roundness: self.roundness.add(features.roundness),
            jaw_opening: self.jaw_opening.add(features.jaw_opening),
        }
    }

    pub fn reset(&mut self) {
        self.vertical_opening.reset();
        self.horizontal_width.reset();
        self.aspect_ratio.reset();
        self.roundness.reset();
        self.jaw_opening.reset();
        debug!("Feature smoother reset");
    }

    /// Number of frames currently averaged
    pub fn len(&self) -> usize {
        self.vertical_opening.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertical_opening.is_empty()
    }
}
