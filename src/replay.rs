//! Recorded-landmark replay
//!
//! Camera and landmark sources that play back a recording instead of
//! talking to hardware and a model. Recordings are JSON lines: one frame
//! per line, either an array of `{x, y, z}` points or `null` for a frame
//! without a face.

use crate::detector::Vowel;
use crate::features::{LandmarkSet, MouthFeatures};
use crate::source::{CameraConstraints, CameraSource, FrameSource, LandmarkSource, SourceError, VideoFrame};
use crate::tracker::TrackerError;
use async_trait::async_trait;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Frames each demo shape is held for
const DEMO_HOLD_FRAMES: usize = 10;

/// A sequence of landmark frames
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkRecording {
    frames: Vec<Option<LandmarkSet>>,
}

impl LandmarkRecording {
    pub fn new(frames: Vec<Option<LandmarkSet>>) -> Self {
        Self { frames }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame for a stream position, looping over the recording
    pub fn frame(&self, sequence: u64) -> Option<&LandmarkSet> {
        if self.frames.is_empty() {
            return None;
        }
        let index = (sequence % self.frames.len() as u64) as usize;
        self.frames[index].as_ref()
    }

    /// Parse JSON lines; blank lines are skipped
    pub fn from_reader(reader: impl BufRead) -> Result<Self, TrackerError> {
        let mut frames = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            frames.push(serde_json::from_str::<Option<LandmarkSet>>(line)?);
        }

        Ok(Self { frames })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        let recording = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!("Loaded {} frames from {}", recording.len(), path.display());
        Ok(recording)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrackerError> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        for frame in &self.frames {
            serde_json::to_writer(&mut writer, frame)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Synthetic sequence holding each vowel shape in turn, with a
    /// face-less frame between shapes
    pub fn demo() -> Self {
        let mut frames = Vec::new();
        for (_, features) in demo_shapes() {
            let landmarks = LandmarkSet::from_features(&features);
            frames.extend(std::iter::repeat(Some(landmarks)).take(DEMO_HOLD_FRAMES));
            frames.push(None);
        }
        Self { frames }
    }
}

/// Mouth shapes used by [`LandmarkRecording::demo`], one per vowel
pub fn demo_shapes() -> [(Vowel, MouthFeatures); 6] {
    let shape = |vertical: f64, width: f64, roundness: f64, jaw: f64| MouthFeatures {
        vertical_opening: vertical,
        horizontal_width: width,
        aspect_ratio: if width > 0.0 { vertical / width } else { 0.0 },
        roundness,
        jaw_opening: jaw,
    };

    [
        (Vowel::Closed, shape(0.008, 0.15, 0.3, 0.04)),
        (Vowel::A, shape(0.3, 0.3, 0.3, 0.6)),
        (Vowel::I, shape(0.0, 0.5, 0.0, 0.2)),
        (Vowel::U, shape(0.04, 0.12, 0.95, 0.2)),
        (Vowel::E, shape(0.1, 0.2, 0.3, 0.2)),
        (Vowel::O, shape(0.125, 0.15, 0.9, 0.2)),
    ]
}

/// Landmark source answering from a recording
pub struct ReplayLandmarker {
    recording: Arc<LandmarkRecording>,
    initialized: bool,
}

impl ReplayLandmarker {
    pub fn new(recording: Arc<LandmarkRecording>) -> Self {
        Self {
            recording,
            initialized: false,
        }
    }
}

#[async_trait]
impl LandmarkSource for ReplayLandmarker {
    async fn initialize(&mut self, model_path: &str) -> Result<(), SourceError> {
        if self.recording.is_empty() {
            return Err(SourceError::ModelLoadFailed(
                "replay recording has no frames".to_string(),
            ));
        }

        debug!("Replay landmarker ready (model path {} ignored)", model_path);
        self.initialized = true;
        Ok(())
    }

    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, SourceError> {
        if !self.initialized {
            return Err(SourceError::NotInitialized);
        }
        Ok(self.recording.frame(frame.sequence).cloned())
    }

    fn release(&mut self) {
        self.initialized = false;
    }
}

/// Camera producing empty frames at the requested rate
#[derive(Default)]
pub struct ReplayCamera {
    active: Arc<AtomicBool>,
}

impl ReplayCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CameraSource for ReplayCamera {
    async fn start(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn FrameSource>, SourceError> {
        if constraints.frame_rate == 0 {
            return Err(SourceError::CameraNotAvailable(
                "frame rate must be greater than 0".to_string(),
            ));
        }

        self.active.store(true, Ordering::SeqCst);

        Ok(Box::new(ReplayFrames {
            active: Arc::clone(&self.active),
            sequence: 0,
            width: constraints.width,
            height: constraints.height,
            frame_period: Duration::from_secs(1) / constraints.frame_rate,
        }))
    }

    fn stop(&mut self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Frame stream of a [`ReplayCamera`]; dries up once the camera stops
pub struct ReplayFrames {
    active: Arc<AtomicBool>,
    sequence: u64,
    width: u32,
    height: u32,
    frame_period: Duration,
}

impl FrameSource for ReplayFrames {
    fn current_frame(&mut self) -> Option<VideoFrame> {
        if !self.active.load(Ordering::SeqCst) {
            return None;
        }

        let frame = VideoFrame {
            sequence: self.sequence,
            width: self.width,
            height: self.height,
            timestamp: frame_timestamp(self.frame_period, self.sequence),
            data: Vec::new(),
        };
        self.sequence += 1;
        Some(frame)
    }
}

/// Presentation time of frame `sequence`, saturating at `u64::MAX` nanoseconds
fn frame_timestamp(frame_period: Duration, sequence: u64) -> Duration {
    let nanos = frame_period.as_nanos().saturating_mul(u128::from(sequence));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::VowelDetector;
    use std::io::Cursor;

    #[test]
    fn test_demo_shapes_classify_as_labelled() {
        let detector = VowelDetector::new();
        for (vowel, features) in demo_shapes() {
            let result = detector.detect(&LandmarkSet::from_features(&features)).unwrap();
            assert_eq!(result.vowel, vowel);
            assert!(result.confidence >= 0.5, "{} scored {}", vowel, result.confidence);
        }
    }

    #[test]
    fn test_demo_layout() {
        let demo = LandmarkRecording::demo();
        assert_eq!(demo.len(), 6 * (DEMO_HOLD_FRAMES + 1));
        assert!(demo.frame(0).is_some());
        assert!(demo.frame(DEMO_HOLD_FRAMES as u64).is_none());
        // Loops back to the start
        assert_eq!(demo.frame(demo.len() as u64), demo.frame(0));
    }

    #[test]
    fn test_parse_lines_with_gaps() {
        let input = "null\n\n[{\"x\": 0.1, \"y\": 0.2}, {\"x\": 0.3, \"y\": 0.4, \"z\": 0.5}]\n";
        let recording = LandmarkRecording::from_reader(Cursor::new(input)).unwrap();

        assert_eq!(recording.len(), 2);
        assert!(recording.frame(0).is_none());
        let frame = recording.frame(1).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.points()[0].z, 0.0);
        assert_eq!(frame.points()[1].z, 0.5);
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        let result = LandmarkRecording::from_reader(Cursor::new("[{\"x\": 1}\n"));
        assert!(matches!(result, Err(TrackerError::Parse(_))));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.jsonl");

        let recording = LandmarkRecording::demo();
        recording.save(&path).unwrap();
        let loaded = LandmarkRecording::load(&path).unwrap();

        assert_eq!(loaded, recording);
    }

    #[tokio::test]
    async fn test_replay_landmarker_lifecycle() {
        let recording = Arc::new(LandmarkRecording::demo());
        let mut landmarker = ReplayLandmarker::new(Arc::clone(&recording));
        let frame = VideoFrame::default();

        assert_eq!(landmarker.detect(&frame), Err(SourceError::NotInitialized));

        landmarker.initialize("unused").await.unwrap();
        assert_eq!(landmarker.detect(&frame).unwrap().as_ref(), recording.frame(0));

        landmarker.release();
        assert!(landmarker.detect(&frame).is_err());
    }

    #[tokio::test]
    async fn test_empty_recording_fails_to_initialize() {
        let mut landmarker = ReplayLandmarker::new(Arc::new(LandmarkRecording::default()));
        assert!(matches!(
            landmarker.initialize("unused").await,
            Err(SourceError::ModelLoadFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_replay_camera_frames() {
        let mut camera = ReplayCamera::new();
        let constraints = CameraConstraints::default();
        let mut frames = camera.start(&constraints).await.unwrap();
        assert!(camera.is_active());

        let first = frames.current_frame().unwrap();
        let second = frames.current_frame().unwrap();
        assert_eq!((first.sequence, second.sequence), (0, 1));
        assert_eq!(first.width, 640);
        assert_eq!(second.timestamp, Duration::from_secs(1) / 30);

        camera.stop();
        assert!(!camera.is_active());
        assert!(frames.current_frame().is_none());
    }

    #[test]
    fn test_timestamps_past_u32_sequences() {
        let period = Duration::from_secs(1) / 30;
        let sequence = u64::from(u32::MAX) + 2;
        let mut frames = ReplayFrames {
            active: Arc::new(AtomicBool::new(true)),
            sequence,
            width: 640,
            height: 480,
            frame_period: period,
        };

        let frame = frames.current_frame().unwrap();
        assert_eq!(frame.sequence, sequence);
        assert_eq!(frame.timestamp, Duration::from_nanos(33_333_333 * sequence));
        assert_eq!(frame_timestamp(period, u64::MAX), Duration::from_nanos(u64::MAX));
    }

    #[tokio::test]
    async fn test_zero_frame_rate_is_rejected() {
        let mut camera = ReplayCamera::new();
        let constraints = CameraConstraints {
            frame_rate: 0,
            ..Default::default()
        };
        assert!(matches!(
            camera.start(&constraints).await,
            Err(SourceError::CameraNotAvailable(_))
        ));
    }
}
