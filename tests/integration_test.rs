//! Integration tests for the vowel tracker
//!
//! Drives the full tracker with replayed landmark sequences.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use vowel_tracker::replay::demo_shapes;
use vowel_tracker::{
    LandmarkRecording, LandmarkSet, MouthFeatures, Point3, ReplayCamera, ReplayLandmarker,
    TrackerConfig, TrackerState, Vowel, VowelDetector, VowelTracker,
};

/// Landmarks for a mouth with the given geometry
fn mouth(vertical: f64, width: f64, roundness: f64, jaw: f64) -> LandmarkSet {
    LandmarkSet::from_features(&MouthFeatures {
        vertical_opening: vertical,
        horizontal_width: width,
        aspect_ratio: 0.0,
        roundness,
        jaw_opening: jaw,
    })
}

/// Tracker over `recording` whose callback appends to the returned log
fn tracker_with_log(
    recording: LandmarkRecording,
    config: TrackerConfig,
) -> (VowelTracker, Arc<Mutex<Vec<Vowel>>>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let config = config.with_callback(move |vowel| sink.lock().unwrap().push(vowel));

    let tracker = VowelTracker::new(
        config,
        ReplayLandmarker::new(Arc::new(recording)),
        ReplayCamera::new(),
    )
    .expect("Failed to create tracker");

    (tracker, log)
}

async fn run(tracker: &VowelTracker) {
    tracker.initialize().await.expect("Failed to initialize tracker");
    let frames = tracker.start_camera().await.expect("Failed to start camera");
    tracker.start(frames).await.expect("Failed to start tracker");
}

#[test]
fn test_closed_mouth_end_to_end() {
    let result = VowelDetector::new()
        .detect(&mouth(0.008, 0.15, 0.3, 0.04))
        .expect("Detection failed");

    assert_eq!(result.vowel, Vowel::Closed);
    assert!(result.confidence > 0.5);
    assert!(result.features.vertical_opening < 0.01);
    assert!(result.features.jaw_opening < 0.05);
}

#[test]
fn test_open_mouth_end_to_end() {
    let result = VowelDetector::new()
        .detect(&mouth(0.2, 0.2 / 0.9, 0.3, 0.4))
        .expect("Detection failed");

    assert_eq!(result.vowel, Vowel::A);
    assert!((result.features.aspect_ratio - 0.9).abs() < 1e-6);
}

#[test]
fn test_short_landmark_sets_are_rejected() {
    let detector = VowelDetector::new();
    for len in [0, 17, 467] {
        let landmarks = LandmarkSet::new(vec![Point3::ORIGIN; len]);
        assert!(detector.detect(&landmarks).is_err(), "{} points accepted", len);
    }
}

#[tokio::test(start_paused = true)]
async fn test_demo_sequence_without_smoothing() {
    let recording = LandmarkRecording::demo();
    let frames = recording.len() as u64;
    let config = TrackerConfig {
        smoothing_window_size: 0,
        ..Default::default()
    };
    let (tracker, log) = tracker_with_log(recording, config);

    run(&tracker).await;

    // One tick per recorded frame, stopping before the recording loops
    sleep(Duration::from_millis(100 * frames + 50)).await;
    tracker.stop().await;

    let expected: Vec<Vowel> = demo_shapes().iter().map(|(v, _)| *v).collect();
    assert_eq!(*log.lock().unwrap(), expected);

    let stats = tracker.stats().await;
    assert_eq!(stats.transitions, 6);
    assert_eq!(stats.frames_processed, frames - 6);

    let mut events = Vec::new();
    while let Some(event) = tracker.try_recv_event().await {
        events.push(event.vowel);
    }
    assert_eq!(events, expected);

    tracker.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_demo_sequence_with_smoothing() {
    let recording = LandmarkRecording::demo();
    let frames = recording.len() as u64;
    let (tracker, log) = tracker_with_log(recording, TrackerConfig::default());

    run(&tracker).await;
    sleep(Duration::from_millis(100 * frames + 50)).await;

    let log = log.lock().unwrap().clone();
    assert_eq!(log.first(), Some(&Vowel::Closed));
    assert_eq!(log.last(), Some(&Vowel::O));
    for (vowel, _) in demo_shapes() {
        assert!(log.contains(&vowel), "{} never reported: {:?}", vowel, log);
    }
    // Consecutive notifications always differ
    assert!(log.windows(2).all(|pair| pair[0] != pair[1]));

    tracker.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_recording_file_drives_tracker() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("session.jsonl");

    let mut frames = vec![None, None];
    frames.extend(std::iter::repeat(Some(mouth(0.0, 0.5, 0.0, 0.2))).take(8));
    LandmarkRecording::new(frames).save(&path).expect("Failed to save recording");

    let recording = LandmarkRecording::load(&path).expect("Failed to load recording");
    let (tracker, log) = tracker_with_log(recording, TrackerConfig::default());

    run(&tracker).await;
    sleep(Duration::from_millis(1050)).await;

    assert_eq!(*log.lock().unwrap(), vec![Vowel::I]);
    assert_eq!(tracker.stats().await.frames_processed, 8);
    tracker.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_invalid_frames_keep_loop_running() {
    let broken = LandmarkSet::new(vec![Point3::planar(0.5, 0.5); 100]);
    let recording = LandmarkRecording::new(vec![Some(broken); 5]);
    let config = TrackerConfig {
        debug: true,
        ..Default::default()
    };
    let (tracker, log) = tracker_with_log(recording, config);

    run(&tracker).await;
    sleep(Duration::from_millis(1250)).await;

    let stats = tracker.stats().await;
    assert_eq!(stats.state, TrackerState::Running);
    assert_eq!(stats.frames_processed, 12);
    assert_eq!(stats.transitions, 0);
    assert!(log.lock().unwrap().is_empty());
    assert!(tracker.debug_info().await.is_none());

    tracker.dispose().await;
    assert_eq!(tracker.state().await, TrackerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_trackers_are_independent() {
    let closed = LandmarkRecording::new(vec![Some(mouth(0.008, 0.15, 0.3, 0.04))]);
    let wide = LandmarkRecording::new(vec![Some(mouth(0.0, 0.5, 0.0, 0.2))]);

    let (first, first_log) = tracker_with_log(closed, TrackerConfig::default());
    let (second, second_log) = tracker_with_log(wide, TrackerConfig::default());

    run(&first).await;
    run(&second).await;
    sleep(Duration::from_millis(550)).await;

    first.stop().await;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(*first_log.lock().unwrap(), vec![Vowel::Closed]);
    assert_eq!(*second_log.lock().unwrap(), vec![Vowel::I]);
    assert_eq!(first.state().await, TrackerState::Stopped);
    assert_eq!(second.state().await, TrackerState::Running);
    assert_eq!(first.stats().await.frames_processed, 5);
    assert_eq!(second.stats().await.frames_processed, 8);

    first.dispose().await;
    second.dispose().await;
}

#[test]
fn test_detection_latency() {
    let detector = VowelDetector::new();
    let shapes: Vec<LandmarkSet> = demo_shapes()
        .iter()
        .map(|(_, f)| LandmarkSet::from_features(f))
        .collect();

    let start = Instant::now();
    let iterations = 6_000;
    for i in 0..iterations {
        detector
            .detect(&shapes[i % shapes.len()])
            .expect("Detection failed");
    }
    let avg = start.elapsed() / iterations as u32;

    println!("Average detection latency: {:?}", avg);

    // A tick budget is 100ms; a single classification is far below that
    assert!(avg.as_millis() < 5, "Detection too slow: {:?} per frame", avg);
}
