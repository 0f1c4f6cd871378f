use super::*;
use crate::config::StabilizerConfig;
use crate::gesture::{Gesture, RawClassification, NO_GESTURE};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn config(min_area: f64, window_size: usize, min_votes: usize) -> StabilizerConfig {
    StabilizerConfig {
        min_area,
        min_confidence: 0.5,
        window_size,
        min_votes,
        cooldown_seconds: 30,
    }
}

/// Feeds frames at 10 per second starting from a fixed epoch
struct Feed {
    stabilizer: GestureStabilizer,
    frame: u64,
}

impl Feed {
    fn new(config: StabilizerConfig) -> Self {
        Self {
            stabilizer: GestureStabilizer::new(config),
            frame: 0,
        }
    }

    fn at(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_800_000_000) + Duration::from_millis(100 * self.frame)
    }

    fn skip(&mut self, duration: Duration) {
        self.frame += (duration.as_millis() / 100) as u64;
    }

    fn push(&mut self, label: &str, confidence: f32, area: f64, times: usize) -> Vec<DetectedEventSummary> {
        let mut events = Vec::new();
        for _ in 0..times {
            let raw = RawClassification {
                label: label.to_string(),
                confidence,
                area,
                frame_id: self.frame,
                timestamp: self.at(),
            };
            if let Some(event) = self.stabilizer.observe(&raw) {
                events.push(DetectedEventSummary {
                    gesture: event.gesture,
                    frame: self.frame,
                });
            }
            self.frame += 1;
        }
        events
    }
}

#[derive(Debug, PartialEq)]
struct DetectedEventSummary {
    gesture: Gesture,
    frame: u64,
}

#[test]
fn test_below_minimum_area_never_fires() {
    let mut feed = Feed::new(config(1000.0, 5, 3));
    let events = feed.push("Thumb_Up", 0.95, 500.0, 5);

    assert!(events.is_empty());
    assert_eq!(feed.stabilizer.stats().rejected_area, 5);
}

#[test]
fn test_held_gesture_fires_once_when_votes_reached() {
    let mut feed = Feed::new(config(1000.0, 6, 4));
    let events = feed.push("Victory", 0.9, 5000.0, 6);

    assert_eq!(
        events,
        vec![DetectedEventSummary {
            gesture: Gesture::Victory,
            frame: 3,
        }]
    );
    assert_eq!(feed.stabilizer.active(), Some(Gesture::Victory));
}

#[test]
fn test_detected_event_carries_triggering_observation() {
    let mut stabilizer = GestureStabilizer::new(config(0.1, 3, 2));
    let ts = UNIX_EPOCH + Duration::from_secs(1_800_000_000);
    let raw = RawClassification {
        label: "Closed_Fist".to_string(),
        confidence: 0.8,
        area: 0.3,
        frame_id: 1,
        timestamp: ts,
    };

    assert!(stabilizer.observe(&raw).is_none());
    let event = stabilizer.observe(&raw).unwrap();
    assert_eq!(event.gesture, Gesture::ClosedFist);
    assert_eq!(event.timestamp, ts);
    assert!((event.area - 0.3).abs() < 1e-9);
    assert!((event.confidence - 0.8).abs() < f32::EPSILON);
}

#[test]
fn test_holding_past_cooldown_does_not_refire() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    // 60 seconds of the same pose at 10 fps
    let events = feed.push("Thumb_Up", 0.9, 0.3, 600);

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].gesture, Gesture::ThumbUp);
}

#[test]
fn test_same_gesture_after_brief_release_is_suppressed_by_cooldown() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    assert_eq!(feed.push("Thumb_Up", 0.9, 0.3, 10).len(), 1);
    assert!(feed.push(NO_GESTURE, 0.0, 0.0, 8).is_empty());
    assert_eq!(feed.stabilizer.active(), None);

    assert!(feed.push("Thumb_Up", 0.9, 0.3, 10).is_empty());
    assert_eq!(feed.stabilizer.stats().suppressed, 1);
}

#[test]
fn test_same_gesture_after_cooldown_fires_again() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    assert_eq!(feed.push("Open_Palm", 0.9, 0.3, 10).len(), 1);
    assert!(feed.push(NO_GESTURE, 0.0, 0.0, 8).is_empty());

    feed.skip(Duration::from_secs(31));
    assert_eq!(feed.push("Open_Palm", 0.9, 0.3, 10).len(), 1);
}

#[test]
fn test_different_gesture_interrupts_cooldown() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    let first = feed.push("Closed_Fist", 0.9, 0.3, 10);
    let second = feed.push("Open_Palm", 0.9, 0.3, 10);
    let third = feed.push("Closed_Fist", 0.9, 0.3, 10);

    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].gesture, Gesture::OpenPalm);
    // Six consecutive frames flip the 8-slot majority
    assert_eq!(second[0].frame, 15);
    assert_eq!(third.len(), 1);
    assert_eq!(third[0].gesture, Gesture::ClosedFist);
}

#[test]
fn test_partial_window_drains_without_event() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    let mut events = feed.push("Victory", 0.9, 0.3, 5);
    events.extend(feed.push(NO_GESTURE, 0.0, 0.0, 8));

    assert!(events.is_empty());
    assert_eq!(feed.stabilizer.active(), None);
    assert_eq!(feed.stabilizer.stats().emitted, 0);
}

#[test]
fn test_low_confidence_and_unknown_labels_do_not_vote() {
    let mut feed = Feed::new(config(0.15, 4, 3));
    assert!(feed.push("Victory", 0.3, 0.5, 4).is_empty());
    assert!(feed.push("Pointing_Up", 0.99, 0.5, 4).is_empty());

    let stats = feed.stabilizer.stats();
    assert_eq!(stats.rejected_confidence, 4);
    assert_eq!(stats.rejected_label, 4);
    assert_eq!(stats.observed, 8);
}

#[test]
fn test_noisy_frames_still_confirm_majority() {
    let mut feed = Feed::new(config(0.15, 8, 6));
    let mut events = Vec::new();
    for _ in 0..3 {
        events.extend(feed.push("Victory", 0.9, 0.3, 3));
        events.extend(feed.push(NO_GESTURE, 0.0, 0.0, 1));
    }

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].gesture, Gesture::Victory);
}

#[test]
fn test_accept_gates_in_order() {
    let stabilizer = GestureStabilizer::new(config(0.15, 8, 6));
    let ts = SystemTime::now();
    let raw = |label: &str, confidence: f32, area: f64| RawClassification {
        label: label.to_string(),
        confidence,
        area,
        frame_id: 0,
        timestamp: ts,
    };

    assert_eq!(stabilizer.accept(&raw("Victory", 0.9, 0.01)), Err(Rejection::Area));
    assert_eq!(stabilizer.accept(&raw(NO_GESTURE, 0.9, 0.5)), Err(Rejection::Label));
    assert_eq!(stabilizer.accept(&raw("Victory", 0.2, 0.5)), Err(Rejection::Confidence));
    assert_eq!(stabilizer.accept(&raw("Victory", 0.5, 0.15)), Ok(Gesture::Victory));
}

#[test]
fn test_verbose_mode_logs_filter_decisions() {
    use crate::config::LogMode;
    use crate::test_support::CapturedLogs;

    let verbose = CapturedLogs::default();
    tracing::subscriber::with_default(verbose.subscriber(LogMode::Verbose), || {
        let mut feed = Feed::new(config(0.15, 8, 6));
        feed.push("Thumb_Up", 0.9, 0.05, 1);
        feed.push("Pointing_Up", 0.9, 0.4, 1);
    });
    let text = verbose.text();
    assert!(text.contains("filtered (Area): Thumb_Up conf 0.90 area 0.0500"), "{}", text);
    assert!(text.contains("filtered (Label): Pointing_Up"), "{}", text);

    let quiet = CapturedLogs::default();
    tracing::subscriber::with_default(quiet.subscriber(LogMode::Quiet), || {
        let mut feed = Feed::new(config(0.15, 8, 6));
        feed.push("Thumb_Up", 0.9, 0.05, 1);
    });
    assert!(!quiet.text().contains("filtered"));
}
