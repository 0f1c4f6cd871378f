use crate::camera::FrameSlot;
use crate::error::InferenceError;
use crate::events::{EventBus, MonitorEvent};
use crate::frame::FrameData;
use crate::gesture::RawClassification;
use crate::inference::InferenceAdapter;
use crate::notify::NotificationDispatcher;
use crate::router::{ActivityRecord, EventRouter};
use crate::stabilizer::GestureStabilizer;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counters kept by the detection loop
#[derive(Debug, Default)]
pub struct PipelineStats {
    pub frames_processed: AtomicU64,
    pub inference_errors: AtomicU64,
    pub inference_timeouts: AtomicU64,
    pub events_detected: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    pub frames_processed: u64,
    pub inference_errors: u64,
    pub inference_timeouts: u64,
    pub events_detected: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            inference_timeouts: self.inference_timeouts.load(Ordering::Relaxed),
            events_detected: self.events_detected.load(Ordering::Relaxed),
        }
    }
}

/// The single consumer of captured frames: classify, stabilize, route and
/// hand records to the dispatcher, one frame at a time and in order.
pub struct DetectionPipeline {
    slot: Arc<FrameSlot>,
    inference: InferenceAdapter,
    stabilizer: GestureStabilizer,
    router: EventRouter,
    dispatcher: NotificationDispatcher,
    event_bus: EventBus,
    stats: Arc<PipelineStats>,
}

impl DetectionPipeline {
    pub fn new(
        slot: Arc<FrameSlot>,
        inference: InferenceAdapter,
        stabilizer: GestureStabilizer,
        router: EventRouter,
        dispatcher: NotificationDispatcher,
        event_bus: EventBus,
    ) -> Self {
        Self {
            slot,
            inference,
            stabilizer,
            router,
            dispatcher,
            event_bus,
            stats: Arc::new(PipelineStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.stats)
    }

    /// Consume frames until cancelled. Nothing in here is fatal.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Detection pipeline started ({})", self.inference.describe());

        loop {
            let frame = tokio::select! {
                _ = cancel.cancelled() => break,
                frame = self.slot.take() => frame,
            };
            self.process_frame(frame).await;
        }

        let snapshot = self.stats.snapshot();
        let stabilizer = self.stabilizer.stats();
        info!(
            "Detection pipeline stopped: {} frames, {} inference errors ({} timeouts), {} events, {} filtered",
            snapshot.frames_processed,
            snapshot.inference_errors,
            snapshot.inference_timeouts,
            snapshot.events_detected,
            stabilizer.rejected_area + stabilizer.rejected_label + stabilizer.rejected_confidence
        );
    }

    /// Run one frame through the pipeline; returns the record it produced
    pub async fn process_frame(&mut self, frame: FrameData) -> Option<ActivityRecord> {
        self.stats.frames_processed.fetch_add(1, Ordering::Relaxed);
        let frame_id = frame.id;
        let captured_at = frame.timestamp;
        debug!("Classifying frame {} ({} ms old)", frame_id, frame.age().as_millis());

        // A failed frame still votes, as "no gesture"
        let raw = match self.inference.classify(frame).await {
            Ok(raw) => raw,
            Err(e) => {
                self.stats.inference_errors.fetch_add(1, Ordering::Relaxed);
                match e {
                    InferenceError::Timeout { .. } => {
                        self.stats.inference_timeouts.fetch_add(1, Ordering::Relaxed);
                        warn!("Inference timeout, skipping frame {}", frame_id);
                    }
                    other => error!("Inference failed on frame {}: {}", frame_id, other),
                }
                RawClassification::none(frame_id, captured_at)
            }
        };

        let event = self.stabilizer.observe(&raw)?;
        self.stats.events_detected.fetch_add(1, Ordering::Relaxed);

        self.event_bus.publish(MonitorEvent::GestureDetected {
            gesture: event.gesture,
            area: event.area,
            confidence: event.confidence,
            timestamp: event.timestamp,
        });

        let record = self.router.route(&event);
        info!(target: "activity", "✅ Event: {}", record.message);
        debug!(
            "Record {} from {} (area {:.4}, confidence {:.2}, state {:?})",
            record.id,
            event.gesture,
            event.area,
            event.confidence,
            self.router.state()
        );

        self.event_bus.publish(MonitorEvent::ActivityRecorded {
            record: record.clone(),
        });
        self.dispatcher.dispatch(record.clone());

        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StabilizerConfig;
    use crate::error::InferenceError;
    use crate::frame::FrameFormat;
    use crate::inference::{GestureClassifier, ScriptEntry, ScriptedClassifier};
    use crate::router::ActivityKind;
    use std::time::{Duration, SystemTime};

    struct FailingClassifier;

    impl GestureClassifier for FailingClassifier {
        fn describe(&self) -> String {
            "failing classifier".to_string()
        }

        fn classify(&self, _frame: &FrameData) -> Result<RawClassification, InferenceError> {
            Err(InferenceError::Failed {
                details: "model crashed".to_string(),
            })
        }
    }

    /// Reports Victory except on the listed frames, where the model fails
    struct FlakyClassifier(Vec<u64>);

    impl GestureClassifier for FlakyClassifier {
        fn describe(&self) -> String {
            "flaky classifier".to_string()
        }

        fn classify(&self, frame: &FrameData) -> Result<RawClassification, InferenceError> {
            if self.0.contains(&frame.id) {
                return Err(InferenceError::Failed {
                    details: "model crashed".to_string(),
                });
            }
            Ok(RawClassification {
                label: "Victory".to_string(),
                confidence: 0.9,
                area: 5000.0,
                frame_id: frame.id,
                timestamp: frame.timestamp,
            })
        }
    }

    fn frame(id: u64) -> FrameData {
        FrameData::new(id, SystemTime::now(), vec![0xFF, 0xD8], 640, 480, FrameFormat::Mjpeg)
    }

    fn pipeline(classifier: Arc<dyn GestureClassifier>, bus: EventBus) -> DetectionPipeline {
        DetectionPipeline::new(
            Arc::new(FrameSlot::new()),
            InferenceAdapter::new(classifier, Duration::from_secs(1)),
            GestureStabilizer::new(StabilizerConfig {
                min_area: 1000.0,
                min_confidence: 0.5,
                window_size: 6,
                min_votes: 4,
                cooldown_seconds: 30,
            }),
            EventRouter::new(Some(chrono_tz::UTC)),
            NotificationDispatcher::new(Vec::new()),
            bus,
        )
    }

    #[tokio::test]
    async fn test_victory_held_produces_one_diaper_record() {
        let bus = EventBus::new(32);
        let mut events = bus.subscribe();
        let classifier = ScriptedClassifier::new(vec![ScriptEntry::new("Victory", 0.9, 5000.0, 6)]);
        let mut pipeline = pipeline(Arc::new(classifier), bus);

        let mut records = Vec::new();
        for id in 0..6 {
            records.extend(pipeline.process_frame(frame(id)).await);
        }

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ActivityKind::DiaperChange);
        assert_eq!(pipeline.stats().snapshot().events_detected, 1);

        let types: Vec<&str> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|e| e.event_type())
            .collect();
        assert_eq!(types, vec!["gesture_detected", "activity_recorded"]);
    }

    #[tokio::test]
    async fn test_small_hand_produces_nothing() {
        let classifier = ScriptedClassifier::new(vec![ScriptEntry::new("Thumb_Up", 0.9, 500.0, 5)]);
        let mut pipeline = pipeline(Arc::new(classifier), EventBus::new(8));

        for id in 0..5 {
            assert!(pipeline.process_frame(frame(id)).await.is_none());
        }
        assert_eq!(pipeline.stats().snapshot().frames_processed, 5);
    }

    #[tokio::test]
    async fn test_inference_errors_skip_frames() {
        let mut pipeline = pipeline(Arc::new(FailingClassifier), EventBus::new(8));

        for id in 0..3 {
            assert!(pipeline.process_frame(frame(id)).await.is_none());
        }
        let snapshot = pipeline.stats().snapshot();
        assert_eq!(snapshot.inference_errors, 3);
        assert_eq!(snapshot.inference_timeouts, 0);
    }

    #[tokio::test]
    async fn test_failed_frames_count_as_no_gesture() {
        // Three good votes, four failures, one more good vote: only 2 of
        // the last 6 frames hold Victory
        let mut pipeline = pipeline(Arc::new(FlakyClassifier(vec![3, 4, 5, 6])), EventBus::new(8));

        let mut records = Vec::new();
        for id in 0..8 {
            records.extend(pipeline.process_frame(frame(id)).await);
        }
        assert!(records.is_empty());
        assert_eq!(pipeline.stats().snapshot().inference_errors, 4);

        // Holding on afterwards fires as usual
        for id in 8..11 {
            records.extend(pipeline.process_frame(frame(id)).await);
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ActivityKind::DiaperChange);
    }

    #[tokio::test]
    async fn test_run_consumes_slot_until_cancelled() {
        let classifier = ScriptedClassifier::new(vec![ScriptEntry::new("Open_Palm", 0.9, 5000.0, 10)]);
        let pipeline = pipeline(Arc::new(classifier), EventBus::new(8));
        let slot = Arc::clone(&pipeline.slot);
        let stats = pipeline.stats();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(pipeline.run(cancel.clone()));

        for id in 0..5 {
            slot.publish(frame(id));
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_processed, 5);
        assert_eq!(snapshot.events_detected, 1);
    }
}
