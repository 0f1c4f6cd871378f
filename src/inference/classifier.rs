use crate::error::InferenceError;
use crate::frame::FrameData;
use crate::gesture::RawClassification;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A gesture model consumed as a black box.
///
/// `classify` is synchronous and may block for as long as the model takes;
/// callers run it off the async executor.
pub trait GestureClassifier: Send + Sync {
    /// Short description used in logs
    fn describe(&self) -> String;

    /// Classify a single frame
    fn classify(&self, frame: &FrameData) -> Result<RawClassification, InferenceError>;

    /// Called when a `classify` call ran past its deadline and was given up
    /// on. Backends holding an external worker should reset it here.
    fn abandon(&self) {}
}

/// Runs a classifier on the blocking pool with a per-call timeout
#[derive(Clone)]
pub struct InferenceAdapter {
    classifier: Arc<dyn GestureClassifier>,
    timeout: Duration,
}

impl InferenceAdapter {
    pub fn new(classifier: Arc<dyn GestureClassifier>, timeout: Duration) -> Self {
        Self {
            classifier,
            timeout,
        }
    }

    pub fn describe(&self) -> String {
        self.classifier.describe()
    }

    /// Classify a frame. A call that exceeds the timeout is abandoned and
    /// reported as `InferenceError::Timeout`.
    pub async fn classify(&self, frame: FrameData) -> Result<RawClassification, InferenceError> {
        let classifier = Arc::clone(&self.classifier);
        let frame_id = frame.id;
        let task = tokio::task::spawn_blocking(move || classifier.classify(&frame));

        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => {
                if let Ok(raw) = &result {
                    debug!(
                        "Frame {}: {} ({:.2}, area {:.4})",
                        frame_id,
                        raw.label,
                        raw.confidence,
                        raw.area
                    );
                }
                result
            }
            Ok(Err(join_error)) => Err(InferenceError::Failed {
                details: format!("Classifier task panicked: {}", join_error),
            }),
            Err(_) => {
                self.classifier.abandon();
                Err(InferenceError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }
}
