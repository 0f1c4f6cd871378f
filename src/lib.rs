pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod events;
pub mod frame;
pub mod gesture;
pub mod inference;
pub mod notify;
pub mod pipeline;
pub mod recovery;
pub mod router;
pub mod stabilizer;

#[cfg(test)]
mod test_support;

pub use app::{ComponentState, MonitorOrchestrator, ShutdownReason, ShutdownTrigger};
pub use camera::{CaptureStats, CaptureWorker, CaptureWorkerBuilder, FrameSlot, FrameSource};
pub use config::MonitorConfig;
pub use error::{CameraError, DispatchError, InferenceError, MonitorError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, MonitorEvent};
pub use frame::{FrameData, FrameFormat};
pub use gesture::{BoundingBox, DetectedEvent, Gesture, RawClassification};
pub use inference::{GestureClassifier, InferenceAdapter};
pub use notify::{DispatchResult, DispatchTarget, NotificationChannel, NotificationDispatcher};
pub use pipeline::{DetectionPipeline, PipelineStats};
pub use recovery::{CaptureRecovery, RecoveryAction, RecoveryConfig};
pub use router::{ActivityKind, ActivityRecord, BabyState, EventRouter};
pub use stabilizer::GestureStabilizer;
