use super::interface::FrameSource;
use super::slot::FrameSlot;
use super::worker::CaptureWorker;
use crate::config::CameraConfig;
use crate::error::{MonitorError, Result};
use crate::events::EventBus;
use std::sync::Arc;

/// Builder for the capture worker
pub struct CaptureWorkerBuilder {
    config: Option<CameraConfig>,
    source: Option<Box<dyn FrameSource>>,
    slot: Option<Arc<FrameSlot>>,
    event_bus: Option<EventBus>,
}

impl CaptureWorkerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            source: None,
            slot: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: CameraConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use this source instead of the configured device
    pub fn source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn slot(mut self, slot: Arc<FrameSlot>) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<CaptureWorker> {
        let config = self
            .config
            .ok_or_else(|| MonitorError::system("Camera configuration must be specified"))?;
        let slot = self
            .slot
            .ok_or_else(|| MonitorError::system("Frame slot must be specified"))?;

        let source = match self.source {
            Some(source) => source,
            None => default_frame_source(&config),
        };

        let worker = CaptureWorker::new(
            source,
            slot,
            config.frame_interval(),
            config.reconnect_policy(),
        );

        Ok(match self.event_bus {
            Some(bus) => worker.with_event_bus(bus),
            None => worker,
        })
    }
}

impl Default for CaptureWorkerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The frame source for this build: the V4L2 device when camera support is
/// compiled in, otherwise a synthetic source.
#[cfg(all(feature = "camera", target_os = "linux"))]
pub fn default_frame_source(config: &CameraConfig) -> Box<dyn FrameSource> {
    Box::new(super::interface::GstCamera::new(config.clone()))
}

#[cfg(not(all(feature = "camera", target_os = "linux")))]
pub fn default_frame_source(config: &CameraConfig) -> Box<dyn FrameSource> {
    tracing::warn!(
        "Built without camera support; using a synthetic source for camera {}",
        config.index
    );
    Box::new(super::synthetic::SyntheticCamera::new(config))
}
