use super::types::{ComponentState, ShutdownReason, ShutdownTrigger};
use crate::camera::{
    default_frame_source, CaptureStats, CaptureWorker, CaptureWorkerBuilder, FrameSlot,
    FrameSource,
};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::events::EventBus;
use crate::inference::{classifier_from_config, GestureClassifier, InferenceAdapter};
use crate::notify::NotificationDispatcher;
use crate::pipeline::{DetectionPipeline, PipelineStats};
use crate::router::EventRouter;
use crate::stabilizer::GestureStabilizer;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Owns the capture, detection and dispatch components and their lifecycle
pub struct MonitorOrchestrator {
    pub(super) config: MonitorConfig,
    pub(super) event_bus: EventBus,

    // Components, moved into their tasks on start
    pub(super) capture_worker: Option<CaptureWorker>,
    pub(super) pipeline: Option<DetectionPipeline>,
    pub(super) dispatcher: NotificationDispatcher,
    pub(super) capture_stats: Arc<CaptureStats>,
    pub(super) pipeline_stats: Arc<PipelineStats>,

    // Lifecycle management
    pub(super) capture_task: Option<JoinHandle<Result<()>>>,
    pub(super) pipeline_task: Option<JoinHandle<()>>,
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_trigger: ShutdownTrigger,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,

    // Failure reporting outlives the components so it sees their last events
    pub(super) report_task: Option<JoinHandle<()>>,
    pub(super) report_stop: CancellationToken,
    pub(super) reported_failures: Arc<AtomicU64>,
}

impl MonitorOrchestrator {
    /// Build every component from configuration. In dry-run mode records are
    /// logged but no notification is sent.
    pub async fn new(config: MonitorConfig, dry_run: bool) -> Result<Self> {
        let source = default_frame_source(&config.camera);
        let classifier = classifier_from_config(&config.inference)?;
        let dispatcher = if dry_run {
            info!("Dry run: notifications disabled");
            NotificationDispatcher::new(Vec::new())
        } else {
            NotificationDispatcher::from_config(&config)?
        };

        Self::with_components(config, source, classifier, dispatcher)
    }

    /// Wire the pipeline around the given source, classifier and dispatcher
    pub fn with_components(
        config: MonitorConfig,
        source: Box<dyn FrameSource>,
        classifier: Arc<dyn GestureClassifier>,
        dispatcher: NotificationDispatcher,
    ) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let slot = Arc::new(FrameSlot::new());

        let capture_worker = CaptureWorkerBuilder::new()
            .config(config.camera.clone())
            .source(source)
            .slot(Arc::clone(&slot))
            .event_bus(event_bus.clone())
            .build()?;

        let dispatcher = dispatcher.with_event_bus(event_bus.clone());
        info!(
            "Notification targets: [{}]",
            dispatcher
                .targets()
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let pipeline = DetectionPipeline::new(
            slot,
            InferenceAdapter::new(classifier, config.inference.timeout()),
            GestureStabilizer::new(config.stabilizer.clone()),
            EventRouter::from_config(&config.router)?,
            dispatcher.clone(),
            event_bus.clone(),
        );

        let (shutdown_trigger, shutdown_receiver) = ShutdownTrigger::new();

        Ok(Self {
            capture_stats: capture_worker.stats(),
            pipeline_stats: pipeline.stats(),
            config,
            event_bus,
            capture_worker: Some(capture_worker),
            pipeline: Some(pipeline),
            dispatcher,
            capture_task: None,
            pipeline_task: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_trigger,
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
            report_task: None,
            report_stop: CancellationToken::new(),
            reported_failures: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Handle that can request shutdown from anywhere
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown_trigger.clone()
    }

    pub fn capture_stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.capture_stats)
    }

    pub fn pipeline_stats(&self) -> Arc<PipelineStats> {
        Arc::clone(&self.pipeline_stats)
    }

    /// Failures surfaced to the operator so far
    pub fn reported_failures(&self) -> u64 {
        self.reported_failures.load(Ordering::Relaxed)
    }
}
