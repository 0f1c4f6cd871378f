use super::report::report_failures;
use super::state::COMPONENTS;
use super::types::ShutdownReason;
use super::{ComponentState, MonitorOrchestrator};
use crate::error::{MonitorError, Result};
use crate::events::{EventFilter, MonitorEvent};
use std::sync::Arc;
use tracing::{error, info};

impl MonitorOrchestrator {
    /// Register all components as stopped
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing babycam components");

        for component in COMPONENTS {
            self.set_component_state(component, ComponentState::Stopped)
                .await;
        }

        Ok(())
    }

    /// Start the dispatcher, the detection pipeline and then capture
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting babycam");

        if self.report_task.is_none() {
            let events = self
                .event_bus
                .subscribe_filtered(EventFilter::Failures, "failure-report");
            self.report_task = Some(tokio::spawn(report_failures(
                events,
                Arc::clone(&self.reported_failures),
                self.report_stop.clone(),
            )));
        }

        // Dispatch tasks are spawned on demand
        self.set_component_state("dispatcher", ComponentState::Running)
            .await;

        let pipeline = self
            .pipeline
            .take()
            .ok_or_else(|| MonitorError::system("Detection pipeline already started"))?;
        self.set_component_state("pipeline", ComponentState::Starting)
            .await;
        let cancel = self.cancellation_token.child_token();
        self.pipeline_task = Some(tokio::spawn(pipeline.run(cancel)));
        self.set_component_state("pipeline", ComponentState::Running)
            .await;

        let worker = self
            .capture_worker
            .take()
            .ok_or_else(|| MonitorError::system("Capture worker already started"))?;
        self.set_component_state("camera", ComponentState::Starting)
            .await;

        // Running before the task exists, so a fast failure is not overwritten
        self.set_component_state("camera", ComponentState::Running)
            .await;
        let cancel = self.cancellation_token.child_token();
        let trigger = self.shutdown_trigger.clone();
        let event_bus = self.event_bus.clone();
        let states = Arc::clone(&self.component_states);
        self.capture_task = Some(tokio::spawn(async move {
            let result = worker.run(cancel).await;
            if let Err(e) = &result {
                error!("Capture failed: {}", e);
                states
                    .lock()
                    .await
                    .insert("camera".to_string(), ComponentState::Failed);
                event_bus.publish(MonitorEvent::SystemError {
                    component: "camera".to_string(),
                    error: e.to_string(),
                });
                trigger.fire(ShutdownReason::Fatal(e.to_string()));
            }
            result
        }));

        info!(
            "Watching camera {} at {} fps",
            self.config.camera.index, self.config.camera.target_fps
        );
        Ok(())
    }
}
