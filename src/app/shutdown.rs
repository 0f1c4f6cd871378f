use super::state::COMPONENTS;
use super::{ComponentState, MonitorOrchestrator, ShutdownReason};
use crate::error::{MonitorError, Result};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

const TASK_STOP_TIMEOUT: Duration = Duration::from_secs(5);

impl MonitorOrchestrator {
    /// Stop capture, then the pipeline, then give in-flight notifications
    /// the configured grace period. Returns the process exit code.
    pub async fn shutdown(&mut self, reason: &ShutdownReason) -> Result<i32> {
        info!("Beginning graceful shutdown");

        self.cancellation_token.cancel();

        let mut exit_code = if reason.is_fatal() { 1 } else { 0 };

        // Reverse start order: capture stops feeding before the pipeline stops
        for component in COMPONENTS.iter().rev() {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        // Dispatch has drained; report whatever it published last
        self.report_stop.cancel();
        if let Some(handle) = self.report_task.take() {
            if timeout(TASK_STOP_TIMEOUT, handle).await.is_err() {
                warn!("Failure report did not finish in time");
            }
        }

        let capture = self.capture_stats.snapshot();
        let pipeline = self.pipeline_stats.snapshot();
        info!(
            "Session totals: {} frames captured, {} classified, {} events, {} failures reported",
            capture.frames_captured,
            pipeline.frames_processed,
            pipeline.events_detected,
            self.reported_failures()
        );

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    async fn stop_component(&mut self, component: &str) -> Result<()> {
        if self.get_component_state(component).await == Some(ComponentState::Failed) {
            // Already reported; the task only needs reaping
            if component == "camera" {
                if let Some(handle) = self.capture_task.take() {
                    let _ = timeout(TASK_STOP_TIMEOUT, handle).await;
                }
            }
            return Err(MonitorError::component(component, "failed while running"));
        }

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        let result = match component {
            "camera" => match self.capture_task.take() {
                Some(handle) => join_within(component, handle).await.and_then(|r| r),
                None => Ok(()),
            },
            "pipeline" => match self.pipeline_task.take() {
                Some(handle) => join_within(component, handle).await,
                None => Ok(()),
            },
            "dispatcher" => {
                let grace = self.config.system.shutdown_grace();
                if !self.dispatcher.shutdown(grace).await {
                    warn!("Undelivered notifications were dropped");
                }
                Ok(())
            }
            other => Err(MonitorError::system(format!("Unknown component '{}'", other))),
        };

        let state = if result.is_ok() {
            info!("{} component stopped", component);
            ComponentState::Stopped
        } else {
            ComponentState::Failed
        };
        self.set_component_state(component, state).await;
        result
    }
}

async fn join_within<T>(component: &str, handle: JoinHandle<T>) -> Result<T> {
    match timeout(TASK_STOP_TIMEOUT, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(MonitorError::component(
            component.to_string(),
            format!("task panicked: {}", e),
        )),
        Err(_) => Err(MonitorError::component(
            component.to_string(),
            "stop timeout".to_string(),
        )),
    }
}
