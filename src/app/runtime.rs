use super::types::ShutdownTrigger;
use super::{MonitorOrchestrator, ShutdownReason};
use crate::error::{MonitorError, Result};
use crate::events::MonitorEvent;
use std::time::SystemTime;
use tracing::{error, info};

impl MonitorOrchestrator {
    /// Run until a signal, a user request or a fatal error; returns the
    /// process exit code
    pub async fn run(&mut self) -> Result<i32> {
        info!("Babycam is running");

        let shutdown_receiver = self
            .shutdown_receiver
            .take()
            .ok_or_else(|| MonitorError::system("Shutdown receiver already taken"))?;

        Self::setup_signal_handlers(self.shutdown_trigger.clone());

        let shutdown_reason = shutdown_receiver
            .await
            .map_err(|_| MonitorError::system("Shutdown channel closed unexpectedly"))?;

        info!("Shutdown initiated: {}", shutdown_reason);
        self.event_bus.publish(MonitorEvent::ShutdownRequested {
            timestamp: SystemTime::now(),
            reason: shutdown_reason.to_string(),
        });

        let exit_code = self.shutdown(&shutdown_reason).await?;

        info!("Babycam shutdown complete");
        Ok(exit_code)
    }

    /// Request a graceful shutdown
    pub fn request_shutdown(&self) {
        self.shutdown_trigger.fire(ShutdownReason::UserRequest);
    }

    fn setup_signal_handlers(trigger: ShutdownTrigger) {
        // SIGTERM (systemd stop), Unix only
        #[cfg(unix)]
        {
            let trigger = trigger.clone();
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};

                let mut sigterm = match signal(SignalKind::terminate()) {
                    Ok(sigterm) => sigterm,
                    Err(e) => {
                        error!("Failed to register SIGTERM handler: {}", e);
                        return;
                    }
                };
                if sigterm.recv().await.is_some() {
                    info!("Received SIGTERM signal");
                    trigger.fire(ShutdownReason::Signal("SIGTERM".to_string()));
                }
            });
        }

        // SIGINT (Ctrl+C)
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received SIGINT signal (Ctrl+C)");
                trigger.fire(ShutdownReason::Signal("SIGINT".to_string()));
            }
        });
    }
}
