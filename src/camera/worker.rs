use super::interface::FrameSource;
use super::slot::FrameSlot;
use super::stats::CaptureStats;
use super::throttle::Throttle;
use crate::error::{CameraError, MonitorError, Result};
use crate::events::{EventBus, MonitorEvent};
use crate::recovery::{CaptureRecovery, RecoveryAction, RecoveryConfig};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Reads frames from a source, throttles them to the inference rate and hands
/// the survivors to the frame slot. Owns reconnection after device failures.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    slot: Arc<FrameSlot>,
    stats: Arc<CaptureStats>,
    throttle: Throttle,
    recovery: CaptureRecovery,
    event_bus: Option<EventBus>,
}

impl CaptureWorker {
    pub fn new(
        source: Box<dyn FrameSource>,
        slot: Arc<FrameSlot>,
        frame_interval: Duration,
        reconnect_policy: RecoveryConfig,
    ) -> Self {
        Self {
            source,
            slot,
            stats: Arc::new(CaptureStats::default()),
            throttle: Throttle::new(frame_interval),
            recovery: CaptureRecovery::new(reconnect_policy),
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        Arc::clone(&self.stats)
    }

    /// Run until cancelled, or until the device cannot be recovered.
    ///
    /// Returns `RecoveryFailed` when reconnection is exhausted; the caller
    /// treats that as fatal.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        info!(
            "Capture worker starting: {} (1 frame per {:?})",
            self.source.describe(),
            self.throttle.interval()
        );

        let result = self.capture_loop(&cancel).await;

        self.source.close().await;
        self.set_connected(false);

        let snapshot = self.stats.snapshot();
        info!(
            "Capture worker stopped: {} captured, {} delivered, {} dropped, {} errors, {} reconnects",
            snapshot.frames_captured,
            snapshot.frames_delivered,
            snapshot.frames_dropped,
            snapshot.capture_errors,
            snapshot.reconnects
        );

        result
    }

    async fn capture_loop(&mut self, cancel: &CancellationToken) -> Result<()> {
        if let Err(e) = self.source.open().await {
            self.stats.capture_errors.fetch_add(1, Ordering::Relaxed);
            if !self.recover(e, cancel).await? {
                return Ok(());
            }
        } else {
            self.set_connected(true);
        }

        loop {
            let wait = self.throttle.wait_time(Instant::now());
            if !wait.is_zero() {
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(wait) => {}
                }
            }

            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                read = self.source.read_frame() => read,
            };

            match read {
                Ok(frame) => {
                    self.recovery.reset();
                    self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);

                    if self.throttle.admit(Instant::now()) {
                        trace!("Frame {} admitted", frame.id);
                        self.slot.publish(frame);
                        self.stats.frames_delivered.fetch_add(1, Ordering::Relaxed);
                    } else {
                        self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(e) => {
                    self.stats.capture_errors.fetch_add(1, Ordering::Relaxed);
                    if !self.recover(e, cancel).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Close and reopen the source until it works again.
    ///
    /// `Ok(true)` means the device is back, `Ok(false)` means cancellation
    /// arrived while waiting.
    async fn recover(&mut self, error: CameraError, cancel: &CancellationToken) -> Result<bool> {
        let mut error = error;
        self.source.close().await;
        self.set_connected(false);

        loop {
            let delay = match self.recovery.handle_failure(&error) {
                RecoveryAction::RetryAfterDelay(delay) => delay,
                RecoveryAction::Shutdown => {
                    let attempts = self.recovery.consecutive_failures();
                    if let Some(bus) = &self.event_bus {
                        bus.publish(MonitorEvent::SystemError {
                            component: "camera".to_string(),
                            error: error.to_string(),
                        });
                    }
                    return Err(MonitorError::recovery_failed("camera", attempts));
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(delay) => {}
            }

            debug!("Reopening {}", self.source.describe());
            match self.source.open().await {
                Ok(()) => {
                    self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                    self.set_connected(true);
                    return Ok(true);
                }
                Err(e) => {
                    warn!("Camera reopen failed: {}", e);
                    self.stats.capture_errors.fetch_add(1, Ordering::Relaxed);
                    error = e;
                }
            }
        }
    }

    fn set_connected(&self, connected: bool) {
        let previous = self.stats.connected.swap(connected, Ordering::Relaxed);
        if previous == connected {
            return;
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(MonitorEvent::CameraStatusChanged {
                connected,
                timestamp: SystemTime::now(),
            });
        }
    }
}
