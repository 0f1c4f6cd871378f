use crate::error::CameraError;
use std::time::Duration;
use tracing::{error, info, warn};

/// Recovery action to take after an error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// Retry after a delay
    RetryAfterDelay(Duration),
    /// Give up and stop the system
    Shutdown,
}

/// Retry schedule shared by capture reconnects and push deliveries
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay for exponential backoff
    pub base_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to use exponential backoff
    pub exponential_backoff: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            exponential_backoff: true,
        }
    }
}

impl RecoveryConfig {
    /// A schedule that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            exponential_backoff: false,
        }
    }

    /// Delay before retry number `retry_count` (zero based)
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        if !self.exponential_backoff {
            return self.base_delay;
        }

        let factor = 2_u32.saturating_pow(retry_count.min(16));
        let delay = self.base_delay.saturating_mul(factor);

        if delay > self.max_delay {
            self.max_delay
        } else {
            delay
        }
    }

    /// Total number of attempts including the first one
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Tracks consecutive capture failures and decides when to give up
pub struct CaptureRecovery {
    config: RecoveryConfig,
    consecutive_failures: u32,
}

impl CaptureRecovery {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            config,
            consecutive_failures: 0,
        }
    }

    /// Handle a capture error and determine the recovery action
    pub fn handle_failure(&mut self, error: &CameraError) -> RecoveryAction {
        if !error.is_recoverable() {
            error!("Non-recoverable camera error: {}", error);
            return RecoveryAction::Shutdown;
        }

        self.consecutive_failures += 1;

        if self.consecutive_failures >= self.config.max_retries {
            error!(
                "Camera failed {} consecutive times, giving up: {}",
                self.consecutive_failures, error
            );
            return RecoveryAction::Shutdown;
        }

        let delay = self.config.delay_for(self.consecutive_failures - 1);

        match error {
            CameraError::Disconnected => {
                warn!("Camera disconnected, will attempt reconnection in {:?}", delay)
            }
            CameraError::FrameTimeout { timeout } => {
                warn!("Camera frame timeout after {:?}, retrying in {:?}", timeout, delay)
            }
            _ => warn!(
                "Camera error (attempt {}/{}): {}, retrying in {:?}",
                self.consecutive_failures, self.config.max_retries, error, delay
            ),
        }

        RecoveryAction::RetryAfterDelay(delay)
    }

    /// Reset after a successful read
    pub fn reset(&mut self) {
        if self.consecutive_failures > 0 {
            info!(
                "Camera recovered after {} failed attempts",
                self.consecutive_failures
            );
        }
        self.consecutive_failures = 0;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
