use super::target::DispatchTarget;
use crate::error::DispatchError;
use crate::recovery::RecoveryConfig;
use crate::router::ActivityRecord;
use async_trait::async_trait;

/// One independent delivery path for activity records
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn target(&self) -> DispatchTarget;

    /// Retry schedule for failed deliveries; defaults to a single attempt
    fn retry_policy(&self) -> RecoveryConfig {
        RecoveryConfig::no_retry()
    }

    /// Deliver a record once
    async fn deliver(&self, record: &ActivityRecord) -> Result<(), DispatchError>;
}
