use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a record is delivered
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DispatchTarget {
    /// Confirmation sound on this machine
    LocalAudio,
    /// One Bark device
    Remote { key: String },
}

/// First five characters of a device key followed by `***`
pub fn mask_key(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{}***", prefix)
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchTarget::LocalAudio => f.write_str("audio"),
            DispatchTarget::Remote { key } => write!(f, "bark:{}", mask_key(key)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DispatchOutcome {
    Delivered { attempts: u32 },
    FailedAfterRetries { attempts: u32, last_error: String },
}

/// Outcome of delivering one record to one target. The target is stored in
/// its masked form so results can be logged and published freely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    pub target: String,
    pub outcome: DispatchOutcome,
    pub latency: Duration,
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DispatchOutcome::Delivered { .. })
    }

    pub fn attempts(&self) -> u32 {
        match &self.outcome {
            DispatchOutcome::Delivered { attempts } => *attempts,
            DispatchOutcome::FailedAfterRetries { attempts, .. } => *attempts,
        }
    }
}
