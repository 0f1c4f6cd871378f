use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Recovery failed for {component} after {attempts} attempts")]
    RecoveryFailed { component: String, attempts: u32 },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl MonitorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn recovery_failed<S: Into<String>>(component: S, attempts: u32) -> Self {
        Self::RecoveryFailed {
            component: component.into(),
            attempts,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Failed to open camera device {device}: {details}")]
    DeviceOpen { device: String, details: String },

    #[error("Camera disconnected")]
    Disconnected,

    #[error("Capture stream error: {details}")]
    CaptureStream { details: String },

    #[error("No frame received within {timeout:?}")]
    FrameTimeout { timeout: Duration },

    #[error("Camera configuration error: {details}")]
    Configuration { details: String },
}

impl CameraError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CameraError::Configuration { .. })
    }
}

#[derive(Error, Debug, Clone)]
pub enum InferenceError {
    #[error("Classifier unavailable: {details}")]
    Unavailable { details: String },

    #[error("Classifier failed: {details}")]
    Failed { details: String },

    #[error("Classifier did not answer within {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Malformed classifier output: {details}")]
    Protocol { details: String },
}

#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    #[error("Network error: {details}")]
    Network { details: String },

    #[error("Push service answered with status {status}")]
    Status { status: u16 },

    #[error("Audio playback failed: {details}")]
    Audio { details: String },

    #[error("Sound asset not found: {path}")]
    AssetMissing { path: String },
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => DispatchError::Status {
                status: status.as_u16(),
            },
            None => DispatchError::Network {
                details: err.to_string(),
            },
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

pub type Result<T> = std::result::Result<T, MonitorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camera_error_recoverability() {
        assert!(CameraError::Disconnected.is_recoverable());
        assert!(CameraError::FrameTimeout {
            timeout: Duration::from_secs(1)
        }
        .is_recoverable());
        assert!(!CameraError::Configuration {
            details: "bad pipeline".to_string()
        }
        .is_recoverable());
    }

    #[test]
    fn test_monitor_error_wraps_camera_error() {
        let err: MonitorError = CameraError::Disconnected.into();
        assert!(err.to_string().contains("Camera disconnected"));

        let fatal = MonitorError::recovery_failed("camera", 5);
        assert_eq!(
            fatal.to_string(),
            "Recovery failed for camera after 5 attempts"
        );
    }
}
