use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::debug;

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    /// A component failed beyond recovery
    Fatal(String),
    UserRequest,
}

impl ShutdownReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ShutdownReason::Fatal(_))
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(signal) => write!(f, "received {}", signal),
            ShutdownReason::Fatal(error) => write!(f, "fatal error: {}", error),
            ShutdownReason::UserRequest => f.write_str("user request"),
        }
    }
}

/// One-shot shutdown request shared by signal handlers and components.
/// Only the first request wins.
#[derive(Clone)]
pub struct ShutdownTrigger {
    sender: Arc<Mutex<Option<oneshot::Sender<ShutdownReason>>>>,
}

impl ShutdownTrigger {
    pub fn new() -> (Self, oneshot::Receiver<ShutdownReason>) {
        let (sender, receiver) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            receiver,
        )
    }

    /// Request shutdown; returns false if one was already requested
    pub fn fire(&self, reason: ShutdownReason) -> bool {
        match self.sender.lock().take() {
            Some(sender) => sender.send(reason).is_ok(),
            None => {
                debug!("Shutdown already requested, ignoring {}", reason);
                false
            }
        }
    }
}
