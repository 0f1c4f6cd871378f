use crate::error::EventBusError;
use crate::gesture::Gesture;
use crate::notify::DispatchResult;
use crate::router::ActivityRecord;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Everything the monitor announces to interested components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A gesture passed the stability filter
    GestureDetected {
        gesture: Gesture,
        area: f64,
        confidence: f32,
        timestamp: SystemTime,
    },
    ActivityRecorded { record: ActivityRecord },
    /// Every target of a record has finished, delivered or not
    DispatchCompleted {
        record_id: String,
        results: Vec<DispatchResult>,
    },
    CameraStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    SystemError { component: String, error: String },
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl MonitorEvent {
    /// Stable snake_case name, used by filters and in tests
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::GestureDetected { .. } => "gesture_detected",
            MonitorEvent::ActivityRecorded { .. } => "activity_recorded",
            MonitorEvent::DispatchCompleted { .. } => "dispatch_completed",
            MonitorEvent::CameraStatusChanged { .. } => "camera_status_changed",
            MonitorEvent::SystemError { .. } => "system_error",
            MonitorEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    /// Errors, lost camera and dispatches where some target gave up
    pub fn is_failure(&self) -> bool {
        match self {
            MonitorEvent::SystemError { .. } => true,
            MonitorEvent::CameraStatusChanged { connected, .. } => !connected,
            MonitorEvent::DispatchCompleted { results, .. } => {
                results.iter().any(|r| !r.is_success())
            }
            _ => false,
        }
    }
}

impl fmt::Display for MonitorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorEvent::GestureDetected {
                gesture,
                area,
                confidence,
                ..
            } => write!(
                f,
                "{} held (area {:.4}, confidence {:.2})",
                gesture, area, confidence
            ),
            MonitorEvent::ActivityRecorded { record } => write!(f, "recorded {}", record.message),
            MonitorEvent::DispatchCompleted { record_id, results } => {
                let delivered = results.iter().filter(|r| r.is_success()).count();
                write!(
                    f,
                    "record {} delivered to {}/{} targets",
                    record_id,
                    delivered,
                    results.len()
                )
            }
            MonitorEvent::CameraStatusChanged { connected: true, .. } => {
                write!(f, "camera online")
            }
            MonitorEvent::CameraStatusChanged { connected: false, .. } => {
                write!(f, "camera offline")
            }
            MonitorEvent::SystemError { component, error } => write!(f, "{}: {}", component, error),
            MonitorEvent::ShutdownRequested { reason, .. } => write!(f, "shutdown ({})", reason),
        }
    }
}

/// Broadcast bus shared by capture, pipeline, dispatcher and orchestrator
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            filter,
            name: name.to_string(),
            lagged: 0,
        }
    }

    /// Publish to all current subscribers; returns how many received it.
    /// An event nobody listens to is dropped.
    pub fn publish(&self, event: MonitorEvent) -> usize {
        // Failures are reported by their subscriber
        match &event {
            MonitorEvent::CameraStatusChanged { connected: true, .. } => info!("{}", event),
            _ => debug!("{}", event),
        }

        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Which events a filtered receiver lets through
#[derive(Debug, Clone)]
pub enum EventFilter {
    All,
    /// Match on [`MonitorEvent::event_type`]
    EventTypes(Vec<&'static str>),
    /// Recorded activities and their delivery outcome
    Activities,
    /// See [`MonitorEvent::is_failure`]
    Failures,
}

impl EventFilter {
    pub fn matches(&self, event: &MonitorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Activities => matches!(
                event,
                MonitorEvent::ActivityRecorded { .. } | MonitorEvent::DispatchCompleted { .. }
            ),
            EventFilter::Failures => event.is_failure(),
        }
    }
}

/// Subscription that skips events its filter rejects
pub struct EventReceiver {
    receiver: broadcast::Receiver<MonitorEvent>,
    filter: EventFilter,
    name: String,
    lagged: u64,
}

impl EventReceiver {
    /// Wait for the next matching event. Lagging is logged and skipped over.
    pub async fn recv(&mut self) -> Result<MonitorEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    trace!("{} <- {}", self.name, event);
                    return Ok(event);
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    self.lagged += n;
                    warn!("Subscriber '{}' missed {} events", self.name, n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Events lost to lagging since subscribing
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
