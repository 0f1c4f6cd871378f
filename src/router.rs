//! Maps confirmed gestures to caregiving activity records and tracks whether
//! the baby is asleep.

use crate::config::RouterConfig;
use crate::error::{MonitorError, Result};
use crate::gesture::{DetectedEvent, Gesture};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tracing::debug;
use uuid::Uuid;

const MESSAGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Caregiving activities, one per gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    Feeding,
    DiaperChange,
    SleepStart,
    WakeUp,
}

impl ActivityKind {
    pub fn from_gesture(gesture: Gesture) -> Self {
        match gesture {
            Gesture::ThumbUp => ActivityKind::Feeding,
            Gesture::Victory => ActivityKind::DiaperChange,
            Gesture::ClosedFist => ActivityKind::SleepStart,
            Gesture::OpenPalm => ActivityKind::WakeUp,
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            ActivityKind::Feeding => "🍼",
            ActivityKind::DiaperChange => "💩",
            ActivityKind::SleepStart => "😴",
            ActivityKind::WakeUp => "👀",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Feeding => "Feeding",
            ActivityKind::DiaperChange => "Diaper",
            ActivityKind::SleepStart => "Sleeping",
            ActivityKind::WakeUp => "Awake",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.emoji(), self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BabyState {
    #[default]
    Unknown,
    Asleep,
    Awake,
}

/// One caregiving entry, created by the router and never modified afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: String,
    pub kind: ActivityKind,
    pub gesture: Gesture,
    pub timestamp: SystemTime,
    pub message: String,
    /// Whether this record moved the baby state
    pub state_changed: bool,
}

/// Turns detected gestures into activity records.
///
/// Owns the baby state; it has a single writer, the pipeline task.
pub struct EventRouter {
    timezone: Option<Tz>,
    state: BabyState,
}

impl EventRouter {
    /// `None` renders timestamps in local time
    pub fn new(timezone: Option<Tz>) -> Self {
        Self {
            timezone,
            state: BabyState::Unknown,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let timezone = match &config.timezone {
            Some(name) => Some(name.parse::<Tz>().map_err(|_| {
                MonitorError::component("router", format!("unknown timezone '{}'", name))
            })?),
            None => None,
        };
        Ok(Self::new(timezone))
    }

    pub fn state(&self) -> BabyState {
        self.state
    }

    /// Build the record for a detected gesture. Redundant sleep/wake
    /// transitions still produce a record but leave the state alone.
    pub fn route(&mut self, event: &DetectedEvent) -> ActivityRecord {
        let kind = ActivityKind::from_gesture(event.gesture);

        let next_state = match kind {
            ActivityKind::SleepStart => Some(BabyState::Asleep),
            ActivityKind::WakeUp => Some(BabyState::Awake),
            ActivityKind::Feeding | ActivityKind::DiaperChange => None,
        };

        let state_changed = match next_state {
            Some(next) if next != self.state => {
                debug!("Baby state {:?} -> {:?}", self.state, next);
                self.state = next;
                true
            }
            _ => false,
        };

        ActivityRecord {
            id: Uuid::new_v4().to_string(),
            kind,
            gesture: event.gesture,
            timestamp: event.timestamp,
            message: self.format_message(kind, event.timestamp),
            state_changed,
        }
    }

    /// `<YYYY-MM-DD HH:MM> <emoji><label>`
    pub fn format_message(&self, kind: ActivityKind, timestamp: SystemTime) -> String {
        let utc: DateTime<Utc> = timestamp.into();
        let rendered = match self.timezone {
            Some(tz) => utc.with_timezone(&tz).format(MESSAGE_TIME_FORMAT).to_string(),
            None => utc
                .with_timezone(&Local)
                .format(MESSAGE_TIME_FORMAT)
                .to_string(),
        };
        format!("{} {}", rendered, kind)
    }
}
