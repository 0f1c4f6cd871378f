//! Gesture vocabulary and the per-frame / per-occurrence gesture types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Label the classifier reports when no hand pose was recognized
pub const NO_GESTURE: &str = "none";

/// Hand poses the monitor reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gesture {
    ThumbUp,
    Victory,
    ClosedFist,
    OpenPalm,
}

impl Gesture {
    pub const ALL: [Gesture; 4] = [
        Gesture::ThumbUp,
        Gesture::Victory,
        Gesture::ClosedFist,
        Gesture::OpenPalm,
    ];

    /// Category name as reported by the recognizer model
    pub fn label(&self) -> &'static str {
        match self {
            Gesture::ThumbUp => "Thumb_Up",
            Gesture::Victory => "Victory",
            Gesture::ClosedFist => "Closed_Fist",
            Gesture::OpenPalm => "Open_Palm",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownGesture(pub String);

impl fmt::Display for UnknownGesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized gesture label '{}'", self.0)
    }
}

impl std::error::Error for UnknownGesture {}

impl FromStr for Gesture {
    type Err = UnknownGesture;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Gesture::ALL
            .into_iter()
            .find(|g| g.label() == s)
            .ok_or_else(|| UnknownGesture(s.to_string()))
    }
}

/// Axis aligned hand bounding box in normalized image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Smallest box enclosing all points, `None` for an empty set
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut iter = points.into_iter();
        let (x, y) = iter.next()?;
        let mut bbox = BoundingBox {
            x_min: x,
            y_min: y,
            x_max: x,
            y_max: y,
        };
        for (x, y) in iter {
            bbox.x_min = bbox.x_min.min(x);
            bbox.y_min = bbox.y_min.min(y);
            bbox.x_max = bbox.x_max.max(x);
            bbox.y_max = bbox.y_max.max(y);
        }
        Some(bbox)
    }

    pub fn area(&self) -> f64 {
        (self.x_max - self.x_min).max(0.0) * (self.y_max - self.y_min).max(0.0)
    }
}

/// Output of a single inference call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawClassification {
    /// Category name as reported by the model
    pub label: String,
    /// Confidence score in [0, 1]
    pub confidence: f32,
    /// Hand bounding area
    pub area: f64,
    /// Frame the classification belongs to
    pub frame_id: u64,
    /// Capture time of that frame
    pub timestamp: SystemTime,
}

impl RawClassification {
    /// A classification for a frame without a recognized hand
    pub fn none(frame_id: u64, timestamp: SystemTime) -> Self {
        Self {
            label: NO_GESTURE.to_string(),
            confidence: 0.0,
            area: 0.0,
            frame_id,
            timestamp,
        }
    }

    /// The gesture the label names, if it is part of the vocabulary
    pub fn gesture(&self) -> Option<Gesture> {
        self.label.parse().ok()
    }
}

/// A confirmed, debounced gesture occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedEvent {
    pub gesture: Gesture,
    pub timestamp: SystemTime,
    pub area: f64,
    pub confidence: f32,
}
