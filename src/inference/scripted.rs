use super::classifier::GestureClassifier;
use crate::error::InferenceError;
use crate::frame::FrameData;
use crate::gesture::{RawClassification, NO_GESTURE};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;

fn default_repeat() -> u32 {
    1
}

/// One scripted answer, returned `repeat` times in a row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptEntry {
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub area: f64,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ScriptEntry {
    pub fn new(label: &str, confidence: f32, area: f64, repeat: u32) -> Self {
        Self {
            label: label.to_string(),
            confidence,
            area,
            repeat,
        }
    }
}

#[derive(Debug, Default)]
struct Cursor {
    entry: usize,
    served: u32,
}

/// Replays a fixed sequence of classifications, one per frame
pub struct ScriptedClassifier {
    entries: Vec<ScriptEntry>,
    looping: bool,
    cursor: Mutex<Cursor>,
}

impl ScriptedClassifier {
    pub fn new(entries: Vec<ScriptEntry>) -> Self {
        Self {
            entries,
            looping: false,
            cursor: Mutex::new(Cursor::default()),
        }
    }

    /// Start over from the first entry once the script is exhausted
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Load a JSON array of entries
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, InferenceError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| InferenceError::Unavailable {
            details: format!("cannot read script {}: {}", path.display(), e),
        })?;
        let entries: Vec<ScriptEntry> =
            serde_json::from_str(&contents).map_err(|e| InferenceError::Protocol {
                details: format!("invalid script {}: {}", path.display(), e),
            })?;
        Ok(Self::new(entries))
    }

    /// Total frames covered by one pass of the script
    pub fn len(&self) -> usize {
        self.entries.iter().map(|e| e.repeat as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn next_entry(&self) -> Option<ScriptEntry> {
        let mut cursor = self.cursor.lock();
        loop {
            if cursor.entry >= self.entries.len() {
                if !self.looping || self.is_empty() {
                    return None;
                }
                *cursor = Cursor::default();
            }

            let entry = &self.entries[cursor.entry];
            if cursor.served < entry.repeat {
                cursor.served += 1;
                return Some(entry.clone());
            }
            cursor.entry += 1;
            cursor.served = 0;
        }
    }
}

impl GestureClassifier for ScriptedClassifier {
    fn describe(&self) -> String {
        format!(
            "scripted classifier ({} frames{})",
            self.len(),
            if self.looping { ", looping" } else { "" }
        )
    }

    fn classify(&self, frame: &FrameData) -> Result<RawClassification, InferenceError> {
        Ok(match self.next_entry() {
            Some(entry) if entry.label != NO_GESTURE => RawClassification {
                label: entry.label,
                confidence: entry.confidence,
                area: entry.area,
                frame_id: frame.id,
                timestamp: frame.timestamp,
            },
            _ => RawClassification::none(frame.id, frame.timestamp),
        })
    }
}
