use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Pixel layout delivered by the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Each frame is a complete JPEG image
    Mjpeg,
    /// Packed YUV 4:2:2, two bytes per pixel
    Yuyv,
}

impl FrameFormat {
    /// Parse a V4L2 style fourcc name such as `MJPG` or `YUYV`
    pub fn from_fourcc(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MJPG" | "MJPEG" => Some(FrameFormat::Mjpeg),
            "YUYV" | "YUY2" => Some(FrameFormat::Yuyv),
            _ => None,
        }
    }

    /// Whether frames of this format can be handed to the recognizer as-is
    pub fn is_encoded_image(&self) -> bool {
        matches!(self, FrameFormat::Mjpeg)
    }
}

/// A captured camera frame
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Monotonic frame identifier assigned by the source
    pub id: u64,
    pub timestamp: SystemTime,
    /// Shared so the latest-wins slot hands frames over without copying
    pub data: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
}

impl FrameData {
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
        }
    }

    /// Time since capture; zero if the clock went backwards
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
    }
}
