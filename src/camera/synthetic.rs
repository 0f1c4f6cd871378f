use super::interface::FrameSource;
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{FrameData, FrameFormat};
use async_trait::async_trait;
use std::time::{Duration, SystemTime};
use tracing::{info, trace};

/// Camera stand-in producing placeholder MJPEG frames at the device rate
pub struct SyntheticCamera {
    resolution: (u32, u32),
    frame_delay: Duration,
    frame_counter: u64,
    open: bool,
}

impl SyntheticCamera {
    pub fn new(config: &CameraConfig) -> Self {
        Self::with_frame_delay(
            config.resolution,
            Duration::from_secs_f64(1.0 / config.fps.max(1) as f64),
        )
    }

    /// Source emitting one frame every `frame_delay`; zero means as fast as read
    pub fn with_frame_delay(resolution: (u32, u32), frame_delay: Duration) -> Self {
        Self {
            resolution,
            frame_delay,
            frame_counter: 0,
            open: false,
        }
    }

    fn placeholder_jpeg(frame_id: u64) -> Vec<u8> {
        let mut data = vec![
            0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01, 0x01,
            0x00, 0x48, 0x00, 0x48, 0x00, 0x00,
        ];

        let pattern_size = 1000 + (frame_id % 500) as usize;
        let pattern_byte = (frame_id % 256) as u8;
        data.extend(vec![pattern_byte; pattern_size]);
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    fn describe(&self) -> String {
        format!(
            "synthetic camera ({}x{}, {:?} per frame)",
            self.resolution.0, self.resolution.1, self.frame_delay
        )
    }

    async fn open(&mut self) -> Result<(), CameraError> {
        info!("Opening {}", self.describe());
        self.open = true;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        if !self.open {
            return Err(CameraError::Disconnected);
        }

        if !self.frame_delay.is_zero() {
            tokio::time::sleep(self.frame_delay).await;
        }

        let frame_id = self.frame_counter;
        self.frame_counter += 1;
        let data = Self::placeholder_jpeg(frame_id);

        trace!("Generated synthetic frame {} ({} bytes)", frame_id, data.len());

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            data,
            self.resolution.0,
            self.resolution.1,
            FrameFormat::Mjpeg,
        ))
    }

    async fn close(&mut self) {
        self.open = false;
    }
}
