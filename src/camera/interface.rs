use crate::error::CameraError;
use crate::frame::FrameData;
use async_trait::async_trait;

#[cfg(all(feature = "camera", target_os = "linux"))]
use crate::config::CameraConfig;
#[cfg(all(feature = "camera", target_os = "linux"))]
use crate::frame::FrameFormat;
#[cfg(all(feature = "camera", target_os = "linux"))]
use std::time::SystemTime;
#[cfg(all(feature = "camera", target_os = "linux"))]
use tracing::{debug, info, trace};

#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::prelude::*;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer::Pipeline;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer_app::AppSink;
#[cfg(all(feature = "camera", target_os = "linux"))]
use gstreamer_video::VideoInfo;

/// A camera that yields frames on demand.
///
/// `read_frame` blocks until the device produces a frame. After an error the
/// caller closes and reopens the source; implementations must support being
/// opened again after `close`.
#[async_trait]
pub trait FrameSource: Send {
    /// Short description used in logs
    fn describe(&self) -> String;

    /// Open (or reopen) the device
    async fn open(&mut self) -> Result<(), CameraError>;

    /// Read the next frame
    async fn read_frame(&mut self) -> Result<FrameData, CameraError>;

    /// Release the device
    async fn close(&mut self);
}

/// GStreamer V4L2 camera
#[cfg(all(feature = "camera", target_os = "linux"))]
pub struct GstCamera {
    config: CameraConfig,
    pipeline: Option<Pipeline>,
    appsink: Option<AppSink>,
    frame_counter: u64,
}

#[cfg(all(feature = "camera", target_os = "linux"))]
impl GstCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pipeline: None,
            appsink: None,
            frame_counter: 0,
        }
    }

    fn device(&self) -> String {
        format!("/dev/video{}", self.config.index)
    }

    /// Caps and resulting frame format for the configured video format
    fn caps(&self) -> Result<(String, FrameFormat), CameraError> {
        let (width, height) = self.config.resolution;
        let fps = self.config.fps;

        match FrameFormat::from_fourcc(&self.config.format) {
            Some(FrameFormat::Mjpeg) => Ok((
                format!("image/jpeg,width={},height={},framerate={}/1", width, height, fps),
                FrameFormat::Mjpeg,
            )),
            Some(FrameFormat::Yuyv) => Ok((
                format!(
                    "video/x-raw,format=YUY2,width={},height={},framerate={}/1",
                    width, height, fps
                ),
                FrameFormat::Yuyv,
            )),
            None => Err(CameraError::Configuration {
                details: format!("Unsupported camera format '{}'", self.config.format),
            }),
        }
    }

    /// Build the capture pipeline; the sink keeps only the newest frame
    fn build_pipeline_string(&self) -> Result<String, CameraError> {
        let (caps, _) = self.caps()?;
        Ok(format!(
            "v4l2src device={} io-mode=mmap do-timestamp=true ! \
             {} ! \
             appsink name=sink sync=false max-buffers=1 drop=true enable-last-sample=false emit-signals=false",
            self.device(),
            caps
        ))
    }

    fn sample_to_frame(
        &mut self,
        sample: gstreamer::Sample,
        format: FrameFormat,
    ) -> Result<FrameData, CameraError> {
        let buffer = sample.buffer().ok_or_else(|| CameraError::CaptureStream {
            details: "No buffer in sample".to_string(),
        })?;

        let caps = sample.caps().ok_or_else(|| CameraError::CaptureStream {
            details: "No caps in sample".to_string(),
        })?;

        let (width, height) = match VideoInfo::from_caps(caps) {
            Ok(info) => (info.width(), info.height()),
            // image/jpeg caps are not raw video; fall back to configured size
            Err(_) => self.config.resolution,
        };

        let map = buffer
            .map_readable()
            .map_err(|e| CameraError::CaptureStream {
                details: format!("Failed to map buffer: {}", e),
            })?;

        let frame_id = self.frame_counter;
        self.frame_counter += 1;

        trace!(
            "Captured frame {} ({}x{}, {} bytes)",
            frame_id,
            width,
            height,
            map.len()
        );

        Ok(FrameData::new(
            frame_id,
            SystemTime::now(),
            map.as_slice().to_vec(),
            width,
            height,
            format,
        ))
    }
}

#[cfg(all(feature = "camera", target_os = "linux"))]
#[async_trait]
impl FrameSource for GstCamera {
    fn describe(&self) -> String {
        format!(
            "GStreamer camera {} ({}x{} @ {}fps, {})",
            self.device(),
            self.config.resolution.0,
            self.config.resolution.1,
            self.config.fps,
            self.config.format
        )
    }

    async fn open(&mut self) -> Result<(), CameraError> {
        gstreamer::init().map_err(|e| CameraError::Configuration {
            details: format!("Failed to initialize GStreamer: {}", e),
        })?;

        let pipeline_desc = self.build_pipeline_string()?;
        info!("Creating GStreamer pipeline: {}", pipeline_desc);

        let pipeline = gstreamer::parse::launch(&pipeline_desc)
            .map_err(|e| CameraError::Configuration {
                details: format!("Failed to create pipeline: {}", e),
            })?
            .downcast::<Pipeline>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to Pipeline".to_string(),
            })?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| CameraError::Configuration {
                details: "Failed to get appsink element".to_string(),
            })?
            .downcast::<AppSink>()
            .map_err(|_| CameraError::Configuration {
                details: "Failed to downcast to AppSink".to_string(),
            })?;

        pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| CameraError::DeviceOpen {
                device: self.device(),
                details: e.to_string(),
            })?;

        info!("GStreamer pipeline started for {}", self.device());
        self.pipeline = Some(pipeline);
        self.appsink = Some(appsink);
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<FrameData, CameraError> {
        let appsink = self.appsink.clone().ok_or(CameraError::Disconnected)?;
        let (_, format) = self.caps()?;
        let timeout = self.config.read_timeout();
        let timeout_ms = timeout.as_millis() as u64;

        let pulled = tokio::task::spawn_blocking(move || {
            let sample = appsink.try_pull_sample(gstreamer::ClockTime::from_mseconds(timeout_ms));
            let eos = sample.is_none() && appsink.is_eos();
            (sample, eos)
        })
        .await
        .map_err(|e| CameraError::CaptureStream {
            details: format!("Capture task failed: {}", e),
        })?;

        match pulled {
            (Some(sample), _) => self.sample_to_frame(sample, format),
            (None, true) => Err(CameraError::Disconnected),
            (None, false) => Err(CameraError::FrameTimeout { timeout }),
        }
    }

    async fn close(&mut self) {
        self.appsink = None;
        if let Some(pipeline) = self.pipeline.take() {
            let _ = pipeline.set_state(gstreamer::State::Null);
            debug!("GStreamer pipeline for {} stopped", self.device());
        }
    }
}
