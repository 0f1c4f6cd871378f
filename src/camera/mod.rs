mod builder;
mod interface;
mod slot;
mod stats;
mod synthetic;
mod throttle;
mod worker;

pub use builder::{default_frame_source, CaptureWorkerBuilder};
#[cfg(all(feature = "camera", target_os = "linux"))]
pub use interface::GstCamera;
pub use interface::FrameSource;
pub use slot::{FrameSlot, FrameSlotStats};
pub use stats::{CaptureStats, CaptureStatsSnapshot};
pub use synthetic::SyntheticCamera;
pub use throttle::Throttle;
pub use worker::CaptureWorker;
