use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Capture counters shared between the worker and observers
#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub frames_delivered: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub capture_errors: AtomicU64,
    pub reconnects: AtomicU64,
    pub connected: AtomicBool,
}

/// Snapshot of capture counters
#[derive(Debug, Clone, Default)]
pub struct CaptureStatsSnapshot {
    pub frames_captured: u64,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub capture_errors: u64,
    pub reconnects: u64,
    pub connected: bool,
}

impl CaptureStats {
    pub fn snapshot(&self) -> CaptureStatsSnapshot {
        CaptureStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            capture_errors: self.capture_errors.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
        }
    }
}
