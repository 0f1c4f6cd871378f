use crate::frame::FrameData;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;
use tracing::trace;

/// Single-slot, latest-wins handoff between capture and inference.
///
/// Publishing replaces any frame that has not been taken yet, so the consumer
/// always sees the freshest frame and memory stays bounded to one frame.
pub struct FrameSlot {
    pending: Mutex<Option<FrameData>>,
    notify: Notify,
    published: AtomicU64,
    superseded: AtomicU64,
    taken: AtomicU64,
}

/// Snapshot of slot counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameSlotStats {
    pub published: u64,
    pub superseded: u64,
    pub taken: u64,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(None),
            notify: Notify::new(),
            published: AtomicU64::new(0),
            superseded: AtomicU64::new(0),
            taken: AtomicU64::new(0),
        }
    }

    /// Offer a frame, replacing a pending one
    pub fn publish(&self, frame: FrameData) {
        let previous = self.pending.lock().replace(frame);
        if let Some(stale) = previous {
            trace!("Frame {} superseded before inference", stale.id);
            self.superseded.fetch_add(1, Ordering::Relaxed);
        }
        self.published.fetch_add(1, Ordering::Relaxed);
        self.notify.notify_one();
    }

    /// Take the pending frame without waiting
    pub fn try_take(&self) -> Option<FrameData> {
        let frame = self.pending.lock().take();
        if frame.is_some() {
            self.taken.fetch_add(1, Ordering::Relaxed);
        }
        frame
    }

    /// Wait for the next frame
    pub async fn take(&self) -> FrameData {
        loop {
            if let Some(frame) = self.try_take() {
                return frame;
            }
            self.notify.notified().await;
        }
    }

    pub fn stats(&self) -> FrameSlotStats {
        FrameSlotStats {
            published: self.published.load(Ordering::Relaxed),
            superseded: self.superseded.load(Ordering::Relaxed),
            taken: self.taken.load(Ordering::Relaxed),
        }
    }
}

impl Default for FrameSlot {
    fn default() -> Self {
        Self::new()
    }
}
