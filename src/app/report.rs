use crate::events::{EventReceiver, MonitorEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Turn failure events into operator-facing lines on the `activity` target,
/// which stays visible in quiet mode. Events already queued when `stop`
/// fires are still reported.
pub(super) async fn report_failures(
    mut events: EventReceiver,
    reported: Arc<AtomicU64>,
    stop: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            event = events.recv() => match event {
                Ok(event) => event,
                Err(_) => break,
            },
            _ = stop.cancelled() => break,
        };

        reported.fetch_add(1, Ordering::Relaxed);
        match &event {
            MonitorEvent::DispatchCompleted { record_id, results } => {
                let failed: Vec<&str> = results
                    .iter()
                    .filter(|r| !r.is_success())
                    .map(|r| r.target.as_str())
                    .collect();
                warn!(
                    target: "activity",
                    "⚠️ Record {} reached {}/{} targets, failed: {}",
                    record_id,
                    results.len() - failed.len(),
                    results.len(),
                    failed.join(", ")
                );
            }
            MonitorEvent::SystemError { component, error } => {
                error!(target: "activity", "❌ {} failed: {}", component, error);
            }
            other => warn!(target: "activity", "⚠️ {}", other),
        }
    }

    if events.lagged() > 0 {
        warn!("Failure report missed {} events", events.lagged());
    }
}
