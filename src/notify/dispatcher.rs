use super::audio::AudioChannel;
use super::bark::{build_client, BarkChannel};
use super::channel::NotificationChannel;
use super::target::{DispatchOutcome, DispatchResult, DispatchTarget};
use crate::config::MonitorConfig;
use crate::error::DispatchError;
use crate::events::{EventBus, MonitorEvent};
use crate::router::ActivityRecord;
use futures::future::join_all;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Debug, Default)]
pub struct DispatchStats {
    pub records: AtomicU64,
    pub delivered: AtomicU64,
    pub failed: AtomicU64,
}

/// Fans every record out to all targets concurrently.
///
/// Each record gets a supervising task that runs one task per target, so a
/// slow or failing target never holds up the others or the detection loop.
/// Supervising tasks are tracked so shutdown can wait for them.
#[derive(Clone)]
pub struct NotificationDispatcher {
    channels: Arc<Vec<Arc<dyn NotificationChannel>>>,
    tracker: TaskTracker,
    event_bus: Option<EventBus>,
    stats: Arc<DispatchStats>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels: Arc::new(channels),
            tracker: TaskTracker::new(),
            event_bus: None,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    /// Audio first when enabled, then one push target per configured key
    pub fn from_config(config: &MonitorConfig) -> Result<Self, DispatchError> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if config.audio.enabled {
            let audio = AudioChannel::new(&config.audio);
            if !audio.sound_path().exists() {
                warn!("Audio file not found: {}", audio.sound_path().display());
            }
            channels.push(Arc::new(audio));
        }

        let keys = config.notify.recipient_keys();
        if keys.is_empty() {
            warn!("No Bark keys configured, remote notifications disabled");
        } else {
            let client = build_client(&config.notify)?;
            for key in keys {
                channels.push(Arc::new(BarkChannel::new(
                    &config.notify,
                    key,
                    client.clone(),
                )?));
            }
        }

        Ok(Self::new(channels))
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn targets(&self) -> Vec<DispatchTarget> {
        self.channels.iter().map(|c| c.target()).collect()
    }

    pub fn stats(&self) -> Arc<DispatchStats> {
        Arc::clone(&self.stats)
    }

    /// Records whose delivery is still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Start delivering a record and return immediately
    pub fn dispatch(&self, record: ActivityRecord) {
        if self.channels.is_empty() {
            debug!("No notification targets, record {} not dispatched", record.id);
            return;
        }
        if self.tracker.is_closed() {
            warn!("Dispatcher shutting down, dropping record {}", record.id);
            return;
        }

        let this = self.clone();
        self.tracker.spawn(async move {
            this.dispatch_and_wait(record).await;
        });
    }

    /// Deliver a record to every target and wait for all outcomes.
    /// Results come back in target order.
    pub async fn dispatch_and_wait(&self, record: ActivityRecord) -> Vec<DispatchResult> {
        self.stats.records.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(record);

        let (targets, handles): (Vec<DispatchTarget>, Vec<_>) = self
            .channels
            .iter()
            .map(|channel| {
                let channel = Arc::clone(channel);
                let record = Arc::clone(&record);
                let target = channel.target();
                let handle =
                    tokio::spawn(async move { deliver_with_retry(channel.as_ref(), &record).await });
                (target, handle)
            })
            .unzip();

        // A panicking channel only loses its own result
        let results: Vec<DispatchResult> = join_all(handles)
            .await
            .into_iter()
            .zip(targets)
            .map(|(joined, target)| match joined {
                Ok(result) => result,
                Err(e) => DispatchResult {
                    target: target.to_string(),
                    outcome: DispatchOutcome::FailedAfterRetries {
                        attempts: 1,
                        last_error: format!("delivery task failed: {}", e),
                    },
                    latency: Duration::ZERO,
                },
            })
            .collect();

        let delivered = results.iter().filter(|r| r.is_success()).count();
        self.stats
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.stats
            .failed
            .fetch_add((results.len() - delivered) as u64, Ordering::Relaxed);

        if delivered == results.len() {
            debug!(
                "Record {} delivered to all {} targets",
                record.id,
                results.len()
            );
        } else {
            debug!(
                "Record {} delivered to {}/{} targets",
                record.id,
                delivered,
                results.len()
            );
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(MonitorEvent::DispatchCompleted {
                record_id: record.id.clone(),
                results: results.clone(),
            });
        }

        results
    }

    /// Stop accepting records and wait up to `grace` for in-flight ones.
    /// Returns false when deliveries were still running at the deadline.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        if self.tracker.is_empty() {
            return true;
        }

        info!(
            "Waiting up to {:?} for {} in-flight notifications",
            grace,
            self.tracker.len()
        );
        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                error!(
                    "{} notifications still undelivered after {:?}, dropping them",
                    self.tracker.len(),
                    grace
                );
                false
            }
        }
    }
}

/// Deliver to one target, retrying per the channel's policy
async fn deliver_with_retry(
    channel: &dyn NotificationChannel,
    record: &ActivityRecord,
) -> DispatchResult {
    let target = channel.target();
    let policy = channel.retry_policy();
    let max_attempts = policy.max_attempts();
    let started = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        match channel.deliver(record).await {
            Ok(()) => {
                let latency = started.elapsed();
                info!("Notification sent to {}", target);
                debug!("{} latency {:.2}ms", target, latency.as_secs_f64() * 1000.0);
                return DispatchResult {
                    target: target.to_string(),
                    outcome: DispatchOutcome::Delivered { attempts },
                    latency,
                };
            }
            Err(e) if attempts >= max_attempts => {
                error!(
                    "Notification to {} failed after {} attempt(s): {}",
                    target, attempts, e
                );
                return DispatchResult {
                    target: target.to_string(),
                    outcome: DispatchOutcome::FailedAfterRetries {
                        attempts,
                        last_error: e.to_string(),
                    },
                    latency: started.elapsed(),
                };
            }
            Err(e) => {
                let delay = policy.delay_for(attempts - 1);
                warn!(
                    "Notification to {} failed (attempt {}/{}): {}, retrying in {:?}",
                    target, attempts, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
