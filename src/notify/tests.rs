use super::*;
use crate::config::MonitorConfig;
use crate::error::DispatchError;
use crate::events::{EventBus, MonitorEvent};
use crate::gesture::Gesture;
use crate::recovery::RecoveryConfig;
use crate::router::{ActivityKind, ActivityRecord};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn record(message: &str) -> ActivityRecord {
    ActivityRecord {
        id: uuid::Uuid::new_v4().to_string(),
        kind: ActivityKind::DiaperChange,
        gesture: Gesture::Victory,
        timestamp: SystemTime::now(),
        message: message.to_string(),
        state_changed: false,
    }
}

fn quick_retry(max_retries: u32) -> RecoveryConfig {
    RecoveryConfig {
        max_retries,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        exponential_backoff: true,
    }
}

/// In-memory channel that fails its first `failures` deliveries
struct FakeChannel {
    key: String,
    failures: u32,
    retry: RecoveryConfig,
    delay: Duration,
    calls: AtomicU32,
    delivered: Mutex<Vec<String>>,
}

impl FakeChannel {
    fn new(key: &str, failures: u32, retry: RecoveryConfig) -> Arc<Self> {
        Self::slow(key, failures, retry, Duration::ZERO)
    }

    fn slow(key: &str, failures: u32, retry: RecoveryConfig, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            key: key.to_string(),
            failures,
            retry,
            delay,
            calls: AtomicU32::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl NotificationChannel for FakeChannel {
    fn target(&self) -> DispatchTarget {
        DispatchTarget::Remote {
            key: self.key.clone(),
        }
    }

    fn retry_policy(&self) -> RecoveryConfig {
        self.retry.clone()
    }

    async fn deliver(&self, record: &ActivityRecord) -> Result<(), DispatchError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(DispatchError::Status { status: 503 });
        }
        self.delivered.lock().push(record.message.clone());
        Ok(())
    }
}

fn channels(list: &[&Arc<FakeChannel>]) -> Vec<Arc<dyn NotificationChannel>> {
    list.iter()
        .map(|c| Arc::clone(*c) as Arc<dyn NotificationChannel>)
        .collect()
}

/// Minimal HTTP server answering every request with `status`; returns the
/// address and the request lines it saw
async fn spawn_push_server(status: u16) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let log = Arc::clone(&log);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                if let Some(line) = request.lines().next() {
                    log.lock().push(line.to_string());
                }
                let response = format!(
                    "HTTP/1.1 {} X\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}", addr), seen)
}

fn push_config(bark_url: &str, keys: &str) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.audio.enabled = false;
    config.notify.bark_url = bark_url.to_string();
    config.notify.bark_keys = keys.to_string();
    config.notify.request_timeout_ms = 1000;
    config.notify.max_attempts = 2;
    config.notify.retry_delay_ms = 10;
    config
}

#[tokio::test]
async fn test_every_target_gets_an_independent_attempt() {
    let good_a = FakeChannel::new("good-a", 0, RecoveryConfig::no_retry());
    let broken = FakeChannel::new("broken", u32::MAX, quick_retry(2));
    let good_b = FakeChannel::new("good-b", 0, RecoveryConfig::no_retry());

    let dispatcher = NotificationDispatcher::new(channels(&[&good_a, &broken, &good_b]));
    let results = dispatcher.dispatch_and_wait(record("diaper")).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert_eq!(results[1].attempts(), 3);
    assert!(results[2].is_success());

    assert_eq!(good_a.delivered.lock().len(), 1);
    assert_eq!(good_b.delivered.lock().len(), 1);
    assert_eq!(broken.calls.load(Ordering::SeqCst), 3);

    let stats = dispatcher.stats();
    assert_eq!(stats.delivered.load(Ordering::Relaxed), 2);
    assert_eq!(stats.failed.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_slow_target_does_not_delay_others() {
    let slow = FakeChannel::slow("slow", 0, RecoveryConfig::no_retry(), Duration::from_secs(1));
    let fast = FakeChannel::new("fast", 0, RecoveryConfig::no_retry());
    let dispatcher = NotificationDispatcher::new(channels(&[&slow, &fast]));

    let started = std::time::Instant::now();
    let pending = tokio::spawn({
        let dispatcher = dispatcher.clone();
        async move { dispatcher.dispatch_and_wait(record("sleep")).await }
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fast.delivered.lock().len(), 1);
    assert!(slow.delivered.lock().is_empty());

    let results = pending.await.unwrap();
    assert!(results.iter().all(|r| r.is_success()));
    assert!(results[0].latency >= Duration::from_secs(1));
    assert!(results[1].latency < Duration::from_millis(200));
    assert!(started.elapsed() < Duration::from_millis(1_800));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let flaky = FakeChannel::new("flaky", 2, quick_retry(3));
    let dispatcher = NotificationDispatcher::new(channels(&[&flaky]));

    let results = dispatcher.dispatch_and_wait(record("feeding")).await;
    assert_eq!(
        results[0].outcome,
        DispatchOutcome::Delivered { attempts: 3 }
    );
    assert_eq!(flaky.delivered.lock().as_slice(), ["feeding"]);
}

#[tokio::test]
async fn test_single_attempt_channel_is_not_retried() {
    let once = FakeChannel::new("audio-like", 1, RecoveryConfig::no_retry());
    let dispatcher = NotificationDispatcher::new(channels(&[&once]));

    let results = dispatcher.dispatch_and_wait(record("sleep")).await;
    match &results[0].outcome {
        DispatchOutcome::FailedAfterRetries {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 1);
            assert!(last_error.contains("503"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(once.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispatch_publishes_completion_event() {
    let bus = EventBus::new(16);
    let mut events = bus.subscribe();
    let channel = FakeChannel::new("k", 0, RecoveryConfig::no_retry());
    let dispatcher = NotificationDispatcher::new(channels(&[&channel])).with_event_bus(bus);

    let rec = record("awake");
    let id = rec.id.clone();
    dispatcher.dispatch(rec);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap()
        .unwrap();
    match event {
        MonitorEvent::DispatchCompleted { record_id, results } => {
            assert_eq!(record_id, id);
            assert_eq!(results.len(), 1);
            assert_eq!(results[0].target, "bark:k***");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_shutdown_waits_for_in_flight_dispatches() {
    let slow = FakeChannel::slow("slow", 0, RecoveryConfig::no_retry(), Duration::from_millis(50));
    let dispatcher = NotificationDispatcher::new(channels(&[&slow]));

    dispatcher.dispatch(record("one"));
    dispatcher.dispatch(record("two"));
    assert!(dispatcher.shutdown(Duration::from_secs(2)).await);
    assert_eq!(slow.delivered.lock().len(), 2);

    // Records arriving after shutdown are dropped
    dispatcher.dispatch(record("late"));
    assert_eq!(dispatcher.in_flight(), 0);
}

#[tokio::test]
async fn test_shutdown_grace_is_bounded() {
    let stuck = FakeChannel::slow("stuck", 0, RecoveryConfig::no_retry(), Duration::from_secs(30));
    let dispatcher = NotificationDispatcher::new(channels(&[&stuck]));

    dispatcher.dispatch(record("never"));
    let started = std::time::Instant::now();
    assert!(!dispatcher.shutdown(Duration::from_millis(100)).await);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_bark_channel_delivers_encoded_request() {
    let (url, seen) = spawn_push_server(200).await;
    let config = push_config(&url, "deviceKey1");
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();
    assert_eq!(
        dispatcher.targets(),
        vec![DispatchTarget::Remote {
            key: "deviceKey1".to_string()
        }]
    );

    let results = dispatcher
        .dispatch_and_wait(record("2026-01-22 15:30 💩Diaper"))
        .await;
    assert!(results[0].is_success(), "{:?}", results);

    let requests = seen.lock().clone();
    assert_eq!(
        requests,
        vec![
            "GET /deviceKey1/Baby%20Care%20Record/2026-01-22%2015:30%20%F0%9F%92%A9Diaper?group=BabyMonitor&isArchive=1 HTTP/1.1"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn test_bark_non_success_status_is_retried_then_failed() {
    let (url, seen) = spawn_push_server(500).await;
    let config = push_config(&url, "deviceKey1");
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();

    let results = dispatcher.dispatch_and_wait(record("x")).await;
    assert_eq!(results[0].attempts(), 2);
    assert!(!results[0].is_success());
    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn test_unreachable_key_does_not_block_others() {
    let (url, seen) = spawn_push_server(200).await;
    let config = push_config(&url, "goodKey01");

    // Port 9 (discard) is closed on test machines; the connection is refused
    let unreachable = push_config("http://127.0.0.1:9", "deadKey01");
    let client = build_client(&unreachable.notify).unwrap();
    let dead = BarkChannel::new(&unreachable.notify, "deadKey01".to_string(), client).unwrap();

    let local = FakeChannel::new("local", 0, RecoveryConfig::no_retry());
    let good_client = build_client(&config.notify).unwrap();
    let good = BarkChannel::new(&config.notify, "goodKey01".to_string(), good_client).unwrap();

    let mut targets = channels(&[&local]);
    targets.push(Arc::new(dead));
    targets.push(Arc::new(good));

    let dispatcher = NotificationDispatcher::new(targets);
    let results = dispatcher.dispatch_and_wait(record("2026-01-22 15:30 🍼Feeding")).await;

    assert!(results[0].is_success());
    assert!(!results[1].is_success());
    assert_eq!(results[1].target, "bark:deadK***");
    assert!(results[2].is_success());
    assert_eq!(local.delivered.lock().len(), 1);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_from_config_builds_targets_in_order() {
    let mut config = push_config("https://api.day.app", " a1, ,b2 ");
    config.audio.enabled = true;
    let dispatcher = NotificationDispatcher::from_config(&config).unwrap();

    assert_eq!(
        dispatcher.targets(),
        vec![
            DispatchTarget::LocalAudio,
            DispatchTarget::Remote {
                key: "a1".to_string()
            },
            DispatchTarget::Remote {
                key: "b2".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_missing_sound_asset_fails_without_retry() {
    let mut config = MonitorConfig::default();
    config.audio.sound_path = "/nonexistent/success.mp3".to_string();
    let audio = AudioChannel::new(&config.audio);

    let targets = vec![Arc::new(audio) as Arc<dyn NotificationChannel>];
    let dispatcher = NotificationDispatcher::new(targets);
    let results = dispatcher.dispatch_and_wait(record("x")).await;

    assert_eq!(results[0].target, "audio");
    assert_eq!(results[0].attempts(), 1);
    assert!(!results[0].is_success());
}

#[test]
fn test_configured_player_overrides_platform_default() {
    let mut config = MonitorConfig::default();
    config.audio.player = Some("paplay --volume 30000".to_string());
    config.audio.sound_path = "chime.wav".to_string();

    let (program, args) = AudioChannel::new(&config.audio).player_command();
    assert_eq!(program, "paplay");
    assert_eq!(args, vec!["--volume", "30000", "chime.wav"]);
}
