use crate::frame::FrameFormat;
use crate::recovery::RecoveryConfig;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MonitorConfig {
    pub camera: CameraConfig,
    pub inference: InferenceConfig,
    pub stabilizer: StabilizerConfig,
    pub router: RouterConfig,
    pub notify: NotifyConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub index: u32,

    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second requested from the device
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Video format (MJPG, YUYV, etc.)
    #[serde(default = "default_camera_format")]
    pub format: String,

    /// Rate at which frames are handed to inference
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,

    /// Consecutive capture failures tolerated before giving up
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// First reconnect delay in milliseconds
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// How long a single frame read may block
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct InferenceConfig {
    /// Recognizer command line; the model path is appended as the last argument
    #[serde(default)]
    pub command: Vec<String>,

    /// Path to the gesture model artifact
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// JSON file of scripted classifications to replay instead of a model
    pub script: Option<String>,

    /// Start the replay script over once it is exhausted
    #[serde(default)]
    pub script_loop: bool,

    /// Maximum time a single classification may take
    #[serde(default = "default_inference_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StabilizerConfig {
    /// Minimum hand bounding area, in the unit the classifier reports
    #[serde(default = "default_min_area")]
    pub min_area: f64,

    /// Minimum classifier confidence
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f32,

    /// Number of recent observations considered (K)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Votes a label needs inside the window to be stable (M)
    #[serde(default = "default_min_votes")]
    pub min_votes: usize,

    /// Suppression period for the same gesture after it fired
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RouterConfig {
    /// IANA timezone used to render record timestamps; local time when unset
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct NotifyConfig {
    /// Comma separated Bark device keys
    #[serde(default)]
    pub bark_keys: String,

    /// Bark server base URL
    #[serde(default = "default_bark_url")]
    pub bark_url: String,

    /// Notification title
    #[serde(default = "default_notify_title")]
    pub title: String,

    /// Bark notification group
    #[serde(default = "default_notify_group")]
    pub group: String,

    /// Per-request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Delivery attempts per recipient, first attempt included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Double the retry delay after every failed attempt
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AudioConfig {
    /// Play a confirmation sound for every recorded activity
    #[serde(default = "default_audio_enabled")]
    pub enabled: bool,

    /// Sound asset to play
    #[serde(default = "default_sound_path")]
    pub sound_path: String,

    /// Player command line; the sound path is appended as the last argument
    pub player: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Quiet shows activity lines and failures; verbose adds classifier detail
    #[serde(default)]
    pub mode: LogMode,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Quiet,
    Verbose,
}

impl LogMode {
    /// `EnvFilter` directives for the mode. Activity lines show in both;
    /// verbose adds every classification and filter decision.
    pub fn directives(self) -> &'static str {
        match self {
            LogMode::Quiet => "warn,activity=info",
            LogMode::Verbose => "babycam=debug,activity=info",
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Grace period for in-flight notifications during shutdown
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl MonitorConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("camera.index", default_camera_index())?
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.format", default_camera_format())?
            .set_default("camera.target_fps", default_target_fps())?
            .set_default(
                "camera.max_consecutive_failures",
                default_max_consecutive_failures(),
            )?
            .set_default(
                "camera.reconnect_base_delay_ms",
                default_reconnect_base_delay_ms(),
            )?
            .set_default(
                "camera.reconnect_max_delay_ms",
                default_reconnect_max_delay_ms(),
            )?
            .set_default("camera.read_timeout_ms", default_read_timeout_ms())?
            .set_default("inference.command", Vec::<String>::new())?
            .set_default("inference.model_path", default_model_path())?
            .set_default("inference.script_loop", false)?
            .set_default("inference.timeout_ms", default_inference_timeout_ms())?
            .set_default("stabilizer.min_area", default_min_area())?
            .set_default("stabilizer.min_confidence", default_min_confidence() as f64)?
            .set_default("stabilizer.window_size", default_window_size() as i64)?
            .set_default("stabilizer.min_votes", default_min_votes() as i64)?
            .set_default("stabilizer.cooldown_seconds", default_cooldown_seconds())?
            .set_default("notify.bark_keys", "")?
            .set_default("notify.bark_url", default_bark_url())?
            .set_default("notify.title", default_notify_title())?
            .set_default("notify.group", default_notify_group())?
            .set_default("notify.request_timeout_ms", default_request_timeout_ms())?
            .set_default("notify.max_attempts", default_max_attempts())?
            .set_default("notify.retry_delay_ms", default_retry_delay_ms())?
            .set_default("notify.exponential_backoff", default_exponential_backoff())?
            .set_default("audio.enabled", default_audio_enabled())?
            .set_default("audio.sound_path", default_sound_path())?
            .set_default("logging.mode", "quiet")?
            .set_default(
                "system.shutdown_grace_seconds",
                default_shutdown_grace_seconds(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. BABYCAM_NOTIFY__BARK_KEYS
            .add_source(
                Environment::with_prefix("BABYCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: MonitorConfig = settings.try_deserialize()?;

        if config.notify.bark_keys.trim().is_empty() {
            if let Ok(keys) = std::env::var("BARK_KEYS") {
                debug!("Using recipient keys from BARK_KEYS");
                config.notify.bark_keys = keys;
            }
        }

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 || self.camera.target_fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps and target_fps must be greater than 0".to_string(),
            ));
        }

        if FrameFormat::from_fourcc(&self.camera.format).is_none() {
            return Err(ConfigError::Message(format!(
                "Unsupported camera format '{}'",
                self.camera.format
            )));
        }

        if self.camera.max_consecutive_failures == 0 {
            return Err(ConfigError::Message(
                "Camera max_consecutive_failures must be greater than 0".to_string(),
            ));
        }

        if self.inference.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Inference timeout_ms must be greater than 0".to_string(),
            ));
        }

        let stabilizer = &self.stabilizer;
        if stabilizer.window_size == 0 || stabilizer.min_votes == 0 {
            return Err(ConfigError::Message(
                "Stabilizer window_size and min_votes must be greater than 0".to_string(),
            ));
        }

        if stabilizer.min_votes > stabilizer.window_size {
            return Err(ConfigError::Message(format!(
                "Stabilizer min_votes ({}) cannot exceed window_size ({})",
                stabilizer.min_votes, stabilizer.window_size
            )));
        }

        if !(0.0..=1.0).contains(&stabilizer.min_confidence) {
            return Err(ConfigError::Message(
                "Stabilizer min_confidence must be within [0, 1]".to_string(),
            ));
        }

        if stabilizer.min_area < 0.0 {
            return Err(ConfigError::Message(
                "Stabilizer min_area cannot be negative".to_string(),
            ));
        }

        if let Some(tz) = &self.router.timezone {
            if tz.parse::<chrono_tz::Tz>().is_err() {
                return Err(ConfigError::Message(format!("Unknown timezone '{}'", tz)));
            }
        }

        if self.notify.max_attempts == 0 {
            return Err(ConfigError::Message(
                "Notify max_attempts must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CameraConfig {
    /// Minimum spacing between frames handed to inference
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Backoff used when reopening the device
    pub fn reconnect_policy(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_retries: self.max_consecutive_failures,
            base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
            max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
            exponential_backoff: true,
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl StabilizerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }
}

impl NotifyConfig {
    /// Recipient keys in configured order, blanks removed
    pub fn recipient_keys(&self) -> Vec<String> {
        self.bark_keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Retry schedule for a single recipient; `max_retries` excludes the first attempt
    pub fn retry_policy(&self) -> RecoveryConfig {
        let base_delay = Duration::from_millis(self.retry_delay_ms);
        RecoveryConfig {
            max_retries: self.max_attempts.saturating_sub(1),
            base_delay,
            max_delay: base_delay.saturating_mul(8),
            exponential_backoff: self.exponential_backoff,
        }
    }
}

impl SystemConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_seconds)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                index: default_camera_index(),
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                format: default_camera_format(),
                target_fps: default_target_fps(),
                max_consecutive_failures: default_max_consecutive_failures(),
                reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
                reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
                read_timeout_ms: default_read_timeout_ms(),
            },
            inference: InferenceConfig {
                command: Vec::new(),
                model_path: default_model_path(),
                script: None,
                script_loop: false,
                timeout_ms: default_inference_timeout_ms(),
            },
            stabilizer: StabilizerConfig {
                min_area: default_min_area(),
                min_confidence: default_min_confidence(),
                window_size: default_window_size(),
                min_votes: default_min_votes(),
                cooldown_seconds: default_cooldown_seconds(),
            },
            router: RouterConfig::default(),
            notify: NotifyConfig {
                bark_keys: String::new(),
                bark_url: default_bark_url(),
                title: default_notify_title(),
                group: default_notify_group(),
                request_timeout_ms: default_request_timeout_ms(),
                max_attempts: default_max_attempts(),
                retry_delay_ms: default_retry_delay_ms(),
                exponential_backoff: default_exponential_backoff(),
            },
            audio: AudioConfig {
                enabled: default_audio_enabled(),
                sound_path: default_sound_path(),
                player: None,
            },
            logging: LoggingConfig::default(),
            system: SystemConfig {
                shutdown_grace_seconds: default_shutdown_grace_seconds(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            mode: LogMode::Quiet,
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_camera_format() -> String {
    "MJPG".to_string()
}
fn default_target_fps() -> u32 {
    10
}
fn default_max_consecutive_failures() -> u32 {
    5
}
fn default_reconnect_base_delay_ms() -> u64 {
    500
}
fn default_reconnect_max_delay_ms() -> u64 {
    10_000
}
fn default_read_timeout_ms() -> u64 {
    2_000
}

fn default_model_path() -> String {
    "gesture_recognizer.task".to_string()
}
fn default_inference_timeout_ms() -> u64 {
    2_000
}

fn default_min_area() -> f64 {
    0.15
}
fn default_min_confidence() -> f32 {
    0.5
}
fn default_window_size() -> usize {
    8
}
fn default_min_votes() -> usize {
    6
}
fn default_cooldown_seconds() -> u64 {
    30
}

fn default_bark_url() -> String {
    "https://api.day.app".to_string()
}
fn default_notify_title() -> String {
    "Baby Care Record".to_string()
}
fn default_notify_group() -> String {
    "BabyMonitor".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5_000
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    1_000
}
fn default_exponential_backoff() -> bool {
    true
}

fn default_audio_enabled() -> bool {
    true
}
fn default_sound_path() -> String {
    "success.mp3".to_string()
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}
fn default_event_bus_capacity() -> usize {
    100
}
