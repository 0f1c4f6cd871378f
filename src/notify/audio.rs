use super::channel::NotificationChannel;
use super::target::DispatchTarget;
use crate::config::AudioConfig;
use crate::error::DispatchError;
use crate::router::ActivityRecord;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Plays a confirmation sound through a platform player. Never retried.
pub struct AudioChannel {
    sound_path: PathBuf,
    player: Option<Vec<String>>,
}

impl AudioChannel {
    pub fn new(config: &AudioConfig) -> Self {
        let player = config
            .player
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect::<Vec<_>>())
            .filter(|argv| !argv.is_empty());

        Self {
            sound_path: PathBuf::from(&config.sound_path),
            player,
        }
    }

    pub fn sound_path(&self) -> &Path {
        &self.sound_path
    }

    /// Program and arguments used to play the sound
    pub fn player_command(&self) -> (String, Vec<String>) {
        let sound = self.sound_path.display().to_string();

        if let Some(argv) = &self.player {
            let mut args = argv[1..].to_vec();
            args.push(sound);
            return (argv[0].clone(), args);
        }

        platform_player(sound)
    }
}

#[cfg(target_os = "macos")]
fn platform_player(sound: String) -> (String, Vec<String>) {
    ("afplay".to_string(), vec![sound])
}

#[cfg(target_os = "windows")]
fn platform_player(sound: String) -> (String, Vec<String>) {
    (
        "powershell".to_string(),
        vec![
            "-c".to_string(),
            format!(
                "(New-Object System.Media.SoundPlayer '{}').PlaySync()",
                sound
            ),
        ],
    )
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn platform_player(sound: String) -> (String, Vec<String>) {
    (
        "ffplay".to_string(),
        vec![
            "-nodisp".to_string(),
            "-autoexit".to_string(),
            "-loglevel".to_string(),
            "quiet".to_string(),
            sound,
        ],
    )
}

#[async_trait]
impl NotificationChannel for AudioChannel {
    fn target(&self) -> DispatchTarget {
        DispatchTarget::LocalAudio
    }

    async fn deliver(&self, _record: &ActivityRecord) -> Result<(), DispatchError> {
        if !self.sound_path.exists() {
            return Err(DispatchError::AssetMissing {
                path: self.sound_path.display().to_string(),
            });
        }

        let (program, args) = self.player_command();
        debug!("Playing sound: {} {}", program, args.join(" "));

        let status = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|e| DispatchError::Audio {
                details: format!("failed to run {}: {}", program, e),
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(DispatchError::Audio {
                details: format!("{} exited with {}", program, status),
            })
        }
    }
}
