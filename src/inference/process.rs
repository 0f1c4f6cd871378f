use super::classifier::GestureClassifier;
use crate::error::InferenceError;
use crate::frame::FrameData;
use crate::gesture::{BoundingBox, RawClassification};
use parking_lot::Mutex;
use serde::Deserialize;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One recognizer answer, shaped like the MediaPipe gesture recognizer result
#[derive(Debug, Deserialize, Default)]
pub(crate) struct RecognizerOutput {
    #[serde(default)]
    pub gestures: Vec<Category>,
    #[serde(default)]
    pub hand_landmarks: Vec<Vec<Landmark>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Category {
    pub category_name: String,
    pub score: f32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Landmark {
    pub x: f64,
    pub y: f64,
}

impl RecognizerOutput {
    /// Top category of the first hand and the area of that hand's landmarks.
    /// No gesture or no landmarks means no recognized hand.
    pub(crate) fn into_classification(self, frame: &FrameData) -> RawClassification {
        let top = self.gestures.into_iter().next();
        let area = self
            .hand_landmarks
            .first()
            .and_then(|hand| BoundingBox::from_points(hand.iter().map(|lm| (lm.x, lm.y))))
            .map(|bbox| bbox.area());

        match (top, area) {
            (Some(category), Some(area)) => RawClassification {
                label: category.category_name,
                confidence: category.score,
                area,
                frame_id: frame.id,
                timestamp: frame.timestamp,
            },
            _ => RawClassification::none(frame.id, frame.timestamp),
        }
    }
}

/// Pipes to one recognizer process. The child sits behind its own lock so
/// it can be killed while another thread is blocked reading its answer.
struct Session {
    child: Mutex<Child>,
    io: Mutex<SessionIo>,
    terminated: AtomicBool,
}

struct SessionIo {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SessionIo {
    fn exchange(&mut self, payload: &[u8]) -> std::io::Result<String> {
        let len = u32::try_from(payload.len()).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large")
        })?;
        self.stdin.write_all(&len.to_be_bytes())?;
        self.stdin.write_all(payload)?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "recognizer closed its output",
            ));
        }
        Ok(line)
    }
}

impl Session {
    /// Kill the recognizer and everything it started. A reader blocked on
    /// its output then sees EOF.
    fn terminate(&self) {
        if self.terminated.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut child = self.child.lock();
        #[cfg(unix)]
        {
            // The recognizer leads its own process group
            if let Ok(pid) = i32::try_from(child.id()) {
                // SAFETY: kill(2) has no memory-safety preconditions
                unsafe {
                    libc::kill(-pid, libc::SIGKILL);
                }
            }
        }
        let _ = child.kill();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.terminate();
        let _ = self.child.get_mut().wait();
    }
}

/// Classifier backed by an external recognizer process.
///
/// Frames are written to the process's stdin as a big-endian u32 length
/// followed by the encoded image; it answers with one JSON line per frame.
/// The process is started lazily. It is restarted after it dies, and
/// killed and restarted when a call is abandoned.
pub struct ProcessClassifier {
    program: String,
    args: Vec<String>,
    current: Mutex<Option<Arc<Session>>>,
    lock_wait: Duration,
}

impl ProcessClassifier {
    /// `command` is the recognizer argv; `model_path` is appended to it
    pub fn new(
        command: &[String],
        model_path: &str,
        lock_wait: Duration,
    ) -> Result<Self, InferenceError> {
        let (program, rest) = command.split_first().ok_or_else(|| InferenceError::Unavailable {
            details: "recognizer command is empty".to_string(),
        })?;

        let mut args = rest.to_vec();
        args.push(model_path.to_string());

        Ok(Self {
            program: program.clone(),
            args,
            current: Mutex::new(None),
            lock_wait,
        })
    }

    fn spawn(&self) -> Result<Session, InferenceError> {
        info!("Starting recognizer: {} {}", self.program, self.args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| InferenceError::Unavailable {
            details: format!("failed to start {}: {}", self.program, e),
        })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        match (stdin, stdout) {
            (Some(stdin), Some(stdout)) => Ok(Session {
                child: Mutex::new(child),
                io: Mutex::new(SessionIo {
                    stdin,
                    stdout: BufReader::new(stdout),
                }),
                terminated: AtomicBool::new(false),
            }),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                Err(InferenceError::Unavailable {
                    details: "recognizer pipes unavailable".to_string(),
                })
            }
        }
    }

    /// The running session, starting one if needed
    fn session(&self) -> Result<Arc<Session>, InferenceError> {
        let mut current = self.current.lock();
        if let Some(session) = current.as_ref() {
            return Ok(Arc::clone(session));
        }
        let session = Arc::new(self.spawn()?);
        *current = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Forget `session` if it is still the current one, then kill it
    fn discard(&self, session: &Arc<Session>) {
        {
            let mut current = self.current.lock();
            if current.as_ref().is_some_and(|c| Arc::ptr_eq(c, session)) {
                *current = None;
            }
        }
        session.terminate();
    }
}

impl GestureClassifier for ProcessClassifier {
    fn describe(&self) -> String {
        format!("recognizer process {}", self.program)
    }

    fn classify(&self, frame: &FrameData) -> Result<RawClassification, InferenceError> {
        if !frame.format.is_encoded_image() {
            return Err(InferenceError::Failed {
                details: format!("recognizer needs encoded images, got {:?}", frame.format),
            });
        }

        let session = self.session()?;

        // A hung call may still own the pipes
        let Some(mut io) = session.io.try_lock_for(self.lock_wait) else {
            warn!("Recognizer stuck on an earlier frame, restarting it");
            self.discard(&session);
            return Err(InferenceError::Failed {
                details: "recognizer busy with an earlier frame".to_string(),
            });
        };

        let line = match io.exchange(&frame.data) {
            Ok(line) => line,
            Err(e) => {
                drop(io);
                warn!("Recognizer I/O failed, restarting on next frame: {}", e);
                self.discard(&session);
                return Err(InferenceError::Failed {
                    details: e.to_string(),
                });
            }
        };
        drop(io);

        let output: RecognizerOutput =
            serde_json::from_str(line.trim()).map_err(|e| InferenceError::Protocol {
                details: format!("{}: {}", e, line.trim()),
            })?;

        Ok(output.into_classification(frame))
    }

    fn abandon(&self) {
        let session = self.current.lock().take();
        if let Some(session) = session {
            warn!("Recognizer timed out, killing it");
            session.terminate();
        }
    }
}
