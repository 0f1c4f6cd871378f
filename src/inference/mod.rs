mod classifier;
mod process;
mod scripted;

pub use classifier::{GestureClassifier, InferenceAdapter};
pub use process::ProcessClassifier;
pub use scripted::{ScriptEntry, ScriptedClassifier};

use crate::config::InferenceConfig;
use crate::error::InferenceError;
use std::sync::Arc;

/// Build the classifier the configuration selects: a replay script when one
/// is set, otherwise the recognizer process.
pub fn classifier_from_config(
    config: &InferenceConfig,
) -> Result<Arc<dyn GestureClassifier>, InferenceError> {
    if let Some(script) = &config.script {
        let classifier = ScriptedClassifier::from_file(script)?.looping(config.script_loop);
        return Ok(Arc::new(classifier));
    }

    if config.command.is_empty() {
        return Err(InferenceError::Unavailable {
            details: "no recognizer command or replay script configured".to_string(),
        });
    }

    Ok(Arc::new(ProcessClassifier::new(
        &config.command,
        &config.model_path,
        config.timeout(),
    )?))
}
