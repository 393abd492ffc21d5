//! # Vosk Engine
//!
//! Kaldi-based streaming recognition through the `vosk` crate. Only compiled
//! with `--features vosk`; the build then links against the native libvosk.
//!
//! ## Model Loading:
//! The model directory is loaded exactly once at startup. A missing directory
//! or a model the library rejects is a startup error, never a per-connection
//! one. libvosk allows concurrent recognizer construction from one model, so
//! the factory needs no lock.

use crate::audio::pcm;
use crate::error::{EngineError, StartupError};
use crate::transcription::engine::{Recognizer, RecognizerFactory};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;
use vosk::{CompleteResult, DecodingState, Model, Word};

/// Shared, read-only Vosk model.
pub struct VoskFactory {
    model: Model,
    path: PathBuf,
}

impl VoskFactory {
    /// Load the model at `path`.
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        if !path.is_dir() {
            return Err(StartupError::Model {
                path: path.display().to_string(),
                reason: "model directory not found (download and unzip a Vosk model there)"
                    .to_string(),
            });
        }

        info!("Loading Vosk model from {}", path.display());
        let model = Model::new(path.to_string_lossy()).ok_or_else(|| StartupError::Model {
            path: path.display().to_string(),
            reason: "libvosk could not load the model".to_string(),
        })?;

        let factory = Self {
            model,
            path: path.to_path_buf(),
        };
        info!("Vosk model ready at {}", factory.path().display());
        Ok(factory)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecognizerFactory for VoskFactory {
    fn name(&self) -> &str {
        "vosk"
    }

    fn create_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, EngineError> {
        let inner = vosk::Recognizer::new(&self.model, sample_rate as f32).ok_or_else(|| {
            EngineError::Init(format!(
                "could not create recognizer at {}Hz from {}",
                sample_rate,
                self.path().display()
            ))
        })?;

        Ok(Box::new(VoskRecognizer { inner }))
    }
}

/// One libvosk recognizer.
pub struct VoskRecognizer {
    inner: vosk::Recognizer,
}

fn words_to_json(words: &[Word<'_>]) -> Value {
    Value::Array(
        words
            .iter()
            .map(|w| {
                json!({
                    "conf": w.conf,
                    "start": w.start,
                    "end": w.end,
                    "word": w.word,
                })
            })
            .collect(),
    )
}

/// Rebuild libvosk's result JSON: `text`, plus `result` when word detail
/// produced any words.
fn complete_to_json(result: CompleteResult<'_>) -> Result<Value, EngineError> {
    let single = result.single().ok_or_else(|| {
        EngineError::Runtime("unexpected multi-alternative result".to_string())
    })?;

    let mut value = json!({ "text": single.text });
    if !single.result.is_empty() {
        value["result"] = words_to_json(&single.result);
    }
    Ok(value)
}

impl Recognizer for VoskRecognizer {
    fn set_word_detail(&mut self, enabled: bool) {
        self.inner.set_words(enabled);
    }

    fn accept_audio(&mut self, data: &[u8]) -> Result<bool, EngineError> {
        let samples = pcm::decode_pcm16(data);

        match self.inner.accept_waveform(&samples) {
            Ok(DecodingState::Finalized) => Ok(true),
            Ok(DecodingState::Running) => Ok(false),
            Ok(DecodingState::Failed) => Err(EngineError::Runtime(
                "decoder rejected the audio".to_string(),
            )),
            Err(err) => Err(EngineError::Runtime(format!("{:?}", err))),
        }
    }

    fn partial_result(&mut self) -> Result<Value, EngineError> {
        let partial = self.inner.partial_result();
        Ok(json!({ "partial": partial.partial }))
    }

    fn segment_result(&mut self) -> Result<Value, EngineError> {
        complete_to_json(self.inner.result())
    }

    fn final_result(&mut self) -> Result<Value, EngineError> {
        complete_to_json(self.inner.final_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_directory_is_startup_error() {
        let result = VoskFactory::load(Path::new("/nonexistent/vosk-model"));
        assert!(matches!(result, Err(StartupError::Model { .. })));
    }
}
