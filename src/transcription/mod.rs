//! # Transcription Module
//!
//! Speech recognition engines behind one contract. The relay only talks to
//! [`RecognizerFactory`] and [`Recognizer`]; which engine answers is decided
//! once at startup from `recognizer.engine` in the configuration.
//!
//! ## Engines:
//! - **null**: built in, no model, recognizes nothing (protocol testing, demos);
//!   the default only in builds without `vosk`
//! - **vosk**: Kaldi-based streaming recognition, `--features vosk`

pub mod engine; // Engine traits shared by every implementation
pub mod null; // Model-free engine
#[cfg(test)]
pub mod scripted; // Deterministic engine for tests
#[cfg(feature = "vosk")]
pub mod vosk; // libvosk bindings

pub use engine::{Recognizer, RecognizerFactory};
pub use null::NullFactory;
#[cfg(feature = "vosk")]
pub use vosk::VoskFactory;

use crate::config::{EngineKind, RecognizerConfig};
use crate::error::StartupError;
use std::sync::Arc;
use tracing::warn;

/// Build the process-wide engine factory.
///
/// Called once in `main` before the server binds. Any failure here aborts
/// startup, so a running server always has a usable engine.
pub fn load_factory(config: &RecognizerConfig) -> Result<Arc<dyn RecognizerFactory>, StartupError> {
    match config.engine {
        EngineKind::Null => {
            warn!("Null recognizer selected: every transcript will be empty");
            Ok(Arc::new(NullFactory::new(config.null_segment_ms)))
        }
        #[cfg(feature = "vosk")]
        EngineKind::Vosk => Ok(Arc::new(VoskFactory::load(std::path::Path::new(
            &config.model_path,
        ))?)),
        #[cfg(not(feature = "vosk"))]
        EngineKind::Vosk => Err(StartupError::EngineUnavailable(EngineKind::Vosk.to_string())),
    }
}
