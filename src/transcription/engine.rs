//! # Recognizer Engine Contract
//!
//! The relay never looks inside a speech recognizer. Every engine is reached
//! through two traits:
//!
//! - **RecognizerFactory**: loaded once at startup (model data lives here) and
//!   shared read-only by all connections
//! - **Recognizer**: one stateful decoder instance, owned by exactly one
//!   session and bound to one sample rate
//!
//! ## Result values:
//! Results are `serde_json::Value`s produced by the engine and forwarded to
//! the client untouched. Only the engine knows their shape (at minimum a text
//! field; optionally per-word timing and confidence).

use crate::error::EngineError;
use serde_json::Value;

/// Builds independent recognizer instances from shared model data.
///
/// ## Thread Safety:
/// `Send + Sync` because the factory sits in `AppState` and every connection
/// calls `create_recognizer` concurrently. Implementations that wrap a
/// non-reentrant native constructor must serialize it internally.
pub trait RecognizerFactory: Send + Sync {
    /// Short engine name for logs and the health endpoint.
    fn name(&self) -> &str;

    /// Construct a fresh recognizer for audio at `sample_rate` Hz.
    fn create_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, EngineError>;
}

/// One stateful decoder instance.
///
/// Calls arrive strictly one at a time from the owning session.
pub trait Recognizer: Send {
    /// Enable or disable per-word details in segment and final results.
    fn set_word_detail(&mut self, enabled: bool);

    /// Feed little-endian PCM16 mono bytes.
    ///
    /// Returns `true` when the engine closed a segment; the caller then reads
    /// it with [`Recognizer::segment_result`].
    fn accept_audio(&mut self, pcm: &[u8]) -> Result<bool, EngineError>;

    /// Current interim hypothesis for the open segment.
    fn partial_result(&mut self) -> Result<Value, EngineError>;

    /// Result of the segment that the last `accept_audio` call closed.
    fn segment_result(&mut self) -> Result<Value, EngineError>;

    /// Flush whatever audio is still buffered and return its result.
    fn final_result(&mut self) -> Result<Value, EngineError>;
}
