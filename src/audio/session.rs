//! # Recognizer Session
//!
//! Wraps the one recognizer engine instance that belongs to a connection and
//! translates audio bytes and control intents into recognition outcomes.
//!
//! ## Session Lifecycle:
//! 1. **Created**: engine built for the configured sample rate, word detail set
//! 2. **Feeding**: audio chunks go straight to the engine (no buffering here;
//!    segmentation belongs to the engine)
//! 3. **Reset** (optional, repeatable): a fresh engine with the same settings
//!    is built and swapped in; the old one and its context are dropped
//! 4. **Finalized** (on `__end__`): the engine is flushed for a last result
//! 5. **Disposed**: the engine is released; safe to repeat
//!
//! ## Ownership:
//! The engine lives in an `Option<Box<dyn Recognizer>>` owned by the session,
//! so at most one engine handle exists per session at any time and only the
//! owning connection can reach it.

use crate::error::SessionError;
use crate::transcription::{Recognizer, RecognizerFactory};
use serde_json::Value;
use std::sync::Arc;

/// Settings every engine of a session is built with.
///
/// Fixed at creation and reused verbatim on reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// PCM sample rate in Hz
    pub sample_rate: u32,

    /// Whether results carry per-word timing/confidence
    pub words_enabled: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            words_enabled: true,
        }
    }
}

/// What feeding one chunk produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    /// Empty chunk; the engine was not touched
    NoOp,

    /// Engine is still inside a segment; carries its interim hypothesis
    PartialUpdate(Value),

    /// Engine closed a segment; carries the stable result for it
    SegmentFinalized(Value),
}

/// Counters for one session, logged when the connection ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Total bytes of audio fed to the engine
    pub audio_bytes: usize,

    /// Non-empty chunks fed
    pub chunks: u64,

    /// Segments the engine closed on its own
    pub segments: u64,

    /// Number of `__reset__` swaps
    pub resets: u32,
}

/// One connection's recognizer.
pub struct RecognizerSession {
    factory: Arc<dyn RecognizerFactory>,
    config: SessionConfig,
    engine: Option<Box<dyn Recognizer>>,
    stats: SessionStats,
}

impl RecognizerSession {
    /// Create a session with a freshly constructed engine.
    ///
    /// ## Errors:
    /// `SessionError::EngineInit` when the factory cannot build a recognizer.
    /// The failure is fatal for this connection only.
    pub fn create(factory: Arc<dyn RecognizerFactory>, config: SessionConfig) -> Result<Self, SessionError> {
        let engine = Self::build_engine(factory.as_ref(), &config)?;

        Ok(Self {
            factory,
            config,
            engine: Some(engine),
            stats: SessionStats::default(),
        })
    }

    fn build_engine(
        factory: &dyn RecognizerFactory,
        config: &SessionConfig,
    ) -> Result<Box<dyn Recognizer>, SessionError> {
        let mut engine = factory
            .create_recognizer(config.sample_rate)
            .map_err(|e| SessionError::EngineInit(e.to_string()))?;
        engine.set_word_detail(config.words_enabled);
        Ok(engine)
    }

    fn engine_mut(&mut self) -> Result<&mut Box<dyn Recognizer>, SessionError> {
        self.engine
            .as_mut()
            .ok_or_else(|| SessionError::EngineRuntime("session already disposed".to_string()))
    }

    /// Feed one chunk of PCM audio.
    ///
    /// An empty chunk is a no-op and leaves the engine state untouched.
    pub fn feed(&mut self, audio: &[u8]) -> Result<FeedOutcome, SessionError> {
        if audio.is_empty() {
            return Ok(FeedOutcome::NoOp);
        }

        let engine = self.engine_mut()?;
        let segment_closed = engine.accept_audio(audio)?;
        let outcome = if segment_closed {
            FeedOutcome::SegmentFinalized(engine.segment_result()?)
        } else {
            FeedOutcome::PartialUpdate(engine.partial_result()?)
        };

        self.stats.audio_bytes += audio.len();
        self.stats.chunks += 1;
        if matches!(outcome, FeedOutcome::SegmentFinalized(_)) {
            self.stats.segments += 1;
        }

        Ok(outcome)
    }

    /// Replace the engine with a fresh one built from the same settings.
    ///
    /// The new engine is constructed first and only then swapped in, so a
    /// failed construction never leaves the session without its old engine.
    pub fn reset(&mut self) -> Result<(), SessionError> {
        let fresh = Self::build_engine(self.factory.as_ref(), &self.config)?;
        // Old engine dropped here
        self.engine = Some(fresh);
        self.stats.resets += 1;
        Ok(())
    }

    /// Flush buffered audio and return the last result.
    ///
    /// With no audio fed, the engine returns its empty/default result.
    pub fn finalize(&mut self) -> Result<Value, SessionError> {
        let result = self.engine_mut()?.final_result()?;
        Ok(result)
    }

    /// Release the engine. Calling it again is harmless.
    pub fn dispose(&mut self) {
        self.engine.take();
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.engine.is_some()
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}
