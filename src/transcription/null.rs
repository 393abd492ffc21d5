//! # Null Engine
//!
//! A recognizer that hears nothing. It needs no model data, so the relay can
//! run (and the protocol can be exercised end to end) without a speech model
//! installed.
//!
//! Results use the same JSON shapes as Vosk: partials are
//! `{"partial": ""}` and segment/final results are `{"text": ""}`. A segment
//! closes every time `segment_ms` of audio has accumulated, which keeps the
//! partial/final cadence realistic for clients.

use crate::audio::pcm;
use crate::error::EngineError;
use crate::transcription::engine::{Recognizer, RecognizerFactory};
use serde_json::{json, Value};

/// Factory for [`NullRecognizer`]s.
#[derive(Debug, Clone)]
pub struct NullFactory {
    segment_ms: u32,
}

impl NullFactory {
    pub fn new(segment_ms: u32) -> Self {
        Self { segment_ms }
    }
}

impl RecognizerFactory for NullFactory {
    fn name(&self) -> &str {
        "null"
    }

    fn create_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, EngineError> {
        let segment_samples = pcm::samples_for_ms(sample_rate, self.segment_ms);
        if segment_samples == 0 {
            return Err(EngineError::Init(format!(
                "segment of {}ms at {}Hz holds no samples",
                self.segment_ms, sample_rate
            )));
        }

        Ok(Box::new(NullRecognizer {
            segment_samples,
            pending_samples: 0,
        }))
    }
}

/// Counts samples and closes a segment every `segment_samples`.
#[derive(Debug)]
pub struct NullRecognizer {
    segment_samples: usize,
    pending_samples: usize,
}

impl NullRecognizer {
    fn empty_result() -> Value {
        json!({ "text": "" })
    }
}

impl Recognizer for NullRecognizer {
    // Nothing is ever recognized, so there are no words to time.
    fn set_word_detail(&mut self, _enabled: bool) {}

    fn accept_audio(&mut self, data: &[u8]) -> Result<bool, EngineError> {
        self.pending_samples += pcm::sample_count(data);

        if self.pending_samples >= self.segment_samples {
            // Carry the overshoot into the next segment
            self.pending_samples %= self.segment_samples;
            return Ok(true);
        }

        Ok(false)
    }

    fn partial_result(&mut self) -> Result<Value, EngineError> {
        Ok(json!({ "partial": "" }))
    }

    fn segment_result(&mut self) -> Result<Value, EngineError> {
        Ok(Self::empty_result())
    }

    fn final_result(&mut self) -> Result<Value, EngineError> {
        self.pending_samples = 0;
        Ok(Self::empty_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence(ms: u32) -> Vec<u8> {
        vec![0u8; pcm::samples_for_ms(16000, ms) * pcm::BYTES_PER_SAMPLE]
    }

    #[test]
    fn test_null_factory_name() {
        assert_eq!(NullFactory::new(2000).name(), "null");
    }

    #[test]
    fn test_segment_closes_after_configured_audio() {
        let factory = NullFactory::new(300);
        let mut recognizer = factory.create_recognizer(16000).unwrap();

        assert!(!recognizer.accept_audio(&silence(100)).unwrap());
        assert!(!recognizer.accept_audio(&silence(100)).unwrap());
        assert!(recognizer.accept_audio(&silence(100)).unwrap());
        // Next segment starts from zero
        assert!(!recognizer.accept_audio(&silence(100)).unwrap());
    }

    #[test]
    fn test_overshoot_counts_toward_next_segment() {
        let factory = NullFactory::new(300);
        let mut recognizer = factory.create_recognizer(16000).unwrap();

        // 250ms + 250ms closes the first segment with 200ms left over
        assert!(!recognizer.accept_audio(&silence(250)).unwrap());
        assert!(recognizer.accept_audio(&silence(250)).unwrap());
        assert!(recognizer.accept_audio(&silence(100)).unwrap());
    }

    #[test]
    fn test_results_are_empty_text() {
        let mut recognizer = NullFactory::new(2000).create_recognizer(16000).unwrap();
        recognizer.accept_audio(&silence(100)).unwrap();

        assert_eq!(recognizer.partial_result().unwrap(), json!({ "partial": "" }));
        assert_eq!(recognizer.final_result().unwrap(), json!({ "text": "" }));
    }

    #[test]
    fn test_zero_length_segment_rejected() {
        let factory = NullFactory::new(0);
        let result = factory.create_recognizer(16000);
        assert!(matches!(result, Err(EngineError::Init(_))));
    }
}
