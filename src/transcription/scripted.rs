//! Deterministic engine for tests.
//!
//! Audio bytes are read as UTF-8 text, so a test can "say" words by sending
//! them as binary frames. A chunk ending in `.` closes the segment, and a
//! chunk containing `!fail` makes the engine error out.

use crate::error::EngineError;
use crate::transcription::engine::{Recognizer, RecognizerFactory};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct ScriptedFactory {
    created: AtomicUsize,
    create_limit: Option<usize>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self {
            created: AtomicUsize::new(0),
            create_limit: None,
        }
    }

    /// Factory whose construction fails once `limit` recognizers exist.
    pub fn failing_after(limit: usize) -> Self {
        Self {
            created: AtomicUsize::new(0),
            create_limit: Some(limit),
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognizerFactory for ScriptedFactory {
    fn name(&self) -> &str {
        "scripted"
    }

    fn create_recognizer(&self, sample_rate: u32) -> Result<Box<dyn Recognizer>, EngineError> {
        let already = self.created.load(Ordering::SeqCst);
        if self.create_limit.map_or(false, |limit| already >= limit) {
            return Err(EngineError::Init("scripted model unavailable".to_string()));
        }
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedRecognizer {
            sample_rate,
            heard: Vec::new(),
            words: false,
        }))
    }
}

pub struct ScriptedRecognizer {
    sample_rate: u32,
    heard: Vec<String>,
    words: bool,
}

impl ScriptedRecognizer {
    fn take_segment(&mut self) -> Value {
        let words = std::mem::take(&mut self.heard);
        let mut value = json!({ "text": words.join(" ") });
        if self.words && !words.is_empty() {
            value["result"] = Value::Array(
                words
                    .iter()
                    .map(|w| json!({ "word": w, "conf": 1.0, "sample_rate": self.sample_rate }))
                    .collect(),
            );
        }
        value
    }
}

impl Recognizer for ScriptedRecognizer {
    fn set_word_detail(&mut self, enabled: bool) {
        self.words = enabled;
    }

    fn accept_audio(&mut self, data: &[u8]) -> Result<bool, EngineError> {
        let text = String::from_utf8_lossy(data);
        if text.contains("!fail") {
            return Err(EngineError::Runtime("scripted decoder failure".to_string()));
        }

        let trimmed = text.trim();
        let closes = trimmed.ends_with('.');
        self.heard.extend(
            trimmed
                .trim_end_matches('.')
                .split_whitespace()
                .map(str::to_string),
        );
        Ok(closes)
    }

    fn partial_result(&mut self) -> Result<Value, EngineError> {
        Ok(json!({ "partial": self.heard.join(" ") }))
    }

    fn segment_result(&mut self) -> Result<Value, EngineError> {
        Ok(self.take_segment())
    }

    fn final_result(&mut self) -> Result<Value, EngineError> {
        Ok(self.take_segment())
    }
}
