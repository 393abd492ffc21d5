//! # Relay Wire Protocol
//!
//! ## Client → Server:
//! - **Binary**: raw PCM16LE mono audio, any chunk size
//! - **Text**: `__end__` (flush and close), `__reset__` (new utterance
//!   context); any other text is ignored
//!
//! ## Server → Client:
//! Text frames carrying one JSON object each:
//! ```json
//! {"type": "partial", "data": {"partial": "hello wor"}}
//! {"type": "final",   "data": {"text": "hello world", "result": [...]}}
//! {"type": "system",  "data": "reset"}
//! ```
//! `data` for partial/final is the engine's result, passed through as is.

use crate::error::SessionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const END_COMMAND: &str = "__end__";
pub const RESET_COMMAND: &str = "__reset__";

/// Status string acknowledging a reset.
pub const RESET_ACK: &str = "reset";

/// Instructions a client can send as text frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    End,
    Reset,
}

impl ControlCommand {
    /// Exact, case-sensitive match against the command vocabulary.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            END_COMMAND => Some(ControlCommand::End),
            RESET_COMMAND => Some(ControlCommand::Reset),
            _ => None,
        }
    }
}

/// One inbound unit, classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// PCM audio (possibly empty)
    Audio(&'a [u8]),

    /// A recognized control command
    Control(ControlCommand),

    /// Text outside the vocabulary
    Noise,
}

impl<'a> Frame<'a> {
    pub fn from_text(text: &str) -> Frame<'static> {
        match ControlCommand::parse(text) {
            Some(cmd) => Frame::Control(cmd),
            None => Frame::Noise,
        }
    }

    pub fn from_binary(data: &'a [u8]) -> Self {
        Frame::Audio(data)
    }
}

/// Outbound message to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum RecognitionEvent {
    /// Interim hypothesis, may still change
    Partial(Value),

    /// Stable result for a closed segment, or the flush on `__end__`
    Final(Value),

    /// Session lifecycle notice
    System(String),
}

impl RecognitionEvent {
    pub fn reset_ack() -> Self {
        RecognitionEvent::System(RESET_ACK.to_string())
    }

    /// Event type as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            RecognitionEvent::Partial(_) => "partial",
            RecognitionEvent::Final(_) => "final",
            RecognitionEvent::System(_) => "system",
        }
    }

    pub fn to_json(&self) -> Result<String, SessionError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_control_vocabulary() {
        assert_eq!(Frame::from_text("__end__"), Frame::Control(ControlCommand::End));
        assert_eq!(Frame::from_text("__reset__"), Frame::Control(ControlCommand::Reset));
        assert_eq!(Frame::from_text("foo"), Frame::Noise);
        // Commands are matched exactly
        assert_eq!(Frame::from_text(" __end__"), Frame::Noise);
        assert_eq!(Frame::from_text("__END__"), Frame::Noise);
    }

    #[test]
    fn test_event_envelope() {
        let event = RecognitionEvent::Partial(json!({ "partial": "hel" }));
        let value: Value = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "partial", "data": { "partial": "hel" } }));

        let value: Value = serde_json::from_str(&RecognitionEvent::reset_ack().to_json().unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "system", "data": "reset" }));
    }

    #[test]
    fn test_engine_payload_passes_through() {
        let payload = json!({
            "text": "hi there",
            "result": [{ "word": "hi", "start": 0.1, "end": 0.3, "conf": 0.98 }],
            "extra": { "nested": true }
        });
        let event = RecognitionEvent::Final(payload.clone());
        let decoded: RecognitionEvent = serde_json::from_str(&event.to_json().unwrap()).unwrap();
        assert_eq!(decoded, RecognitionEvent::Final(payload));
        assert_eq!(decoded.kind(), "final");
    }
}
