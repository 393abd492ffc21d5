//! # Audio Module
//!
//! Per-connection recognition state and the PCM helpers engines share.
//!
//! ## Audio Format Requirements:
//! - **Sample Rate**: 16kHz by default (`recognizer.sample_rate`)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono (1 channel)
//! - **Encoding**: Little-endian signed integers, no header

pub mod pcm; // PCM16 decoding
pub mod session; // RecognizerSession: engine lifecycle for one connection

pub use session::{FeedOutcome, RecognizerSession, SessionConfig, SessionStats};
