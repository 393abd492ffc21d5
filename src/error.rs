//! # Error Handling
//!
//! Error types for the relay, split by where a failure can happen:
//!
//! - **EngineError**: raised by a recognizer engine (construction or decoding)
//! - **SessionError**: what a single connection sees; always fatal to that
//!   connection and never to any other
//! - **StartupError**: configuration or model problems found before the server
//!   binds; these abort the whole process
//!
//! A client disconnect and an unrecognized control frame are *not* errors and
//! have no variant here. The connection loop models them as ordinary outcomes.
//!
//! ## Rust Concepts:
//! - **enum**: each variant is one kind of failure carrying its message
//! - **Display**: the text a client sees as the WebSocket close reason
//! - **From**: lets `?` convert engine errors into session errors

use std::fmt;

/// Failure reported by a recognizer engine implementation.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The engine could not construct a recognizer instance
    Init(String),

    /// The engine rejected audio or failed while decoding
    Runtime(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Init(msg) => write!(f, "recognizer init failed: {}", msg),
            EngineError::Runtime(msg) => write!(f, "recognizer failed: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Errors that end one connection.
///
/// ## Close semantics:
/// Every variant closes the WebSocket with code 1011 (internal error) and the
/// `Display` text as the close reason. No automatic retry happens; the client
/// must reconnect to get a new session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Recognizer construction failed (on connect or on `__reset__`)
    EngineInit(String),

    /// Feeding or finalizing audio failed mid-session
    EngineRuntime(String),

    /// An outbound event could not be encoded as JSON
    Serialization(String),

    /// The transport itself reported a protocol violation
    Transport(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::EngineInit(msg) => write!(f, "engine init error: {}", msg),
            SessionError::EngineRuntime(msg) => write!(f, "engine runtime error: {}", msg),
            SessionError::Serialization(msg) => write!(f, "serialization error: {}", msg),
            SessionError::Transport(msg) => write!(f, "transport error: {}", msg),
        }
    }
}

impl std::error::Error for SessionError {}

/// Engine errors keep their phase when they surface at session level.
impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Init(msg) => SessionError::EngineInit(msg),
            EngineError::Runtime(msg) => SessionError::EngineRuntime(msg),
        }
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::Serialization(err.to_string())
    }
}

/// Errors that prevent the process from starting.
///
/// ## When this happens:
/// - config.toml has invalid syntax or values fail validation
/// - the configured model directory is missing or the model fails to load
/// - the configured engine was not compiled into this binary
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded or failed validation
    Config(String),

    /// Model directory missing, unreadable, or rejected by the engine
    Model { path: String, reason: String },

    /// The selected engine needs a cargo feature that is not enabled
    EngineUnavailable(String),
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(msg) => write!(f, "Configuration error: {}", msg),
            StartupError::Model { path, reason } => {
                write!(f, "Model error at {}: {}", path, reason)
            }
            StartupError::EngineUnavailable(engine) => write!(
                f,
                "Engine '{}' is not available in this build (rebuild with --features {})",
                engine, engine
            ),
        }
    }
}

impl std::error::Error for StartupError {}

impl From<config::ConfigError> for StartupError {
    fn from(err: config::ConfigError) -> Self {
        StartupError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_keeps_phase() {
        let init: SessionError = EngineError::Init("no model".to_string()).into();
        assert_eq!(init, SessionError::EngineInit("no model".to_string()));

        let runtime: SessionError = EngineError::Runtime("bad audio".to_string()).into();
        assert_eq!(runtime, SessionError::EngineRuntime("bad audio".to_string()));
    }

    #[test]
    fn test_session_error_display_is_close_reason() {
        let err = SessionError::EngineRuntime("decoder crashed".to_string());
        assert_eq!(err.to_string(), "engine runtime error: decoder crashed");
    }

    #[test]
    fn test_startup_error_names_feature() {
        let err = StartupError::EngineUnavailable("vosk".to_string());
        assert!(err.to_string().contains("--features vosk"));
    }
}
