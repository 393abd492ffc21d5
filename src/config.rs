//! # Configuration Management
//!
//! This module handles loading the relay configuration from multiple sources:
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Key Rust Concepts Used:
//! - **Serde**: converts between Rust structs and TOML / environment values
//! - **derive macros**: generate Debug, Clone, Serialize, Deserialize
//! - **Result<T, E>**: loading can fail and the caller must handle it
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platform convention)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_RECOGNIZER__ENGINE`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! The configuration is read once at startup and never changes afterwards.
//! The engine factory built from it is shared read-only by every connection.

use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub recognizer: RecognizerConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: address to bind (`127.0.0.1` for development, `0.0.0.0` to expose)
/// - `port`: TCP port to listen on
/// - `max_frame_bytes`: largest WebSocket frame accepted from a client; an
///   audio chunk bigger than this is a transport error for that connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
}

/// Which recognizer engine backs the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Built-in engine without a model; recognizes nothing
    Null,
    /// Kaldi-based Vosk engine (requires the `vosk` cargo feature)
    Vosk,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Null => write!(f, "null"),
            EngineKind::Vosk => write!(f, "vosk"),
        }
    }
}

/// Recognizer settings applied to every session.
///
/// ## Fields:
/// - `engine`: engine implementation to load at startup
/// - `model_path`: directory with the engine's model data (Vosk only)
/// - `sample_rate`: PCM sample rate clients stream at, in Hz
/// - `words`: include per-word timing/confidence in final results
/// - `null_segment_ms`: audio length after which the null engine closes a
///   segment and reports a `final` result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub engine: EngineKind,
    pub model_path: String,
    pub sample_rate: u32,
    pub words: bool,
    pub null_segment_ms: u32,
}

/// Builds with a real engine default to it, so a missing model stops startup.
#[cfg(feature = "vosk")]
const DEFAULT_ENGINE: EngineKind = EngineKind::Vosk;
#[cfg(not(feature = "vosk"))]
const DEFAULT_ENGINE: EngineKind = EngineKind::Null;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(), // Localhost only (safe for development)
                port: 8080,
                max_frame_bytes: 1024 * 1024,
            },
            recognizer: RecognizerConfig {
                engine: DEFAULT_ENGINE,
                model_path: "models/vosk-model-small-en-us-0.15".to_string(),
                sample_rate: 16000, // 16kHz mono PCM16
                words: true,
                null_segment_ms: 2000,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: override server port
    /// - `APP_RECOGNIZER__ENGINE=vosk`: switch to the Vosk engine
    /// - `APP_RECOGNIZER__MODEL_PATH=/srv/models/en`: model directory
    /// - `HOST=0.0.0.0` / `PORT=3000`: deployment platform overrides
    ///
    /// Nested keys use a double underscore so that field names which contain
    /// a single underscore (`model_path`, `max_frame_bytes`) stay intact.
    pub fn load() -> Result<Self, StartupError> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Model *existence* is checked later, when the engine is loaded; this
    /// only rejects values that can never work.
    pub fn validate(&self) -> Result<(), StartupError> {
        if self.server.port == 0 {
            return Err(StartupError::Config("Server port cannot be 0".to_string()));
        }

        if self.server.max_frame_bytes == 0 {
            return Err(StartupError::Config(
                "Max frame size must be greater than 0".to_string(),
            ));
        }

        if self.recognizer.sample_rate == 0 {
            return Err(StartupError::Config(
                "Sample rate must be greater than 0".to_string(),
            ));
        }

        if self.recognizer.null_segment_ms == 0 {
            return Err(StartupError::Config(
                "Null engine segment length must be greater than 0".to_string(),
            ));
        }

        if self.recognizer.engine == EngineKind::Vosk && self.recognizer.model_path.trim().is_empty() {
            return Err(StartupError::Config(
                "Model path is required for the vosk engine".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.recognizer.sample_rate, 16000);
        assert!(config.recognizer.words);
        assert!(config.validate().is_ok());
    }

    #[cfg(feature = "vosk")]
    #[test]
    fn test_default_engine_is_vosk_when_compiled_in() {
        assert_eq!(AppConfig::default().recognizer.engine, EngineKind::Vosk);
    }

    #[cfg(not(feature = "vosk"))]
    #[test]
    fn test_default_engine_is_null_without_vosk() {
        assert_eq!(AppConfig::default().recognizer.engine, EngineKind::Null);
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.recognizer.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.server.max_frame_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_vosk_requires_model_path() {
        let mut config = AppConfig::default();
        config.recognizer.engine = EngineKind::Vosk;
        config.recognizer.model_path = "  ".to_string();
        assert!(config.validate().is_err());

        config.recognizer.model_path = "models/en".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_kind_names() {
        let kind: EngineKind = serde_json::from_str("\"vosk\"").unwrap();
        assert_eq!(kind, EngineKind::Vosk);
        assert_eq!(EngineKind::Null.to_string(), "null");
    }
}
