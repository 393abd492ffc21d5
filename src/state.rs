//! # Application State Management
//!
//! State shared by every HTTP request and every WebSocket connection.
//!
//! ## What is shared, and how:
//! - **config**: read-only after startup, so a plain `Arc<AppConfig>`
//! - **engine**: the recognizer factory, loaded once and shared read-only
//!   (`Arc<dyn RecognizerFactory>`); each connection builds its own engine
//!   instance from it, so no recognizer state is ever shared
//! - **metrics**: counters updated from many threads, `Arc<RwLock<AppMetrics>>`
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: multiple ownership (every worker holds a clone of AppState)
//! - **RwLock**: many readers (health checks) or one writer (counter updates)

use crate::audio::SessionConfig;
use crate::config::AppConfig;
use crate::transcription::RecognizerFactory;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state, cloned into every actix worker.
#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded at startup (never changes afterwards)
    pub config: Arc<AppConfig>,

    /// Process-wide recognizer factory
    pub engine: Arc<dyn RecognizerFactory>,

    /// Request and session counters
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started (Instant is Copy, no lock needed)
    pub start_time: Instant,
}

/// Counters collected across HTTP requests and relay sessions.
///
/// ## Why these metrics matter:
/// - **active_sessions**: open WebSocket connections right now
/// - **failed_sessions**: connections closed with 1011 (engine or transport error)
/// - **events_sent**: partial/final/system messages delivered to clients
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of HTTP errors (4xx/5xx) since server start
    pub error_count: u64,

    /// Currently open relay sessions
    pub active_sessions: u32,

    /// Relay sessions opened since server start
    pub total_sessions: u64,

    /// Sessions that ended with a fatal error
    pub failed_sessions: u64,

    /// Recognition events sent to clients
    pub events_sent: u64,

    /// `__reset__` commands honoured
    pub resets: u64,

    /// Detailed metrics per endpoint, keyed like "GET /health"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific HTTP endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    /// Number of requests to this endpoint
    pub request_count: u64,

    /// Total processing time for this endpoint (milliseconds)
    pub total_duration_ms: u64,

    /// Number of requests that ended in an error status
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, engine: Arc<dyn RecognizerFactory>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Settings every new relay session is created with.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sample_rate: self.config.recognizer.sample_rate,
            words_enabled: self.config.recognizer.words,
        }
    }

    /// Counters are plain integers; a panic while holding the lock cannot
    /// leave them inconsistent, so a poisoned lock is simply reused.
    fn metrics_mut(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn metrics_ref(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_mut().request_count += 1;
    }

    /// Increment the total error counter (called when a request fails).
    pub fn increment_error_count(&self) {
        self.metrics_mut().error_count += 1;
    }

    /// Record timing for one request to `endpoint`.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_mut();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// A relay connection created its session.
    pub fn session_opened(&self) {
        let mut metrics = self.metrics_mut();
        metrics.active_sessions += 1;
        metrics.total_sessions += 1;
    }

    /// A relay connection ended. Guards against underflow so a session that
    /// never opened cannot drive the gauge below zero.
    pub fn session_closed(&self, failed: bool) {
        let mut metrics = self.metrics_mut();
        if metrics.active_sessions > 0 {
            metrics.active_sessions -= 1;
        }
        if failed {
            metrics.failed_sessions += 1;
        }
    }

    /// A connection failed before its session existed.
    pub fn session_rejected(&self) {
        self.metrics_mut().failed_sessions += 1;
    }

    pub fn record_event_sent(&self) {
        self.metrics_mut().events_sent += 1;
    }

    pub fn record_reset(&self) {
        self.metrics_mut().resets += 1;
    }

    /// Copy of the current metrics, so no lock is held while serializing.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_ref().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    /// Average response time in milliseconds (0.0 before the first request).
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Share of requests that failed, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
