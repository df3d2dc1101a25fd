//! # Application State Management
//!
//! This module holds everything the HTTP handlers share:
//! - the configuration, read once at startup and never changed afterwards
//! - the three upstream service handles
//! - request metrics, updated by the metrics middleware on every request
//!
//! ## Key Rust Concepts (IMPORTANT for beginners):
//!
//! ### Arc (Atomically Reference Counted)
//! - **Purpose**: Allows multiple parts of the program to safely share ownership of data
//! - **Why needed**: actix-web clones the state into every worker thread
//!
//! ### Immutable sharing vs. RwLock
//! - **Config and clients**: Read-only after startup, so a plain `Arc<T>` is enough
//! - **Metrics**: Written on every request, so they sit behind `Arc<RwLock<T>>`
//!
//! The handlers themselves never touch shared mutable state; only the middleware does.

use crate::clients::ServiceClients;
use crate::config::AppConfig;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

/// The main application state that's shared across all HTTP request handlers.
///
/// ## Rust Concepts:
/// - **#[derive(Clone)]**: Cloning only bumps the Arc reference counts
/// - **Arc<AppConfig>**: Shared, immutable configuration
/// - **Instant**: A point in time (for measuring uptime)
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration (immutable for the process lifetime)
    pub config: Arc<AppConfig>,

    /// Token issuer, translator and synthesizer handles
    pub clients: Arc<ServiceClients>,

    /// Request metrics (updated by every request)
    pub metrics: Arc<RwLock<AppMetrics>>,

    /// When the server started
    pub start_time: Instant,
}

/// Request metrics collected across all HTTP requests.
///
/// ## Why these metrics matter:
/// - **request_count**: Total requests processed (for load monitoring)
/// - **error_count**: Total 4xx/5xx responses (for reliability monitoring)
/// - **endpoint_metrics**: Per-endpoint statistics, keyed by "METHOD /path"
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    pub request_count: u64,
    pub error_count: u64,
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for a specific API endpoint.
///
/// ## Performance calculations:
/// - **Average response time**: total_duration_ms / request_count
/// - **Error rate**: error_count / request_count
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    /// Create the shared state, building the upstream clients from the configuration.
    ///
    /// ## What this does:
    /// 1. Builds the three service handles (fails if the HTTP client cannot be created)
    /// 2. Wraps config and clients in Arc for cheap cloning into workers
    /// 3. Creates empty metrics and records the start time
    pub fn new(config: AppConfig) -> Result<Self> {
        let clients = ServiceClients::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            clients: Arc::new(clients),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        })
    }

    /// Read access to the metrics. A poisoned lock still holds valid counters.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Increment the total request counter (called by middleware for every request).
    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    /// Increment the total error counter (called for every 4xx/5xx response).
    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    /// Record detailed metrics for a specific endpoint.
    ///
    /// ## Parameters:
    /// - **endpoint**: The API endpoint (e.g., "GET /synthesize")
    /// - **duration_ms**: How long the request took to process (in milliseconds)
    /// - **is_error**: Whether this request resulted in an error status
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics_write();
        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();

        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Get a snapshot of current metrics (used for the /metrics endpoint).
    ///
    /// Cloning releases the lock before the response is serialized.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    /// Get server uptime in seconds.
    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl AppMetrics {
    /// Overall error rate from 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

impl EndpointMetric {
    /// Calculate the average response time for this endpoint.
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Calculate the error rate for this endpoint (0.0 to 1.0).
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(AppConfig::for_upstream("http://127.0.0.1:9")).unwrap()
    }

    #[test]
    fn test_endpoint_metrics_accumulate() {
        let state = state();
        state.record_endpoint_request("GET /token", 10, false);
        state.record_endpoint_request("GET /token", 30, true);

        let metrics = state.get_metrics_snapshot();
        let token = &metrics.endpoint_metrics["GET /token"];
        assert_eq!(token.request_count, 2);
        assert_eq!(token.error_count, 1);
        assert_eq!(token.average_duration_ms(), 20.0);
        assert_eq!(token.error_rate(), 0.5);
    }

    #[test]
    fn test_clones_share_metrics() {
        let state = state();
        let clone = state.clone();
        clone.increment_request_count();
        clone.increment_error_count();
        state.increment_request_count();

        let metrics = state.get_metrics_snapshot();
        assert_eq!(metrics.request_count, 2);
        assert_eq!(metrics.error_rate(), 0.5);
    }
}
