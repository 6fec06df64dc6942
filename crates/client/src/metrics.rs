//! Metrics collection for API calls and token exchanges.
//!
//! This module records, through the `metrics` facade:
//! - Request latency histograms
//! - Request, retry and error counters
//! - Token exchange outcomes and latency
//!
//! # What this module does NOT handle:
//! - Metrics exposition/export (install a recorder in the host application)
//! - Alerting or threshold monitoring
//!
//! # Invariants
//! - All metrics use consistent label names: `endpoint`, `method`, `status`, `error_category`, `outcome`
//! - Metric recording is infallible and never disrupts API calls
//! - Zero-cost when no metrics recorder is installed

use crate::error::ClientError;
use std::time::Duration;

/// Metric name for request duration histogram.
pub const METRIC_REQUEST_DURATION: &str = "facility_api_request_duration_seconds";

/// Metric name for total request counter.
pub const METRIC_REQUESTS_TOTAL: &str = "facility_api_requests_total";

/// Metric name for retry counter.
pub const METRIC_RETRIES_TOTAL: &str = "facility_api_retries_total";

/// Metric name for error counter.
pub const METRIC_ERRORS_TOTAL: &str = "facility_api_errors_total";

/// Metric name for token exchange counter.
pub const METRIC_TOKEN_EXCHANGES_TOTAL: &str = "facility_api_token_exchanges_total";

/// Metric name for token exchange duration histogram.
pub const METRIC_TOKEN_EXCHANGE_DURATION: &str = "facility_api_token_exchange_duration_seconds";

/// Metric name for requests forwarded without a token.
pub const METRIC_UNAUTHENTICATED_REQUESTS: &str = "facility_api_unauthenticated_requests_total";

/// Error categories for metrics labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport-level errors (connection refused, DNS, proxy, etc.)
    Transport,
    /// Request timeout
    Timeout,
    /// Token exchange failures
    Auth,
    /// HTTP 4xx client errors
    Http4xx,
    /// HTTP 5xx server errors
    Http5xx,
    /// Rate limiting outlasted the retry budget
    RateLimited,
    /// Unknown/unclassified errors
    Unknown,
}

impl ErrorCategory {
    /// Returns the string label for this error category.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Http4xx => "http_4xx",
            ErrorCategory::Http5xx => "http_5xx",
            ErrorCategory::RateLimited => "rate_limited",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl From<&ClientError> for ErrorCategory {
    fn from(error: &ClientError) -> Self {
        match error {
            ClientError::AuthFailed(_) => ErrorCategory::Auth,
            ClientError::MaxRetriesExceeded(_) => ErrorCategory::RateLimited,
            ClientError::ApiError { status, .. } => {
                if (400..500).contains(status) {
                    ErrorCategory::Http4xx
                } else if (500..600).contains(status) {
                    ErrorCategory::Http5xx
                } else {
                    ErrorCategory::Unknown
                }
            }
            ClientError::HttpError(e) if e.is_timeout() => ErrorCategory::Timeout,
            ClientError::HttpError(e) if e.is_connect() || e.is_request() => {
                ErrorCategory::Transport
            }
            _ => ErrorCategory::Unknown,
        }
    }
}

/// Metrics collector for facility API calls.
///
/// A lightweight wrapper around the `metrics` crate macros, providing
/// type-safe methods for recording metrics with consistent labels.
///
/// # Example
///
/// ```rust,ignore
/// use facility_client::metrics::MetricsCollector;
///
/// let collector = MetricsCollector::new();
/// collector.record_request_duration("/api/sites", "GET", Duration::from_millis(150), Some(200));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    enabled: bool,
}

impl MetricsCollector {
    /// Create an enabled metrics collector.
    pub fn new() -> Self {
        Self { enabled: true }
    }

    /// Create a collector that records nothing.
    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Record the duration of an API request.
    ///
    /// `status` is `None` if the request failed before receiving a response.
    pub fn record_request_duration(
        &self,
        endpoint: &str,
        method: &str,
        duration: Duration,
        status: Option<u16>,
    ) {
        if !self.enabled {
            return;
        }

        let status_label = status.map_or("error".to_string(), |s| s.to_string());

        metrics::histogram!(METRIC_REQUEST_DURATION,
            "endpoint" => endpoint.to_string(),
            "method" => method.to_string(),
            "status" => status_label,
        )
        .record(duration.as_secs_f64());
    }

    /// Record a request attempt, including retries.
    pub fn record_request(&self, endpoint: &str, method: &str) {
        if !self.enabled {
            return;
        }

        metrics::counter!(METRIC_REQUESTS_TOTAL,
            "endpoint" => endpoint.to_string(),
            "method" => method.to_string(),
        )
        .increment(1);
    }

    /// Record a retry attempt (1-based `attempt`).
    pub fn record_retry(&self, endpoint: &str, method: &str, attempt: usize) {
        if !self.enabled {
            return;
        }

        metrics::counter!(METRIC_RETRIES_TOTAL,
            "endpoint" => endpoint.to_string(),
            "method" => method.to_string(),
            "attempt" => attempt.to_string(),
        )
        .increment(1);
    }

    pub fn record_error(&self, endpoint: &str, method: &str, category: ErrorCategory) {
        if !self.enabled {
            return;
        }

        metrics::counter!(METRIC_ERRORS_TOTAL,
            "endpoint" => endpoint.to_string(),
            "method" => method.to_string(),
            "error_category" => category.as_str(),
        )
        .increment(1);
    }

    /// Record an error from a ClientError, categorizing it automatically.
    pub fn record_client_error(&self, endpoint: &str, method: &str, error: &ClientError) {
        self.record_error(endpoint, method, ErrorCategory::from(error));
    }

    /// Record a finished token exchange. `outcome` is `success` or `failure`.
    pub fn record_token_exchange(&self, outcome: &'static str, duration: Duration) {
        if !self.enabled {
            return;
        }

        metrics::counter!(METRIC_TOKEN_EXCHANGES_TOTAL, "outcome" => outcome).increment(1);
        metrics::histogram!(METRIC_TOKEN_EXCHANGE_DURATION, "outcome" => outcome)
            .record(duration.as_secs_f64());
    }

    /// Record a request that went out without a bearer token.
    pub fn record_unauthenticated_request(&self, endpoint: &str) {
        if !self.enabled {
            return;
        }

        metrics::counter!(METRIC_UNAUTHENTICATED_REQUESTS,
            "endpoint" => endpoint.to_string(),
        )
        .increment(1);
    }
}
