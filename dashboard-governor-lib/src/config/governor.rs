use serde::Deserialize;
use std::collections::HashMap;

use crate::governor::endpoint::Endpoint;
use crate::governor::estimator::{default_duration_estimates, default_priorities};
use crate::governor::rate_limit::default_quotas;

/// Request governor configuration
///
/// Endpoint tables are keyed by endpoint name:
/// "overview", "stats", "refresh", "breakdown", "export", "health-check",
/// "performance-metrics", "unknown".
///
/// ```toml
/// [governor.rate_limits]
/// overview = 30
/// export = 2
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GovernorConfig {
    /// Path fragment that marks a request as a dashboard request
    /// Default: "/api/dashboard/"
    #[serde(default = "default_dashboard_prefix")]
    pub dashboard_prefix: String,

    /// Sliding rate-limit window in seconds
    /// Default: 60
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_secs: u64,

    /// `retry_after` hint returned with 429 responses
    /// Default: 60
    #[serde(default = "default_rate_limit_retry_after")]
    pub rate_limit_retry_after_secs: u64,

    /// Memory utilization above which every governed request is rejected with 503
    /// Default: 95.0
    #[serde(default = "default_overload_memory_percent")]
    pub overload_memory_percent: f64,

    /// `retry_after` hint returned with 503 responses
    /// Default: 30
    #[serde(default = "default_overload_retry_after")]
    pub overload_retry_after_secs: u64,

    /// Estimated duration above which a request is flagged async-eligible
    /// Default: 0.2
    #[serde(default = "default_async_duration_threshold")]
    pub async_duration_threshold_secs: f64,

    /// Estimated duration above which an admitted request is logged as expensive
    /// Default: 2.0
    #[serde(default = "default_expensive_operation")]
    pub expensive_operation_secs: f64,

    /// Responses slower than this factor times the estimate get a recommendation header
    /// Default: 2.0
    #[serde(default = "default_recommendation_factor")]
    pub recommendation_factor: f64,

    /// Error rate above which a key's priority is pushed back
    /// Default: 0.1
    #[serde(default = "default_high_error_rate")]
    pub high_error_rate: f64,

    /// Memory trend threshold in percentage points
    /// Default: 5.0
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,

    /// Number of response-time samples kept per (user, endpoint)
    /// Default: 50
    #[serde(default = "default_sample_window")]
    pub sample_window: usize,

    /// Number of memory samples kept
    /// Default: 100
    #[serde(default = "default_memory_history")]
    pub memory_history: usize,

    /// Priority for endpoints missing from `priorities`
    /// Default: 5
    #[serde(default = "default_priority")]
    pub default_priority: i32,

    /// Duration estimate for endpoints missing from `duration_estimates`
    /// Default: 0.5
    #[serde(default = "default_duration")]
    pub default_duration_secs: f64,

    /// Endpoints always flagged async-eligible
    /// Default: ["refresh", "export", "breakdown"]
    #[serde(default = "default_expensive_endpoints")]
    pub expensive_endpoints: Vec<Endpoint>,

    /// Requests per window, per user. Endpoints not listed are never limited.
    /// Default: overview = 30, breakdown = 10, refresh = 5, export = 2
    #[serde(default = "default_rate_limits")]
    pub rate_limits: HashMap<Endpoint, u32>,

    /// Base priority per endpoint (lower = more urgent)
    #[serde(default = "default_priority_table")]
    pub priorities: HashMap<Endpoint, i32>,

    /// Fallback duration estimate per endpoint, in seconds
    #[serde(default = "default_duration_table")]
    pub duration_estimates: HashMap<Endpoint, f64>,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            dashboard_prefix: default_dashboard_prefix(),
            rate_limit_window_secs: default_rate_limit_window(),
            rate_limit_retry_after_secs: default_rate_limit_retry_after(),
            overload_memory_percent: default_overload_memory_percent(),
            overload_retry_after_secs: default_overload_retry_after(),
            async_duration_threshold_secs: default_async_duration_threshold(),
            expensive_operation_secs: default_expensive_operation(),
            recommendation_factor: default_recommendation_factor(),
            high_error_rate: default_high_error_rate(),
            trend_threshold: default_trend_threshold(),
            sample_window: default_sample_window(),
            memory_history: default_memory_history(),
            default_priority: default_priority(),
            default_duration_secs: default_duration(),
            expensive_endpoints: default_expensive_endpoints(),
            rate_limits: default_rate_limits(),
            priorities: default_priority_table(),
            duration_estimates: default_duration_table(),
        }
    }
}

fn default_dashboard_prefix() -> String {
    "/api/dashboard/".to_string()
}

fn default_rate_limit_window() -> u64 {
    60
}

fn default_rate_limit_retry_after() -> u64 {
    60
}

fn default_overload_memory_percent() -> f64 {
    95.0
}

fn default_overload_retry_after() -> u64 {
    30
}

fn default_async_duration_threshold() -> f64 {
    0.2
}

fn default_expensive_operation() -> f64 {
    2.0
}

fn default_recommendation_factor() -> f64 {
    2.0
}

fn default_high_error_rate() -> f64 {
    0.1
}

fn default_trend_threshold() -> f64 {
    5.0
}

fn default_sample_window() -> usize {
    50
}

fn default_memory_history() -> usize {
    100
}

fn default_priority() -> i32 {
    5
}

fn default_duration() -> f64 {
    0.5
}

fn default_expensive_endpoints() -> Vec<Endpoint> {
    vec![Endpoint::Refresh, Endpoint::Export, Endpoint::Breakdown]
}

fn default_rate_limits() -> HashMap<Endpoint, u32> {
    default_quotas().into_iter().collect()
}

fn default_priority_table() -> HashMap<Endpoint, i32> {
    default_priorities().into_iter().collect()
}

fn default_duration_table() -> HashMap<Endpoint, f64> {
    default_duration_estimates().into_iter().collect()
}
