use ahash::AHashMap;

use super::endpoint::{Endpoint, UserId};
use super::recorder::{MemoryTrend, MetricsRecorder};

pub const DEFAULT_PRIORITY: i32 = 5;
pub const DEFAULT_DURATION_SECS: f64 = 0.5;
pub const DEFAULT_HIGH_ERROR_RATE: f64 = 0.1;

const ERROR_PENALTY: i32 = 2;
const MEMORY_PENALTY: i32 = 1;

pub fn default_priorities() -> AHashMap<Endpoint, i32> {
    let mut table = AHashMap::new();
    table.insert(Endpoint::HealthCheck, 0);
    table.insert(Endpoint::Overview, 1);
    table.insert(Endpoint::Stats, 1);
    table.insert(Endpoint::Refresh, 2);
    table.insert(Endpoint::Breakdown, 3);
    table.insert(Endpoint::Export, 4);
    table
}

pub fn default_duration_estimates() -> AHashMap<Endpoint, f64> {
    let mut table = AHashMap::new();
    table.insert(Endpoint::Overview, 0.1);
    table.insert(Endpoint::Stats, 0.05);
    table.insert(Endpoint::Refresh, 0.8);
    table.insert(Endpoint::Breakdown, 0.3);
    table.insert(Endpoint::Export, 2.0);
    table.insert(Endpoint::HealthCheck, 0.02);
    table
}

/// Maps (endpoint, user) to a scheduling priority. Lower is more urgent.
///
/// The base value comes from a static table and is pushed back when the
/// key has been failing or memory is climbing. The result is not clamped.
pub struct PriorityEstimator {
    table: AHashMap<Endpoint, i32>,
    default_priority: i32,
    high_error_rate: f64,
}

impl Default for PriorityEstimator {
    fn default() -> Self {
        Self::new(default_priorities(), DEFAULT_PRIORITY, DEFAULT_HIGH_ERROR_RATE)
    }
}

impl PriorityEstimator {
    pub fn new(table: AHashMap<Endpoint, i32>, default_priority: i32, high_error_rate: f64) -> Self {
        Self { table, default_priority, high_error_rate }
    }

    pub fn base(&self, endpoint: Endpoint) -> i32 {
        self.table.get(&endpoint).copied().unwrap_or(self.default_priority)
    }

    pub fn priority(&self, endpoint: Endpoint, user: &UserId, recorder: &MetricsRecorder) -> i32 {
        let mut priority = self.base(endpoint);
        if recorder.error_rate(user, endpoint) > self.high_error_rate {
            priority = priority.saturating_add(ERROR_PENALTY);
        }
        if recorder.memory_trend() == MemoryTrend::Increasing {
            priority = priority.saturating_add(MEMORY_PENALTY);
        }
        priority
    }
}

/// Predicts request latency in seconds from history, falling back to a static table.
pub struct DurationEstimator {
    fallback: AHashMap<Endpoint, f64>,
    default_secs: f64,
}

impl Default for DurationEstimator {
    fn default() -> Self {
        Self::new(default_duration_estimates(), DEFAULT_DURATION_SECS)
    }
}

impl DurationEstimator {
    pub fn new(fallback: AHashMap<Endpoint, f64>, default_secs: f64) -> Self {
        Self { fallback, default_secs }
    }

    pub fn fallback(&self, endpoint: Endpoint) -> f64 {
        self.fallback.get(&endpoint).copied().unwrap_or(self.default_secs)
    }

    pub fn estimate(&self, user: &UserId, endpoint: Endpoint, recorder: &MetricsRecorder) -> f64 {
        let average = recorder.average_response_time(user, endpoint);
        if average != 0.0 {
            average
        } else {
            self.fallback(endpoint)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn unknown_endpoints_get_defaults() {
        let priorities = PriorityEstimator::default();
        let durations = DurationEstimator::default();
        assert_eq!(priorities.base(Endpoint::Unknown), 5);
        assert_eq!(priorities.base(Endpoint::PerformanceMetrics), 5);
        assert_eq!(durations.fallback(Endpoint::Unknown), 0.5);
    }

    #[test]
    fn history_overrides_fallback() {
        let recorder = MetricsRecorder::default();
        let durations = DurationEstimator::default();
        let user = UserId::from(3);

        assert_eq!(durations.estimate(&user, Endpoint::Export, &recorder), 2.0);

        recorder.record(&user, Endpoint::Export, Duration::from_millis(400), true);
        recorder.record(&user, Endpoint::Export, Duration::from_millis(600), true);

        let estimate = durations.estimate(&user, Endpoint::Export, &recorder);
        assert!((estimate - 0.5).abs() < 1e-9, "got {estimate}");
    }
}
