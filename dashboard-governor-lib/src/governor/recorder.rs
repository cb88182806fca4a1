//! Rolling per-(user, endpoint) performance metrics and system memory history.
//!
//! All bucket mutations go through a single mutex. Operations are O(1)
//! amortized (or O(window) for averages), so the coarse lock is not contended
//! for long. Memory history has its own lock since it is written by the
//! background sampler rather than by request handlers.

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use super::endpoint::{Endpoint, EndpointKey, UserId};
use super::memory::MemoryProbe;
use crate::error::Result;

/// Default number of samples kept per key.
pub const DEFAULT_SAMPLE_WINDOW: usize = 50;
/// Default number of memory samples kept.
pub const DEFAULT_MEMORY_HISTORY: usize = 100;
/// Default trend threshold, in percentage points.
pub const DEFAULT_TREND_THRESHOLD: f64 = 5.0;

const ERROR_WEIGHT: f64 = 0.1;
const ERROR_RETENTION: f64 = 0.9;
const SUCCESS_DECAY: f64 = 0.95;
const TREND_SPAN: usize = 5;

/// A single completed request observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestSample {
    pub duration: Duration,
    pub success: bool,
    pub timestamp: Instant,
}

/// Coarse direction of recent memory utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryTrend {
    Stable,
    Increasing,
    Decreasing,
}

impl fmt::Display for MemoryTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryTrend::Stable => "stable",
            MemoryTrend::Increasing => "increasing",
            MemoryTrend::Decreasing => "decreasing",
        };
        f.write_str(s)
    }
}

#[derive(Default)]
struct Buckets {
    samples: AHashMap<EndpointKey, VecDeque<RequestSample>>,
    error_rates: AHashMap<EndpointKey, f64>,
}

/// Per-key view used by [`RecorderSnapshot`].
#[derive(Debug, Clone, Serialize)]
pub struct KeySnapshot {
    pub user: UserId,
    pub endpoint: Endpoint,
    pub samples: usize,
    pub avg_response_time: f64,
    pub error_rate: f64,
}

/// Point-in-time view of everything the recorder tracks.
#[derive(Debug, Clone, Serialize)]
pub struct RecorderSnapshot {
    pub keys: Vec<KeySnapshot>,
    pub memory_samples: usize,
    pub latest_memory_percent: Option<f64>,
    pub memory_trend: MemoryTrend,
}

pub struct MetricsRecorder {
    buckets: Mutex<Buckets>,
    memory: Mutex<VecDeque<f64>>,
    sample_window: usize,
    memory_history: usize,
    trend_threshold: f64,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_WINDOW, DEFAULT_MEMORY_HISTORY, DEFAULT_TREND_THRESHOLD)
    }
}

impl MetricsRecorder {
    /// Create a recorder.
    ///
    /// `sample_window` and `memory_history` are clamped to at least 1.
    pub fn new(sample_window: usize, memory_history: usize, trend_threshold: f64) -> Self {
        let memory_history = memory_history.max(1);
        Self {
            buckets: Mutex::new(Buckets::default()),
            memory: Mutex::new(VecDeque::with_capacity(memory_history)),
            sample_window: sample_window.max(1),
            memory_history,
            trend_threshold,
        }
    }

    pub fn record(&self, user: &UserId, endpoint: Endpoint, duration: Duration, success: bool) {
        self.record_at(user, endpoint, duration, success, Instant::now());
    }

    /// Append a sample taken at `timestamp` and update the error-rate EMA.
    pub fn record_at(
        &self,
        user: &UserId,
        endpoint: Endpoint,
        duration: Duration,
        success: bool,
        timestamp: Instant,
    ) {
        let key = EndpointKey::new(user, endpoint);
        let mut buckets = self.buckets.lock();

        let window = buckets.samples.entry(key.clone()).or_default();
        window.push_back(RequestSample { duration, success, timestamp });
        while window.len() > self.sample_window {
            window.pop_front();
        }

        let rate = buckets.error_rates.entry(key).or_insert(0.0);
        *rate = if success {
            *rate * SUCCESS_DECAY
        } else {
            (*rate * ERROR_RETENTION) + ERROR_WEIGHT
        };
    }

    /// Mean duration of the current window in seconds, 0.0 when nothing was recorded.
    pub fn average_response_time(&self, user: &UserId, endpoint: Endpoint) -> f64 {
        let key = EndpointKey::new(user, endpoint);
        let buckets = self.buckets.lock();
        match buckets.samples.get(&key) {
            Some(window) if !window.is_empty() => {
                let total: f64 = window.iter().map(|s| s.duration.as_secs_f64()).sum();
                total / window.len() as f64
            }
            _ => 0.0,
        }
    }

    pub fn error_rate(&self, user: &UserId, endpoint: Endpoint) -> f64 {
        let key = EndpointKey::new(user, endpoint);
        self.buckets.lock().error_rates.get(&key).copied().unwrap_or(0.0)
    }

    /// Samples currently retained for a key, oldest first.
    pub fn samples(&self, user: &UserId, endpoint: Endpoint) -> Vec<RequestSample> {
        let key = EndpointKey::new(user, endpoint);
        self.buckets
            .lock()
            .samples
            .get(&key)
            .map(|window| window.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Read the probe and append the reading to the memory history.
    pub fn sample_memory(&self, probe: &dyn MemoryProbe) -> Result<f64> {
        let percent = probe.memory_percent()?;
        self.push_memory_sample(percent);
        Ok(percent)
    }

    pub fn push_memory_sample(&self, percent: f64) {
        let mut history = self.memory.lock();
        history.push_back(percent);
        while history.len() > self.memory_history {
            history.pop_front();
        }
    }

    pub fn memory_samples(&self) -> Vec<f64> {
        self.memory.lock().iter().copied().collect()
    }

    /// Compare the three newest samples against the first two of the last five.
    ///
    /// The sums are always divided by 3 and 2, so with only two samples the
    /// newer side is under-weighted and two equal readings read as decreasing.
    /// With fewer than five samples the two slices overlap. Fewer than two
    /// samples is reported as stable.
    pub fn memory_trend(&self) -> MemoryTrend {
        let history = self.memory.lock();
        if history.len() < 2 {
            return MemoryTrend::Stable;
        }

        let recent: Vec<f64> = history
            .iter()
            .skip(history.len().saturating_sub(TREND_SPAN))
            .copied()
            .collect();

        let newest = &recent[recent.len().saturating_sub(3)..];
        let oldest = &recent[..recent.len().min(2)];
        let trend = newest.iter().sum::<f64>() / 3.0 - oldest.iter().sum::<f64>() / 2.0;

        if trend > self.trend_threshold {
            MemoryTrend::Increasing
        } else if trend < -self.trend_threshold {
            MemoryTrend::Decreasing
        } else {
            MemoryTrend::Stable
        }
    }

    /// Drop buckets whose newest sample is older than `idle_after` and
    /// release spare capacity. Returns the number of keys removed.
    pub fn compact(&self, now: Instant, idle_after: Duration) -> usize {
        let mut buckets = self.buckets.lock();
        let Buckets { samples, error_rates } = &mut *buckets;

        let before = samples.len();
        samples.retain(|_, window| {
            window
                .back()
                .is_some_and(|newest| now.saturating_duration_since(newest.timestamp) <= idle_after)
        });
        error_rates.retain(|key, _| samples.contains_key(key));
        let removed = before.saturating_sub(samples.len());

        samples.shrink_to_fit();
        error_rates.shrink_to_fit();
        for window in samples.values_mut() {
            window.shrink_to_fit();
        }
        self.memory.lock().shrink_to_fit();

        removed
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().samples.len()
    }

    pub fn snapshot(&self) -> RecorderSnapshot {
        let keys = {
            let buckets = self.buckets.lock();
            let mut keys: Vec<KeySnapshot> = buckets
                .samples
                .iter()
                .map(|(key, window)| {
                    let total: f64 = window.iter().map(|s| s.duration.as_secs_f64()).sum();
                    KeySnapshot {
                        user: key.user.clone(),
                        endpoint: key.endpoint,
                        samples: window.len(),
                        avg_response_time: if window.is_empty() {
                            0.0
                        } else {
                            total / window.len() as f64
                        },
                        error_rate: buckets.error_rates.get(key).copied().unwrap_or(0.0),
                    }
                })
                .collect();
            keys.sort_by(|a, b| (&a.user, a.endpoint).cmp(&(&b.user, b.endpoint)));
            keys
        };

        let (memory_samples, latest_memory_percent) = {
            let history = self.memory.lock();
            (history.len(), history.back().copied())
        };

        RecorderSnapshot {
            keys,
            memory_samples,
            latest_memory_percent,
            memory_trend: self.memory_trend(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder_with_memory(samples: &[f64]) -> MetricsRecorder {
        let recorder = MetricsRecorder::default();
        for s in samples {
            recorder.push_memory_sample(*s);
        }
        recorder
    }

    #[test]
    fn trend_needs_two_samples() {
        assert_eq!(recorder_with_memory(&[]).memory_trend(), MemoryTrend::Stable);
        assert_eq!(recorder_with_memory(&[90.0]).memory_trend(), MemoryTrend::Stable);
    }

    #[test]
    fn trend_uses_last_five_samples() {
        // The leading 10.0 readings fall outside the five-sample span.
        let recorder = recorder_with_memory(&[10.0, 10.0, 50.0, 50.0, 52.0, 51.0, 53.0]);
        assert_eq!(recorder.memory_trend(), MemoryTrend::Stable);
    }

    #[test]
    fn trend_with_two_equal_samples_is_decreasing() {
        // 100 / 3 - 100 / 2
        assert_eq!(recorder_with_memory(&[50.0, 50.0]).memory_trend(), MemoryTrend::Decreasing);
    }

    #[test]
    fn trend_with_three_samples_overlaps_slices() {
        // (40 + 40 + 60) / 3 - (40 + 40) / 2 = 6.67
        assert_eq!(recorder_with_memory(&[40.0, 40.0, 60.0]).memory_trend(), MemoryTrend::Increasing);
    }

    #[test]
    fn compact_drops_idle_keys_only() {
        let recorder = MetricsRecorder::default();
        let start = Instant::now();
        let idle = UserId::from(1);
        let active = UserId::from(2);
        recorder.record_at(&idle, Endpoint::Overview, Duration::from_millis(10), false, start);
        recorder.record_at(
            &active,
            Endpoint::Overview,
            Duration::from_millis(10),
            true,
            start + Duration::from_secs(3000),
        );

        let removed = recorder.compact(start + Duration::from_secs(3700), Duration::from_secs(3600));

        assert_eq!(removed, 1);
        assert_eq!(recorder.tracked_keys(), 1);
        assert_eq!(recorder.error_rate(&idle, Endpoint::Overview), 0.0);
        assert_eq!(recorder.samples(&active, Endpoint::Overview).len(), 1);
    }
}
