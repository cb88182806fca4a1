//! Admission control for governed dashboard requests.
//!
//! Every governed request moves through
//! `Received -> {Rejected(overload) | Rejected(rate-limit) | Admitted} -> Completed | Failed`.
//! Admission is synchronous: it takes the recorder and limiter locks briefly
//! and never waits on other requests.

use ahash::AHashSet;
use http::{Request, Response, StatusCode};
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::endpoint::{resolve_endpoint, Endpoint, UserId};
use super::estimator::{DurationEstimator, PriorityEstimator};
use super::memory::MemoryProbe;
use super::rate_limit::{RateLimitResult, RateLimiter};
use super::recorder::{MetricsRecorder, RecorderSnapshot};
use super::response::{
    annotate_response, apply_downstream_hints, rejection_response, RECOMMENDATION_TEXT,
};
use crate::config::GovernorConfig;
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Scheduling metadata attached to an admitted request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestMetadata {
    pub endpoint: Endpoint,
    /// Expected latency in seconds
    pub estimated_duration: f64,
    pub priority: i32,
    pub should_process_async: bool,
    pub start_time: Instant,
}

/// Why a request was turned away before reaching the downstream service.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("System temporarily overloaded")]
    Overloaded { memory_percent: f64, retry_after: u64 },

    #[error("Rate limit exceeded")]
    RateLimited { endpoint: Endpoint, retry_after: u64, limit: u32, reset_after: Duration },
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Overloaded { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Suggested delay in seconds before retrying
    pub fn retry_after(&self) -> u64 {
        match self {
            Rejection::Overloaded { retry_after, .. } => *retry_after,
            Rejection::RateLimited { retry_after, .. } => *retry_after,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Overloaded { .. } => values::REJECT_OVERLOADED,
            Rejection::RateLimited { .. } => values::REJECT_RATE_LIMITED,
        }
    }
}

impl From<&Rejection> for StatusCode {
    fn from(rejection: &Rejection) -> StatusCode {
        rejection.status()
    }
}

/// How a governed request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The downstream service produced a response with this status.
    Status(StatusCode),
    /// The downstream service returned an error instead of a response.
    Failed,
    /// The request was dropped before it finished.
    Cancelled,
}

impl Outcome {
    /// Only 2xx and 3xx responses count as success.
    pub fn is_success(&self) -> bool {
        match self {
            Outcome::Status(status) => (200..400).contains(&status.as_u16()),
            Outcome::Failed | Outcome::Cancelled => false,
        }
    }
}

/// Result of recording a completed request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub endpoint: Endpoint,
    pub elapsed: Duration,
    pub success: bool,
    pub priority: i32,
    pub recommendation: Option<&'static str>,
}

/// What a forced reclamation pass released.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclaimStats {
    pub rate_limit_windows: usize,
    pub metric_buckets: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernorSnapshot {
    pub timestamp_ms: u64,
    #[serde(flatten)]
    pub recorder: RecorderSnapshot,
    pub rate_limit_windows: usize,
}

pub struct RequestGovernor {
    config: GovernorConfig,
    expensive_endpoints: AHashSet<Endpoint>,
    recorder: MetricsRecorder,
    limiter: RateLimiter,
    priorities: PriorityEstimator,
    durations: DurationEstimator,
    memory: Arc<dyn MemoryProbe>,
    metrics: Option<Arc<Metrics>>,
}

impl RequestGovernor {
    pub fn new(config: GovernorConfig, memory: Arc<dyn MemoryProbe>) -> Self {
        let recorder =
            MetricsRecorder::new(config.sample_window, config.memory_history, config.trend_threshold);
        let limiter = RateLimiter::new(
            config.rate_limits.iter().map(|(k, v)| (*k, *v)).collect(),
            Duration::from_secs(config.rate_limit_window_secs),
        );
        let priorities = PriorityEstimator::new(
            config.priorities.iter().map(|(k, v)| (*k, *v)).collect(),
            config.default_priority,
            config.high_error_rate,
        );
        let durations = DurationEstimator::new(
            config.duration_estimates.iter().map(|(k, v)| (*k, *v)).collect(),
            config.default_duration_secs,
        );
        let expensive_endpoints = config.expensive_endpoints.iter().copied().collect();

        Self {
            config,
            expensive_endpoints,
            recorder,
            limiter,
            priorities,
            durations,
            memory,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.recorder
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn memory_probe(&self) -> &dyn MemoryProbe {
        self.memory.as_ref()
    }

    pub fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.as_ref()
    }

    /// Endpoint a path is governed as, or `None` for paths outside the dashboard.
    pub fn resolve(&self, path: &str) -> Option<Endpoint> {
        resolve_endpoint(&self.config.dashboard_prefix, path)
    }

    pub fn priority(&self, endpoint: Endpoint, user: &UserId) -> i32 {
        self.priorities.priority(endpoint, user, &self.recorder)
    }

    pub fn estimated_duration(&self, user: &UserId, endpoint: Endpoint) -> f64 {
        self.durations.estimate(user, endpoint, &self.recorder)
    }

    pub fn should_process_async(&self, endpoint: Endpoint, estimated_duration: f64) -> bool {
        estimated_duration > self.config.async_duration_threshold_secs
            || self.expensive_endpoints.contains(&endpoint)
    }

    pub fn admit(&self, user: &UserId, endpoint: Endpoint) -> Result<RequestMetadata, Rejection> {
        self.admit_at(user, endpoint, Instant::now())
    }

    /// Decide whether a request arriving at `now` may proceed.
    ///
    /// Memory overload is checked first and short-circuits the rate limiter,
    /// so an overloaded rejection never consumes quota.
    pub fn admit_at(
        &self,
        user: &UserId,
        endpoint: Endpoint,
        now: Instant,
    ) -> Result<RequestMetadata, Rejection> {
        match self.memory.memory_percent() {
            Ok(memory_percent) if memory_percent > self.config.overload_memory_percent => {
                error!(%user, %endpoint, memory_percent, "System overloaded, rejecting request");
                return Err(self.reject(Rejection::Overloaded {
                    memory_percent,
                    retry_after: self.config.overload_retry_after_secs,
                }, endpoint));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "Memory probe failed, skipping overload check");
                if let Some(m) = &self.metrics {
                    m.record_background_failure(values::COMPONENT_MEMORY_PROBE);
                }
            }
        }

        if let RateLimitResult::Limited { limit, reset_after } =
            self.limiter.check_at(user, endpoint, now)
        {
            warn!(%user, %endpoint, limit, "Rate limit exceeded");
            return Err(self.reject(Rejection::RateLimited {
                endpoint,
                retry_after: self.config.rate_limit_retry_after_secs,
                limit,
                reset_after,
            }, endpoint));
        }

        let estimated_duration = self.estimated_duration(user, endpoint);
        let metadata = RequestMetadata {
            endpoint,
            estimated_duration,
            priority: self.priority(endpoint, user),
            should_process_async: self.should_process_async(endpoint, estimated_duration),
            start_time: now,
        };

        if estimated_duration > self.config.expensive_operation_secs {
            info!(%endpoint, estimated_duration, "Expensive operation detected");
        }
        debug!(
            %user,
            %endpoint,
            priority = metadata.priority,
            estimated_duration,
            should_process_async = metadata.should_process_async,
            "Request admitted"
        );
        if let Some(m) = &self.metrics {
            m.record_admitted(endpoint);
        }

        Ok(metadata)
    }

    fn reject(&self, rejection: Rejection, endpoint: Endpoint) -> Rejection {
        if let Some(m) = &self.metrics {
            m.record_rejection(rejection.reason(), endpoint);
        }
        rejection
    }

    pub fn complete(&self, user: &UserId, metadata: &RequestMetadata, outcome: Outcome) -> Completion {
        self.complete_at(user, metadata, outcome, Instant::now())
    }

    /// Record the outcome of an admitted request that finished at `now`.
    pub fn complete_at(
        &self,
        user: &UserId,
        metadata: &RequestMetadata,
        outcome: Outcome,
        now: Instant,
    ) -> Completion {
        let elapsed = now.saturating_duration_since(metadata.start_time);
        let success = outcome.is_success();
        self.recorder.record_at(user, metadata.endpoint, elapsed, success, now);

        let recommendation = (elapsed.as_secs_f64()
            > metadata.estimated_duration * self.config.recommendation_factor)
            .then_some(RECOMMENDATION_TEXT);

        if let Some(m) = &self.metrics {
            m.record_completion(metadata.endpoint, elapsed.as_secs_f64(), success);
        }

        Completion {
            endpoint: metadata.endpoint,
            elapsed,
            success,
            priority: metadata.priority,
            recommendation,
        }
    }

    /// Admit a request and return a guard that records its completion.
    pub fn begin(&self, user: UserId, endpoint: Endpoint) -> Result<AdmissionGuard<'_>, Rejection> {
        let metadata = self.admit(&user, endpoint)?;
        Ok(AdmissionGuard { governor: self, user, metadata, finished: false })
    }

    /// Run `next` under governance.
    ///
    /// Requests outside the dashboard prefix, or without a user, are passed
    /// through untouched. Rejections become 429/503 responses. Admitted
    /// requests carry [`RequestMetadata`] in their extensions, their outcome is
    /// recorded, and a downstream error is returned unchanged after being
    /// recorded as a failure.
    pub async fn govern<B, F, Fut, E>(
        &self,
        mut req: Request<B>,
        user: Option<UserId>,
        next: F,
    ) -> Result<Response<RespBody>, E>
    where
        F: FnOnce(Request<B>) -> Fut,
        Fut: Future<Output = Result<Response<RespBody>, E>>,
    {
        let (Some(endpoint), Some(user)) = (self.resolve(req.uri().path()), user) else {
            return next(req).await;
        };

        let guard = match self.begin(user, endpoint) {
            Ok(guard) => guard,
            Err(rejection) => return Ok(rejection_response(&rejection)),
        };

        apply_downstream_hints(req.headers_mut(), guard.metadata());
        req.extensions_mut().insert(guard.metadata().clone());

        match next(req).await {
            Ok(mut resp) => {
                let completion = guard.finish(Outcome::Status(resp.status()));
                annotate_response(resp.headers_mut(), &completion);
                Ok(resp)
            }
            Err(e) => {
                guard.finish(Outcome::Failed);
                Err(e)
            }
        }
    }

    /// Release memory held by stale governance state.
    pub fn reclaim_memory(&self, idle_after: Duration) -> ReclaimStats {
        self.reclaim_memory_at(idle_after, Instant::now())
    }

    /// Release state that is stale as of `now`.
    pub fn reclaim_memory_at(&self, idle_after: Duration, now: Instant) -> ReclaimStats {
        ReclaimStats {
            rate_limit_windows: self.limiter.purge_expired(now),
            metric_buckets: self.recorder.compact(now, idle_after),
        }
    }

    pub fn snapshot(&self) -> GovernorSnapshot {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        GovernorSnapshot {
            timestamp_ms,
            recorder: self.recorder.snapshot(),
            rate_limit_windows: self.limiter.tracked_windows(),
        }
    }
}

/// Completion handle for an admitted request.
///
/// Dropping the guard without calling [`AdmissionGuard::finish`] records the
/// request as cancelled (a failed sample) so metrics stay consistent when the
/// host abandons a request.
pub struct AdmissionGuard<'a> {
    governor: &'a RequestGovernor,
    user: UserId,
    metadata: RequestMetadata,
    finished: bool,
}

impl AdmissionGuard<'_> {
    pub fn metadata(&self) -> &RequestMetadata {
        &self.metadata
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn finish(mut self, outcome: Outcome) -> Completion {
        self.finished = true;
        self.governor.complete(&self.user, &self.metadata, outcome)
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            debug!(user = %self.user, endpoint = %self.metadata.endpoint, "Governed request cancelled");
            self.governor.complete(&self.user, &self.metadata, Outcome::Cancelled);
        }
    }
}
