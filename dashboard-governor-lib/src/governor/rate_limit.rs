//! Sliding-window admission control per (user, endpoint).
//!
//! Each key keeps the timestamps of its admitted requests inside the trailing
//! window. Timestamps older than the window are pruned before every check, and
//! only admitted requests are appended, so a rejected attempt never consumes
//! quota.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::endpoint::{Endpoint, EndpointKey, UserId};

/// Default sliding window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// The endpoint has no quota configured.
    Unlimited,
    /// Request is allowed to proceed and has been counted.
    Allowed {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Number of requests remaining in the current window
        remaining: u32,
    },
    /// Request is rate limited and should be rejected.
    Limited {
        /// Maximum number of requests allowed in the window
        limit: u32,
        /// Time until the oldest counted request leaves the window
        reset_after: Duration,
    },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    pub fn is_allowed(&self) -> bool {
        !self.is_limited()
    }

    /// Returns true if the request is limited.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateLimitResult::Limited { .. })
    }

    /// Get the limit value, if the endpoint has one.
    pub fn limit(&self) -> Option<u32> {
        match self {
            RateLimitResult::Unlimited => None,
            RateLimitResult::Allowed { limit, .. } => Some(*limit),
            RateLimitResult::Limited { limit, .. } => Some(*limit),
        }
    }

    /// Get the remaining count. Zero when limited.
    pub fn remaining(&self) -> Option<u32> {
        match self {
            RateLimitResult::Unlimited => None,
            RateLimitResult::Allowed { remaining, .. } => Some(*remaining),
            RateLimitResult::Limited { .. } => Some(0),
        }
    }

    /// Get the reset duration if limited.
    pub fn reset_after(&self) -> Option<Duration> {
        match self {
            RateLimitResult::Limited { reset_after, .. } => Some(*reset_after),
            _ => None,
        }
    }
}

/// Default per-endpoint quotas, in requests per window.
pub fn default_quotas() -> AHashMap<Endpoint, u32> {
    let mut quotas = AHashMap::new();
    quotas.insert(Endpoint::Overview, 30);
    quotas.insert(Endpoint::Breakdown, 10);
    quotas.insert(Endpoint::Refresh, 5);
    quotas.insert(Endpoint::Export, 2);
    quotas
}

pub struct RateLimiter {
    quotas: AHashMap<Endpoint, u32>,
    window: Duration,
    windows: Mutex<AHashMap<EndpointKey, VecDeque<Instant>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(default_quotas(), DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(quotas: AHashMap<Endpoint, u32>, window: Duration) -> Self {
        Self { quotas, window, windows: Mutex::new(AHashMap::new()) }
    }

    pub fn quota(&self, endpoint: Endpoint) -> Option<u32> {
        self.quotas.get(&endpoint).copied()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Returns true when the request must be rejected. Admitted requests are counted.
    pub fn is_limited(&self, user: &UserId, endpoint: Endpoint) -> bool {
        self.check(user, endpoint).is_limited()
    }

    pub fn check(&self, user: &UserId, endpoint: Endpoint) -> RateLimitResult {
        self.check_at(user, endpoint, Instant::now())
    }

    /// Check and, on admission, count a request made at `now`.
    pub fn check_at(&self, user: &UserId, endpoint: Endpoint, now: Instant) -> RateLimitResult {
        let Some(limit) = self.quota(endpoint) else {
            return RateLimitResult::Unlimited;
        };

        let mut windows = self.windows.lock();
        let timestamps = windows.entry(EndpointKey::new(user, endpoint)).or_default();
        prune(timestamps, now, self.window);

        if timestamps.len() >= limit as usize {
            let reset_after = timestamps
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            return RateLimitResult::Limited { limit, reset_after };
        }

        timestamps.push_back(now);
        let used = u32::try_from(timestamps.len()).unwrap_or(u32::MAX);
        RateLimitResult::Allowed { limit, remaining: limit.saturating_sub(used) }
    }

    /// Requests currently counted against a key.
    pub fn in_window(&self, user: &UserId, endpoint: Endpoint, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        match windows.get_mut(&EndpointKey::new(user, endpoint)) {
            Some(timestamps) => {
                prune(timestamps, now, self.window);
                timestamps.len()
            }
            None => 0,
        }
    }

    pub fn tracked_windows(&self) -> usize {
        self.windows.lock().len()
    }

    /// Remove windows whose every entry has expired. Returns how many were removed.
    pub fn purge_expired(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();
        windows.retain(|_, timestamps| {
            prune(timestamps, now, self.window);
            !timestamps.is_empty()
        });
        windows.shrink_to_fit();
        before.saturating_sub(windows.len())
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(oldest) = timestamps.front() {
        if now.saturating_duration_since(*oldest) > window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
