//! Background maintenance of downstream connection pools and governor state.
//!
//! Two independent loops run for the lifetime of the process:
//! - the monitor loop samples memory, runs an idle-connection pass and forces
//!   a reclamation pass when memory is under pressure;
//! - the pool-trim loop reclaims idle connections on a slower cadence.
//!
//! Failures are logged and counted, never propagated to request handling.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::OptimizerConfig;
use crate::error::{GovernorError, Result};
use crate::governor::{ReclaimStats, RequestGovernor};
use crate::telemetry::metrics::values;
use crate::telemetry::Metrics;

/// A pool of reusable downstream connections that can drop its idle members.
pub trait IdlePool: Send + Sync {
    fn name(&self) -> &str;

    /// Close connections that are not currently in use.
    fn reclaim_idle(&self) -> Result<()>;
}

pub struct ConnectionPoolOptimizer {
    config: OptimizerConfig,
    governor: Arc<RequestGovernor>,
    pools: Vec<Arc<dyn IdlePool>>,
    trim_passes: Mutex<AHashMap<String, u64>>,
    metrics: Option<Arc<Metrics>>,
}

impl ConnectionPoolOptimizer {
    pub fn new(config: OptimizerConfig, governor: Arc<RequestGovernor>) -> Self {
        Self {
            config,
            governor,
            pools: Vec::new(),
            trim_passes: Mutex::new(AHashMap::new()),
            metrics: None,
        }
    }

    pub fn with_pool(mut self, pool: Arc<dyn IdlePool>) -> Self {
        self.pools.push(pool);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn pools(&self) -> usize {
        self.pools.len()
    }

    /// Number of trim passes run so far on the named pool.
    pub fn trim_passes(&self, pool: &str) -> u64 {
        self.trim_passes.lock().get(pool).copied().unwrap_or(0)
    }

    /// Run the idle-connection pass on every pool.
    ///
    /// Every pool is attempted; the first failure is returned.
    pub fn reclaim_pools(&self) -> Result<()> {
        let mut first_error = None;
        for pool in &self.pools {
            match pool.reclaim_idle() {
                Ok(()) => {
                    if let Some(m) = &self.metrics {
                        m.record_pool_reclaim(pool.name());
                    }
                }
                Err(e) => {
                    warn!(pool = pool.name(), error = %e, "Idle connection reclaim failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Release stale governor state, then run an idle-connection pass.
    pub fn reclaim_memory(&self, trigger: &'static str) -> Result<ReclaimStats> {
        self.reclaim_memory_at(trigger, Instant::now())
    }

    pub fn reclaim_memory_at(&self, trigger: &'static str, now: Instant) -> Result<ReclaimStats> {
        let stats = self
            .governor
            .reclaim_memory_at(Duration::from_secs(self.config.idle_bucket_secs), now);
        self.reclaim_pools()?;

        if let Some(m) = &self.metrics {
            let released = stats.rate_limit_windows.saturating_add(stats.metric_buckets);
            m.record_memory_reclaim(trigger, u64::try_from(released).unwrap_or(u64::MAX));
        }
        info!(
            trigger,
            rate_limit_windows = stats.rate_limit_windows,
            metric_buckets = stats.metric_buckets,
            "Memory reclamation pass completed"
        );
        Ok(stats)
    }

    /// One iteration of the monitor loop. Returns the sampled memory utilization.
    pub fn monitor_tick(&self) -> Result<f64> {
        self.monitor_tick_at(Instant::now())
    }

    /// Monitor iteration treating `now` as the current time for reclamation.
    pub fn monitor_tick_at(&self, now: Instant) -> Result<f64> {
        let percent = self
            .governor
            .recorder()
            .sample_memory(self.governor.memory_probe())?;
        if let Some(m) = &self.metrics {
            m.record_memory_usage(percent);
        }

        if percent > self.config.memory_pressure_percent {
            warn!(memory_percent = percent, "Memory pressure detected, forcing reclamation");
            self.reclaim_memory_at(values::TRIGGER_PRESSURE, now)?;
        } else {
            self.reclaim_pools()?;
            debug!(memory_percent = percent, "Monitor tick completed");
        }
        Ok(percent)
    }

    /// One iteration of the pool-trim loop.
    pub fn trim_tick(&self) -> Result<()> {
        let mut first_error = None;
        for pool in &self.pools {
            if let Err(e) = pool.reclaim_idle() {
                warn!(pool = pool.name(), error = %e, "Pool trim failed");
                first_error.get_or_insert(e);
                continue;
            }

            let passes = {
                let mut counts = self.trim_passes.lock();
                let count = counts.entry(pool.name().to_string()).or_insert(0);
                *count = count.saturating_add(1);
                *count
            };
            if let Some(m) = &self.metrics {
                m.record_pool_reclaim(pool.name());
            }
            info!(pool = pool.name(), passes, "Connection pool trimmed");
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Manually trigger a forced reclamation including the idle-connection pass.
    ///
    /// Returns `true` on success.
    pub fn optimize_now(&self) -> bool {
        match self.reclaim_memory(values::TRIGGER_MANUAL) {
            Ok(stats) => {
                info!(?stats, "Dashboard performance optimization completed");
                true
            }
            Err(e) => {
                error!(error = %e, "Dashboard performance optimization failed");
                if let Some(m) = &self.metrics {
                    m.record_background_failure(values::COMPONENT_MONITOR);
                }
                false
            }
        }
    }

    /// Start both background loops.
    pub fn spawn(self: Arc<Self>) -> OptimizerHandle {
        let cancel = CancellationToken::new();

        let monitor = tokio::spawn(self.clone().monitor_loop(cancel.clone()));
        let trimmer = tokio::spawn(self.trim_loop(cancel.clone()));

        OptimizerHandle { cancel, tasks: vec![monitor, trimmer] }
    }

    async fn monitor_loop(self: Arc<Self>, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.monitor_interval_secs);
        let backoff = Duration::from_secs(self.config.error_backoff_secs);
        info!(?period, "Memory monitor started");

        loop {
            let delay = match self.monitor_tick() {
                Ok(_) => period,
                Err(e) => {
                    error!(error = %e, "Memory monitor tick failed");
                    if let Some(m) = &self.metrics {
                        m.record_background_failure(values::COMPONENT_MONITOR);
                    }
                    backoff
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(delay) => {}
            }
        }
        info!("Memory monitor stopped");
    }

    async fn trim_loop(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = interval(Duration::from_secs(self.config.pool_trim_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the monitor loop already covers startup.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.trim_tick() {
                        error!(error = %e, "Connection pool trim failed");
                        if let Some(m) = &self.metrics {
                            m.record_background_failure(values::COMPONENT_POOL_TRIM);
                        }
                    }
                }
            }
        }
        info!("Connection pool trimmer stopped");
    }
}

/// Running optimizer loops.
pub struct OptimizerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl OptimizerHandle {
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop both loops and wait for them to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        for task in self.tasks {
            task.await
                .map_err(|e| GovernorError::Pool(format!("optimizer task failed: {e}")))?;
        }
        Ok(())
    }
}
