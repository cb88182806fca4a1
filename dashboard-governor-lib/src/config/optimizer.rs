use serde::Deserialize;

/// Background optimizer configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OptimizerConfig {
    /// Interval of the monitor loop (memory sample + idle connection pass)
    /// Default: 30 seconds
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,
    /// Delay before the monitor loop retries after a failed tick
    /// Default: 60 seconds
    #[serde(default = "default_error_backoff")]
    pub error_backoff_secs: u64,
    /// Interval of the independent pool-trim pass
    /// Default: 300 seconds
    #[serde(default = "default_pool_trim_interval")]
    pub pool_trim_interval_secs: u64,
    /// Memory utilization above which a forced reclamation pass runs
    /// Default: 85.0
    #[serde(default = "default_memory_pressure_percent")]
    pub memory_pressure_percent: f64,
    /// Metric buckets with no sample newer than this are dropped during reclamation
    /// Default: 3600 seconds
    #[serde(default = "default_idle_bucket")]
    pub idle_bucket_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: default_monitor_interval(),
            error_backoff_secs: default_error_backoff(),
            pool_trim_interval_secs: default_pool_trim_interval(),
            memory_pressure_percent: default_memory_pressure_percent(),
            idle_bucket_secs: default_idle_bucket(),
        }
    }
}

fn default_monitor_interval() -> u64 {
    30
}

fn default_error_backoff() -> u64 {
    60
}

fn default_pool_trim_interval() -> u64 {
    300
}

fn default_memory_pressure_percent() -> f64 {
    85.0
}

fn default_idle_bucket() -> u64 {
    3600
}
