use serde::Deserialize;
use std::net::SocketAddr;

use super::downstream::{DownstreamConfig, IdentityConfig, RuntimeConfig};
use super::governor::GovernorConfig;
use super::optimizer::OptimizerConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};
use super::timeout::TimeoutConfig;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port to listen on
    /// Example: "0.0.0.0:7000" or "127.0.0.1:8080"
    pub listen: SocketAddr,
    /// Downstream dashboard service
    pub downstream: DownstreamConfig,
    /// Where the authenticated user identifier is read from
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Admission control, prioritization and estimation settings
    #[serde(default)]
    pub governor: GovernorConfig,
    /// Background connection and memory optimizer
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// Host runtime sizing
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    /// Controls metrics, health checks and the governor snapshot endpoint
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
}
