use serde::Deserialize;

/// Downstream dashboard service that admitted requests are forwarded to
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DownstreamConfig {
    /// Downstream address (host:port format)
    /// Example: "127.0.0.1:8000" or "dashboard-api:8000"
    pub address: String,

    /// Idle timeout in seconds for pooled connections
    /// How long hyper keeps an idle connection before closing it on its own,
    /// independently of the optimizer's reclaim passes
    /// Default: 90 seconds
    #[serde(default = "default_pool_idle_timeout")]
    pub pool_idle_timeout_secs: u64,

    /// Maximum number of idle connections to maintain per host
    /// 0 = unlimited (hyper default)
    /// Default: 32
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
}

/// Identity configuration
///
/// Authentication happens upstream; the governor only reads the stable user
/// identifier the authentication layer attaches to the request.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IdentityConfig {
    /// Request header carrying the authenticated user identifier
    /// Requests without it are treated as unauthenticated and pass through ungoverned
    /// Default: "x-user-id"
    #[serde(default = "default_identity_header")]
    pub header: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self { header: default_identity_header() }
    }
}

/// Host runtime configuration
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Number of worker threads serving requests
    /// Default: 8
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { max_workers: default_max_workers() }
    }
}

fn default_pool_idle_timeout() -> u64 {
    90
}

fn default_pool_max_idle_per_host() -> usize {
    32
}

fn default_identity_header() -> String {
    "x-user-id".to_string()
}

fn default_max_workers() -> usize {
    8
}
