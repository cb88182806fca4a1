use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical dashboard endpoint a request is governed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Endpoint {
    Overview,
    Stats,
    Refresh,
    Breakdown,
    Export,
    HealthCheck,
    PerformanceMetrics,
    Unknown,
}

/// Path-segment keys checked in order; the first key contained in a segment wins.
const ENDPOINT_TABLE: &[(&str, Endpoint)] = &[
    ("overview", Endpoint::Overview),
    ("stats", Endpoint::Stats),
    ("refresh", Endpoint::Refresh),
    ("breakdown", Endpoint::Breakdown),
    ("export", Endpoint::Export),
    ("health-check", Endpoint::HealthCheck),
    ("performance-metrics", Endpoint::PerformanceMetrics),
];

impl Endpoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Overview => "overview",
            Endpoint::Stats => "stats",
            Endpoint::Refresh => "refresh",
            Endpoint::Breakdown => "breakdown",
            Endpoint::Export => "export",
            Endpoint::HealthCheck => "health-check",
            Endpoint::PerformanceMetrics => "performance-metrics",
            Endpoint::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable identifier of an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<u64> for UserId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Unit of metrics and rate-limit tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub user: UserId,
    pub endpoint: Endpoint,
}

impl EndpointKey {
    pub fn new(user: &UserId, endpoint: Endpoint) -> Self {
        Self { user: user.clone(), endpoint }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.user, self.endpoint)
    }
}

/// Resolve the governed endpoint for a request path.
///
/// Returns `None` when the path does not contain the dashboard prefix; such
/// requests are not governed. Any other path under the prefix resolves to a
/// known endpoint or to [`Endpoint::Unknown`].
pub fn resolve_endpoint(prefix: &str, path: &str) -> Option<Endpoint> {
    let start = path.find(prefix)?;
    let rest = &path[start.saturating_add(prefix.len())..];

    let endpoint = ENDPOINT_TABLE
        .iter()
        .find(|(key, _)| rest.split('/').any(|segment| segment.contains(key)))
        .map(|(_, endpoint)| *endpoint)
        .unwrap_or(Endpoint::Unknown);

    Some(endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/api/dashboard/";

    #[test]
    fn paths_outside_prefix_are_not_governed() {
        assert_eq!(resolve_endpoint(PREFIX, "/api/invoices/"), None);
        assert_eq!(resolve_endpoint(PREFIX, "/api/dashboard"), None);
    }

    #[test]
    fn known_segments_resolve() {
        assert_eq!(resolve_endpoint(PREFIX, "/api/dashboard/overview/"), Some(Endpoint::Overview));
        assert_eq!(resolve_endpoint(PREFIX, "/api/dashboard/stats"), Some(Endpoint::Stats));
        assert_eq!(
            resolve_endpoint(PREFIX, "/api/dashboard/health-check/"),
            Some(Endpoint::HealthCheck)
        );
        assert_eq!(
            resolve_endpoint(PREFIX, "/api/dashboard/performance-metrics/"),
            Some(Endpoint::PerformanceMetrics)
        );
        assert_eq!(
            resolve_endpoint(PREFIX, "/api/dashboard/reports/export/csv"),
            Some(Endpoint::Export)
        );
    }

    #[test]
    fn table_order_breaks_ties() {
        // "stats" is checked before "refresh"
        assert_eq!(
            resolve_endpoint(PREFIX, "/api/dashboard/refresh-stats/"),
            Some(Endpoint::Stats)
        );
    }

    #[test]
    fn unmatched_paths_under_prefix_are_unknown() {
        assert_eq!(resolve_endpoint(PREFIX, "/api/dashboard/"), Some(Endpoint::Unknown));
        assert_eq!(resolve_endpoint(PREFIX, "/api/dashboard/widgets/7"), Some(Endpoint::Unknown));
    }

    #[test]
    fn endpoint_names_are_kebab_case() -> Result<(), serde_json::Error> {
        assert_eq!(serde_json::to_string(&Endpoint::HealthCheck)?, "\"health-check\"");
        let parsed: Endpoint = serde_json::from_str("\"performance-metrics\"")?;
        assert_eq!(parsed, Endpoint::PerformanceMetrics);
        assert_eq!(Endpoint::PerformanceMetrics.to_string(), "performance-metrics");
        Ok(())
    }
}
