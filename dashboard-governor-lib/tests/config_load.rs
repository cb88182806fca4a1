use dashboard_governor_lib::config::{load_from_path, load_from_str};
use dashboard_governor_lib::governor::Endpoint;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn loads_minimal_config_with_defaults() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        r#"
listen = "127.0.0.1:7000"

[downstream]
address = "127.0.0.1:8000"
"#
    )?;

    let cfg = load_from_path(file.path())?;
    assert_eq!(cfg.listen.to_string(), "127.0.0.1:7000");
    assert_eq!(cfg.downstream.address, "127.0.0.1:8000");
    assert_eq!(cfg.downstream.pool_idle_timeout_secs, 90);
    assert_eq!(cfg.identity.header, "x-user-id");
    assert_eq!(cfg.runtime.max_workers, 8);
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.telemetry.metrics_port, None);
    assert_eq!(cfg.timeout.shutdown_secs, 30);

    let governor = &cfg.governor;
    assert_eq!(governor.dashboard_prefix, "/api/dashboard/");
    assert_eq!(governor.rate_limit_window_secs, 60);
    assert_eq!(governor.overload_memory_percent, 95.0);
    assert_eq!(governor.rate_limits.get(&Endpoint::Overview), Some(&30));
    assert_eq!(governor.rate_limits.get(&Endpoint::Stats), None);
    assert_eq!(governor.priorities.get(&Endpoint::HealthCheck), Some(&0));
    assert_eq!(governor.duration_estimates.get(&Endpoint::Export), Some(&2.0));
    assert_eq!(
        governor.expensive_endpoints,
        vec![Endpoint::Refresh, Endpoint::Export, Endpoint::Breakdown]
    );

    assert_eq!(cfg.optimizer.monitor_interval_secs, 30);
    assert_eq!(cfg.optimizer.pool_trim_interval_secs, 300);
    assert_eq!(cfg.optimizer.memory_pressure_percent, 85.0);
    Ok(())
}

#[test]
fn endpoint_tables_use_kebab_case_keys() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = load_from_str(
        r#"
listen = "0.0.0.0:7000"

[downstream]
address = "dashboard-api:8000"

[governor]
dashboard_prefix = "/v2/dash/"
expensive_endpoints = ["export"]

[governor.rate_limits]
overview = 100
health-check = 1

[governor.priorities]
performance-metrics = 2
"#,
    )?;

    assert_eq!(cfg.governor.dashboard_prefix, "/v2/dash/");
    assert_eq!(cfg.governor.rate_limits.len(), 2);
    assert_eq!(cfg.governor.rate_limits.get(&Endpoint::HealthCheck), Some(&1));
    assert_eq!(cfg.governor.priorities.get(&Endpoint::PerformanceMetrics), Some(&2));
    assert_eq!(cfg.governor.expensive_endpoints, vec![Endpoint::Export]);
    Ok(())
}

#[test]
fn rejects_invalid_values() {
    let cases = [
        ("empty downstream", "[downstream]\naddress = \"\"\n"),
        (
            "zero window",
            "[downstream]\naddress = \"a:1\"\n[governor]\nrate_limit_window_secs = 0\n",
        ),
        (
            "percent above 100",
            "[downstream]\naddress = \"a:1\"\n[governor]\noverload_memory_percent = 120.0\n",
        ),
        (
            "relative prefix",
            "[downstream]\naddress = \"a:1\"\n[governor]\ndashboard_prefix = \"api/\"\n",
        ),
        (
            "zero sample window",
            "[downstream]\naddress = \"a:1\"\n[governor]\nsample_window = 0\n",
        ),
        ("zero workers", "[downstream]\naddress = \"a:1\"\n[runtime]\nmax_workers = 0\n"),
        (
            "bad identity header",
            "[downstream]\naddress = \"a:1\"\n[identity]\nheader = \"x user\"\n",
        ),
        (
            "zero monitor interval",
            "[downstream]\naddress = \"a:1\"\n[optimizer]\nmonitor_interval_secs = 0\n",
        ),
        (
            "nan error rate",
            "[downstream]\naddress = \"a:1\"\n[governor]\nhigh_error_rate = nan\n",
        ),
        (
            "negative trend threshold",
            "[downstream]\naddress = \"a:1\"\n[governor]\ntrend_threshold = -1.0\n",
        ),
        (
            "infinite async threshold",
            "[downstream]\naddress = \"a:1\"\n[governor]\nasync_duration_threshold_secs = inf\n",
        ),
        (
            "negative expensive threshold",
            "[downstream]\naddress = \"a:1\"\n[governor]\nexpensive_operation_secs = -2.0\n",
        ),
        (
            "nan default duration",
            "[downstream]\naddress = \"a:1\"\n[governor]\ndefault_duration_secs = nan\n",
        ),
        (
            "nan recommendation factor",
            "[downstream]\naddress = \"a:1\"\n[governor]\nrecommendation_factor = nan\n",
        ),
        (
            "negative duration estimate",
            "[downstream]\naddress = \"a:1\"\n[governor.duration_estimates]\nexport = -1.0\n",
        ),
        ("unknown endpoint key", "[downstream]\naddress = \"a:1\"\n[governor.rate_limits]\nsettings = 3\n"),
    ];

    for (name, body) in cases {
        let txt = format!("listen = \"127.0.0.1:7000\"\n{body}");
        assert!(load_from_str(&txt).is_err(), "{name} should be rejected");
    }
}

#[test]
fn missing_file_is_config_error() {
    let err = load_from_path("/nonexistent/dashboard-governor.toml").unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}
