use crate::config::Config;

fn valid_percent(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

fn non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

pub fn validate(config: &Config) -> Result<(), String> {
    if config.downstream.address.trim().is_empty() {
        return Err("downstream address cannot be empty".into());
    }
    if config.identity.header.trim().is_empty() {
        return Err("identity header cannot be empty".into());
    }
    if http::HeaderName::from_bytes(config.identity.header.as_bytes()).is_err() {
        return Err(format!("identity header is not a valid header name: {}", config.identity.header));
    }

    let governor = &config.governor;
    if !governor.dashboard_prefix.starts_with('/') {
        return Err("dashboard_prefix must start with '/'".into());
    }
    if governor.rate_limit_window_secs == 0 {
        return Err("rate_limit_window_secs must be > 0".into());
    }
    if !valid_percent(governor.overload_memory_percent) {
        return Err("overload_memory_percent must be in (0, 100]".into());
    }
    if governor.sample_window == 0 {
        return Err("sample_window must be > 0".into());
    }
    if governor.memory_history == 0 {
        return Err("memory_history must be > 0".into());
    }
    if !(governor.recommendation_factor.is_finite() && governor.recommendation_factor > 0.0) {
        return Err("recommendation_factor must be a finite number > 0".into());
    }
    for (name, value) in [
        ("high_error_rate", governor.high_error_rate),
        ("trend_threshold", governor.trend_threshold),
        ("async_duration_threshold_secs", governor.async_duration_threshold_secs),
        ("expensive_operation_secs", governor.expensive_operation_secs),
        ("default_duration_secs", governor.default_duration_secs),
    ] {
        if !non_negative(value) {
            return Err(format!("{name} must be a finite number >= 0, got {value}"));
        }
    }
    if let Some((endpoint, secs)) =
        governor.duration_estimates.iter().find(|(_, secs)| !non_negative(**secs))
    {
        return Err(format!("duration estimate for {endpoint} must be a finite number >= 0, got {secs}"));
    }

    let optimizer = &config.optimizer;
    if optimizer.monitor_interval_secs == 0 {
        return Err("monitor_interval_secs must be > 0".into());
    }
    if optimizer.error_backoff_secs == 0 {
        return Err("error_backoff_secs must be > 0".into());
    }
    if optimizer.pool_trim_interval_secs == 0 {
        return Err("pool_trim_interval_secs must be > 0".into());
    }
    if !valid_percent(optimizer.memory_pressure_percent) {
        return Err("memory_pressure_percent must be in (0, 100]".into());
    }

    if config.runtime.max_workers == 0 {
        return Err("max_workers must be > 0".into());
    }
    Ok(())
}
