use dashboard_governor_lib::governor::{
    DurationEstimator, Endpoint, MetricsRecorder, PriorityEstimator, UserId,
};
use std::time::Duration;

fn failing_recorder(user: &UserId, endpoint: Endpoint) -> MetricsRecorder {
    let recorder = MetricsRecorder::default();
    // Two failures push the EMA to 0.19, above the 0.1 threshold.
    recorder.record(user, endpoint, Duration::from_secs(2), false);
    recorder.record(user, endpoint, Duration::from_secs(2), false);
    recorder
}

#[test]
fn base_priorities() {
    let estimator = PriorityEstimator::default();
    let recorder = MetricsRecorder::default();
    let user = UserId::from("alice");

    assert_eq!(estimator.priority(Endpoint::HealthCheck, &user, &recorder), 0);
    assert_eq!(estimator.priority(Endpoint::Overview, &user, &recorder), 1);
    assert_eq!(estimator.priority(Endpoint::Stats, &user, &recorder), 1);
    assert_eq!(estimator.priority(Endpoint::Refresh, &user, &recorder), 2);
    assert_eq!(estimator.priority(Endpoint::Breakdown, &user, &recorder), 3);
    assert_eq!(estimator.priority(Endpoint::Export, &user, &recorder), 4);
    assert_eq!(estimator.priority(Endpoint::PerformanceMetrics, &user, &recorder), 5);
    assert_eq!(estimator.priority(Endpoint::Unknown, &user, &recorder), 5);
}

#[test]
fn export_with_errors_and_rising_memory_is_seven() {
    let estimator = PriorityEstimator::default();
    let user = UserId::from("alice");
    let recorder = failing_recorder(&user, Endpoint::Export);
    for sample in [40.0, 40.0, 50.0, 55.0, 60.0] {
        recorder.push_memory_sample(sample);
    }

    assert!(recorder.error_rate(&user, Endpoint::Export) > 0.1);
    assert_eq!(estimator.priority(Endpoint::Export, &user, &recorder), 7);
}

#[test]
fn error_penalty_is_per_key() {
    let estimator = PriorityEstimator::default();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let recorder = failing_recorder(&alice, Endpoint::Overview);

    assert_eq!(estimator.priority(Endpoint::Overview, &alice, &recorder), 3);
    assert_eq!(estimator.priority(Endpoint::Overview, &bob, &recorder), 1);
}

#[test]
fn single_failure_stays_at_threshold() {
    let estimator = PriorityEstimator::default();
    let recorder = MetricsRecorder::default();
    let user = UserId::from("alice");
    recorder.record(&user, Endpoint::Refresh, Duration::from_millis(10), false);

    // 0.1 is not strictly greater than the threshold
    assert_eq!(estimator.priority(Endpoint::Refresh, &user, &recorder), 2);
}

#[test]
fn duration_uses_history_then_fallback() {
    let estimator = DurationEstimator::default();
    let recorder = MetricsRecorder::default();
    let user = UserId::from("alice");

    assert_eq!(estimator.estimate(&user, Endpoint::Export, &recorder), 2.0);
    assert_eq!(estimator.estimate(&user, Endpoint::HealthCheck, &recorder), 0.02);
    assert_eq!(estimator.estimate(&user, Endpoint::Unknown, &recorder), 0.5);

    recorder.record(&user, Endpoint::Export, Duration::from_millis(500), true);
    recorder.record(&user, Endpoint::Export, Duration::from_millis(1500), true);
    let estimate = estimator.estimate(&user, Endpoint::Export, &recorder);
    assert!((estimate - 1.0).abs() < 1e-9, "estimate = {estimate}");
}
