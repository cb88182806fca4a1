use dashboard_governor_lib::governor::{Endpoint, RateLimitResult, RateLimiter, UserId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[test]
fn refresh_quota_rejects_sixth_call_until_window_passes() {
    let limiter = RateLimiter::default();
    let user = UserId::from("alice");
    let t0 = Instant::now();

    for i in 0..5 {
        let at = t0 + Duration::from_secs(i);
        assert!(limiter.check_at(&user, Endpoint::Refresh, at).is_allowed(), "call {i}");
    }

    let sixth = limiter.check_at(&user, Endpoint::Refresh, t0 + Duration::from_secs(10));
    assert!(sixth.is_limited());
    assert_eq!(sixth.limit(), Some(5));
    assert_eq!(sixth.remaining(), Some(0));
    assert_eq!(sixth.reset_after(), Some(Duration::from_secs(50)));

    // Strictly more than the window after the first call, that entry expires.
    let later = limiter.check_at(&user, Endpoint::Refresh, t0 + Duration::from_secs(61));
    assert!(later.is_allowed());
}

#[test]
fn rejected_attempts_do_not_consume_quota() {
    let limiter = RateLimiter::default();
    let user = UserId::from("bob");
    let t0 = Instant::now();

    assert!(limiter.check_at(&user, Endpoint::Export, t0).is_allowed());
    assert!(limiter.check_at(&user, Endpoint::Export, t0).is_allowed());
    for _ in 0..10 {
        assert!(limiter.check_at(&user, Endpoint::Export, t0).is_limited());
    }
    assert_eq!(limiter.in_window(&user, Endpoint::Export, t0), 2);
}

#[test]
fn remaining_counts_down() {
    let limiter = RateLimiter::default();
    let user = UserId::from(7u64);
    let now = Instant::now();

    assert_eq!(
        limiter.check_at(&user, Endpoint::Breakdown, now),
        RateLimitResult::Allowed { limit: 10, remaining: 9 }
    );
    assert_eq!(limiter.check_at(&user, Endpoint::Breakdown, now).remaining(), Some(8));
}

#[test]
fn endpoint_without_quota_is_never_limited() {
    let limiter = RateLimiter::default();
    let user = UserId::from("carol");

    for _ in 0..1_000 {
        assert!(!limiter.is_limited(&user, Endpoint::Stats));
    }
    assert_eq!(limiter.check(&user, Endpoint::HealthCheck), RateLimitResult::Unlimited);
    assert_eq!(limiter.tracked_windows(), 0);
}

#[test]
fn users_have_independent_windows() {
    let limiter = RateLimiter::default();
    let now = Instant::now();
    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    for _ in 0..2 {
        limiter.check_at(&alice, Endpoint::Export, now);
    }
    assert!(limiter.check_at(&alice, Endpoint::Export, now).is_limited());
    assert!(limiter.check_at(&bob, Endpoint::Export, now).is_allowed());
}

#[test]
fn purge_drops_only_fully_expired_windows() {
    let limiter = RateLimiter::default();
    let t0 = Instant::now();
    let old = UserId::from("old");
    let fresh = UserId::from("fresh");

    limiter.check_at(&old, Endpoint::Overview, t0);
    limiter.check_at(&fresh, Endpoint::Overview, t0 + Duration::from_secs(50));
    assert_eq!(limiter.tracked_windows(), 2);

    assert_eq!(limiter.purge_expired(t0 + Duration::from_secs(70)), 1);
    assert_eq!(limiter.tracked_windows(), 1);
    assert_eq!(limiter.in_window(&fresh, Endpoint::Overview, t0 + Duration::from_secs(70)), 1);
}

#[test]
fn concurrent_users_each_get_their_own_quota() {
    let limiter = RateLimiter::default();
    let now = Instant::now();
    let users: Vec<UserId> = (0..4u64).map(UserId::from).collect();
    let allowed = AtomicUsize::new(0);

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for user in &users {
                    for _ in 0..3 {
                        if limiter.check_at(user, Endpoint::Export, now).is_allowed() {
                            allowed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    // export allows 2 per minute per user
    assert_eq!(allowed.load(Ordering::Relaxed), 8);
    for user in &users {
        assert_eq!(limiter.in_window(user, Endpoint::Export, now), 2);
    }
}
