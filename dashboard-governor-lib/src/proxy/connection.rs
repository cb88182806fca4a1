use opentelemetry::metrics::UpDownCounter;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Guard to decrement the active connections counter when dropped
pub struct ConnectionGuard {
    counter: Arc<AtomicUsize>,
    connections_active: Option<UpDownCounter<i64>>,
}

impl ConnectionGuard {
    pub fn new(counter: Arc<AtomicUsize>, connections_active: Option<UpDownCounter<i64>>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        if let Some(ref gauge) = connections_active {
            gauge.add(1, &[]);
        }
        Self { counter, connections_active }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
        if let Some(ref gauge) = self.connections_active {
            gauge.add(-1, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_follows_guard_lifetime() {
        let counter = Arc::new(AtomicUsize::new(0));
        let first = ConnectionGuard::new(counter.clone(), None);
        let second = ConnectionGuard::new(counter.clone(), None);
        assert_eq!(counter.load(Ordering::Relaxed), 2);
        drop(first);
        assert_eq!(counter.load(Ordering::Relaxed), 1);
        drop(second);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }
}
