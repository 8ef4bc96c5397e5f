//! Sliding-window rate limiting shared by both trust pipelines.
//!
//! State lives behind the `RateLimitStore` abstraction so production can move
//! to a shared counter service without touching the decision pipelines; the
//! in-memory store here is process-local. The read-check-increment on a key
//! is a single critical section, so two concurrent attempts can never both
//! pass at the boundary count.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

/// Counter for one identifier within its window.
#[derive(Clone, Copy, Debug)]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_time: Instant,
}

/// Injectable counter store. `increment` performs the guarded
/// check-then-increment and reports whether the attempt is allowed.
pub trait RateLimitStore: Send + Sync {
    fn get(&self, identifier: &str) -> Option<RateLimitRecord>;
    fn increment(&self, identifier: &str, max_attempts: u32, window: Duration) -> bool;
    fn evict_expired(&self);
}

/// Process-local store; counts are not shared across instances.
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    records: Mutex<HashMap<String, RateLimitRecord>>,
}

impl InMemoryRateLimitStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn get(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records
            .lock()
            .ok()
            .and_then(|records| records.get(identifier).copied())
    }

    fn increment(&self, identifier: &str, max_attempts: u32, window: Duration) -> bool {
        let Ok(mut records) = self.records.lock() else {
            // A poisoned lock means a panic elsewhere; fail closed.
            return false;
        };
        let now = Instant::now();
        match records.get_mut(identifier) {
            Some(record) if now <= record.reset_time => {
                if record.count < max_attempts {
                    record.count += 1;
                    true
                } else {
                    false
                }
            }
            _ => {
                records.insert(
                    identifier.to_string(),
                    RateLimitRecord {
                        count: 1,
                        reset_time: now + window,
                    },
                );
                max_attempts > 0
            }
        }
    }

    fn evict_expired(&self) {
        if let Ok(mut records) = self.records.lock() {
            let now = Instant::now();
            records.retain(|_, record| now <= record.reset_time);
        }
    }
}

/// Sliding-window-by-reset limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateLimitStore>) -> Self {
        Self { store }
    }

    /// Whether another attempt for `identifier` is allowed inside the window.
    #[must_use]
    pub fn allow(&self, identifier: &str, max_attempts: u32, window: Duration) -> bool {
        let allowed = self.store.increment(identifier, max_attempts, window);
        if !allowed {
            debug!(identifier, "rate limit exceeded");
        }
        allowed
    }
}

/// Spawn the housekeeping sweep bounding memory to active identifiers.
pub fn spawn_housekeeping(
    store: Arc<dyn RateLimitStore>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            store.evict_expired();
        }
    })
}
