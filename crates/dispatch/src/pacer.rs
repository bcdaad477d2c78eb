//! One token bucket + concurrency limiter per provider, with AIMD rate
//! adaptation when the provider reports a rate limit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use gw_config::PacerDefaults;
use tokio::sync::{Semaphore, SemaphorePermit};

struct TokenBucketState {
    tokens: f64,
    effective_rate: f64,
    last_refill: Instant,
}

/// A held lease on a provider's pacer. Dropping it returns the concurrency
/// slot; `queue_wait_ms` is the time spent waiting for `acquire()` to
/// return, exposed per spec.md §4.3.
pub struct PacerLease<'a> {
    _permit: SemaphorePermit<'a>,
    pub queue_wait_ms: u64,
}

pub struct Pacer {
    base_rate: f64,
    min_rate: f64,
    burst: f64,
    penalty_alpha: f64,
    recovery_delta: f64,
    state: Mutex<TokenBucketState>,
    concurrency: Semaphore,
    concurrency_capacity: usize,
    total_rate_limits: AtomicU64,
}

impl Pacer {
    pub fn new(defaults: PacerDefaults) -> Self {
        Self {
            base_rate: defaults.rps,
            min_rate: defaults.min_rps,
            burst: defaults.burst,
            penalty_alpha: defaults.penalty_alpha,
            recovery_delta: defaults.recovery_delta,
            state: Mutex::new(TokenBucketState {
                tokens: defaults.burst,
                effective_rate: defaults.rps,
                last_refill: Instant::now(),
            }),
            concurrency: Semaphore::new(defaults.concurrency),
            concurrency_capacity: defaults.concurrency,
            total_rate_limits: AtomicU64::new(0),
        }
    }

    /// Blocks until a token is available and a concurrency slot is free.
    /// Cancel-safe: dropping this future before it resolves leaves no
    /// trace — the token consumed right before returning is the only
    /// exception, an accepted simplification of the FIFO/no-preemption
    /// contract.
    pub async fn acquire(&self) -> PacerLease<'_> {
        let start = Instant::now();
        loop {
            let ready = {
                let mut state = self.state.lock().unwrap();
                self.refill(&mut state);
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    true
                } else {
                    false
                }
            };
            if ready {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let permit = self.concurrency.acquire().await.expect("pacer semaphore never closes");
        PacerLease { _permit: permit, queue_wait_ms: start.elapsed().as_millis() as u64 }
    }

    fn refill(&self, state: &mut TokenBucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.last_refill = now;
        if state.effective_rate < self.base_rate {
            state.effective_rate = (state.effective_rate + self.recovery_delta * elapsed).min(self.base_rate);
        }
        state.tokens = (state.tokens + state.effective_rate * elapsed).min(self.burst);
    }

    /// Multiplicatively reduces the effective rate to `max(R_min, R·α)`;
    /// `refill` then recovers it by `Δ` per second, per spec.md §4.3.
    pub fn record_rate_limited(&self) {
        let mut state = self.state.lock().unwrap();
        state.effective_rate = (state.effective_rate * self.penalty_alpha).max(self.min_rate);
        self.total_rate_limits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn current_rate(&self) -> f64 {
        self.state.lock().unwrap().effective_rate
    }

    /// Number of leases currently held, not the number of free slots.
    pub fn in_flight(&self) -> usize {
        self.concurrency_capacity - self.concurrency.available_permits()
    }

    pub fn total_rate_limits(&self) -> u64 {
        self.total_rate_limits.load(Ordering::Relaxed)
    }
}

/// One `Pacer` per configured provider, constructed once at startup.
pub struct PacerRegistry {
    pacers: Mutex<std::collections::HashMap<String, Arc<Pacer>>>,
    defaults_for: Arc<dyn Fn(&str) -> PacerDefaults + Send + Sync>,
}

impl PacerRegistry {
    pub fn new(defaults_for: impl Fn(&str) -> PacerDefaults + Send + Sync + 'static) -> Self {
        Self { pacers: Mutex::new(std::collections::HashMap::new()), defaults_for: Arc::new(defaults_for) }
    }

    pub fn get(&self, provider: &str) -> Arc<Pacer> {
        let mut guard = self.pacers.lock().unwrap();
        guard
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(Pacer::new((self.defaults_for)(provider))))
            .clone()
    }
}
