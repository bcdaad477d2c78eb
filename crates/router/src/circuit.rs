//! Per-provider circuit breaker: a sliding-window failure counter that
//! trips the Router's credential/availability filter, grounded on the same
//! AIMD-flavoured penalty shape the Pacer uses, but triggered by failure
//! count rather than provider-reported rate limits.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub struct CircuitBreaker {
    window: Duration,
    failure_threshold: usize,
    failures: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl CircuitBreaker {
    pub fn new(window: Duration, failure_threshold: usize) -> Self {
        Self { window, failure_threshold, failures: Mutex::new(HashMap::new()) }
    }

    pub fn record_failure(&self, provider: &str) {
        let mut guard = self.failures.lock().unwrap();
        let entry = guard.entry(provider.to_string()).or_default();
        entry.push_back(Instant::now());
        self.evict_stale(entry);
    }

    pub fn record_success(&self, provider: &str) {
        if let Some(entry) = self.failures.lock().unwrap().get_mut(provider) {
            entry.clear();
        }
    }

    pub fn is_open(&self, provider: &str) -> bool {
        let mut guard = self.failures.lock().unwrap();
        match guard.get_mut(provider) {
            Some(entry) => {
                self.evict_stale(entry);
                entry.len() >= self.failure_threshold
            }
            None => false,
        }
    }

    fn evict_stale(&self, entry: &mut VecDeque<Instant>) {
        let cutoff = Instant::now() - self.window;
        while let Some(front) = entry.front() {
            if *front < cutoff {
                entry.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 5)
    }
}
