//! # Circuit Breaker Module
//!
//! Counts consecutive failures of the completion service. Once the threshold
//! is reached the breaker opens and callers answer locally until the reset
//! timeout has elapsed.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker guarding a remote service
///
/// - **Closed**: requests pass through
/// - **Open**: failure threshold reached, requests short-circuit
/// - after `circuit_breaker_reset_secs` the breaker closes again and the next
///   request is a trial
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    fn state(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Check if the circuit is open (requests should short-circuit)
    pub fn is_open(&self) -> bool {
        let mut state = self.state();

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) {
                    return true;
                }
                info!("Circuit breaker reset timeout elapsed, closing");
                *state = BreakerState::default();
            }
        }
        false
    }

    pub fn record_failure(&self) {
        let mut state = self.state();
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
        if state.failure_count == self.config.circuit_breaker_threshold {
            warn!(failures = state.failure_count, "Circuit breaker opened");
        }
    }

    pub fn record_success(&self) {
        *self.state() = BreakerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, reset_secs: u64) -> CircuitBreaker {
        CircuitBreaker::new(RecoveryConfig {
            circuit_breaker_threshold: threshold,
            circuit_breaker_reset_secs: reset_secs,
            ..RecoveryConfig::default()
        })
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(2, 60);
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(!cb.is_open());
        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn test_success_closes() {
        let cb = breaker(1, 60);
        cb.record_failure();
        assert!(cb.is_open());
        cb.record_success();
        assert!(!cb.is_open());
    }

    #[test]
    fn test_closes_after_reset_timeout() {
        let cb = breaker(1, 0);
        cb.record_failure();
        assert!(!cb.is_open());
    }
}
