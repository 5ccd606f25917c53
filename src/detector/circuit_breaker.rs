//! # Circuit Breaker Module
//!
//! Stops sending photos to the detector worker after a run of consecutive
//! failures, so users get the failure reply immediately instead of waiting
//! out one inference timeout after another.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::config::RecoveryConfig;

#[derive(Debug, Default)]
struct BreakerState {
    failure_count: u32,
    last_failure_time: Option<Instant>,
}

/// Circuit breaker for detector calls
///
/// # State Machine
///
/// - **Closed**: Normal operation, requests pass through
/// - **Open**: Failure threshold exceeded, requests fail fast
/// - **Half-Open**: Reset window elapsed, the next request is let through
///
/// # Configuration
///
/// Uses `RecoveryConfig` for:
/// - `circuit_breaker_threshold`: Failures before opening (default: 5)
/// - `circuit_breaker_reset_secs`: Time before attempting reset (default: 60s)
#[derive(Debug)]
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: RecoveryConfig,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given configuration
    ///
    /// ```rust
    /// use skinbot::detector::circuit_breaker::CircuitBreaker;
    /// use skinbot::detector::config::RecoveryConfig;
    ///
    /// let circuit_breaker = CircuitBreaker::new(RecoveryConfig::default());
    /// assert!(!circuit_breaker.is_open());
    /// ```
    pub fn new(config: RecoveryConfig) -> Self {
        Self {
            state: Mutex::new(BreakerState::default()),
            config,
        }
    }

    /// Check if circuit breaker is open (blocking requests)
    ///
    /// Returns `true` when the failure count reached the threshold and the
    /// reset window has not elapsed yet. Once the window elapses the counter
    /// is reset and the circuit closes again.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if state.failure_count >= self.config.circuit_breaker_threshold {
            if let Some(last_time) = state.last_failure_time {
                if last_time.elapsed() < Duration::from_secs(self.config.circuit_breaker_reset_secs) {
                    return true;
                }
                *state = BreakerState::default();
            }
        }
        false
    }

    /// Record a failed detector call
    pub fn record_failure(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());
    }

    /// Record a successful detector call, closing the circuit
    pub fn record_success(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = BreakerState::default();
    }

    /// Number of consecutive failures recorded so far
    pub fn failure_count(&self) -> u32 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failure_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_breaker_state_transitions() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 2,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        assert!(!circuit_breaker.is_open());

        circuit_breaker.record_failure();
        assert!(!circuit_breaker.is_open()); // Still closed (1 failure)

        circuit_breaker.record_failure();
        assert!(circuit_breaker.is_open()); // Now open (2 failures)
    }

    #[test]
    fn test_circuit_breaker_success_recording() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 1,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        circuit_breaker.record_failure();
        assert!(circuit_breaker.is_open());

        circuit_breaker.record_success();
        assert!(!circuit_breaker.is_open());
        assert_eq!(circuit_breaker.failure_count(), 0);
    }

    #[test]
    fn test_circuit_breaker_resets_after_window() {
        let config = RecoveryConfig {
            circuit_breaker_threshold: 1,
            circuit_breaker_reset_secs: 0,
            ..Default::default()
        };
        let circuit_breaker = CircuitBreaker::new(config);

        circuit_breaker.record_failure();
        // Zero-length window: the circuit half-opens straight away
        assert!(!circuit_breaker.is_open());
        assert_eq!(circuit_breaker.failure_count(), 0);
    }
}
