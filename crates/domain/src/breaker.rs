//! Per-upstream circuit breaker: fail fast while an upstream is unhealthy.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        write!(f, "{s}")
    }
}

/// Error returned by `CircuitBreaker::check` while the breaker is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("upstream unavailable: circuit breaker open")]
pub struct UpstreamUnavailable;

/// Tracks consecutive failures for one upstream (LLM provider, memory
/// service, KV store, ...) and fails calls fast once it trips open.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    reset_timeout_ms: u64,
    half_open_max_attempts: u32,

    state: Mutex<BreakerState>,
    consecutive_failures: AtomicU32,
    half_open_successes: AtomicU32,
    half_open_inflight: AtomicU32,
    opened_at_ms: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_params(name, 5, 30_000, 3)
    }

    pub fn with_params(
        name: impl Into<String>,
        failure_threshold: u32,
        reset_timeout_ms: u64,
        half_open_max_attempts: u32,
    ) -> Self {
        Self {
            name: name.into(),
            failure_threshold,
            reset_timeout_ms,
            half_open_max_attempts,
            state: Mutex::new(BreakerState::Closed),
            consecutive_failures: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            half_open_inflight: AtomicU32::new(0),
            opened_at_ms: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> BreakerState {
        *self.state.lock()
    }

    /// Whether a call is currently permitted. In `Open` state this also
    /// performs the Open -> HalfOpen transition once `resetTimeoutMs` has
    /// elapsed, admitting the caller as the first probe.
    pub fn is_call_permitted(&self) -> bool {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                self.half_open_inflight.load(Ordering::SeqCst) < self.half_open_max_attempts
            }
            BreakerState::Open => {
                let elapsed = now_ms().saturating_sub(self.opened_at_ms.load(Ordering::SeqCst));
                if elapsed >= self.reset_timeout_ms {
                    tracing::info!(
                        upstream = %self.name,
                        prev_state = %BreakerState::Open,
                        new_state = %BreakerState::HalfOpen,
                        "circuit breaker transition"
                    );
                    *state = BreakerState::HalfOpen;
                    self.half_open_successes.store(0, Ordering::SeqCst);
                    self.half_open_inflight.store(1, Ordering::SeqCst);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            BreakerState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::SeqCst) + 1;
                if successes >= self.half_open_max_attempts {
                    tracing::info!(
                        upstream = %self.name,
                        prev_state = %BreakerState::HalfOpen,
                        new_state = %BreakerState::Closed,
                        "circuit breaker transition"
                    );
                    *state = BreakerState::Closed;
                    self.consecutive_failures.store(0, Ordering::SeqCst);
                    self.half_open_inflight.store(0, Ordering::SeqCst);
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match *state {
            BreakerState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.failure_threshold {
                    self.trip_open(&mut state);
                }
            }
            BreakerState::HalfOpen => {
                self.trip_open(&mut state);
            }
            BreakerState::Open => {}
        }
    }

    fn trip_open(&self, state: &mut BreakerState) {
        let prev = *state;
        tracing::warn!(
            upstream = %self.name,
            prev_state = %prev,
            new_state = %BreakerState::Open,
            "circuit breaker transition"
        );
        *state = BreakerState::Open;
        self.opened_at_ms.store(now_ms(), Ordering::SeqCst);
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.half_open_inflight.store(0, Ordering::SeqCst);
    }

    /// Convenience wrapper: returns `Err(UpstreamUnavailable)` without
    /// calling `f` if the breaker currently rejects calls, otherwise runs
    /// `f` and records the outcome.
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<Result<T, E>, UpstreamUnavailable>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.is_call_permitted() {
            return Err(UpstreamUnavailable);
        }
        let result = f().await;
        match &result {
            Ok(_) => self.record_success(),
            Err(_) => self.record_failure(),
        }
        Ok(result)
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_closed_and_permits_calls() {
        let b = CircuitBreaker::new("test");
        assert_eq!(b.state(), BreakerState::Closed);
        assert!(b.is_call_permitted());
    }

    #[test]
    fn trips_open_after_threshold_failures() {
        let b = CircuitBreaker::with_params("test", 3, 30_000, 3);
        b.record_failure();
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Closed);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.is_call_permitted());
    }

    #[test]
    fn open_rejects_immediately_until_timeout() {
        let b = CircuitBreaker::with_params("test", 1, 50, 3);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.is_call_permitted());
        std::thread::sleep(std::time::Duration::from_millis(60));
        assert!(b.is_call_permitted());
        assert_eq!(b.state(), BreakerState::HalfOpen);
    }

    #[test]
    fn half_open_failure_reopens_and_restarts_timer() {
        let b = CircuitBreaker::with_params("test", 1, 20, 3);
        b.record_failure();
        std::thread::sleep(std::time::Duration::from_millis(25));
        assert!(b.is_call_permitted());
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_failure();
        assert_eq!(b.state(), BreakerState::Open);
        assert!(!b.is_call_permitted());
    }

    #[test]
    fn half_open_success_streak_closes_breaker() {
        let b = CircuitBreaker::with_params("test", 1, 10, 2);
        b.record_failure();
        std::thread::sleep(std::time::Duration::from_millis(15));
        assert!(b.is_call_permitted());
        b.record_success();
        assert_eq!(b.state(), BreakerState::HalfOpen);
        b.record_success();
        assert_eq!(b.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn call_wrapper_records_outcome() {
        let b = CircuitBreaker::with_params("test", 2, 30_000, 3);
        let r: Result<Result<u32, &str>, UpstreamUnavailable> =
            b.call(|| async { Err::<u32, _>("boom") }).await;
        assert!(r.unwrap().is_err());
        let r2: Result<Result<u32, &str>, UpstreamUnavailable> =
            b.call(|| async { Err::<u32, _>("boom") }).await;
        assert!(r2.unwrap().is_err());
        assert_eq!(b.state(), BreakerState::Open);
        let r3 = b.call(|| async { Ok::<u32, &str>(1) }).await;
        assert_eq!(r3, Err(UpstreamUnavailable));
    }
}
