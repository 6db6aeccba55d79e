//! Deterministic + jittered backoff profiles with cancellation support.

use std::time::Duration;

use tokio::sync::watch;

/// A fixed `(initialMs, maxMs, factor, jitter)` tuple governing retry delay
/// growth for one class of upstream call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub factor: f64,
    pub jitter: f64,
}

impl BackoffPolicy {
    /// Fast retry for cheap, idempotent local operations.
    pub const AGGRESSIVE: Self = Self {
        initial_ms: 100,
        max_ms: 5_000,
        factor: 2.0,
        jitter: 0.10,
    };

    /// Default profile for generic upstream calls.
    pub const STANDARD: Self = Self {
        initial_ms: 300,
        max_ms: 30_000,
        factor: 2.0,
        jitter: 0.15,
    };

    /// HTTP API calls (tool destinations, MCP, memory service REST).
    pub const API: Self = Self {
        initial_ms: 500,
        max_ms: 30_000,
        factor: 2.0,
        jitter: 0.25,
    };

    /// LLM provider calls — larger ceiling, larger jitter to de-synchronize
    /// a fleet of agents hammering the same provider during an outage.
    pub const LLM: Self = Self {
        initial_ms: 1_000,
        max_ms: 60_000,
        factor: 2.0,
        jitter: 0.30,
    };

    /// KV / pub-sub store reconnects.
    pub const STORAGE: Self = Self {
        initial_ms: 200,
        max_ms: 10_000,
        factor: 2.0,
        jitter: 0.10,
    };

    /// Look up a named profile. Unknown names fall back to `standard`.
    pub fn by_name(name: &str) -> Self {
        match name {
            "aggressive" => Self::AGGRESSIVE,
            "api" => Self::API,
            "llm" => Self::LLM,
            "storage" => Self::STORAGE,
            _ => Self::STANDARD,
        }
    }

    /// Delay for attempt `k` (1-based): `min(maxMs, initial*factor^(k-1) +
    /// U[0, jitter*initial*factor^(k-1)])`.
    pub fn delay_for_attempt(&self, k: u32) -> Duration {
        let exp = (k.saturating_sub(1)) as i32;
        let grown = self.initial_ms as f64 * self.factor.powi(exp);
        let capped = grown.min(self.max_ms as f64);
        let jitter_span = capped * self.jitter;
        let jitter = rand::random::<f64>() * jitter_span;
        Duration::from_millis((capped + jitter).min(self.max_ms as f64) as u64)
    }
}

/// Error returned when a backoff sleep is interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("backoff sleep aborted by cancellation")]
pub struct Aborted;

/// Sleep for the given attempt's backoff delay, honoring `cancel`.
///
/// Returns `Ok(())` once the delay elapses, or `Err(Aborted)` the instant
/// `cancel` transitions to `true`.
pub async fn sleep_with_cancel(
    policy: BackoffPolicy,
    attempt: u32,
    cancel: &mut watch::Receiver<bool>,
) -> Result<(), Aborted> {
    if *cancel.borrow() {
        return Err(Aborted);
    }
    let delay = policy.delay_for_attempt(attempt);
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.changed() => Err(Aborted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_values_match_spec() {
        assert_eq!(BackoffPolicy::AGGRESSIVE.initial_ms, 100);
        assert_eq!(BackoffPolicy::AGGRESSIVE.max_ms, 5_000);
        assert_eq!(BackoffPolicy::STANDARD.initial_ms, 300);
        assert_eq!(BackoffPolicy::STANDARD.max_ms, 30_000);
        assert_eq!(BackoffPolicy::API.jitter, 0.25);
        assert_eq!(BackoffPolicy::LLM.max_ms, 60_000);
        assert_eq!(BackoffPolicy::STORAGE.initial_ms, 200);
    }

    #[test]
    fn by_name_resolves_known_profiles() {
        assert_eq!(BackoffPolicy::by_name("llm"), BackoffPolicy::LLM);
        assert_eq!(BackoffPolicy::by_name("storage"), BackoffPolicy::STORAGE);
        assert_eq!(BackoffPolicy::by_name("bogus"), BackoffPolicy::STANDARD);
    }

    #[test]
    fn delay_grows_and_caps() {
        let p = BackoffPolicy::STANDARD;
        let d1 = p.delay_for_attempt(1);
        let d5 = p.delay_for_attempt(5);
        let d20 = p.delay_for_attempt(20);
        assert!(d1.as_millis() >= 300);
        assert!(d5 > d1);
        assert!(d20.as_millis() as u64 <= p.max_ms + (p.max_ms as f64 * p.jitter) as u64);
    }

    #[tokio::test]
    async fn sleep_returns_ok_without_cancel() {
        let (_tx, mut rx) = watch::channel(false);
        let policy = BackoffPolicy::AGGRESSIVE;
        let result = sleep_with_cancel(policy, 1, &mut rx).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancel_aborts_sleep_immediately() {
        let (tx, mut rx) = watch::channel(false);
        let policy = BackoffPolicy::LLM;
        tx.send(true).unwrap();
        let result = sleep_with_cancel(policy, 1, &mut rx).await;
        assert_eq!(result, Err(Aborted));
    }
}
