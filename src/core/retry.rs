use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::utils::error::{PortcallError, Result};

/// Bounded exponential backoff with multiplicative jitter.
///
/// Attempt `n` (1-based) that hits a rate limit waits
/// `base_delay * 2^(n-1) * U(1 - jitter, 1 + jitter)` before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            jitter: 0.2,
        }
    }
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32, jitter_factor: f64) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .mul_f64(f64::from(1u32 << exponent))
            .mul_f64(jitter_factor.max(0.0))
    }

    /// Jitter clamped to `[0, 1]`; a non-finite value disables jitter.
    fn effective_jitter(&self) -> f64 {
        if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn sample_delay(&self, attempt: u32) -> Duration {
        let jitter = self.effective_jitter();
        let factor = if jitter == 0.0 {
            1.0
        } else {
            rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter))
        };
        self.backoff_delay(attempt, factor)
    }

    /// Range `sample_delay(attempt)` draws from.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let jitter = self.effective_jitter();
        (
            self.backoff_delay(attempt, 1.0 - jitter),
            self.backoff_delay(attempt, 1.0 + jitter),
        )
    }
}

/// Races `future` against the token; a fired token wins.
pub async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> Result<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PortcallError::Cancelled),
        output = future => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay(1, 1.0), Duration::from_secs(5));
        assert_eq!(policy.backoff_delay(2, 1.0), Duration::from_secs(10));
        assert_eq!(policy.backoff_delay(3, 1.0), Duration::from_secs(20));
        assert!((policy.backoff_delay(1, 0.8).as_secs_f64() - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_sampled_delay_stays_within_jitter_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=2 {
            let (low, high) = policy.delay_bounds(attempt);
            for _ in 0..200 {
                let delay = policy.sample_delay(attempt);
                assert!(delay >= low && delay <= high, "{:?} outside {:?}..{:?}", delay, low, high);
            }
        }
        let (low, high) = policy.delay_bounds(2);
        assert!((low.as_secs_f64() - 8.0).abs() < 1e-6);
        assert!((high.as_secs_f64() - 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_jitter_is_deterministic() {
        let policy = RetryPolicy {
            jitter: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.sample_delay(2), Duration::from_secs(10));
    }

    #[test]
    fn test_non_finite_jitter_falls_back_to_plain_backoff() {
        for jitter in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let policy = RetryPolicy {
                jitter,
                ..RetryPolicy::default()
            };
            assert_eq!(policy.sample_delay(1), Duration::from_secs(5));
            assert_eq!(
                policy.delay_bounds(2),
                (Duration::from_secs(10), Duration::from_secs(10))
            );
        }
    }

    #[tokio::test]
    async fn test_cancellable_returns_output_when_not_cancelled() {
        let token = CancellationToken::new();
        let value = cancellable(&token, async { 42 }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_cancellable_aborts_pending_future() {
        let token = CancellationToken::new();
        token.cancel();
        let result = cancellable(&token, std::future::pending::<()>()).await;
        assert!(matches!(result, Err(PortcallError::Cancelled)));
    }
}
