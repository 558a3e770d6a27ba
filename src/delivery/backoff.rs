// src/delivery/backoff.rs
// Throttle backoff policy and the sleep seam used while waiting

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Throttled sends retried per chunk before delivery fails
pub const DEFAULT_MAX_THROTTLE_RETRIES: u32 = 3;
/// Wait before the first retry when the transport suggests none (doubles each attempt)
pub const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(1000);
/// Random spread applied around each computed wait
pub const DEFAULT_JITTER: f64 = 0.2;

/// Exponential backoff with jitter for throttled sends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max_retries: u32,
    /// Fraction of the computed wait to spread by, in either direction
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_BACKOFF,
            max_retries: DEFAULT_MAX_THROTTLE_RETRIES,
            jitter: DEFAULT_JITTER,
        }
    }
}

impl Backoff {
    /// Wait before retry `attempt` (0-based) with no jitter: `base * 2^attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(16))
    }

    /// Wait before retry `attempt`.
    ///
    /// A transport-suggested wait is used as-is; otherwise the base delay is
    /// scaled by a random factor in `[1 - jitter, 1 + jitter]`.
    pub fn delay<R: Rng>(&self, attempt: u32, suggested: Option<Duration>, rng: &mut R) -> Duration {
        if let Some(wait) = suggested {
            return wait;
        }
        let jitter = self.jitter.clamp(0.0, 1.0);
        let factor = if jitter > 0.0 {
            rng.random_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };
        self.base_delay(attempt).mul_f64(factor)
    }

    /// Whether another retry is allowed after `attempt` throttled sends
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Async sleep seam so tests can observe waits without spending them.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real-time sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
