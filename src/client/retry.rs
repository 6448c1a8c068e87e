//! # Retry Logic and Backoff Strategies
//!
//! Bounded retry for writes the server rejected as `CONTENDED`. Lease
//! contention is short-lived (a lease lasts a few seconds at most), so a
//! handful of quick retries usually succeeds. Every other failure is returned
//! to the caller on the first attempt.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardsync::client::retry::RetryPolicy;
//! # async fn example(client: &boardsync::client::api::BoardClient, request: boardsync::shared::MoveCardRequest) {
//! let policy = RetryPolicy::default();
//! let card = policy.run(|| client.move_card(request.clone())).await;
//! # }
//! ```

use crate::shared::config::ClientConfig;
use std::future::Future;
use std::time::Duration;

/// Failures that know whether retrying them can help
pub trait Retriable {
    fn is_retriable(&self) -> bool;
}

/// Backoff strategy configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStrategy {
    /// Same delay before every retry
    Fixed { interval: Duration },
    /// `base * 2^(attempt-1)`, capped at `max`
    Exponential { base: Duration, max: Duration },
}

impl BackoffStrategy {
    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            BackoffStrategy::Fixed { interval } => interval,
            BackoffStrategy::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            strategy: BackoffStrategy::Exponential {
                base: config.base_delay,
                max: config.max_delay,
            },
        }
    }

    /// Never retry
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            strategy: BackoffStrategy::Fixed {
                interval: Duration::ZERO,
            },
        }
    }

    /// Run `operation`, retrying retriable failures up to `max_retries` times
    pub async fn run<T, E, F, Fut>(&self, mut operation: F) -> Result<T, E>
    where
        E: Retriable + std::fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retriable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.strategy.delay(attempt);
                    tracing::debug!(
                        "Retrying after {:?} (attempt {}/{}): {}",
                        delay,
                        attempt,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
