//! Attempt budget and inter-attempt delay.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default ceiling for exponential delays.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);

/// How the delay evolves between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStrategy {
    /// Same delay before every retry.
    Fixed,
    /// `delay * 2^(n-1)` capped at `max_delay`, then a uniformly random
    /// fraction of that (full jitter).
    ExponentialJitter { max_delay: Duration },
}

impl FromStr for RetryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "exponential" | "exponential_jitter" => Ok(Self::ExponentialJitter {
                max_delay: DEFAULT_MAX_DELAY,
            }),
            other => Err(format!(
                "Unknown retry strategy '{other}' (expected 'fixed' or 'exponential')"
            )),
        }
    }
}

/// Retry configuration for [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    pub delay: Duration,
    pub strategy: RetryStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            strategy: RetryStrategy::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
            strategy: RetryStrategy::Fixed,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.strategy {
            RetryStrategy::Fixed => self.delay,
            RetryStrategy::ExponentialJitter { max_delay } => {
                let cap = exponential_cap(self.delay, attempt, max_delay);
                if cap.is_zero() {
                    return cap;
                }
                let millis = rand::rng().random_range(0..=cap.as_millis() as u64);
                Duration::from_millis(millis)
            }
        }
    }

    /// Longest a call can take when every attempt runs into `per_attempt`
    /// and every delay hits its ceiling.
    pub fn worst_case(&self, per_attempt: Duration) -> Duration {
        let attempts = self.attempts();
        (1..attempts).fold(per_attempt.saturating_mul(attempts), |total, attempt| {
            let delay = match self.strategy {
                RetryStrategy::Fixed => self.delay,
                RetryStrategy::ExponentialJitter { max_delay } => {
                    exponential_cap(self.delay, attempt, max_delay)
                }
            };
            total.saturating_add(delay)
        })
    }
}

fn exponential_cap(base: Duration, attempt: u32, max_delay: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(max_delay)
}
