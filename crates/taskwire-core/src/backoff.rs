//! Reconnection backoff policy and delay calculation.
//!
//! The client controller retries a lost connection with capped exponential
//! delay between attempts. The math lives here, sync and dependency-free;
//! the controller supplies randomness for jitter and owns the timers.

use serde::{Deserialize, Serialize};

/// Default maximum reconnection attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Default base delay between attempts in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default cap on the delay between attempts in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Reconnection policy: attempt cap plus delay shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectPolicy {
    /// Maximum automatic attempts after an unexpected loss (default: 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff in ms (default: 1000).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Delay cap in ms (default: 5000).
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0 (default: 0.2).
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl ReconnectPolicy {
    /// Whether another attempt is allowed after `attempt` failures.
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before the given zero-based attempt, with jitter from `random`
    /// (a value in `[0.0, 1.0)`, typically from a PRNG).
    ///
    /// Formula: `min(max_delay, base * 2^attempt) * (1 + (random*2-1) * jitter)`.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_ms(&self, attempt: u32, random: f64) -> u64 {
        let exponential = self.base_delay_ms.saturating_mul(1u64 << attempt.min(31));
        let capped = exponential.min(self.max_delay_ms);
        let jitter = 1.0 + (random * 2.0 - 1.0) * self.jitter_factor;
        ((capped as f64) * jitter).round().max(0.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_client() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 1000);
        assert_eq!(policy.max_delay_ms, 5000);
    }

    #[test]
    fn delays_grow_exponentially_without_jitter() {
        let policy = ReconnectPolicy {
            jitter_factor: 0.0,
            ..ReconnectPolicy::default()
        };
        assert_eq!(policy.delay_ms(0, 0.5), 1000);
        assert_eq!(policy.delay_ms(1, 0.5), 2000);
        assert_eq!(policy.delay_ms(2, 0.5), 4000);
        // capped
        assert_eq!(policy.delay_ms(3, 0.5), 5000);
        assert_eq!(policy.delay_ms(10, 0.5), 5000);
    }

    #[test]
    fn jitter_spreads_symmetrically() {
        let policy = ReconnectPolicy::default();
        // random=0 → -20%, random=0.5 → exact, random→1 → +20%
        assert_eq!(policy.delay_ms(0, 0.0), 800);
        assert_eq!(policy.delay_ms(0, 0.5), 1000);
        assert_eq!(policy.delay_ms(0, 1.0), 1200);
    }

    #[test]
    fn high_attempt_does_not_overflow() {
        let policy = ReconnectPolicy::default();
        let delay = policy.delay_ms(1000, 0.5);
        assert_eq!(delay, 5000);
    }

    #[test]
    fn allows_up_to_cap() {
        let policy = ReconnectPolicy::default();
        assert!(policy.allows(0));
        assert!(policy.allows(4));
        assert!(!policy.allows(5));
        assert!(!policy.allows(100));
    }

    #[test]
    fn serde_fills_defaults() {
        let policy: ReconnectPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.max_attempts, DEFAULT_MAX_ATTEMPTS);
        let policy: ReconnectPolicy =
            serde_json::from_str(r#"{"maxAttempts":2}"#).unwrap();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.base_delay_ms, DEFAULT_BASE_DELAY_MS);
    }
}
