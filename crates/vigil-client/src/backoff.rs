//! Exponential reconnect delay.

use std::time::Duration;

/// Reconnect delay parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// First delay after a failure, and the value restored on success.
    pub initial: Duration,
    /// Multiplier applied after every failed attempt. Must be greater than 1.
    pub factor: f64,
    /// Upper bound on any single delay.
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            factor: 1.5,
            max: Duration::from_millis(30_000),
        }
    }
}

/// Running delay sequence for one connection.
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    current: Duration,
}

impl Backoff {
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self {
            current: policy.initial,
            policy,
        }
    }

    /// Delay to wait before the next attempt; advances the sequence.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.mul_f64(self.policy.factor).min(self.policy.max);
        delay
    }

    /// Delay the next failure will be given, without advancing.
    pub const fn peek(&self) -> Duration {
        self.current
    }

    /// Back to the initial delay after a successful connection.
    pub const fn reset(&mut self) {
        self.current = self.policy.initial;
    }
}
