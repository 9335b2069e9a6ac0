// Bounded exponential backoff for capture recovery

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget for the recovery loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryPolicy {
    /// Wait before the first retry
    pub initial_backoff_ms: u64,
    /// Upper bound on any single wait
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    /// Consecutive failed attempts before giving up
    pub max_attempts: u32,
    /// Good blocks in a row that reset the attempt counter
    pub healthy_blocks_to_reset: u32,
    /// Silence from the source longer than this counts as a fault
    pub stall_timeout_ms: u64,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 8_000,
            multiplier: 2.0,
            max_attempts: 5,
            healthy_blocks_to_reset: 50,
            stall_timeout_ms: 2_000,
        }
    }
}

impl RecoveryPolicy {
    /// Wait before attempt `attempt` (1-based): `min(max, initial * multiplier^(n-1))`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let raw = self.initial_backoff_ms as f64 * multiplier.powi(exponent);
        let capped = raw.min(self.max_backoff_ms.max(self.initial_backoff_ms) as f64);
        Duration::from_millis(capped as u64)
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }
}

/// Attempt bookkeeping for one capture thread
#[derive(Debug, Clone)]
pub struct RecoveryTracker {
    policy: RecoveryPolicy,
    attempts: u32,
    healthy_blocks: u32,
}

impl RecoveryTracker {
    pub fn new(policy: RecoveryPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
            healthy_blocks: 0,
        }
    }

    /// Register a fault and get `(attempt, delay)` for the next retry,
    /// or `None` once `max_attempts` is exhausted
    pub fn next_attempt(&mut self) -> Option<(u32, Duration)> {
        self.healthy_blocks = 0;
        if self.attempts >= self.policy.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some((self.attempts, self.policy.delay_for(self.attempts)))
    }

    /// Count a good block; returns true when it reset the attempt counter
    pub fn record_healthy_block(&mut self) -> bool {
        if self.attempts == 0 {
            return false;
        }
        self.healthy_blocks += 1;
        if self.healthy_blocks >= self.policy.healthy_blocks_to_reset {
            tracing::debug!(
                "[StreamSupervisor] {} healthy blocks, retry budget restored",
                self.healthy_blocks
            );
            self.attempts = 0;
            self.healthy_blocks = 0;
            return true;
        }
        false
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &RecoveryPolicy {
        &self.policy
    }
}
