//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// Calculate exponential backoff delay with jitter.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Apply jitter (0 to 10% of the delay)
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}

/// Tracks a streak of failures and the earliest time the next attempt may run.
#[derive(Debug)]
pub struct BackoffGate {
    base_ms: u64,
    max_ms: u64,
    streak: u32,
    not_before: Option<Instant>,
}

impl BackoffGate {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            streak: 0,
            not_before: None,
        }
    }

    /// Record a failure and push the next allowed attempt out.
    pub fn record_failure(&mut self) -> Duration {
        self.streak = self.streak.saturating_add(1);
        let delay = calculate_backoff(self.streak, self.base_ms, self.max_ms);
        self.not_before = Some(Instant::now() + delay);
        delay
    }

    /// Clear the streak.
    pub fn record_success(&mut self) {
        self.streak = 0;
        self.not_before = None;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// True once the backoff delay has elapsed.
    pub fn is_open(&self) -> bool {
        self.not_before.map_or(true, |t| Instant::now() >= t)
    }
}
