//! Reconnect pacing for the connection manager.
//!
//! The policy only decides *when* the next connect attempt may start; the
//! state machine itself is unchanged whatever the policy. The shipped policy
//! is a fixed interval with no backoff.

use tokio::time::{Duration, Instant};

/// Tolerance for loop tick jitter when comparing against the retry time
const RETRY_SLACK: Duration = Duration::from_millis(20);

/// Spacing between connect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    interval: Duration,
}

impl ReconnectPolicy {
    /// Retry every `interval`, however many attempts have failed
    pub fn fixed(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Delay before the next attempt after `consecutive_failures` failures
    pub fn delay_after(&self, _consecutive_failures: u32) -> Duration {
        self.interval
    }

    /// Whether an attempt may start at `now`
    pub fn should_attempt(&self, retry_at: Option<Instant>, now: Instant) -> bool {
        match retry_at {
            None => true,
            Some(at) => now + RETRY_SLACK >= at,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}
