//! Reconnect bookkeeping for the event stream.
//!
//! The attempt counter resets only when the server's `connected` event
//! arrives, not when the transport opens, so a server that accepts and
//! immediately drops connections still exhausts the budget.

use std::time::Duration;

use gate_config::StreamConfig;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "attempt", rename_all = "snake_case")]
pub enum StreamState {
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `n`.
    Disconnected(u32),
    /// Attempts exhausted; only a manual restart reconnects.
    GaveUp,
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected(attempt) => write!(f, "disconnected (retry {attempt})"),
            Self::GaveUp => write!(f, "gave up"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    max_attempts: u32,
    base_delay: Duration,
    attempts: u32,
    state: StreamState,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            attempts: 0,
            state: StreamState::Connecting,
        }
    }

    pub fn from_config(config: &StreamConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay())
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A connection attempt is starting.
    pub fn begin_connect(&mut self) -> StreamState {
        if self.state != StreamState::GaveUp {
            self.state = StreamState::Connecting;
        }
        self.state
    }

    /// The server confirmed the stream. Returns `true` when this ends an
    /// outage, meaning events may have been missed.
    pub fn on_connected(&mut self) -> bool {
        let recovered = self.attempts > 0;
        self.attempts = 0;
        self.state = StreamState::Connected;
        recovered
    }

    /// The transport failed or the server closed the stream.
    pub fn on_failure(&mut self) -> ReconnectDecision {
        if self.attempts >= self.max_attempts {
            self.state = StreamState::GaveUp;
            return ReconnectDecision::GiveUp;
        }
        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        self.state = StreamState::Disconnected(self.attempts);
        ReconnectDecision::Retry {
            attempt: self.attempts,
            delay,
        }
    }

    /// Clear the counter so a manually restarted stream gets the full budget
    /// again.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.state = StreamState::Connecting;
    }

    /// `base_delay * 2^n`, saturating.
    pub fn delay_for(&self, n: u32) -> Duration {
        let factor = 2u32.checked_pow(n).unwrap_or(u32::MAX);
        self.base_delay.checked_mul(factor).unwrap_or(Duration::MAX)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&StreamConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retry_delays(policy: &mut ReconnectPolicy) -> Vec<u64> {
        let mut delays = Vec::new();
        while let ReconnectDecision::Retry { delay, .. } = policy.on_failure() {
            delays.push(delay.as_millis() as u64);
        }
        delays
    }

    #[test]
    fn test_default_schedule_then_give_up() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(retry_delays(&mut policy), [1000, 2000, 4000, 8000, 16000]);
        assert_eq!(policy.state(), StreamState::GaveUp);
        assert_eq!(policy.on_failure(), ReconnectDecision::GiveUp);
    }

    #[test]
    fn test_disconnected_state_carries_attempt() {
        let mut policy = ReconnectPolicy::new(3, Duration::from_millis(10));
        policy.begin_connect();
        assert_eq!(
            policy.on_failure(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_millis(10)
            }
        );
        assert_eq!(policy.state(), StreamState::Disconnected(1));
        assert_eq!(policy.begin_connect(), StreamState::Connecting);
    }

    #[test]
    fn test_connected_resets_counter_and_reports_recovery() {
        let mut policy = ReconnectPolicy::new(5, Duration::from_secs(1));
        assert!(!policy.on_connected());

        policy.on_failure();
        policy.on_failure();
        assert_eq!(policy.state(), StreamState::Disconnected(2));
        assert!(policy.on_connected());
        assert_eq!(policy.state(), StreamState::Connected);

        assert_eq!(
            policy.on_failure(),
            ReconnectDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
    }

    #[test]
    fn test_gave_up_is_sticky_until_reset() {
        let mut policy = ReconnectPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.on_failure(), ReconnectDecision::GiveUp);
        assert_eq!(policy.begin_connect(), StreamState::GaveUp);

        policy.reset();
        assert_eq!(policy.begin_connect(), StreamState::Connecting);
    }

    #[test]
    fn test_reset_restores_full_budget() {
        let mut policy = ReconnectPolicy::new(2, Duration::from_millis(100));
        assert_eq!(retry_delays(&mut policy), [100, 200]);
        assert_eq!(policy.state(), StreamState::GaveUp);

        policy.reset();
        assert!(!policy.on_connected());
        assert_eq!(retry_delays(&mut policy), [100, 200]);
    }

    #[test]
    fn test_delay_saturates() {
        let policy = ReconnectPolicy::new(100, Duration::from_secs(1));
        assert_eq!(policy.delay_for(64), Duration::MAX);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(StreamState::Disconnected(2).to_string(), "disconnected (retry 2)");
        assert_eq!(StreamState::GaveUp.to_string(), "gave up");
    }
}
