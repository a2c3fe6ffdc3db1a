//! Connection status for display, derived from the stream state.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::reconnect::StreamState;

/// Three-way indicator; `GaveUp` shows as disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

impl From<StreamState> for ConnectionStatus {
    fn from(state: StreamState) -> Self {
        match state {
            StreamState::Connecting => Self::Connecting,
            StreamState::Connected => Self::Connected,
            StreamState::Disconnected(_) | StreamState::GaveUp => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Write side, held by the stream task(s) of one session.
#[derive(Debug, Clone)]
pub(crate) struct HealthReporter {
    tx: Arc<watch::Sender<StreamState>>,
}

impl HealthReporter {
    pub(crate) fn new() -> Self {
        let (tx, _rx) = watch::channel(StreamState::Connecting);
        Self { tx: Arc::new(tx) }
    }

    pub(crate) fn publish(&self, state: StreamState) {
        self.tx.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
    }

    pub(crate) fn monitor(&self) -> HealthMonitor {
        HealthMonitor {
            rx: self.tx.subscribe(),
        }
    }
}

/// Read side. Cheap to clone; every clone observes the same stream.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    rx: watch::Receiver<StreamState>,
}

impl HealthMonitor {
    pub fn state(&self) -> StreamState {
        *self.rx.borrow()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state().into()
    }

    pub fn gave_up(&self) -> bool {
        self.state() == StreamState::GaveUp
    }

    /// Wait for the next state change. `None` once the session is gone.
    pub async fn changed(&mut self) -> Option<StreamState> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ConnectionStatus::from(StreamState::Connecting),
            ConnectionStatus::Connecting
        );
        assert_eq!(
            ConnectionStatus::from(StreamState::Disconnected(3)),
            ConnectionStatus::Disconnected
        );
        assert_eq!(
            ConnectionStatus::from(StreamState::GaveUp),
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_monitor_follows_reporter() {
        let reporter = HealthReporter::new();
        let mut monitor = reporter.monitor();
        assert_eq!(monitor.status(), ConnectionStatus::Connecting);

        reporter.publish(StreamState::Connected);
        assert_eq!(monitor.changed().await, Some(StreamState::Connected));
        assert_eq!(monitor.status(), ConnectionStatus::Connected);

        reporter.publish(StreamState::GaveUp);
        assert!(monitor.clone().gave_up());
    }

    #[tokio::test]
    async fn test_changed_ends_when_reporter_dropped() {
        let reporter = HealthReporter::new();
        let mut monitor = reporter.monitor();
        drop(reporter);
        assert_eq!(monitor.changed().await, None);
    }
}
