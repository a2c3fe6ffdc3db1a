use tracing::{info, warn};

/// User-facing message raised by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Dismissible; the engine is still recovering on its own.
    Transient(String),
    /// Persistent; live updates stay off until the user restarts them.
    LiveUpdatesStopped { attempts: u32 },
}

impl Notice {
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::LiveUpdatesStopped { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Transient(message) => message.clone(),
            Self::LiveUpdatesStopped { attempts } => format!(
                "Live updates stopped after {attempts} reconnect attempts. Restart to try again."
            ),
        }
    }
}

/// Where notices are delivered (status line, toast, log).
pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Sink that writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotices;

impl NoticeSink for LogNotices {
    fn notify(&self, notice: Notice) {
        if notice.is_persistent() {
            warn!(notice = %notice.message(), "sync notice");
        } else {
            info!(notice = %notice.message(), "sync notice");
        }
    }
}
