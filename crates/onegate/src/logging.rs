//! Tracing setup: stderr always, plus an optional log file.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Create a file log writer in `log_dir`.
///
/// Log files are named `gate-{timestamp}.log`. The guard must stay alive for
/// as long as logging is needed; dropping it flushes the writer.
pub fn create_log_writer(log_dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_name = format!("gate-{}.log", Utc::now().format("%Y%m%d-%H%M%S"));
    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    Ok(tracing_appender::non_blocking(file_appender))
}

/// Install the global subscriber (once). Returns the file writer guard when
/// file logging is on.
pub fn init(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let stderr = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let file = log_dir.and_then(|dir| match create_log_writer(dir) {
        Ok(pair) => Some(pair),
        Err(err) => {
            eprintln!("WARNING: file logging disabled: {err:#}");
            None
        }
    });

    match file {
        Some((writer, guard)) => {
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);
            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env())
                .with(stderr)
                .with(file_layer)
                .try_init()
                .ok();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(EnvFilter::from_default_env())
                .with(stderr)
                .try_init()
                .ok();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_log_writer_creates_named_file() {
        let tmp = tempfile::tempdir().expect("Failed to create tempdir");
        let log_dir = tmp.path().join("state").join("logs");

        let (writer, _guard) = create_log_writer(&log_dir).expect("Should create log writer");

        let entries: Vec<_> = std::fs::read_dir(&log_dir)
            .expect("Should read log dir")
            .collect();
        assert_eq!(entries.len(), 1);
        let name = entries[0].as_ref().unwrap().file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("gate-"), "got {name}");
        assert!(name.ends_with(".log"), "got {name}");
        drop(writer);
    }
}
