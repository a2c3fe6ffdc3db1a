//! Environment diagnostics for OneGate.

use anyhow::Result;
use chrono::Utc;
use gate_config::{CredentialStore, GateConfig, paths};
use gate_core::OutputFormat;
use gate_sync::{ApiClient, NotionStatus, RecordBackend};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct DoctorReport {
    version: &'static str,
    config_path: Option<String>,
    config_exists: bool,
    config_error: Option<String>,
    backend_url: Option<String>,
    user_id_set: bool,
    calendar_token: CredentialState,
    backend: BackendState,
    notion: NotionState,
    log_dir: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum CredentialState {
    Missing,
    Valid,
    Expired,
    Unreadable,
}

#[derive(Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
enum BackendState {
    Skipped,
    Reachable { status: String, ai_available: bool },
    Unreachable { error: String },
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "snake_case")]
enum NotionState {
    /// No usable config or user id, or the backend is down.
    Skipped,
    Connected { user: Option<String> },
    NotConnected,
    Expired,
    Error { error: String },
}

impl From<NotionStatus> for NotionState {
    fn from(status: NotionStatus) -> Self {
        match status {
            NotionStatus::Connected { user } => Self::Connected { user },
            NotionStatus::NotConnected => Self::NotConnected,
            NotionStatus::Expired { .. } => Self::Expired,
            NotionStatus::Error { message } => Self::Error {
                error: message.unwrap_or_else(|| "status check failed".to_string()),
            },
        }
    }
}

/// Run full environment diagnostics.
pub async fn run_doctor(format: OutputFormat) -> Result<()> {
    let report = collect().await;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text(&report),
    }
    Ok(())
}

async fn collect() -> DoctorReport {
    let config_path = GateConfig::config_path().ok();
    let config_exists = config_path.as_ref().is_some_and(|path| path.exists());
    let config = GateConfig::load().and_then(|config| {
        config.validate()?;
        Ok(config)
    });

    let (config, config_error) = match config {
        Ok(config) => (Some(config), None),
        Err(err) => (None, Some(format!("{err:#}"))),
    };

    let client = config
        .as_ref()
        .map(|config| ApiClient::from_config(&config.backend));
    let backend = match &client {
        Some(client) => match client.health().await {
            Ok(report) => BackendState::Reachable {
                status: report.status,
                ai_available: report.ai_available,
            },
            Err(err) => BackendState::Unreachable {
                error: err.to_string(),
            },
        },
        None => BackendState::Skipped,
    };

    let user_id = config
        .as_ref()
        .and_then(|config| config.require_user_id().ok());
    let notion = match (&client, user_id, &backend) {
        (Some(client), Some(user_id), BackendState::Reachable { .. }) => {
            match client.notion_status(user_id).await {
                Ok(status) => status.into(),
                Err(err) => NotionState::Error {
                    error: err.to_string(),
                },
            }
        }
        _ => NotionState::Skipped,
    };

    DoctorReport {
        version: env!("CARGO_PKG_VERSION"),
        config_path: config_path.map(|path| path.display().to_string()),
        config_exists,
        config_error,
        backend_url: config.as_ref().map(|c| c.backend.base_url.clone()),
        user_id_set: user_id.is_some(),
        calendar_token: credential_state(),
        backend,
        notion,
        log_dir: paths::log_dir().display().to_string(),
    }
}

fn credential_state() -> CredentialState {
    let loaded = CredentialStore::default_location().and_then(|store| store.load());
    match loaded {
        Ok(None) => CredentialState::Missing,
        Ok(Some(credential)) if credential.is_expired_at(Utc::now()) => CredentialState::Expired,
        Ok(Some(_)) => CredentialState::Valid,
        Err(_) => CredentialState::Unreadable,
    }
}

fn print_text(report: &DoctorReport) {
    println!("=== OneGate Environment Check ===");
    println!("Version:      {}", report.version);
    println!("Log dir:      {}", report.log_dir);
    println!();

    println!("=== Config ===");
    match &report.config_path {
        Some(path) if report.config_exists => println!("Config file:  {path}"),
        Some(path) => println!("Config file:  {path} (not found, using defaults)"),
        None => println!("Config file:  (no home directory)"),
    }
    if let Some(error) = &report.config_error {
        println!("Config error: {error}");
    }
    if let Some(url) = &report.backend_url {
        println!("Backend URL:  {url}");
    }
    println!(
        "User id:      {}",
        if report.user_id_set { "set" } else { "NOT SET" }
    );
    println!();

    println!("=== Credentials ===");
    let token = match report.calendar_token {
        CredentialState::Missing => "not stored (calendar uploads will fail)",
        CredentialState::Valid => "stored",
        CredentialState::Expired => "EXPIRED (run `gate token set`)",
        CredentialState::Unreadable => "unreadable",
    };
    println!("Calendar token: {token}");
    println!();

    println!("=== Backend ===");
    match &report.backend {
        BackendState::Skipped => println!("Skipped (invalid config)"),
        BackendState::Reachable {
            status,
            ai_available,
        } => {
            println!("Status:       {status}");
            println!(
                "Analysis:     {}",
                if *ai_available { "available" } else { "unavailable" }
            );
        }
        BackendState::Unreachable { error } => println!("Unreachable:  {error}"),
    }
    println!();

    println!("=== Notion ===");
    match &report.notion {
        NotionState::Skipped => println!("Skipped (needs a reachable backend and a user id)"),
        NotionState::Connected { user: Some(user) } => println!("Connected as {user}"),
        NotionState::Connected { user: None } => println!("Connected"),
        NotionState::NotConnected => println!("NOT CONNECTED (memo uploads will fail)"),
        NotionState::Expired => println!("EXPIRED (reconnect Notion in the web app)"),
        NotionState::Error { error } => println!("Check failed: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_state_json_shape() {
        let reachable = serde_json::to_value(BackendState::Reachable {
            status: "ok".into(),
            ai_available: true,
        })
        .unwrap();
        assert_eq!(reachable["state"], "reachable");
        assert_eq!(reachable["ai_available"], true);

        let skipped = serde_json::to_value(BackendState::Skipped).unwrap();
        assert_eq!(skipped["state"], "skipped");
    }

    #[test]
    fn test_credential_state_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(CredentialState::Expired).unwrap(),
            "expired"
        );
    }

    #[test]
    fn test_notion_state_from_server_status() {
        let connected = NotionState::from(NotionStatus::Connected {
            user: Some("Ada".into()),
        });
        let value = serde_json::to_value(&connected).unwrap();
        assert_eq!(value["state"], "connected");
        assert_eq!(value["user"], "Ada");

        let missing = serde_json::to_value(NotionState::from(NotionStatus::NotConnected)).unwrap();
        assert_eq!(missing["state"], "not_connected");

        let failed = NotionState::from(NotionStatus::Error { message: None });
        assert_eq!(
            failed,
            NotionState::Error {
                error: "status check failed".into()
            }
        );
        assert_eq!(
            NotionState::from(NotionStatus::Expired { message: None }),
            NotionState::Expired
        );
    }
}
