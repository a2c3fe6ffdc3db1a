use std::sync::Arc;

use anyhow::Result;
use gate_config::{CredentialStore, GateConfig};
use gate_sync::{
    ApiClient, CalendarCredentials, HttpStreamTransport, NoticeSink, SessionParts,
    StaticCredential, SyncSession,
};
use tracing::debug;

/// Effective configuration: file, then environment, then validation.
pub(crate) fn load_config() -> Result<GateConfig> {
    let config = GateConfig::load()?;
    config.validate()?;
    Ok(config)
}

pub(crate) fn credentials() -> Arc<dyn CalendarCredentials> {
    match CredentialStore::default_location() {
        Ok(store) => Arc::new(store),
        Err(err) => {
            debug!("no credential store: {err:#}");
            Arc::new(StaticCredential(None))
        }
    }
}

pub(crate) fn parts(config: &GateConfig, notices: Arc<dyn NoticeSink>) -> SessionParts {
    let api = ApiClient::from_config(&config.backend);
    let transport = HttpStreamTransport::from_api(&api);
    SessionParts {
        backend: Arc::new(api),
        transport: Arc::new(transport),
        credentials: credentials(),
        notices,
    }
}

/// Session with the snapshot installed but no live stream, for one-shot
/// commands.
pub(crate) async fn open_session(config: &GateConfig) -> Result<SyncSession> {
    let user_id = config.require_user_id()?;
    let parts = parts(config, Arc::new(gate_sync::LogNotices));
    Ok(SyncSession::open(user_id, &config.stream, parts).await)
}
