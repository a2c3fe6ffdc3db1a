use std::sync::Arc;

use gate_config::StreamConfig;
use tracing::info;

use crate::backend::RecordBackend;
use crate::health::{HealthMonitor, HealthReporter};
use crate::mutation::{CalendarCredentials, MutationCoordinator};
use crate::notice::NoticeSink;
use crate::reconnect::{ReconnectPolicy, StreamState};
use crate::snapshot::SnapshotLoader;
use crate::store::SharedStore;
use crate::stream::{EventStreamClient, StreamHandle, StreamTransport};

/// Collaborators a session is built from.
pub struct SessionParts {
    pub backend: Arc<dyn RecordBackend>,
    pub transport: Arc<dyn StreamTransport>,
    pub credentials: Arc<dyn CalendarCredentials>,
    pub notices: Arc<dyn NoticeSink>,
}

/// One signed-in user's live view: store, loader, stream task, coordinator.
pub struct SyncSession {
    user_id: String,
    store: SharedStore,
    loader: Arc<SnapshotLoader>,
    coordinator: MutationCoordinator,
    transport: Arc<dyn StreamTransport>,
    notices: Arc<dyn NoticeSink>,
    stream_config: StreamConfig,
    reporter: HealthReporter,
    stream: Option<StreamHandle>,
}

impl SyncSession {
    /// Install the initial snapshot without starting live updates.
    pub async fn open(
        user_id: impl Into<String>,
        stream_config: &StreamConfig,
        parts: SessionParts,
    ) -> Self {
        let user_id = user_id.into();
        let store = SharedStore::new();
        let loader = Arc::new(SnapshotLoader::new(
            Arc::clone(&parts.backend),
            store.clone(),
            user_id.clone(),
        ));
        let coordinator = MutationCoordinator::new(
            parts.backend,
            store.clone(),
            parts.credentials,
            user_id.clone(),
        );
        loader.load().await;

        Self {
            user_id,
            store,
            loader,
            coordinator,
            transport: parts.transport,
            notices: parts.notices,
            stream_config: stream_config.clone(),
            reporter: HealthReporter::new(),
            stream: None,
        }
    }

    /// Install the initial snapshot and start the event stream.
    pub async fn start(
        user_id: impl Into<String>,
        stream_config: &StreamConfig,
        parts: SessionParts,
    ) -> Self {
        let mut session = Self::open(user_id, stream_config, parts).await;
        session.spawn_stream(ReconnectPolicy::from_config(stream_config));
        session
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    pub fn health(&self) -> HealthMonitor {
        self.reporter.monitor()
    }

    pub fn loader(&self) -> &SnapshotLoader {
        &self.loader
    }

    /// Reload the snapshot on demand. Returns the number of records installed.
    pub async fn refresh(&self) -> usize {
        self.loader.load().await.len()
    }

    /// Manually reconnect after the stream gave up (or at any time).
    ///
    /// The attempt counter starts from zero and the snapshot is reloaded
    /// first, since events were missed while disconnected.
    pub async fn restart_stream(&mut self) {
        let previous = match self.stream.take() {
            Some(mut handle) => handle.stop().await,
            None => None,
        };
        let mut policy =
            previous.unwrap_or_else(|| ReconnectPolicy::from_config(&self.stream_config));
        policy.reset();

        self.loader.load().await;
        info!(user_id = %self.user_id, "restarting live updates");
        self.spawn_stream(policy);
    }

    /// Stop live updates. Returns the last stream state.
    pub async fn shutdown(mut self) -> StreamState {
        match self.stream.take() {
            Some(handle) => handle.shutdown().await,
            None => self.reporter.monitor().state(),
        }
    }

    /// Wait until the stream task ends on its own, which only happens after
    /// it gave up.
    pub async fn wait_stream(&mut self) -> Option<StreamState> {
        let handle = self.stream.take()?;
        Some(handle.join().await)
    }

    fn spawn_stream(&mut self, policy: ReconnectPolicy) {
        let client = EventStreamClient::new(
            self.user_id.clone(),
            Arc::clone(&self.transport),
            Arc::clone(&self.loader),
            Arc::clone(&self.notices),
            policy,
            self.reporter.clone(),
        );
        self.stream = Some(client.spawn());
    }
}
