//! Long-lived event stream task.
//!
//! One task per session owns the connection, decodes frames, applies events
//! to the store and runs the reconnect policy. Cancelling the handle closes
//! the connection and any pending reconnect timer.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use gate_core::{SyncError, SyncResult};
use reqwest::header::ACCEPT;
use reqwest::{Response, Url};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::apply::{ApplyOutcome, apply_event};
use crate::backend::ApiClient;
use crate::event::StreamEvent;
use crate::health::{HealthMonitor, HealthReporter};
use crate::notice::{Notice, NoticeSink};
use crate::reconnect::{ReconnectDecision, ReconnectPolicy, StreamState};
use crate::snapshot::SnapshotLoader;
use crate::sse::{SseDecoder, SseFrame};
use crate::store::SharedStore;

/// Opens event stream connections.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, user_id: &str) -> SyncResult<Box<dyn StreamConnection>>;
}

/// An open event stream.
#[async_trait]
pub trait StreamConnection: Send {
    /// Next complete frame, or `Ok(None)` once the server closed the stream.
    async fn next_frame(&mut self) -> SyncResult<Option<SseFrame>>;
}

/// `GET /records/stream?user_id=` over `reqwest`, without a request timeout.
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStreamTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_api(api: &ApiClient) -> Self {
        Self::new(api.http().clone(), api.base_url())
    }
}

#[async_trait]
impl StreamTransport for HttpStreamTransport {
    async fn connect(&self, user_id: &str) -> SyncResult<Box<dyn StreamConnection>> {
        let url = Url::parse_with_params(
            &format!("{}/records/stream", self.base_url),
            &[("user_id", user_id)],
        )
        .map_err(|err| SyncError::Transport(format!("invalid stream URL: {err}")))?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|err| SyncError::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Transport(format!(
                "stream request rejected with HTTP {}",
                status.as_u16()
            )));
        }
        debug!("event stream response received");
        Ok(Box::new(HttpStreamConnection {
            response,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
        }))
    }
}

struct HttpStreamConnection {
    response: Response,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
}

#[async_trait]
impl StreamConnection for HttpStreamConnection {
    async fn next_frame(&mut self) -> SyncResult<Option<SseFrame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }
            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|err| SyncError::Transport(err.to_string()))?;
            match chunk {
                Some(bytes) => self.pending.extend(self.decoder.push(&bytes)),
                None => return Ok(None),
            }
        }
    }
}

/// Handle to a running stream task.
///
/// Dropping the handle cancels the task.
pub struct StreamHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<ReconnectPolicy>>,
    monitor: HealthMonitor,
}

impl StreamHandle {
    /// Cancel the task and wait for it to exit. Returns the final state.
    pub async fn shutdown(mut self) -> StreamState {
        let fallback = self.monitor.state();
        self.stop()
            .await
            .map_or(fallback, |policy| policy.state())
    }

    /// Wait for the task to end on its own (it only does after giving up).
    pub async fn join(mut self) -> StreamState {
        let fallback = self.monitor.state();
        match self.task.take() {
            Some(task) => task.await.map_or(fallback, |policy| policy.state()),
            None => fallback,
        }
    }

    /// Cancel the task and hand back its reconnect policy, `None` if the task
    /// was already collected or panicked.
    pub(crate) async fn stop(&mut self) -> Option<ReconnectPolicy> {
        self.cancel.cancel();
        self.task.take()?.await.ok()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum PumpExit {
    Cancelled,
    Failed(String),
}

/// Connects, applies events and reconnects with backoff until cancelled or
/// the policy gives up.
pub(crate) struct EventStreamClient {
    user_id: String,
    transport: Arc<dyn StreamTransport>,
    loader: Arc<SnapshotLoader>,
    store: SharedStore,
    notices: Arc<dyn NoticeSink>,
    policy: ReconnectPolicy,
    reporter: HealthReporter,
    cancel: CancellationToken,
}

impl EventStreamClient {
    pub(crate) fn new(
        user_id: impl Into<String>,
        transport: Arc<dyn StreamTransport>,
        loader: Arc<SnapshotLoader>,
        notices: Arc<dyn NoticeSink>,
        policy: ReconnectPolicy,
        reporter: HealthReporter,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            transport,
            store: loader.store().clone(),
            loader,
            notices,
            policy,
            reporter,
            cancel: CancellationToken::new(),
        }
    }

    /// Start the task on the current runtime.
    pub(crate) fn spawn(self) -> StreamHandle {
        let cancel = self.cancel.clone();
        let monitor = self.reporter.monitor();
        let task = tokio::spawn(self.run());
        StreamHandle {
            cancel,
            task: Some(task),
            monitor,
        }
    }

    async fn run(mut self) -> ReconnectPolicy {
        loop {
            let state = self.policy.begin_connect();
            self.reporter.publish(state);

            let connected = tokio::select! {
                _ = self.cancel.cancelled() => return self.policy,
                result = self.transport.connect(&self.user_id) => result,
            };
            let reason = match connected {
                Ok(connection) => match self.pump(connection).await {
                    PumpExit::Cancelled => return self.policy,
                    PumpExit::Failed(reason) => reason,
                },
                Err(err) => err.to_string(),
            };

            match self.policy.on_failure() {
                ReconnectDecision::Retry { attempt, delay } => {
                    self.reporter.publish(self.policy.state());
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "event stream disconnected; reconnecting"
                    );
                    self.notices.notify(Notice::Transient(format!(
                        "Live updates interrupted; reconnecting in {}s",
                        delay.as_secs().max(1)
                    )));
                    tokio::select! {
                        _ = self.cancel.cancelled() => return self.policy,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                ReconnectDecision::GiveUp => {
                    self.reporter.publish(StreamState::GaveUp);
                    error!(
                        attempts = self.policy.max_attempts(),
                        %reason,
                        "event stream gave up reconnecting"
                    );
                    self.notices.notify(Notice::LiveUpdatesStopped {
                        attempts: self.policy.max_attempts(),
                    });
                    return self.policy;
                }
            }
        }
    }

    async fn pump(&mut self, mut connection: Box<dyn StreamConnection>) -> PumpExit {
        loop {
            let frame = tokio::select! {
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
                frame = connection.next_frame() => frame,
            };
            match frame {
                Ok(Some(frame)) => self.handle_frame(frame).await,
                Ok(None) => return PumpExit::Failed("stream closed by server".to_string()),
                Err(err) => return PumpExit::Failed(err.to_string()),
            }
        }
    }

    async fn handle_frame(&mut self, frame: SseFrame) {
        let event = match StreamEvent::parse(&frame) {
            Ok(event) => event,
            Err(err) => {
                warn!(%err, "discarding stream event");
                return;
            }
        };

        if event == StreamEvent::Connected {
            let recovered = self.policy.on_connected();
            self.reporter.publish(StreamState::Connected);
            info!(recovered, "event stream connected");
            if recovered {
                self.resync("reconnected after an outage").await;
            }
            return;
        }

        let name = event.name();
        if apply_event(&self.store, event) == ApplyOutcome::ResyncNeeded {
            self.resync(name).await;
        }
    }

    async fn resync(&self, reason: &str) {
        debug!(reason, "resyncing record snapshot");
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = self.loader.load() => {}
        }
    }
}
