//! In-process fakes for the records API and the event stream.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gate_core::{FailureKind, RecordId, RequestFailure, SyncError, SyncResult};
use gate_sync::wire::WireRecord;
use gate_sync::{
    HealthReport, NewInput, Notice, NoticeSink, RecordBackend, RecordRevision, SseFrame,
    StreamConnection, StreamTransport, UploadReceipt, UploadRequest,
};
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

pub fn row(value: Value) -> WireRecord {
    serde_json::from_value(value).expect("valid row")
}

pub fn failure(kind: FailureKind, status: Option<u16>) -> RequestFailure {
    RequestFailure::new(kind, status, format!("simulated {kind}"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadCall {
    pub id: RecordId,
    pub token: Option<String>,
    pub request: UploadRequest,
}

/// Scriptable [`RecordBackend`]. Unscripted calls succeed.
#[derive(Default)]
pub struct FakeBackend {
    rows: Mutex<Vec<WireRecord>>,
    list_failure: Mutex<Option<RequestFailure>>,
    list_calls: AtomicUsize,
    next_id: AtomicUsize,
    submit_results: Mutex<VecDeque<Result<WireRecord, RequestFailure>>>,
    upload_results: Mutex<VecDeque<Result<UploadReceipt, RequestFailure>>>,
    delete_results: Mutex<VecDeque<Result<(), RequestFailure>>>,
    upload_gate: Mutex<Option<oneshot::Receiver<()>>>,
    uploads: Mutex<Vec<UploadCall>>,
    deletes: Mutex<Vec<RecordId>>,
    submits: Mutex<Vec<Option<String>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(100),
            ..Self::default()
        })
    }

    pub fn with_rows(rows: Vec<Value>) -> Arc<Self> {
        let backend = Self::new();
        backend.set_rows(rows);
        backend
    }

    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.rows.lock().unwrap() = rows.into_iter().map(row).collect();
    }

    pub fn fail_list(&self, failure: RequestFailure) {
        *self.list_failure.lock().unwrap() = Some(failure);
    }

    pub fn push_submit(&self, result: Result<WireRecord, RequestFailure>) {
        self.submit_results.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: Result<UploadReceipt, RequestFailure>) {
        self.upload_results.lock().unwrap().push_back(result);
    }

    /// Park the next upload after it is recorded, until the returned sender
    /// fires (or is dropped).
    pub fn hold_next_upload(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.upload_gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn push_delete(&self, result: Result<(), RequestFailure>) {
        self.delete_results.lock().unwrap().push_back(result);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> Vec<UploadCall> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<RecordId> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn submits(&self) -> Vec<Option<String>> {
        self.submits.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordBackend for FakeBackend {
    async fn list_records(&self, _user_id: &str) -> Result<Vec<WireRecord>, RequestFailure> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = self.list_failure.lock().unwrap().clone() {
            return Err(failure);
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn submit_input(
        &self,
        _user_id: &str,
        input: &NewInput,
    ) -> Result<WireRecord, RequestFailure> {
        self.submits.lock().unwrap().push(input.text.clone());
        if let Some(result) = self.submit_results.lock().unwrap().pop_front() {
            return result;
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(row(json!({
            "id": id,
            "text": input.text,
            "status": "PENDING",
            "created_at": "2026-10-16T09:00:00Z"
        })))
    }

    async fn upload_record(
        &self,
        id: &RecordId,
        request: &UploadRequest,
        calendar_token: Option<&str>,
    ) -> Result<UploadReceipt, RequestFailure> {
        self.uploads.lock().unwrap().push(UploadCall {
            id: id.clone(),
            token: calendar_token.map(ToOwned::to_owned),
            request: request.clone(),
        });
        let gate = self.upload_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.upload_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(UploadReceipt::default()))
    }

    async fn delete_record(&self, id: &RecordId) -> Result<(), RequestFailure> {
        self.deletes.lock().unwrap().push(id.clone());
        self.delete_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn revise_record(
        &self,
        id: &RecordId,
        revision: &RecordRevision,
    ) -> Result<Option<WireRecord>, RequestFailure> {
        let rows = self.rows.lock().unwrap();
        let Some(current) = rows.iter().find(|row| &row.id == id) else {
            return Ok(None);
        };
        let mut updated = current.clone();
        if let Some(text) = &revision.text {
            updated.text = Some(text.clone());
        }
        if let Some(analysis) = &revision.analysis_data {
            updated.result = Some(Value::Object(analysis.clone()));
        }
        Ok(Some(updated))
    }

    async fn health(&self) -> Result<HealthReport, RequestFailure> {
        Ok(HealthReport {
            status: "ok".into(),
            ai_available: true,
        })
    }
}

/// One scripted outcome of `connect`.
pub enum Connect {
    Fail(String),
    /// Frames are fed through the returned sender; dropping it closes the stream.
    Open(mpsc::UnboundedReceiver<SseFrame>),
}

/// Transport whose connections are handed out from a script. Once the
/// script is exhausted every connect fails.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Connect>>,
    connects: Mutex<Vec<Instant>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue an open connection and return its feed.
    pub fn open(&self) -> mpsc::UnboundedSender<SseFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().unwrap().push_back(Connect::Open(rx));
        tx
    }

    pub fn fail(&self, reason: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(Connect::Fail(reason.to_string()));
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.connects.lock().unwrap().clone()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }
}

struct ChannelConnection {
    rx: mpsc::UnboundedReceiver<SseFrame>,
}

#[async_trait]
impl StreamConnection for ChannelConnection {
    async fn next_frame(&mut self) -> SyncResult<Option<SseFrame>> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl StreamTransport for ScriptedTransport {
    async fn connect(&self, _user_id: &str) -> SyncResult<Box<dyn StreamConnection>> {
        self.connects.lock().unwrap().push(Instant::now());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Connect::Open(rx)) => Ok(Box::new(ChannelConnection { rx })),
            Some(Connect::Fail(reason)) => Err(SyncError::Transport(reason)),
            None => Err(SyncError::Transport("connection refused".into())),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotices {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotices {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn all(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NoticeSink for RecordingNotices {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

pub fn frame(event: &str, data: Value) -> SseFrame {
    SseFrame::new(event, data.to_string())
}

/// Poll `condition` until it holds, failing the test after a few seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
