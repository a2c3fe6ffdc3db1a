//! Live, eventually consistent view of a user's records.
//!
//! A [`SyncSession`] seeds the [`SharedStore`] from a snapshot, keeps it
//! current from the server-push event stream, and routes user mutations
//! (create, upload, delete) through the [`MutationCoordinator`].

mod apply;
pub mod backend;
pub mod classify;
mod event;
mod health;
mod mutation;
mod notice;
mod reconnect;
mod session;
mod snapshot;
pub mod sse;
mod store;
mod stream;
pub mod wire;

pub use apply::{ApplyOutcome, apply_event};
pub use backend::{
    ApiClient, HealthReport, ImageAttachment, NewInput, NotionStatus, RecordBackend,
    RecordRevision, UploadReceipt, UploadRequest,
};
pub use classify::{FailureSignal, classify_failure};
pub use event::{AnalysisFailure, RecordChange, RecordCreated, StreamEvent};
pub use health::{ConnectionStatus, HealthMonitor};
pub use mutation::{
    BulkFailure, BulkSummary, CalendarCredentials, MutationCoordinator, StaticCredential,
};
pub use notice::{LogNotices, Notice, NoticeSink};
pub use reconnect::{ReconnectDecision, ReconnectPolicy, StreamState};
pub use session::{SessionParts, SyncSession};
pub use snapshot::{SnapshotLoader, records_from_wire};
pub use sse::{SseDecoder, SseFrame};
pub use store::{PrependOutcome, RecordStore, SharedStore, StoreChanges, UpsertOutcome};
pub use stream::{HttpStreamTransport, StreamConnection, StreamHandle, StreamTransport};
