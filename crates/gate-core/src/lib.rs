//! Record model and error taxonomy shared by the sync engine and the `gate` CLI.

pub mod error;
pub mod record;
pub mod types;

pub use error::{FailureKind, PreconditionError, RequestFailure, SyncError, SyncResult};
pub use record::{Record, RecordPatch, UploadFailure};
pub use types::{LifecycleStatus, OutputFormat, Provenance, RecordId, RecordKind, parse_timestamp};
