//! User-initiated changes: create, upload, delete, revise.
//!
//! Create is optimistic (a placeholder appears before the server answers).
//! Upload and delete are pessimistic: the record leaves the store only after
//! the server confirms, and a failed upload leaves an inline annotation.

use std::sync::Arc;

use chrono::Utc;
use gate_config::{CalendarCredential, CredentialStore};
use gate_core::{
    FailureKind, LifecycleStatus, PreconditionError, Record, RecordId, RecordKind, RecordPatch,
    RequestFailure, SyncError, SyncResult, UploadFailure,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::{NewInput, RecordBackend, RecordRevision, UploadReceipt, UploadRequest};
use crate::store::SharedStore;

/// Source of the Google credential required by calendar uploads.
pub trait CalendarCredentials: Send + Sync {
    fn calendar_credential(&self) -> Option<CalendarCredential>;
}

impl CalendarCredentials for CredentialStore {
    fn calendar_credential(&self) -> Option<CalendarCredential> {
        match self.load() {
            Ok(credential) => credential,
            Err(err) => {
                warn!(path = %self.path().display(), "unreadable credentials: {err:#}");
                None
            }
        }
    }
}

/// Fixed credential, e.g. a token passed on the command line.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(pub Option<CalendarCredential>);

impl CalendarCredentials for StaticCredential {
    fn calendar_credential(&self) -> Option<CalendarCredential> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
    pub id: RecordId,
    pub kind: Option<FailureKind>,
    pub message: String,
}

/// Outcome of a bulk upload or delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkSummary {
    pub succeeded: Vec<RecordId>,
    pub failed: Vec<BulkFailure>,
}

impl BulkSummary {
    fn record(&mut self, id: &RecordId, result: SyncResult<()>) {
        match result {
            Ok(()) => self.succeeded.push(id.clone()),
            Err(err) => self.failed.push(BulkFailure {
                id: id.clone(),
                kind: err.failure_kind(),
                message: err.to_string(),
            }),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary, e.g. `3 uploaded, 1 failed`.
    pub fn message(&self, verb: &str) -> String {
        if self.failed.is_empty() {
            format!("{} {verb}", self.succeeded.len())
        } else {
            format!("{} {verb}, {} failed", self.succeeded.len(), self.failed.len())
        }
    }
}

pub struct MutationCoordinator {
    backend: Arc<dyn RecordBackend>,
    store: SharedStore,
    credentials: Arc<dyn CalendarCredentials>,
    user_id: String,
}

impl MutationCoordinator {
    pub fn new(
        backend: Arc<dyn RecordBackend>,
        store: SharedStore,
        credentials: Arc<dyn CalendarCredentials>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            credentials,
            user_id: user_id.into(),
        }
    }

    /// Submit new input. A placeholder is shown immediately; on success it is
    /// re-keyed to the server id, on failure it is removed.
    pub async fn create(&self, input: NewInput) -> SyncResult<RecordId> {
        if input.is_empty() {
            return Err(PreconditionError::EmptyInput.into());
        }
        let placeholder = Record::local_placeholder(
            input.text.clone(),
            input.image.as_ref().map(|image| image.file_name.clone()),
        );
        let local_id = placeholder.id.clone();
        self.store.update(|store| store.prepend(placeholder));

        let row = match self.backend.submit_input(&self.user_id, &input).await {
            Ok(row) => row,
            Err(failure) => {
                self.store.update(|store| store.remove(&local_id));
                warn!(%failure, "create failed");
                return Err(failure.into());
            }
        };
        let Some(record) = row.into_record() else {
            self.store.update(|store| store.remove(&local_id));
            return Err(SyncError::Request(RequestFailure::new(
                FailureKind::Unknown,
                None,
                "server returned an inactive record",
            )));
        };

        let id = record.id.clone();
        self.store
            .update(|store| store.confirm_placeholder(&local_id, record));
        info!(%id, "record created");
        Ok(id)
    }

    /// Upload an analyzed record to its destination.
    ///
    /// The record is removed only after the server confirms. Precondition
    /// failures never reach the network.
    pub async fn upload(
        &self,
        id: &RecordId,
        final_data: Option<Map<String, Value>>,
    ) -> SyncResult<UploadReceipt> {
        let record = self
            .store
            .get(id)
            .ok_or_else(|| PreconditionError::UnknownRecord(id.clone()))?;
        if record.status != LifecycleStatus::Analyzed {
            return Err(PreconditionError::NotAnalyzed {
                id: id.clone(),
                status: record.status,
            }
            .into());
        }

        self.store.update(|store| store.clear_upload_failed(id));

        let destination = final_data
            .as_ref()
            .and_then(|data| data.get("type"))
            .and_then(Value::as_str)
            .and_then(RecordKind::from_wire)
            .or(record.kind);
        let calendar_token = if destination == Some(RecordKind::Calendar) {
            match self.calendar_token() {
                Ok(token) => Some(token),
                Err(precondition) => {
                    let kind = precondition.failure_kind().unwrap_or(FailureKind::Unknown);
                    self.mark_failed(id, kind);
                    return Err(precondition.into());
                }
            }
        } else {
            None
        };

        let request = UploadRequest { final_data };
        match self
            .backend
            .upload_record(id, &request, calendar_token.as_deref())
            .await
        {
            Ok(receipt) => {
                self.store.update(|store| store.remove(id));
                info!(%id, destination = ?receipt.destination, "record uploaded");
                Ok(receipt)
            }
            Err(failure) => {
                warn!(%id, %failure, "upload failed");
                self.mark_failed(id, failure.kind);
                Err(failure.into())
            }
        }
    }

    /// Upload each id in order; one failure does not stop the rest.
    pub async fn upload_many(&self, ids: &[RecordId]) -> BulkSummary {
        let mut summary = BulkSummary::default();
        for id in ids {
            let result = self.upload(id, None).await.map(|_| ());
            summary.record(id, result);
        }
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "bulk upload finished"
        );
        summary
    }

    /// Delete on the server, then locally. A failure leaves the store as is.
    pub async fn delete(&self, id: &RecordId) -> SyncResult<()> {
        if let Err(failure) = self.backend.delete_record(id).await {
            warn!(%id, %failure, "delete failed");
            return Err(failure.into());
        }
        self.store.update(|store| store.remove(id));
        info!(%id, "record deleted");
        Ok(())
    }

    pub async fn delete_many(&self, ids: &[RecordId]) -> BulkSummary {
        let mut summary = BulkSummary::default();
        for id in ids {
            let result = self.delete(id).await;
            summary.record(id, result);
        }
        summary
    }

    /// Edit the input text or analysis fields of a record.
    pub async fn revise(&self, id: &RecordId, revision: RecordRevision) -> SyncResult<bool> {
        if revision.is_empty() {
            return Ok(false);
        }
        let Some(row) = self.backend.revise_record(id, &revision).await? else {
            debug!(%id, "revision made no changes");
            return Ok(false);
        };
        let Some(updated) = row.into_record() else {
            return Ok(true);
        };
        let patch = RecordPatch {
            status: Some(updated.status),
            payload: Some(updated.payload),
            input_text: updated.input_text,
            attachment_ref: None,
        };
        self.store.update(|store| store.upsert(id, patch));
        Ok(true)
    }

    fn calendar_token(&self) -> Result<String, PreconditionError> {
        match self.credentials.calendar_credential() {
            None => Err(PreconditionError::CredentialMissing),
            Some(credential) if credential.is_blank() => Err(PreconditionError::CredentialMissing),
            Some(credential) if credential.is_expired_at(Utc::now()) => {
                Err(PreconditionError::CredentialExpired)
            }
            Some(credential) => Ok(credential.token),
        }
    }

    fn mark_failed(&self, id: &RecordId, kind: FailureKind) {
        let failure = UploadFailure::new(kind, kind.user_message());
        self.store
            .update(|store| store.mark_upload_failed(id, failure));
    }
}
