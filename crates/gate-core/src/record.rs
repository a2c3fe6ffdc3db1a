use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FailureKind;
use crate::types::{LifecycleStatus, Provenance, RecordId, RecordKind};

const IMAGE_PLACEHOLDER: &str = "(image)";
const EMPTY_PLACEHOLDER: &str = "(empty)";

/// Store-local annotation left by a failed upload attempt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl UploadFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Client-side view of one captured item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub status: LifecycleStatus,
    pub kind: Option<RecordKind>,
    /// Best available summary: AI summary, then raw input, then a placeholder.
    pub display_text: String,
    pub input_text: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Classification result; merged key by key, never replaced wholesale.
    pub payload: Map<String, Value>,
    pub attachment_ref: Option<String>,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_failure: Option<UploadFailure>,
}

impl Record {
    /// Server-known record that has not been classified yet.
    pub fn pending(
        id: RecordId,
        input_text: Option<String>,
        attachment_ref: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut record = Self {
            id,
            status: LifecycleStatus::Pending,
            kind: None,
            display_text: String::new(),
            input_text: non_empty(input_text),
            category: None,
            created_at,
            payload: Map::new(),
            attachment_ref: non_empty(attachment_ref),
            provenance: Provenance::ServerConfirmed,
            upload_failure: None,
        };
        record.refresh_derived();
        record
    }

    /// Optimistic placeholder shown between submit and server confirmation.
    pub fn local_placeholder(input_text: Option<String>, attachment_ref: Option<String>) -> Self {
        let mut record = Self::pending(RecordId::local(), input_text, attachment_ref, Utc::now());
        record.provenance = Provenance::LocalPending;
        record
    }

    pub fn with_status(mut self, status: LifecycleStatus) -> Self {
        self.status = status;
        self.refresh_derived();
        self
    }

    pub fn with_kind(mut self, kind: Option<RecordKind>) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = non_empty(category);
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self.refresh_derived();
        self
    }

    pub fn upload_failed(&self) -> bool {
        self.upload_failure.is_some()
    }

    pub fn fail_reason(&self) -> Option<&str> {
        self.upload_failure
            .as_ref()
            .map(|failure| failure.message.as_str())
    }

    pub fn is_local(&self) -> bool {
        self.provenance == Provenance::LocalPending
    }

    /// AI summary, if the classification produced a non-empty one.
    pub fn summary(&self) -> Option<&str> {
        self.payload
            .get("summary")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|summary| !summary.is_empty())
    }

    /// Merge `patch` into this record.
    ///
    /// Top-level fields are replaced when present; `payload` merges key by
    /// key so a status-only patch keeps every known payload field. Status
    /// only moves forward (see [`LifecycleStatus::advance`]).
    pub fn merge(&mut self, patch: RecordPatch) {
        if let Some(status) = patch.status {
            self.status = self.status.advance(status);
        }
        if let Some(payload) = patch.payload {
            self.payload.extend(payload);
        }
        if let Some(input_text) = non_empty(patch.input_text) {
            self.input_text = Some(input_text);
        }
        if let Some(attachment_ref) = non_empty(patch.attachment_ref) {
            self.attachment_ref = Some(attachment_ref);
        }
        self.refresh_derived();
    }

    /// Recompute `display_text`, `kind` and `category` from the current fields.
    pub fn refresh_derived(&mut self) {
        if let Some(kind) = self
            .payload
            .get("type")
            .and_then(Value::as_str)
            .and_then(RecordKind::from_wire)
        {
            self.kind = Some(kind);
        }
        if let Some(category) = self
            .payload
            .get("category")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|category| !category.is_empty())
        {
            self.category = Some(category.to_string());
        }
        self.display_text = self.derive_display_text();
    }

    pub fn created_at_display(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    }

    fn derive_display_text(&self) -> String {
        let summary = match self.status {
            LifecycleStatus::AnalysisFailed => None,
            _ => self.summary(),
        };
        let input = self
            .input_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty());

        match summary.or(input) {
            Some(text) => text.to_string(),
            None if self.attachment_ref.is_some() => IMAGE_PLACEHOLDER.to_string(),
            None => EMPTY_PLACEHOLDER.to_string(),
        }
    }
}

/// Partial update carried by a stream event or a confirmed mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordPatch {
    pub status: Option<LifecycleStatus>,
    pub payload: Option<Map<String, Value>>,
    pub input_text: Option<String>,
    pub attachment_ref: Option<String>,
}

impl RecordPatch {
    pub fn status(status: LifecycleStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
