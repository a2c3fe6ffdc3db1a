//! JSON shapes exchanged with the records API.

use chrono::Utc;
use gate_core::{LifecycleStatus, Record, RecordId, RecordKind, parse_timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// A row of the `records` table as returned by list, create and revise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRecord {
    pub id: RecordId,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub record_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Classification result (`summary`, `type`, `analysis_failed`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<WireCategory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCategory {
    #[serde(default)]
    pub name: Option<String>,
}

impl WireRecord {
    /// Convert to the client model. Canceled and unknown-status rows yield
    /// `None`.
    ///
    /// A failed classification is stored server-side as `PENDING` with
    /// `result.analysis_failed = true`; it maps to `AnalysisFailed`.
    pub fn into_record(self) -> Option<Record> {
        let status = match self.status.as_deref() {
            None => LifecycleStatus::Pending,
            Some(raw) => match LifecycleStatus::from_wire(raw) {
                Some(status) => status,
                None => {
                    debug!(id = %self.id, status = raw, "skipping record with inactive status");
                    return None;
                }
            },
        };
        let payload = match self.result {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let analysis_failed = payload
            .get("analysis_failed")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let status = if analysis_failed && status == LifecycleStatus::Pending {
            LifecycleStatus::AnalysisFailed
        } else {
            status
        };
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);

        let record = Record::pending(self.id, self.text, self.image_url, created_at)
            .with_kind(self.record_type.as_deref().and_then(RecordKind::from_wire))
            .with_category(self.category.and_then(|category| category.name))
            .with_payload(payload)
            .with_status(status);
        Some(record)
    }
}

/// `{status, data, message}` wrapper used by most endpoints.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    /// Business-level failure reported with a 2xx status.
    pub fn is_error(&self) -> bool {
        self.status
            .as_deref()
            .is_some_and(|status| status.eq_ignore_ascii_case("error"))
    }

    pub fn message_or(&self, fallback: &str) -> String {
        self.message
            .clone()
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Human-readable error text from a failed response body.
///
/// Prefers FastAPI's `detail`, then `message`, then the raw body.
pub fn error_text(body: &str) -> String {
    const MAX_RAW: usize = 200;

    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => return text.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.chars().count() > MAX_RAW {
        let cut: String = trimmed.chars().take(MAX_RAW).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}
