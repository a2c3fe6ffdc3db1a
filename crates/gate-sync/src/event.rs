use chrono::Utc;
use gate_core::{
    LifecycleStatus, Record, RecordId, RecordKind, RecordPatch, SyncError, SyncResult,
    parse_timestamp,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::sse::SseFrame;

/// Typed server-push event. Unknown event names are a parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// First frame after the stream is established.
    Connected,
    /// Keepalive.
    Ping,
    RecordCreated(RecordCreated),
    AnalysisCompleted(RecordChange),
    RecordUpdated(RecordChange),
    AnalysisFailed(AnalysisFailure),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordCreated {
    pub record_id: RecordId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub record_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl RecordCreated {
    pub fn into_record(self) -> Record {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or_else(Utc::now);
        let status = self
            .status
            .as_deref()
            .and_then(LifecycleStatus::from_wire)
            .unwrap_or(LifecycleStatus::Pending);
        Record::pending(self.record_id, self.text, self.image_url, created_at)
            .with_kind(self.record_type.as_deref().and_then(RecordKind::from_wire))
            .with_status(status)
    }
}

/// Body shared by `analysis_completed` and `record_updated`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecordChange {
    pub record_id: RecordId,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub analysis_data: Option<Map<String, Value>>,
    /// Destination details after a completed upload.
    #[serde(default)]
    pub upload_result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RecordChange {
    pub fn status(&self) -> Option<LifecycleStatus> {
        self.status.as_deref().and_then(LifecycleStatus::from_wire)
    }

    pub fn into_patch(self) -> RecordPatch {
        let mut patch = RecordPatch {
            status: self.status(),
            payload: self.analysis_data,
            ..RecordPatch::default()
        };
        if let Some(error) = self.error {
            patch
                .payload
                .get_or_insert_with(Map::new)
                .insert("error".to_string(), Value::String(error));
        }
        patch
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnalysisFailure {
    pub record_id: RecordId,
    #[serde(default)]
    pub error: Option<String>,
}

impl AnalysisFailure {
    /// Mirrors how the server persists the failure in `result`.
    pub fn into_patch(self) -> RecordPatch {
        let mut payload = Map::new();
        payload.insert("analysis_failed".to_string(), Value::Bool(true));
        if let Some(error) = self.error {
            payload.insert("error".to_string(), Value::String(error));
        }
        RecordPatch::status(LifecycleStatus::AnalysisFailed).with_payload(payload)
    }
}

impl StreamEvent {
    pub fn parse(frame: &SseFrame) -> SyncResult<Self> {
        match frame.event.as_str() {
            "connected" => Ok(Self::Connected),
            "ping" => Ok(Self::Ping),
            "record_created" => decode(frame).map(Self::RecordCreated),
            "analysis_completed" => decode(frame).map(Self::AnalysisCompleted),
            "record_updated" => decode(frame).map(Self::RecordUpdated),
            "analysis_failed" => decode(frame).map(Self::AnalysisFailed),
            other => Err(SyncError::Parse {
                event: other.to_string(),
                reason: "unknown event type".to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Ping => "ping",
            Self::RecordCreated(_) => "record_created",
            Self::AnalysisCompleted(_) => "analysis_completed",
            Self::RecordUpdated(_) => "record_updated",
            Self::AnalysisFailed(_) => "analysis_failed",
        }
    }
}

fn decode<T: DeserializeOwned>(frame: &SseFrame) -> SyncResult<T> {
    serde_json::from_str(&frame.data).map_err(|err| SyncError::Parse {
        event: frame.event.clone(),
        reason: err.to_string(),
    })
}
