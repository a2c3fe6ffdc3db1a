use serde::{Deserialize, Serialize};

use crate::types::{LifecycleStatus, RecordId};

/// User-facing classification of a failed backend call.
///
/// Derived from transport signals (no response, HTTP status range,
/// integration error text). Every kind is retryable by re-invoking the
/// operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    NetworkUnreachable,
    Timeout,
    ServerError,
    CredentialMissing,
    CredentialExpired,
    PermissionDenied,
    IntegrationNotConnected,
    Unknown,
}

impl FailureKind {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkUnreachable => "Cannot reach the server. Check your network connection.",
            Self::Timeout => "The server took too long to respond.",
            Self::ServerError => "The server failed to process the request.",
            Self::CredentialMissing => {
                "Connect your Google account before uploading calendar items."
            }
            Self::CredentialExpired => "Your Google sign-in has expired. Sign in again.",
            Self::PermissionDenied => "The integration refused access to this resource.",
            Self::IntegrationNotConnected => "Connect Notion in settings before uploading memos.",
            Self::Unknown => "The request failed for an unknown reason.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NetworkUnreachable => "network-unreachable",
            Self::Timeout => "timeout",
            Self::ServerError => "server-error",
            Self::CredentialMissing => "credential-missing",
            Self::CredentialExpired => "credential-expired",
            Self::PermissionDenied => "permission-denied",
            Self::IntegrationNotConnected => "integration-not-connected",
            Self::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// A classified backend call failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    /// HTTP status, absent when no response arrived.
    pub status: Option<u16>,
    pub message: String,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {status}): {}", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Rejections raised before any network call is made.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("Record '{id}' is {status}; only analyzed records can be uploaded")]
    NotAnalyzed { id: RecordId, status: LifecycleStatus },

    #[error("Calendar upload requires a Google credential")]
    CredentialMissing,

    #[error("Stored Google credential has expired")]
    CredentialExpired,

    #[error("No record '{0}' in the current session")]
    UnknownRecord(RecordId),

    #[error("Input needs text or an image")]
    EmptyInput,
}

impl PreconditionError {
    /// Failure classification shown inline when the rejection concerns a credential.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::CredentialMissing => Some(FailureKind::CredentialMissing),
            Self::CredentialExpired => Some(FailureKind::CredentialExpired),
            _ => None,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("Event stream transport error: {0}")]
    Transport(String),

    #[error("Request failed: {0}")]
    Request(RequestFailure),

    #[error("Malformed '{event}' event: {reason}")]
    Parse { event: String, reason: String },

    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),
}

impl SyncError {
    /// Failure classification for inline display, when one applies.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Request(failure) => Some(failure.kind),
            Self::Precondition(precondition) => precondition.failure_kind(),
            Self::Transport(_) | Self::Parse { .. } => None,
        }
    }
}

impl From<RequestFailure> for SyncError {
    fn from(failure: RequestFailure) -> Self {
        Self::Request(failure)
    }
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;
