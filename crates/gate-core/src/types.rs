use chrono::{DateTime, NaiveDateTime, Utc};
use clap::ValueEnum;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

const LOCAL_ID_PREFIX: &str = "local-";

/// Opaque record identifier.
///
/// Server ids arrive as JSON integers or strings; both normalize to the same
/// string form so `1` and `"1"` address the same record. Optimistic
/// placeholders use a `local-<ULID>` id that never collides with a server id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh provisional id for a record the server has not confirmed yet.
    pub fn local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", ulid::Ulid::new()))
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        let id = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text.trim().to_string(),
            Raw::Signed(n) => n.to_string(),
            Raw::Unsigned(n) => n.to_string(),
        };
        if id.is_empty() {
            return Err(D::Error::custom("record id must not be empty"));
        }
        Ok(Self(id))
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Classification progress of a record, driven by the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStatus {
    Pending,
    Analyzed,
    Completed,
    AnalysisFailed,
}

impl LifecycleStatus {
    /// Parse a backend status string. `CANCELED` and unknown values yield `None`.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "ANALYZED" => Some(Self::Analyzed),
            "COMPLETED" => Some(Self::Completed),
            "ANALYSIS_FAILED" | "FAILED" => Some(Self::AnalysisFailed),
            _ => None,
        }
    }

    /// `Completed` and `AnalysisFailed` end the lifecycle; only deletion follows.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::AnalysisFailed)
    }

    /// Status after observing `next`, keeping the lifecycle monotonic.
    ///
    /// Terminal states never change, `AnalysisFailed` is reachable from any
    /// non-terminal state, and a stale backwards status is ignored.
    pub fn advance(self, next: Self) -> Self {
        if self.is_terminal() {
            return self;
        }
        match next {
            Self::AnalysisFailed => next,
            _ if next.rank() > self.rank() => next,
            _ => self,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Analyzed => 1,
            Self::Completed | Self::AnalysisFailed => 2,
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Analyzed => write!(f, "analyzed"),
            Self::Completed => write!(f, "completed"),
            Self::AnalysisFailed => write!(f, "analysis-failed"),
        }
    }
}

/// Target integration of a classified record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum RecordKind {
    Calendar,
    Memo,
}

impl RecordKind {
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CALENDAR" => Some(Self::Calendar),
            "MEMO" => Some(Self::Memo),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calendar => write!(f, "calendar"),
            Self::Memo => write!(f, "memo"),
        }
    }
}

/// Where the current field values of a record came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// Synthesized locally right after submit; fields are provisional.
    LocalPending,
    /// Seen in a snapshot or a stream event.
    ServerConfirmed,
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Parse a backend timestamp.
///
/// Accepts RFC 3339 (with `Z` or an offset) and offset-less ISO datetimes,
/// which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
