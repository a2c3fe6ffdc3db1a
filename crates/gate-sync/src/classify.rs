//! Map transport and integration errors onto [`FailureKind`].
//!
//! Integration errors (Google Calendar, Notion) surface as free text inside
//! a 400/500 body, so the message is inspected before the status range.

use gate_core::FailureKind;

/// What went wrong, as observed by the HTTP client.
#[derive(Debug, Clone, Copy)]
pub enum FailureSignal<'a> {
    /// No response arrived.
    NoResponse { timed_out: bool },
    /// A non-2xx response.
    Http { status: u16, body: &'a str },
    /// A 2xx response whose envelope reported `status: "error"`.
    Rejected { message: &'a str },
}

pub fn classify_failure(signal: FailureSignal<'_>) -> FailureKind {
    match signal {
        FailureSignal::NoResponse { timed_out: true } => FailureKind::Timeout,
        FailureSignal::NoResponse { timed_out: false } => FailureKind::NetworkUnreachable,
        FailureSignal::Http { status, body } => {
            classify_text(body).unwrap_or_else(|| classify_status(status))
        }
        FailureSignal::Rejected { message } => {
            classify_text(message).unwrap_or(FailureKind::Unknown)
        }
    }
}

fn classify_status(status: u16) -> FailureKind {
    match status {
        401 => FailureKind::CredentialExpired,
        403 => FailureKind::PermissionDenied,
        408 | 504 => FailureKind::Timeout,
        500..=599 => FailureKind::ServerError,
        _ => FailureKind::Unknown,
    }
}

fn classify_text(text: &str) -> Option<FailureKind> {
    let text = text.to_lowercase();
    let has = |needle: &str| text.contains(needle);

    if has("token required") || has("credential missing") || has("no google token") {
        return Some(FailureKind::CredentialMissing);
    }
    if has("invalid_grant")
        || has("token has been expired")
        || has("token expired")
        || has("invalid credentials")
        || has("unauthenticated")
    {
        return Some(FailureKind::CredentialExpired);
    }
    if has("notion") && (has("not connected") || has("연결되지")) {
        return Some(FailureKind::IntegrationNotConnected);
    }
    if has("설정되지 않았습니다") || has("database is not configured") {
        return Some(FailureKind::IntegrationNotConnected);
    }
    if has("insufficient permission") || has("permission denied") || has("forbidden") {
        return Some(FailureKind::PermissionDenied);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16, body: &str) -> FailureKind {
        classify_failure(FailureSignal::Http { status, body })
    }

    #[test]
    fn test_no_response() {
        assert_eq!(
            classify_failure(FailureSignal::NoResponse { timed_out: true }),
            FailureKind::Timeout
        );
        assert_eq!(
            classify_failure(FailureSignal::NoResponse { timed_out: false }),
            FailureKind::NetworkUnreachable
        );
    }

    #[test]
    fn test_status_ranges() {
        assert_eq!(http(500, ""), FailureKind::ServerError);
        assert_eq!(http(503, "upstream down"), FailureKind::ServerError);
        assert_eq!(http(504, ""), FailureKind::Timeout);
        assert_eq!(http(401, ""), FailureKind::CredentialExpired);
        assert_eq!(http(403, ""), FailureKind::PermissionDenied);
        assert_eq!(http(404, r#"{"detail": "Record not found"}"#), FailureKind::Unknown);
    }

    #[test]
    fn test_integration_text_wins_over_status() {
        assert_eq!(
            http(400, r#"{"detail": "Google token required"}"#),
            FailureKind::CredentialMissing
        );
        assert_eq!(
            http(500, r#"{"detail": "('invalid_grant: Token has been expired or revoked.')"}"#),
            FailureKind::CredentialExpired
        );
        assert_eq!(
            http(400, r#"{"detail": "Notion이 연결되지 않았습니다"}"#),
            FailureKind::IntegrationNotConnected
        );
        assert_eq!(
            http(500, r#"{"detail": "Request had insufficient permission scopes"}"#),
            FailureKind::PermissionDenied
        );
    }

    #[test]
    fn test_rejected_envelope() {
        assert_eq!(
            classify_failure(FailureSignal::Rejected { message: "Record not found" }),
            FailureKind::Unknown
        );
        assert_eq!(
            classify_failure(FailureSignal::Rejected {
                message: "Notion is not connected"
            }),
            FailureKind::IntegrationNotConnected
        );
    }
}
