//! `gate token`: the Google Calendar credential used by calendar uploads.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use gate_config::{CalendarCredential, CredentialStore};
use gate_core::OutputFormat;

pub(crate) fn handle_token_set(
    token: String,
    expires_in: Option<i64>,
    expires_at: Option<String>,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Token must not be empty");
    }
    let expires_at = resolve_expiry(expires_in, expires_at.as_deref(), Utc::now())?;

    let store = CredentialStore::default_location()?;
    store.save(&CalendarCredential::new(token, expires_at))?;
    match expires_at {
        Some(at) => eprintln!("Saved calendar token (expires {})", at.to_rfc3339()),
        None => eprintln!("Saved calendar token (no expiry)"),
    }
    Ok(())
}

pub(crate) fn handle_token_clear() -> Result<()> {
    let store = CredentialStore::default_location()?;
    if store.clear()? {
        eprintln!("Removed calendar token");
    } else {
        eprintln!("No calendar token stored");
    }
    Ok(())
}

pub(crate) fn handle_token_show(format: OutputFormat) -> Result<()> {
    let store = CredentialStore::default_location()?;
    let credential = store.load()?;
    let now = Utc::now();

    match format {
        OutputFormat::Json => {
            let value = match &credential {
                Some(credential) => serde_json::json!({
                    "token": credential.redacted_token(),
                    "expires_at": credential.expires_at,
                    "expired": credential.is_expired_at(now),
                }),
                None => serde_json::Value::Null,
            };
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Text => match credential {
            Some(credential) => {
                println!("token:   {}", credential.redacted_token());
                println!("expires: {}", expiry_text(&credential, now));
            }
            None => println!("No calendar token stored. Run `gate token set <TOKEN>`."),
        },
    }
    Ok(())
}

fn resolve_expiry(
    expires_in: Option<i64>,
    expires_at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Option<DateTime<Utc>>> {
    if let Some(minutes) = expires_in {
        if minutes <= 0 {
            bail!("--expires-in must be a positive number of minutes");
        }
        let at = TimeDelta::try_minutes(minutes)
            .and_then(|lifetime| now.checked_add_signed(lifetime));
        let Some(at) = at else {
            bail!("--expires-in {minutes}: expiry out of range");
        };
        return Ok(Some(at));
    }
    expires_at
        .map(|raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|at| at.with_timezone(&Utc))
                .with_context(|| format!("--expires-at is not an RFC 3339 timestamp: {raw}"))
        })
        .transpose()
}

fn expiry_text(credential: &CalendarCredential, now: DateTime<Utc>) -> String {
    match credential.expires_at {
        None => "never".to_string(),
        Some(at) if credential.is_expired_at(now) => format!("{} (expired)", at.to_rfc3339()),
        Some(at) => at.to_rfc3339(),
    }
}
