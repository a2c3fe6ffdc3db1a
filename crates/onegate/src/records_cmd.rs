use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use gate_core::{OutputFormat, RecordId, RecordKind, SyncError};
use gate_sync::{ImageAttachment, NewInput, RecordRevision};
use serde_json::{Map, Value};

use crate::render::{failure_text, print_records, print_summary};
use crate::session_setup::{load_config, open_session};

pub(crate) async fn handle_list(kind: Option<RecordKind>, format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let session = open_session(&config).await?;
    print_records(&session.store().list(kind), &format)
}

pub(crate) async fn handle_submit(
    text: Option<String>,
    image: Option<&Path>,
    format: OutputFormat,
) -> Result<()> {
    let text = match (text, image) {
        (Some(text), _) => Some(text),
        (None, Some(_)) => None,
        (None, None) => Some(read_stdin()?),
    };
    let mut input = NewInput { text, image: None };
    if let Some(path) = image {
        input = input.with_image(load_image(path)?);
    }

    let config = load_config()?;
    let session = open_session(&config).await?;
    let id = session
        .coordinator()
        .create(input)
        .await
        .map_err(user_error)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "id": id })),
        OutputFormat::Text => println!("Submitted record {id}; analysis runs in the background."),
    }
    Ok(())
}

pub(crate) async fn handle_upload(
    ids: Vec<String>,
    final_data: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let ids = parse_ids(ids);
    let final_data = final_data
        .as_deref()
        .map(|raw| parse_object(raw, "--final-data"))
        .transpose()?;
    if final_data.is_some() && ids.len() != 1 {
        bail!("--final-data applies to a single record");
    }

    let config = load_config()?;
    let session = open_session(&config).await?;
    let coordinator = session.coordinator();

    if let Some(final_data) = final_data {
        let id = &ids[0];
        let receipt = coordinator
            .upload(id, Some(final_data))
            .await
            .map_err(user_error)?;
        match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&receipt)?),
            OutputFormat::Text => match receipt.link {
                Some(link) => println!("Uploaded {id}: {link}"),
                None => println!("Uploaded {id}"),
            },
        }
        return Ok(());
    }

    let summary = coordinator.upload_many(&ids).await;
    print_summary(&summary, "uploaded", &format)?;
    if !summary.is_clean() {
        bail!("{} of {} uploads failed", summary.failed.len(), ids.len());
    }
    Ok(())
}

pub(crate) async fn handle_delete(ids: Vec<String>, format: OutputFormat) -> Result<()> {
    let ids = parse_ids(ids);
    let config = load_config()?;
    let session = open_session(&config).await?;
    let summary = session.coordinator().delete_many(&ids).await;
    print_summary(&summary, "deleted", &format)?;
    if !summary.is_clean() {
        bail!("{} of {} deletions failed", summary.failed.len(), ids.len());
    }
    Ok(())
}

pub(crate) async fn handle_revise(
    id: String,
    text: Option<String>,
    analysis: Option<String>,
) -> Result<()> {
    let revision = RecordRevision {
        text,
        analysis_data: analysis
            .as_deref()
            .map(|raw| parse_object(raw, "--analysis"))
            .transpose()?,
    };
    if revision.is_empty() {
        bail!("Nothing to change: pass --text and/or --analysis");
    }

    let config = load_config()?;
    let session = open_session(&config).await?;
    let id = RecordId::from(id.trim());
    let changed = session
        .coordinator()
        .revise(&id, revision)
        .await
        .map_err(user_error)?;
    if changed {
        println!("Updated {id}");
    } else {
        println!("No changes to {id}");
    }
    Ok(())
}

/// Error for display: the classified message when there is one.
fn user_error(err: SyncError) -> anyhow::Error {
    anyhow::anyhow!(failure_text(err.failure_kind(), &err.to_string()))
}

fn parse_ids(ids: Vec<String>) -> Vec<RecordId> {
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty())
        .map(RecordId::from)
        .collect()
}

fn parse_object(raw: &str, flag: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).with_context(|| format!("{flag} is not valid JSON"))? {
        Value::Object(map) => Ok(map),
        _ => bail!("{flag} must be a JSON object"),
    }
}

fn read_stdin() -> Result<String> {
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read input from stdin")?;
    Ok(text)
}

fn load_image(path: &Path) -> Result<ImageAttachment> {
    let mime_type = match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => bail!("Unsupported image type: {}", path.display()),
    };
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(ImageAttachment {
        file_name,
        mime_type: mime_type.to_string(),
        bytes,
    })
}
