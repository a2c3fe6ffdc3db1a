//! Text and JSON rendering of records and bulk results.

use anyhow::Result;
use gate_core::{OutputFormat, Record};
use gate_sync::BulkSummary;

const TEXT_WIDTH: usize = 48;

pub(crate) fn print_records(records: &[Record], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(records)?),
        OutputFormat::Text => {
            if records.is_empty() {
                println!("No records.");
                return Ok(());
            }
            for record in records {
                println!("{}", record_line(record));
            }
        }
    }
    Ok(())
}

pub(crate) fn record_line(record: &Record) -> String {
    let kind = record
        .kind
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "-".to_string());
    let mut line = format!(
        "{:<10} {:<16} {:<8} {:<15} {}",
        truncate(record.id.as_str(), 10),
        record.created_at_display(),
        kind,
        record.status.to_string(),
        truncate(&record.display_text, TEXT_WIDTH),
    );
    if let Some(category) = &record.category {
        line.push_str(&format!(" [{category}]"));
    }
    if record.is_local() {
        line.push_str(" (syncing)");
    }
    if let Some(reason) = record.fail_reason() {
        line.push_str(&format!("\n{:>12} upload failed: {reason}", ""));
    }
    line
}

pub(crate) fn print_summary(
    summary: &BulkSummary,
    verb: &str,
    format: &OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(summary)?),
        OutputFormat::Text => {
            for failure in &summary.failed {
                eprintln!("{}: {}", failure.id, failure_text(failure.kind, &failure.message));
            }
            println!("{}", summary.message(verb));
        }
    }
    Ok(())
}

/// Classified failures show the user-facing message; others their own text.
pub(crate) fn failure_text(kind: Option<gate_core::FailureKind>, message: &str) -> String {
    match kind {
        Some(kind) => kind.user_message().to_string(),
        None => message.to_string(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let cut: String = single_line.chars().take(max.saturating_sub(1)).collect();
    format!("{cut}…")
}
