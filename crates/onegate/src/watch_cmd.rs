//! `gate watch`: follow the record list live.
//!
//! Reprints the list whenever it changes and reports connection status on
//! stderr. Reads commands from stdin: `r` reconnects, `l` reloads the
//! snapshot, `q` quits.

use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use gate_core::OutputFormat;
use gate_sync::{Notice, NoticeSink, StreamState, SyncSession};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::render::print_records;
use crate::session_setup::{load_config, parts};

/// Prints notices to stderr, persistent ones with a reconnect hint.
struct TerminalNotices;

impl NoticeSink for TerminalNotices {
    fn notify(&self, notice: Notice) {
        if notice.is_persistent() {
            eprintln!("!! {} (type `r` + Enter)", notice.message());
        } else {
            eprintln!("-- {}", notice.message());
        }
    }
}

enum Input {
    Reconnect,
    Reload,
    Quit,
    Unknown(String),
}

impl Input {
    fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "" => None,
            "r" | "reconnect" => Some(Self::Reconnect),
            "l" | "reload" => Some(Self::Reload),
            "q" | "quit" | "exit" => Some(Self::Quit),
            other => Some(Self::Unknown(other.to_string())),
        }
    }
}

pub(crate) async fn handle_watch(format: OutputFormat) -> Result<()> {
    let config = load_config()?;
    let user_id = config.require_user_id()?.to_string();
    let mut session = SyncSession::start(
        user_id,
        &config.stream,
        parts(&config, Arc::new(TerminalNotices)),
    )
    .await;
    let mut health = session.health();
    let mut changes = session.store().changes();

    redraw(&session, &format)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut health_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            state = health.changed(), if health_open => match state {
                Some(state) => report_state(state),
                None => health_open = false,
            },
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match Input::parse(&line) {
                    Some(Input::Quit) => break,
                    Some(Input::Reconnect) => session.restart_stream().await,
                    Some(Input::Reload) => {
                        let count = session.refresh().await;
                        eprintln!("-- reloaded {count} records");
                    }
                    Some(Input::Unknown(other)) => {
                        eprintln!(
                            "-- unknown command '{other}' (r: reconnect, l: reload, q: quit)"
                        );
                    }
                    None => {}
                },
                Ok(None) => stdin_open = false,
                Err(err) => {
                    debug!("stdin closed: {err}");
                    stdin_open = false;
                }
            },
            Some(_) = changes.changed() => redraw(&session, &format)?,
        }
    }

    let last = session.shutdown().await;
    debug!(state = %last, "watch stopped");
    Ok(())
}

fn redraw(session: &SyncSession, format: &OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Text) {
        println!("--- {} ---", Local::now().format("%H:%M:%S"));
    }
    print_records(&session.store().list(None), format)
}

fn report_state(state: StreamState) {
    match state {
        StreamState::Connected => eprintln!("-- live"),
        StreamState::Connecting => eprintln!("-- connecting..."),
        StreamState::Disconnected(attempt) => eprintln!("-- disconnected (retry {attempt})"),
        StreamState::GaveUp => eprintln!("-- offline"),
    }
}
