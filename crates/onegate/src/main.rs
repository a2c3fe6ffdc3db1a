use anyhow::Result;
use clap::Parser;

mod cli;
mod config_cmds;
mod doctor;
mod logging;
mod records_cmd;
mod render;
mod session_setup;
mod token_cmd;
mod watch_cmd;

use cli::{Cli, Commands, ConfigCommands, TokenCommands};
use gate_config::GateConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_format = cli.format.clone();

    // A broken config file must not prevent logging; commands that need the
    // config report the parse error themselves.
    let file_logging = GateConfig::load()
        .map(|config| config.logging.file)
        .unwrap_or(false);
    let log_dir = file_logging.then(gate_config::paths::log_dir);
    let _log_guard = logging::init(log_dir.as_deref());

    match cli.command {
        Commands::Watch => watch_cmd::handle_watch(output_format).await?,
        Commands::List { kind } => records_cmd::handle_list(kind, output_format).await?,
        Commands::Submit { text, image } => {
            records_cmd::handle_submit(text, image.as_deref(), output_format).await?;
        }
        Commands::Upload { ids, final_data } => {
            records_cmd::handle_upload(ids, final_data, output_format).await?;
        }
        Commands::Delete { ids } => records_cmd::handle_delete(ids, output_format).await?,
        Commands::Revise { id, text, analysis } => {
            records_cmd::handle_revise(id, text, analysis).await?;
        }
        Commands::Token { cmd } => match cmd {
            TokenCommands::Set {
                token,
                expires_in,
                expires_at,
            } => token_cmd::handle_token_set(token, expires_in, expires_at)?,
            TokenCommands::Clear => token_cmd::handle_token_clear()?,
            TokenCommands::Show => token_cmd::handle_token_show(output_format)?,
        },
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => config_cmds::handle_config_show(output_format)?,
            ConfigCommands::Init => config_cmds::handle_config_init()?,
        },
        Commands::Doctor => doctor::run_doctor(output_format).await?,
    }

    Ok(())
}
