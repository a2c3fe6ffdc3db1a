use anyhow::Result;
use gate_config::GateConfig;
use gate_core::OutputFormat;

pub(crate) fn handle_config_show(format: OutputFormat) -> Result<()> {
    let config = GateConfig::load()?;

    match format {
        OutputFormat::Json => {
            let json_str = serde_json::to_string_pretty(&config)?;
            println!("{}", json_str);
        }
        OutputFormat::Text => {
            let toml_str = toml::to_string_pretty(&config)?;
            print!("{}", toml_str);
        }
    }
    Ok(())
}

pub(crate) fn handle_config_init() -> Result<()> {
    let path = GateConfig::config_path()?;
    if GateConfig::write_template(&path)? {
        eprintln!("Wrote config template to: {}", path.display());
        eprintln!("Set session.user_id there (or export ONEGATE_USER_ID) before syncing.");
    } else {
        eprintln!("Config already exists at: {}", path.display());
    }
    Ok(())
}
