use std::path::PathBuf;

/// XDG app name used for config, state and log directories.
pub const APP_NAME: &str = "onegate";

const CONFIG_FILE_NAME: &str = "config.toml";
const CREDENTIALS_FILE_NAME: &str = "credentials.toml";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/onegate`, or `None` when no home directory can be determined.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// State directory, falling back to the local data dir on platforms without
/// an XDG state dir (macOS, Windows).
pub fn state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

pub fn state_dir_fallback() -> PathBuf {
    std::env::temp_dir().join(format!("{APP_NAME}-state"))
}

pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

pub fn credentials_file() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CREDENTIALS_FILE_NAME))
}

/// Directory for `gate-*.log` files.
pub fn log_dir() -> PathBuf {
    state_dir()
        .unwrap_or_else(state_dir_fallback)
        .join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_and_credentials_share_directory() {
        if let (Some(config), Some(credentials)) = (config_file(), credentials_file()) {
            assert_eq!(config.parent(), credentials.parent());
            assert!(config.ends_with("config.toml"));
            assert!(credentials.ends_with("credentials.toml"));
        }
    }

    #[test]
    fn test_log_dir_is_under_app_state() {
        let dir = log_dir();
        assert!(dir.ends_with("logs"));
        assert!(dir.to_string_lossy().contains(APP_NAME));
    }
}
