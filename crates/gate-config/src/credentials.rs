//! Calendar credential persisted in `~/.config/onegate/credentials.toml`.
//!
//! The token is issued by the Google OAuth flow of the desktop shell; this
//! crate only stores it (mode 0600) and hands it to calendar-bound uploads.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarCredential {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CalendarCredential {
    pub fn new(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_blank(&self) -> bool {
        self.token.trim().is_empty()
    }

    pub fn redacted_token(&self) -> String {
        mask_token(&self.token)
    }
}

impl fmt::Debug for CalendarCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalendarCredential")
            .field("token", &self.redacted_token())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    calendar: Option<CalendarCredential>,
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `~/.config/onegate/credentials.toml`.
    pub fn default_location() -> Result<Self> {
        let path = paths::credentials_file().context("Failed to determine config directory")?;
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored calendar credential; `None` when the file or section is absent.
    pub fn load(&self) -> Result<Option<CalendarCredential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials: {}", self.path.display()))?;
        let file: CredentialFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse credentials: {}", self.path.display()))?;
        Ok(file.calendar.filter(|credential| !credential.is_blank()))
    }

    pub fn save(&self, credential: &CalendarCredential) -> Result<()> {
        let file = CredentialFile {
            calendar: Some(credential.clone()),
        };
        self.write(&file)
    }

    /// Remove the calendar credential. Returns `false` if none was stored.
    pub fn clear(&self) -> Result<bool> {
        if self.load()?.is_none() {
            return Ok(false);
        }
        self.write(&CredentialFile::default())?;
        Ok(true)
    }

    fn write(&self, file: &CredentialFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string(file).context("Failed to serialize credentials")?;

        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        set_file_mode_600(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

fn mask_token(token: &str) -> String {
    if token.is_empty() {
        return String::new();
    }

    let char_count = token.chars().count();
    let prefix: String = token.chars().take(3).collect();
    let suffix: String = token.chars().skip(char_count.saturating_sub(4)).collect();

    if char_count <= 4 {
        format!("***{suffix}")
    } else {
        format!("{prefix}...{suffix}")
    }
}

#[cfg(unix)]
fn set_file_mode_600(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to chmod 600: {}", path.display()))
}

#[cfg(not(unix))]
fn set_file_mode_600(_path: &Path) -> Result<()> {
    Ok(())
}
