//! Client configuration (`~/.config/onegate/config.toml`) and the locally
//! persisted calendar credential.

pub mod config;
pub mod credentials;
pub mod paths;

pub use config::{BackendConfig, GateConfig, LoggingConfig, SessionConfig, StreamConfig};
pub use credentials::{CalendarCredential, CredentialStore};
