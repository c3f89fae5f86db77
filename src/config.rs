//! Per-invocation configuration
//!
//! [`Config`] is resolved once in `main` from, in increasing priority:
//! built-in defaults, `config.json` in the data directory, the
//! `FWDCTL_IPTABLES_COMMAND` environment variable, and command-line flags.
//! It is then passed by reference; nothing else reads process state.

use crate::utils::get_data_dir;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// iptables binary baked in by distro packagers, if any
const SYSTEM_IPTABLES_PATH: Option<&str> = option_env!("FWDCTL_SYSTEM_IPTABLES_PATH");

/// How `fwdctl list` prints forwards
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// iptables binary name or path
    #[serde(default = "default_iptables_command")]
    pub iptables_command: String,
    /// Rules file used by `apply` when `--file` is not given
    #[serde(default)]
    pub rules_file: Option<PathBuf>,
    /// Refuse forwards on interfaces missing from `/sys/class/net`
    #[serde(default = "default_true")]
    pub check_interface: bool,
    #[serde(default)]
    pub output_format: OutputFormat,
    /// Record create/delete/apply in the audit log
    #[serde(default = "default_true")]
    pub audit_log: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            iptables_command: default_iptables_command(),
            rules_file: None,
            check_interface: true,
            output_format: OutputFormat::default(),
            audit_log: true,
        }
    }
}

fn default_iptables_command() -> String {
    SYSTEM_IPTABLES_PATH.unwrap_or("iptables").to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Applies `FWDCTL_IPTABLES_COMMAND` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(command) = std::env::var("FWDCTL_IPTABLES_COMMAND")
            && !command.is_empty()
        {
            self.iptables_command = command;
        }
        self
    }

    /// Rules file to use when the caller did not name one.
    pub fn rules_path(&self) -> Option<PathBuf> {
        self.rules_file
            .clone()
            .or_else(crate::core::rules_file::default_rules_path)
    }
}

fn config_path() -> Option<PathBuf> {
    get_data_dir().map(|dir| dir.join("config.json"))
}

/// Saves the config to disk using an atomic write pattern.
/// 1. Writes to a temporary file created with mode 0o600.
/// 2. Atomically renames to the target path.
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn save_config(config: &Config) -> std::io::Result<PathBuf> {
    use tokio::fs::OpenOptions;
    use tokio::io::AsyncWriteExt;

    let path = config_path().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "Data directory not found")
    })?;
    let json = serde_json::to_string_pretty(config)?;
    let temp_path = path.with_extension("json.tmp");

    // Restrictive permissions from the start, before any data is written
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .mode(0o600)
        .open(&temp_path)
        .await?;

    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;

    tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                "Disk full: cannot save configuration. Free up space and try again.",
            )
        } else {
            e
        }
    })?;
    Ok(path)
}

/// Loads the config from disk, or returns default if not found.
///
/// An unreadable or invalid file is logged and ignored.
pub async fn load_config() -> Config {
    if let Some(path) = config_path() {
        match tokio::fs::read_to_string(&path).await {
            Ok(json) => match serde_json::from_str::<Config>(&json) {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring invalid {}: {e}", path.display()),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Cannot read {}: {e}", path.display()),
        }
    }
    Config::default()
}
