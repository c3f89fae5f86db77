//! Rules file management
//!
//! A rules file is a JSON document listing forwards to create with
//! `fwdctl apply`:
//!
//! ```json
//! {
//!   "rules": [
//!     { "iface": "eth0", "proto": "tcp", "dport": 3000, "saddr": "192.168.199.105", "sport": 80 }
//!   ]
//! }
//! ```

use crate::core::error::{Error, Result};
use crate::core::rule::Rule;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Maximum number of rules accepted from a single file
///
/// Limit prevents memory exhaustion from malformed files.
pub const MAX_RULES: usize = 1000;

/// File name used inside the data directory when no path is given
pub const DEFAULT_RULES_FILE: &str = "rules.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RulesFile {
    /// A starting point for a new rules file.
    pub fn template() -> Self {
        Self {
            rules: vec![
                Rule::new("lo", "tcp", 3000, "127.0.0.1", 80),
                Rule::new("eth0", "udp", 5353, "192.168.199.105", 53),
            ],
        }
    }

    /// Parses a rules file from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the JSON is invalid or lists more than [`MAX_RULES`] rules.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(json)?;
        if file.rules.len() > MAX_RULES {
            return Err(Error::RulesFile(format!(
                "{} rules exceeds the limit of {MAX_RULES}",
                file.rules.len()
            )));
        }
        Ok(file)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Default rules file location in the data directory.
pub fn default_rules_path() -> Option<PathBuf> {
    crate::utils::get_data_dir().map(|dir| dir.join(DEFAULT_RULES_FILE))
}

/// Loads a rules file from disk.
///
/// # Async
/// Uses `tokio::fs` for non-blocking I/O.
pub async fn load_rules_file(path: &Path) -> Result<RulesFile> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::RulesFile(format!("cannot read {}: {e}", path.display()))
    })?;
    let file = RulesFile::from_json(&json)?;
    info!("Loaded {} rules from {}", file.rules.len(), path.display());
    Ok(file)
}

/// Writes a rules file atomically (temp file in the same directory, then rename).
pub fn save_rules_file(path: &Path, file: &RulesFile) -> Result<()> {
    let json = file.to_json()?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(json.as_bytes())?;
    temp.write_all(b"\n")?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
