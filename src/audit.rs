//! Audit logging for operations that change the nat table
//!
//! Every create, delete and apply is appended to a JSON-lines file in the
//! state directory, whether it succeeded or not.
use crate::core::rule::Rule;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

/// Types of auditable events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    CreateForward,
    DeleteForward,
    ApplyRules,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Type of event
    pub event_type: EventType,

    /// Whether the operation succeeded
    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
pub struct AuditLog {
    log_path: PathBuf,
}

impl AuditLog {
    /// Opens the audit log in the state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined
    pub fn new() -> std::io::Result<Self> {
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self { log_path })
    }

    /// Uses an explicit log file
    pub fn at(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    /// Appends an event to the audit log
    ///
    /// Events are written as JSON-lines format (one JSON object per line)
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .mode(0o600)
            .open(&self.log_path)
            .await?;

        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// Lines that do not parse are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .filter_map(|line| serde_json::from_str(line).ok())
            .take(count)
            .collect();

        Ok(events)
    }

    /// Returns the path to the audit log file
    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }
}

async fn write_event(event: AuditEvent) {
    if let Ok(audit) = AuditLog::new()
        && let Err(e) = audit.log(event).await
    {
        tracing::warn!("Failed to write audit log: {}", e);
    }
}

fn result_fields<T, E: std::fmt::Display>(result: &Result<T, E>) -> (bool, Option<String>) {
    match result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    }
}

/// Logs a create operation
pub async fn log_create<T, E: std::fmt::Display>(rule: &Rule, result: &Result<T, E>) {
    let (success, error) = result_fields(result);
    write_event(AuditEvent::new(
        EventType::CreateForward,
        success,
        serde_json::json!({ "rule": rule }),
        error,
    ))
    .await;
}

/// Logs a delete operation, by rule or by id
pub async fn log_delete<E: std::fmt::Display>(
    target: serde_json::Value,
    result: &Result<Rule, E>,
) {
    let (success, error) = result_fields(result);
    let removed = result.as_ref().ok();
    write_event(AuditEvent::new(
        EventType::DeleteForward,
        success,
        serde_json::json!({ "target": target, "removed": removed }),
        error,
    ))
    .await;
}

/// Logs an apply operation
///
/// # Arguments
///
/// * `rule_count` - Number of rules in the rules file
/// * `created` - Number of forwards created, when the apply finished
/// * `error` - Error message if operation failed
pub async fn log_apply(rule_count: usize, created: Option<usize>, error: Option<String>) {
    write_event(AuditEvent::new(
        EventType::ApplyRules,
        error.is_none(),
        serde_json::json!({
            "rule_count": rule_count,
            "created": created,
        }),
        error,
    ))
    .await;
}
