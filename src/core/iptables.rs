//! iptables subprocess execution
//!
//! [`CommandRunner`] is the only seam between fwdctl and the firewall: it
//! takes a fixed argument vector and hands back the exit status and output.
//! [`IptablesRunner`] is the real implementation; tests substitute their own.

use crate::core::error::{Error, Result};
use std::process::Stdio;
use tracing::{debug, error};

/// Exit status and captured output of one iptables invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Converts a failed invocation into [`Error::Iptables`].
    pub fn into_error(self) -> Error {
        let stderr = self.stderr.trim().to_string();
        let message = if stderr.is_empty() {
            match self.exit_code {
                Some(code) => format!("iptables exited with status {code}"),
                None => "iptables was terminated by a signal".to_string(),
            }
        } else {
            stderr.clone()
        };
        Error::Iptables {
            message,
            stderr: (!stderr.is_empty()).then_some(stderr),
            exit_code: self.exit_code,
        }
    }
}

/// Runs the firewall utility with a list of arguments.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Runs the utility once.
    ///
    /// Returns `Err` only when the process could not be run at all; a
    /// non-zero exit status is reported through [`CommandOutput`].
    async fn run(&self, args: &[String]) -> Result<CommandOutput>;
}

/// Runs the configured iptables binary, elevating when needed.
#[derive(Debug, Clone)]
pub struct IptablesRunner {
    program: String,
}

impl IptablesRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl CommandRunner for IptablesRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        debug!(program = %self.program, ?args, "running iptables");

        let output =
            crate::elevation::create_elevated_iptables_command(&self.program, &args)?
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .output()
                .await
                .map_err(|e| {
                    error!("Failed to spawn {}: {e}", self.program);
                    Error::Iptables {
                        message: format!("Failed to spawn {}: {e}", self.program),
                        stderr: None,
                        exit_code: None,
                    }
                })?;

        let result = CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(exit_code = ?result.exit_code, "iptables finished");
        Ok(result)
    }
}
