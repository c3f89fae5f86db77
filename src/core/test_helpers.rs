//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::error::Result;
use crate::core::iptables::{CommandOutput, CommandRunner};
use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// Use this when your test needs to:
/// 1. Temporarily change env vars to different values
/// 2. Restore env vars after the test
/// 3. Test behavior when env vars are absent
///
/// # Example
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("FWDCTL_ELEVATION_METHOD", "sudo");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("FWDCTL_ELEVATION_METHOD");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// In-memory stand-in for `iptables -t nat` on the PREROUTING chain.
///
/// Understands `-S`, `-A`, `-C` and `-D`, and records every invocation.
#[derive(Debug, Default)]
pub struct FakeIptables {
    rules: Mutex<Vec<String>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeIptables {
    /// Starts with the given `-S` lines already in the chain.
    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            rules: Mutex::new(lines.iter().map(ToString::to_string).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.rules.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    fn missing() -> CommandOutput {
        CommandOutput {
            exit_code: Some(1),
            stdout: String::new(),
            stderr: "iptables: Bad rule (does a matching rule exist in that chain?).\n"
                .to_string(),
        }
    }

    fn ok(stdout: String) -> CommandOutput {
        CommandOutput {
            exit_code: Some(0),
            stdout,
            stderr: String::new(),
        }
    }
}

impl CommandRunner for FakeIptables {
    async fn run(&self, args: &[String]) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(args.to_vec());

        // Every call is prefixed with `-t nat`
        let spec = &args[2..];
        let line = std::iter::once("-A")
            .chain(spec[1..].iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let mut rules = self.rules.lock().unwrap();

        let output = match spec[0].as_str() {
            "-S" => {
                let mut out = String::from("-P PREROUTING ACCEPT\n");
                for rule in rules.iter() {
                    out.push_str(rule);
                    out.push('\n');
                }
                Self::ok(out)
            }
            "-A" => {
                rules.push(line);
                Self::ok(String::new())
            }
            "-C" => {
                if rules.contains(&line) {
                    Self::ok(String::new())
                } else {
                    Self::missing()
                }
            }
            "-D" => match rules.iter().position(|r| *r == line) {
                Some(index) => {
                    rules.remove(index);
                    Self::ok(String::new())
                }
                None => Self::missing(),
            },
            other => CommandOutput {
                exit_code: Some(2),
                stdout: String::new(),
                stderr: format!("iptables: unknown option {other}\n"),
            },
        };
        Ok(output)
    }
}
