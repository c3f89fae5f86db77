//! Forwarding rule data structure
//!
//! A [`Rule`] maps `(interface, protocol, external port)` to
//! `(internal address, internal port)`. It is a plain value: the kernel's nat
//! table is the source of truth and a `Rule` is only a view of one entry.
//!
//! # Example
//!
//! ```
//! use fwdctl::Rule;
//!
//! let rule = Rule::new("eth0", "tcp", 3000, "192.168.199.105", 80);
//! assert_eq!(rule.to_string(), "eth0 tcp/3000 -> 192.168.199.105:80");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// One DNAT port forward.
///
/// Ports are stored as `u32` so a rule decoded from `iptables` output keeps
/// whatever number the table holds; range checks live in
/// [`crate::validators`] and only run on user input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    /// Input interface the rule is attached to
    pub iface: String,
    /// Transport protocol token (`tcp`, `udp`, ...)
    pub proto: String,
    /// Externally exposed destination port
    pub dport: u32,
    /// Internal target address
    pub saddr: String,
    /// Internal target port
    pub sport: u32,
}

impl Rule {
    /// Builds a rule without validating any field.
    pub fn new(
        iface: impl Into<String>,
        proto: impl Into<String>,
        dport: u32,
        saddr: impl Into<String>,
        sport: u32,
    ) -> Self {
        Self {
            iface: iface.into(),
            proto: proto.into(),
            dport,
            saddr: saddr.into(),
            sport,
        }
    }

    /// The `--to-destination` value, `address:port`.
    pub fn destination(&self) -> String {
        format!("{}:{}", self.saddr, self.sport)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} -> {}",
            self.iface,
            self.proto,
            self.dport,
            self.destination()
        )
    }
}
