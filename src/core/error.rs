use crate::core::rule::Rule;
use thiserror::Error;

/// Core error types for fwdctl
#[derive(Debug, Error)]
pub enum Error {
    /// The line is not a complete DNAT forwarding rule
    #[error("not a complete DNAT forwarding rule: {line}")]
    MalformedRuleLine { line: String },

    /// A port token was present but is not an integer
    #[error("invalid {field} value: {value:?}")]
    InvalidPortValue { field: &'static str, value: String },

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// iptables command execution failed
    #[error("iptables error: {message}")]
    Iptables {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },

    /// The forward is already present in the nat table
    #[error("forward already exists: {0}")]
    AlreadyExists(Rule),

    /// No matching forward in the nat table
    #[error("forward not found: {0}")]
    NotFound(String),

    /// Rules file could not be used
    #[error("Rules file error: {0}")]
    RulesFile(String),

    /// Privilege escalation failed
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether a line scan should skip this error instead of failing
    pub fn is_unparseable_line(&self) -> bool {
        matches!(
            self,
            Self::MalformedRuleLine { .. } | Self::InvalidPortValue { .. }
        )
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Database of iptables error patterns and their translations
pub struct IptablesErrorPattern;

impl IptablesErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        // Permission errors
        if lower.contains("permission denied")
            || lower.contains("operation not permitted")
            || lower.contains("you must be root")
        {
            return ErrorTranslation::new("Insufficient permissions to modify the nat table")
                .with_suggestion("Run fwdctl as root or allow sudo/run0 elevation")
                .with_suggestion("Set FWDCTL_ELEVATION_METHOD=sudo to force sudo")
                .with_suggestion("Check if CAP_NET_ADMIN capability is available");
        }

        // Missing iptables
        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("iptables is not installed or not found in PATH")
                .with_suggestion("Install iptables: sudo apt install iptables  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install iptables  (Fedora/RHEL)")
                .with_suggestion("Or: sudo pacman -S iptables  (Arch)")
                .with_suggestion("Or point --iptables at the binary");
        }

        // xtables lock held by another process
        if lower.contains("xtables lock") || lower.contains("resource temporarily unavailable") {
            return ErrorTranslation::new("Another process is holding the xtables lock")
                .with_suggestion("Wait a moment and try again")
                .with_suggestion(
                    "Check for conflicting firewall managers: sudo systemctl status firewalld ufw",
                );
        }

        // Deleting a rule that is not there
        if lower.contains("does a matching rule exist") || lower.contains("bad rule") {
            return ErrorTranslation::new("No matching rule in the PREROUTING chain")
                .with_suggestion("List current forwards: fwdctl list");
        }

        // Missing kernel modules
        if lower.contains("table does not exist") || lower.contains("can't initialize") {
            return ErrorTranslation::new("The nat table is not available")
                .with_suggestion("Load the NAT modules: sudo modprobe iptable_nat")
                .with_suggestion("On nftables systems make sure iptables-nft is installed");
        }

        // Unknown protocol or match
        if lower.contains("unknown protocol") || lower.contains("couldn't load match") {
            return ErrorTranslation::new("Invalid protocol for a port forward")
                .with_suggestion("Use tcp, udp, sctp or dccp");
        }

        // Bad destination
        if lower.contains("bad ip address") || lower.contains("host/network") {
            return ErrorTranslation::new("Invalid destination address")
                .with_suggestion("Use an IPv4 address such as 192.168.1.10");
        }

        // Generic fallback
        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Check the detailed error message for more information")
            .with_suggestion("Verify iptables is working: sudo iptables -t nat -S")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
