//! Conversion between [`Rule`] and the iptables textual surface
//!
//! [`encode`] produces the argument vector handed to `iptables -t nat`, and
//! [`decode`] rebuilds a rule from one line of `iptables -t nat -S PREROUTING`.
//!
//! Decoding is pattern extraction over a known dialect, not a grammar: each
//! anchor (`-i`, `-p`, `--dport`, `--to-destination`) is located by its own
//! regex, so flag order and extra tokens such as `-c <pkts> <bytes>` counters
//! do not matter. A line missing any anchor is rejected as a whole, and so is
//! a line where `-i`, `-p` or `--dport` is inverted with `!`: such a rule
//! matches everything except the named value and has no [`Rule`] form.
//!
//! # Example
//!
//! ```
//! use fwdctl::core::codec::{decode, encode, Action};
//! use fwdctl::Rule;
//!
//! let rule = Rule::new("eth0", "udp", 53, "10.0.0.1", 5353);
//! let args = encode(&rule, Action::Insert);
//! assert_eq!(args[0], "-A");
//!
//! let line = args.join(" ");
//! assert_eq!(decode(&line).unwrap(), rule);
//! ```

use crate::core::error::{Error, Result};
use crate::core::rule::Rule;
use regex::Regex;
use std::sync::LazyLock;

/// Comment attached to every rule fwdctl creates
pub const RULE_TAG: &str = "fwdctl";

/// Chain all forwards live in
pub const CHAIN: &str = "PREROUTING";

/// Table all forwards live in
pub const TABLE: &str = "nat";

// `neg` captures the `!` iptables prints before an inverted match
static IFACE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<neg>!\s+)?-i\s+(?P<iface>\S+)").expect("valid regex")
});

static PROTO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<neg>!\s+)?-p\s+(?P<proto>\S+)").expect("valid regex")
});

static DPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)(?P<neg>!\s+)?--dport\s+(?P<dport>\S+)").expect("valid regex")
});

static DEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\s)--to-destination\s+(?P<dest>\S+)").expect("valid regex")
});

// iptables quotes comments that contain whitespace
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:^|\s)--comment\s+(?:"(?P<quoted>[^"]*)"|(?P<bare>\S+))"#)
        .expect("valid regex")
});

/// Rule operation, rendered as the iptables command flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Action {
    /// Append to the end of the chain
    #[strum(serialize = "-A")]
    Insert,
    /// Delete the matching rule
    #[strum(serialize = "-D")]
    Delete,
    /// Check whether a matching rule exists
    #[strum(serialize = "-C")]
    Check,
}

/// Builds the rule specification for `iptables -t nat`.
///
/// Never fails; field values must be validated by the caller beforehand.
pub fn encode(rule: &Rule, action: Action) -> Vec<String> {
    vec![
        action.to_string(),
        CHAIN.to_string(),
        "-i".to_string(),
        rule.iface.clone(),
        "-p".to_string(),
        rule.proto.clone(),
        "-m".to_string(),
        rule.proto.clone(),
        "--dport".to_string(),
        rule.dport.to_string(),
        "-m".to_string(),
        "comment".to_string(),
        "--comment".to_string(),
        RULE_TAG.to_string(),
        "-j".to_string(),
        "DNAT".to_string(),
        "--to-destination".to_string(),
        rule.destination(),
    ]
}

/// The line `iptables -S` prints for a rule created by [`encode`].
pub fn listing_line(rule: &Rule) -> String {
    encode(rule, Action::Insert).join(" ")
}

/// Parses one `iptables -S` line into a [`Rule`].
///
/// # Errors
///
/// - [`Error::MalformedRuleLine`] if any of `-i`, `-p`, `--dport` or
///   `--to-destination <addr>:<port>` is missing, or if `-i`, `-p` or
///   `--dport` is inverted (`! -i eth0`)
/// - [`Error::InvalidPortValue`] if a port token is not an integer
pub fn decode(line: &str) -> Result<Rule> {
    let malformed = || Error::MalformedRuleLine {
        line: line.trim().to_string(),
    };

    let iface = extract_iface(line).ok_or_else(malformed)?;
    let proto = extract_proto(line).ok_or_else(malformed)?;
    let dport = extract_dport(line).ok_or_else(malformed)?;
    let (saddr, sport) = extract_destination(line).ok_or_else(malformed)?;

    Ok(Rule {
        iface: iface.to_string(),
        proto: proto.to_string(),
        dport: parse_port("dport", dport)?,
        saddr: saddr.to_string(),
        sport: parse_port("sport", sport)?,
    })
}

/// Whether the line carries the fwdctl comment tag.
pub fn is_managed(line: &str) -> bool {
    extract_comment(line) == Some(RULE_TAG)
}

/// Interface token after `-i`; `None` when absent or inverted.
pub fn extract_iface(line: &str) -> Option<&str> {
    capture(&IFACE_RE, line, "iface")
}

/// Protocol token after `-p`; `None` when absent or inverted.
pub fn extract_proto(line: &str) -> Option<&str> {
    capture(&PROTO_RE, line, "proto")
}

/// Raw `--dport` token, not yet parsed; `None` when absent or inverted.
pub fn extract_dport(line: &str) -> Option<&str> {
    capture(&DPORT_RE, line, "dport")
}

/// `--to-destination` split on its last colon into `(address, port)`.
///
/// A destination without a port, or with an empty address, yields `None`.
pub fn extract_destination(line: &str) -> Option<(&str, &str)> {
    let dest = capture(&DEST_RE, line, "dest")?;
    let (addr, port) = dest.rsplit_once(':')?;
    if addr.is_empty() || port.is_empty() {
        return None;
    }
    Some((addr, port))
}

/// Value of `--comment`, with iptables' quoting removed.
pub fn extract_comment(line: &str) -> Option<&str> {
    let caps = COMMENT_RE.captures(line)?;
    caps.name("quoted")
        .or_else(|| caps.name("bare"))
        .map(|m| m.as_str())
}

fn capture<'a>(re: &Regex, line: &'a str, name: &str) -> Option<&'a str> {
    let caps = re.captures(line)?;
    if caps.name("neg").is_some() {
        return None;
    }
    caps.name(name).map(|m| m.as_str())
}

fn parse_port(field: &'static str, value: &str) -> Result<u32> {
    // u32::from_str accepts a leading '+', iptables never prints one
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Error::InvalidPortValue {
            field,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| Error::InvalidPortValue {
        field,
        value: value.to_string(),
    })
}
