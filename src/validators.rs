//! Input validation for forwards built from user input
//!
//! Everything here runs before a rule is handed to iptables. Rules decoded
//! from `iptables -S` are never validated: the table is trusted as-is.

use crate::core::error::{Error, Result};
use crate::core::rule::Rule;
use std::net::Ipv4Addr;

/// Protocols iptables can match a destination port for
pub const PORT_PROTOCOLS: [&str; 4] = ["tcp", "udp", "sctp", "dccp"];

/// Validates a single port number.
///
/// # Errors
///
/// Returns `Err` if the port is 0 or above 65535.
pub fn validate_port(port: u32) -> std::result::Result<u16, String> {
    match u16::try_from(port) {
        Ok(0) | Err(_) => Err("Port must be between 1 and 65535".to_string()),
        Ok(port) => Ok(port),
    }
}

/// Validates a network interface name.
///
/// Linux kernel interface name rules:
/// - Max 15 characters (IFNAMSIZ - 1)
/// - Alphanumeric, dot, dash, underscore only
/// - Cannot be "." or ".."
///
/// # Errors
///
/// Returns `Err` if interface name violates kernel constraints.
pub fn validate_interface(name: &str) -> std::result::Result<String, String> {
    if name.is_empty() {
        return Err("Interface name cannot be empty".to_string());
    }

    if name.len() > 15 {
        return Err("Interface name too long (max 15 characters)".to_string());
    }

    if name == "." || name == ".." {
        return Err("Invalid interface name".to_string());
    }

    // Check for valid characters (ASCII alphanumeric only, plus dot, dash, underscore)
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
    {
        return Err("Interface name contains invalid characters".to_string());
    }

    Ok(name.to_string())
}

/// Validates a protocol token, normalizing it to lowercase.
///
/// # Errors
///
/// Returns `Err` for protocols without port matching.
pub fn validate_protocol(proto: &str) -> std::result::Result<String, String> {
    let proto = proto.to_ascii_lowercase();
    if PORT_PROTOCOLS.contains(&proto.as_str()) {
        Ok(proto)
    } else {
        Err(format!(
            "Unsupported protocol '{proto}' (use {})",
            PORT_PROTOCOLS.join(", ")
        ))
    }
}

/// Validates the internal target address.
///
/// # Errors
///
/// Returns `Err` unless the address is a literal IPv4 address. Forwards are
/// created with `iptables`, whose nat table only holds IPv4 targets.
pub fn validate_address(addr: &str) -> std::result::Result<Ipv4Addr, String> {
    addr.parse::<Ipv4Addr>()
        .map_err(|_| format!("'{addr}' is not a valid IPv4 address"))
}

/// Validates every field of a user-supplied rule.
///
/// Returns the rule with its protocol normalized.
///
/// # Errors
///
/// Returns [`Error::Validation`] naming the first invalid field.
pub fn validate_rule(rule: &Rule) -> Result<Rule> {
    let iface = validate_interface(&rule.iface).map_err(|m| Error::validation("interface", m))?;
    let proto = validate_protocol(&rule.proto).map_err(|m| Error::validation("proto", m))?;
    validate_port(rule.dport).map_err(|m| Error::validation("destination-port", m))?;
    validate_address(&rule.saddr).map_err(|m| Error::validation("source-address", m))?;
    validate_port(rule.sport).map_err(|m| Error::validation("source-port", m))?;

    Ok(Rule {
        iface,
        proto,
        ..rule.clone()
    })
}

/// Checks that the interface exists on this host.
///
/// # Errors
///
/// Returns [`Error::Validation`] if the interface is not listed under
/// `/sys/class/net`.
pub fn validate_interface_exists(name: &str) -> Result<()> {
    let interfaces = crate::utils::list_interfaces();
    if interfaces.iter().any(|i| i == name) {
        Ok(())
    } else {
        Err(Error::validation(
            "interface",
            format!("no such interface '{name}' (available: {})", interfaces.join(", ")),
        ))
    }
}
