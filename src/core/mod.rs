//! Core forwarding functionality
//!
//! This module contains the forward rule model and its iptables plumbing:
//!
//! - [`rule`]: The [`rule::Rule`] value type
//! - [`codec`]: Rule ⇄ iptables argument vector / `-S` line conversion
//! - [`iptables`]: Subprocess execution behind the [`iptables::CommandRunner`] trait
//! - [`forward`]: Create, list, delete and apply forwards
//! - [`rules_file`]: JSON rules files for `apply`
//! - [`error`]: Error types for all of the above

pub mod codec;
pub mod error;
pub mod forward;
pub mod iptables;
pub mod rule;
pub mod rules_file;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
