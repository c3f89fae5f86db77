//! fwdctl - iptables port forwarding manager
//!
//! Creates, lists and removes DNAT port forwards in the `nat` table's
//! PREROUTING chain. Every forward is tagged with a `fwdctl` comment so the
//! tool can tell its own rules apart from everything else in the chain.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, iptables codec, subprocess runner, forward manager
//! - [`validators`] - Input validation for user-supplied forwards
//! - [`config`] - Per-invocation configuration
//! - [`elevation`] - Privilege escalation for iptables
//! - [`audit`] - Audit logging for all table changes
//! - [`utils`] - Utility functions (XDG directories, interfaces)

#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

// Re-export commonly used types
pub use crate::core::codec::{Action, decode, encode};
pub use crate::core::error::{Error, Result};
pub use crate::core::rule::Rule;
