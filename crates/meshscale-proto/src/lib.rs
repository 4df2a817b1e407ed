//! client wire formats for meshscale.
//!
//! the coordination server distributes two security-sensitive artifacts to
//! every node: a packet filter and an ssh policy. clients enforce both
//! locally, so the shapes here are fixed - field names, casing, and the
//! nanosecond duration encoding must not drift.

#![warn(missing_docs)]

mod filter;
mod ssh;

pub use filter::{FilterRule, NetPortRange, PORT_RANGE_BEGIN, PORT_RANGE_END, PortRange, filter_allow_all};
pub use ssh::{SshAction, SshPolicy, SshPrincipal, SshRule};
