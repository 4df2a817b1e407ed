//! core types for meshscale - a coordination server for a mesh vpn.
//!
//! this crate provides the fundamental data structures shared across the
//! server:
//! - [`node`]: a device in the fleet, with its addresses and tags
//! - [`user`]: the namespace owning untagged nodes
//! - [`ipset`]: finite unions of ip prefixes with add/remove algebra
//! - [`matcher`]: filter-rule matching for node-to-node access checks

#![warn(missing_docs)]

mod error;
pub mod ipset;
pub mod matcher;
mod node;
mod tag;
pub mod test_utils;
mod user;

pub use error::Error;
pub use node::{HostInfo, Node, NodeId, filter_by_ip};
pub use tag::{MAX_TAG_NAME_LEN, Tag, TagError};
pub use user::{User, UserId};

/// result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;
