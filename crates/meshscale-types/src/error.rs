//! error types for meshscale-types.

use thiserror::Error;

/// errors that can occur in meshscale-types.
#[derive(Debug, Error)]
pub enum Error {
    /// string is neither `*`, an ip address, nor a cidr prefix.
    #[error("invalid IP expression: {0:?}")]
    InvalidIpExpression(String),
}
