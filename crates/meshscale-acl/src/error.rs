//! error types for the acl compiler.

use thiserror::Error;

/// errors surfaced while loading or compiling a policy.
#[derive(Debug, Error)]
pub enum Error {
    /// failed to read the policy file.
    #[error("reading policy: {0}")]
    Io(#[from] std::io::Error),

    /// policy document is not valid json after normalization. the
    /// underlying error carries line and column context.
    #[error("parsing policy document: {0}")]
    Parse(#[from] serde_json::Error),

    /// policy document could not be normalized to strict json.
    #[error("normalizing policy document: {0}")]
    Normalize(#[from] crate::hujson::NormalizeError),

    /// the policy deserialized to nothing at all.
    #[error("empty policy")]
    EmptyPolicy,

    /// access rule action is not `accept`, or ssh action is not one of
    /// `accept` / `check`.
    #[error("invalid action {action:?}")]
    InvalidAction {
        /// the rejected action literal.
        action: String,
    },

    /// group referenced but not declared in the policy.
    #[error("group {group:?} isn't registered in the policy")]
    UnknownGroup {
        /// the undeclared group reference.
        group: String,
    },

    /// a group member is itself a group; groups cannot nest.
    #[error("a group cannot be composed of groups")]
    NestedGroup,

    /// tag referenced without a tagOwners entry.
    #[error("tag {tag:?} isn't owned by a TagOwner; add one to tagOwners first")]
    InvalidTag {
        /// the unowned tag.
        tag: String,
    },

    /// tag referenced without a tagOwners entry or any forced-tag carrier.
    #[error("tag {tag:?} isn't owned by a TagOwner and no forced tags provide it")]
    InvalidTagNoForced {
        /// the unresolvable tag.
        tag: String,
    },

    /// port specification or destination entry could not be parsed.
    #[error("invalid port format in {spec:?}")]
    InvalidPortFormat {
        /// the offending destination or port spec.
        spec: String,
    },

    /// a port was given for a protocol that cannot carry one.
    #[error("wildcard as port is required for the protocol")]
    WildcardRequired,

    /// protocol is neither a known keyword nor a number.
    #[error("unknown protocol {proto:?}")]
    UnknownProtocol {
        /// the rejected protocol string.
        proto: String,
    },

    /// autogroup name has no ip expansion.
    #[error("unknown autogroup: {0:?}")]
    UnknownAutogroup(String),

    /// `autogroup:self` destination used without a single
    /// `autogroup:member` or `autogroup:self` source.
    #[error(r#"dst "autogroup:self" only works with one src "autogroup:member" or "autogroup:self""#)]
    AutogroupSelfRequirement,

    /// ssh `check` action with an unparseable or missing check period.
    #[error("invalid check period {value:?}: {source}")]
    InvalidCheckPeriod {
        /// the rejected duration string.
        value: String,
        /// the underlying duration parse error.
        source: humantime::DurationError,
    },
}

/// result type for acl compilation.
pub type Result<T> = std::result::Result<T, Error>;
