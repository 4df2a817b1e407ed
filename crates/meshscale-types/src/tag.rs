//! validated tag type for node tagging.
//!
//! tags must start with `tag:` and carry a short lowercase name. forced
//! tags on nodes use this type; request-tags stay raw strings because the
//! client may assert anything.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// maximum length for a tag name (after the `tag:` prefix).
pub const MAX_TAG_NAME_LEN: usize = 50;

/// a validated tag string such as `tag:server`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(String);

impl Tag {
    /// create a new tag, validating the format.
    pub fn new(s: impl Into<String>) -> Result<Self, TagError> {
        let s = s.into();
        Self::validate(&s)?;
        Ok(Self(s))
    }

    /// the full tag string (e.g. `tag:server`).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// the name portion (e.g. `server`).
    pub fn name(&self) -> &str {
        &self.0[4..]
    }

    fn validate(s: &str) -> Result<(), TagError> {
        let Some(name) = s.strip_prefix("tag:") else {
            return Err(TagError::MissingPrefix);
        };
        if name.is_empty() {
            return Err(TagError::EmptyName);
        }
        if name.len() > MAX_TAG_NAME_LEN {
            return Err(TagError::NameTooLong(name.len()));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(TagError::InvalidCharacters);
        }
        Ok(())
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Tag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Tag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl PartialEq<String> for Tag {
    fn eq(&self, other: &String) -> bool {
        &self.0 == other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tag::new(s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// error type for tag validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    /// tag doesn't start with `tag:`.
    #[error("tag must start with 'tag:'")]
    MissingPrefix,

    /// tag name portion is empty.
    #[error("tag name cannot be empty")]
    EmptyName,

    /// tag name exceeds the maximum length.
    #[error("tag name too long ({0} chars, max {max})", max = MAX_TAG_NAME_LEN)]
    NameTooLong(usize),

    /// tag name contains characters outside [a-z0-9-_].
    #[error("tag name may only contain lowercase letters, digits, hyphens, and underscores")]
    InvalidCharacters,
}
