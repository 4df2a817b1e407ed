//! user type representing a namespace for nodes.
//!
//! users are the "bubbles" that own untagged nodes. policy aliases refer
//! to users by name; tagged nodes belong to their tags instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// unique identifier for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a meshscale user.
///
/// only `id` and `name` participate in policy evaluation; the rest is
/// bookkeeping for the surrounding server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// unique identifier.
    pub id: UserId,

    /// username - the name policy aliases resolve against.
    pub name: String,

    /// display name - typically the user's full name.
    pub display_name: Option<String>,

    /// when the user was created.
    pub created_at: DateTime<Utc>,

    /// when the user was last updated.
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// create a new user with the given name.
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            display_name: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// returns the display name or falls back to the username.
    pub fn display(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.name)
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new(UserId(0), String::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_display_fallback() {
        let mut user = User::new(UserId(1), "alice");
        assert_eq!(user.display(), "alice");

        user.display_name = Some("Alice Example".to_string());
        assert_eq!(user.display(), "Alice Example");
    }

    #[test]
    fn test_user_id_display() {
        assert_eq!(UserId(42).to_string(), "42");
    }
}
