//! policy document ast and loading.
//!
//! administrators write one policy document for the whole mesh: groups,
//! tag ownership, named hosts, access rules, and ssh rules. the document
//! is a json superset (comments, trailing commas); loading normalizes it
//! and rejects documents that deserialize to nothing.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::hujson;

/// the complete policy document.
///
/// # Example
///
/// ```json
/// {
///   "groups": {
///     "group:engineering": ["alice", "bork"]
///   },
///   "tagOwners": {
///     "tag:web": ["group:engineering"]
///   },
///   "Hosts": {
///     "git-server": "100.64.0.30"
///   },
///   "acls": [
///     {"action": "accept", "src": ["group:engineering"], "dst": ["git-server:22,443"]}
///   ],
///   "ssh": [
///     {"action": "accept", "src": ["autogroup:member"], "dst": ["autogroup:self"], "users": ["ubuntu"]}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AclPolicy {
    /// group definitions mapping group names to member user names.
    ///
    /// group names include the `group:` prefix. members are always
    /// users; a group can never contain another group.
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,

    /// tag name -> owners allowed to attach that tag to a node.
    ///
    /// owners are user names or `group:` references.
    #[serde(default, rename = "tagOwners")]
    pub tag_owners: HashMap<String, Vec<String>>,

    /// named hosts. values are usually an ip or cidr, but may point at
    /// another name handled by alias expansion.
    #[serde(default, rename = "Hosts")]
    pub hosts: HashMap<String, String>,

    /// ordered access rules.
    #[serde(default)]
    pub acls: Vec<Acl>,

    /// ordered ssh rules.
    #[serde(default)]
    pub ssh: Vec<SshAclRule>,
}

/// a single access rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acl {
    /// must be the literal `accept`; anything else is rejected.
    pub action: String,

    /// optional ip protocol (e.g. `tcp`, `icmp`, or a protocol number).
    /// empty means the default protocol set.
    #[serde(default, rename = "proto", skip_serializing_if = "String::is_empty")]
    pub protocol: String,

    /// source aliases.
    #[serde(rename = "src")]
    pub sources: Vec<String>,

    /// destination entries of the form `ALIAS:PORTSPEC`.
    #[serde(rename = "dst")]
    pub destinations: Vec<String>,
}

/// a single ssh rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SshAclRule {
    /// `accept`, `check`, or empty for reject.
    #[serde(default)]
    pub action: String,

    /// session re-check interval for `check` (e.g. `12h`).
    #[serde(
        default,
        rename = "checkPeriod",
        skip_serializing_if = "Option::is_none"
    )]
    pub check_period: Option<String>,

    /// source aliases (who may connect).
    #[serde(rename = "src")]
    pub sources: Vec<String>,

    /// destination aliases (which nodes may be reached); no port
    /// component.
    #[serde(rename = "dst")]
    pub destinations: Vec<String>,

    /// server-side unix users the connection may map to.
    #[serde(default)]
    pub users: Vec<String>,
}

impl AclPolicy {
    /// load a policy document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading acl policy");

        let raw = std::fs::read_to_string(path)?;
        Self::from_bytes(raw.as_bytes())
    }

    /// load a policy document from raw bytes.
    ///
    /// the document is normalized from the json superset to strict json
    /// before deserializing. a document with no meaningful content is
    /// rejected with [`Error::EmptyPolicy`].
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        debug!(bytes = raw.len(), "parsing acl policy");

        let text = std::str::from_utf8(raw)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))?;
        let strict = hujson::normalize(text)?;
        let policy: AclPolicy = serde_json::from_str(&strict)?;

        if policy.is_zero() {
            return Err(Error::EmptyPolicy);
        }

        Ok(policy)
    }

    /// true when the document declares nothing at all.
    pub fn is_zero(&self) -> bool {
        self.groups.is_empty()
            && self.tag_owners.is_empty()
            && self.hosts.is_empty()
            && self.acls.is_empty()
            && self.ssh.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_policy() {
        let doc = r#"{
            // engineering runs the web fleet
            "groups": {
                "group:engineering": ["alice", "bork"]
            },
            "tagOwners": {
                "tag:web": ["group:engineering"]
            },
            "Hosts": {
                "git-server": "100.64.0.30",
                "lab": "10.40.0.0/16"
            },
            "acls": [
                {
                    "action": "accept",
                    "proto": "tcp",
                    "src": ["group:engineering"],
                    "dst": ["git-server:22,443",]
                },
            ],
            "ssh": [
                {
                    "action": "check",
                    "checkPeriod": "12h",
                    "src": ["group:engineering"],
                    "dst": ["tag:web"],
                    "users": ["ubuntu", "root"]
                }
            ]
        }"#;

        let policy = AclPolicy::from_bytes(doc.as_bytes()).unwrap();
        assert_eq!(policy.groups["group:engineering"], vec!["alice", "bork"]);
        assert_eq!(policy.tag_owners["tag:web"], vec!["group:engineering"]);
        assert_eq!(policy.hosts["git-server"], "100.64.0.30");
        assert_eq!(policy.acls.len(), 1);
        assert_eq!(policy.acls[0].protocol, "tcp");
        assert_eq!(policy.acls[0].destinations, vec!["git-server:22,443"]);
        assert_eq!(policy.ssh.len(), 1);
        assert_eq!(policy.ssh[0].check_period.as_deref(), Some("12h"));
    }

    #[test]
    fn test_empty_document_rejected() {
        let err = AclPolicy::from_bytes(b"{}").unwrap_err();
        assert!(matches!(err, Error::EmptyPolicy));

        let err = AclPolicy::from_bytes(b"{\"acls\": []}").unwrap_err();
        assert!(matches!(err, Error::EmptyPolicy));
    }

    #[test]
    fn test_malformed_document_surfaces_position() {
        let err = AclPolicy::from_bytes(b"{\n\"acls\": nope\n}").unwrap_err();
        match err {
            Error::Parse(e) => assert_eq!(e.line(), 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_protocol_defaults_empty() {
        let doc = r#"{"acls": [{"action": "accept", "src": ["*"], "dst": ["*:*"]}]}"#;
        let policy = AclPolicy::from_bytes(doc.as_bytes()).unwrap();
        assert_eq!(policy.acls[0].protocol, "");
    }

    #[test]
    fn test_ssh_action_defaults_empty() {
        let doc = r#"{"ssh": [{"src": ["*"], "dst": ["*"], "users": ["ubuntu"]}]}"#;
        let policy = AclPolicy::from_bytes(doc.as_bytes()).unwrap();
        assert_eq!(policy.ssh[0].action, "");
        assert!(policy.ssh[0].check_period.is_none());
    }

    #[test]
    fn test_is_zero() {
        assert!(AclPolicy::default().is_zero());

        let mut policy = AclPolicy::default();
        policy.hosts.insert("a".into(), "10.0.0.1".into());
        assert!(!policy.is_zero());
    }
}
