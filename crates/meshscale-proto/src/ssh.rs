//! ssh policy types distributed to clients.
//!
//! rules are evaluated in order on the receiving node; the first matching
//! rule wins. the wire format uses camelcase field names and encodes
//! session durations as nanoseconds.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// ssh policy for a single recipient node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshPolicy {
    /// ssh rules to evaluate for incoming connections.
    pub rules: Vec<SshRule>,
}

/// a single ssh rule matching principals to an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshRule {
    /// principals that can match this rule (or logic).
    pub principals: Vec<SshPrincipal>,

    /// ssh user to local user mapping.
    ///
    /// values are the literal `"="`, meaning the requested user is matched
    /// as itself.
    pub ssh_users: HashMap<String, String>,

    /// action to take when the rule matches.
    pub action: SshAction,
}

/// who an ssh rule applies to.
///
/// exactly one field is set per principal; any set field that matches the
/// incoming connection causes a match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SshPrincipal {
    /// node identified by one of its mesh addresses.
    #[serde(rename = "nodeIP", skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<String>,

    /// user identified by login name.
    #[serde(rename = "userLogin", skip_serializing_if = "Option::is_none")]
    pub user_login: Option<String>,

    /// match any connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub any: Option<bool>,
}

/// what to do with a matching ssh connection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshAction {
    /// accept the connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept: Option<bool>,

    /// reject the connection (takes priority over accept).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reject: Option<bool>,

    /// maximum session length, encoded as nanoseconds on the wire.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_duration_nanos",
        deserialize_with = "deserialize_duration_nanos",
        default
    )]
    pub session_duration: Option<std::time::Duration>,

    /// allow ssh agent forwarding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_agent_forwarding: Option<bool>,

    /// url for hold-and-delegate authorization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_and_delegate: Option<String>,

    /// allow local port forwarding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_local_port_forwarding: Option<bool>,
}

fn serialize_duration_nanos<S>(
    duration: &Option<std::time::Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match duration {
        Some(d) => serializer.serialize_i64(d.as_nanos() as i64),
        None => serializer.serialize_none(),
    }
}

fn deserialize_duration_nanos<'de, D>(
    deserializer: D,
) -> Result<Option<std::time::Duration>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let nanos: Option<i64> = Option::deserialize(deserializer)?;
    Ok(nanos.map(|n| std::time::Duration::from_nanos(n as u64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssh_policy_empty_serializes() {
        let policy = SshPolicy::default();
        let json = serde_json::to_string(&policy).unwrap();
        assert_eq!(json, r#"{"rules":[]}"#);
    }

    #[test]
    fn test_ssh_principal_node_ip_only() {
        let principal = SshPrincipal {
            node_ip: Some("100.64.0.2".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&principal).unwrap();
        assert_eq!(json, r#"{"nodeIP":"100.64.0.2"}"#);
    }

    #[test]
    fn test_ssh_action_duration_nanos() {
        let action = SshAction {
            accept: Some(true),
            session_duration: Some(std::time::Duration::from_secs(12 * 60 * 60)),
            allow_local_port_forwarding: Some(true),
            ..Default::default()
        };
        let json = serde_json::to_string(&action).unwrap();

        // 12 hours in nanoseconds
        assert!(json.contains(r#""sessionDuration":43200000000000"#));
        assert!(json.contains(r#""accept":true"#));
        assert!(json.contains(r#""allowLocalPortForwarding":true"#));
        assert!(!json.contains("reject"));
    }

    #[test]
    fn test_ssh_action_duration_deserialize() {
        let json = r#"{"accept":true,"sessionDuration":43200000000000}"#;
        let action: SshAction = serde_json::from_str(json).unwrap();

        assert_eq!(action.accept, Some(true));
        assert_eq!(
            action.session_duration,
            Some(std::time::Duration::from_secs(12 * 60 * 60))
        );
    }

    #[test]
    fn test_ssh_rule_field_names() {
        let rule = SshRule {
            principals: vec![SshPrincipal {
                user_login: Some("alice".to_string()),
                ..Default::default()
            }],
            ssh_users: [("ubuntu".to_string(), "=".to_string())]
                .into_iter()
                .collect(),
            action: SshAction {
                accept: Some(true),
                ..Default::default()
            },
        };

        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains(r#""principals""#));
        assert!(json.contains(r#""sshUsers""#));
        assert!(json.contains(r#""userLogin""#));
        assert!(json.contains(r#""ubuntu":"=""#));
    }

    #[test]
    fn test_ssh_policy_roundtrip() {
        let policy = SshPolicy {
            rules: vec![SshRule {
                principals: vec![SshPrincipal {
                    any: Some(true),
                    ..Default::default()
                }],
                ssh_users: [("root".to_string(), "=".to_string())].into_iter().collect(),
                action: SshAction {
                    reject: Some(true),
                    ..Default::default()
                },
            }],
        };

        let json = serde_json::to_string(&policy).unwrap();
        let parsed: SshPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, parsed);
    }
}
