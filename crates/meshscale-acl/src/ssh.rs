//! ssh policy compilation.
//!
//! unlike the packet filter, ssh policies are per-recipient: a rule only
//! makes it into a node's policy when the node is in the rule's
//! destination set. principals are built from the rule's sources; users
//! map to the literal `=`, matching the requested unix user as itself.

use std::collections::HashMap;

use meshscale_proto::{SshAction, SshPolicy, SshPrincipal, SshRule};
use meshscale_types::Node;
use meshscale_types::ipset::IpSetBuilder;

use crate::alias::{is_group, is_wildcard};
use crate::error::{Error, Result};
use crate::policy::{AclPolicy, SshAclRule};

const AUTOGROUP_SELF: &str = "autogroup:self";
const AUTOGROUP_MEMBER: &str = "autogroup:member";

fn accept_action() -> SshAction {
    SshAction {
        accept: Some(true),
        allow_local_port_forwarding: Some(true),
        ..Default::default()
    }
}

fn reject_action() -> SshAction {
    SshAction {
        reject: Some(true),
        ..Default::default()
    }
}

fn check_action(period: &str) -> Result<SshAction> {
    let duration = humantime::parse_duration(period).map_err(|source| Error::InvalidCheckPeriod {
        value: period.to_string(),
        source,
    })?;

    Ok(SshAction {
        accept: Some(true),
        session_duration: Some(duration),
        allow_local_port_forwarding: Some(true),
        ..Default::default()
    })
}

impl AclPolicy {
    /// compile the ssh rules that apply to `node`.
    ///
    /// rules whose destination set does not cover the node are skipped
    /// entirely. source expansion resolves against `peers`; destination
    /// expansion sees the whole fleet including the recipient.
    pub fn compile_ssh_policy(&self, node: &Node, peers: &[Node]) -> Result<SshPolicy> {
        let mut all_nodes: Vec<Node> = peers.to_vec();
        all_nodes.push(node.clone());

        let mut rules = Vec::new();

        // like the filter compiler, the self-split below may append to
        // the working list during iteration
        let mut sshs = self.ssh.clone();
        let mut index = 0;

        while index < sshs.len() {
            let ssh_rule = sshs[index].clone();
            let mut destinations = ssh_rule.destinations.clone();

            let mut dest = IpSetBuilder::new();
            for dst in &destinations {
                if dst.starts_with(AUTOGROUP_SELF) {
                    let allowed = ssh_rule.sources.len() == 1
                        && (ssh_rule.sources[0] == AUTOGROUP_SELF
                            || ssh_rule.sources[0] == AUTOGROUP_MEMBER);
                    if !allowed {
                        return Err(Error::AutogroupSelfRequirement);
                    }
                }

                let expanded = self.expand_alias(&all_nodes, Some(node), dst)?;
                dest.add_set(&expanded);
            }

            // ssh rules are not broadcast: skip rules that don't target
            // the recipient
            if !node.in_ipset(&dest.build()) {
                index += 1;
                continue;
            }

            let action = match ssh_rule.action.as_str() {
                "accept" => accept_action(),
                "check" => check_action(ssh_rule.check_period.as_deref().unwrap_or_default())?,
                "" => reject_action(),
                other => {
                    return Err(Error::InvalidAction {
                        action: other.to_string(),
                    });
                }
            };

            let mut principals = Vec::with_capacity(ssh_rule.sources.len());
            for raw_src in &ssh_rule.sources {
                let mut raw_src = raw_src.as_str();

                if is_wildcard(raw_src) {
                    principals.push(SshPrincipal {
                        any: Some(true),
                        ..Default::default()
                    });
                } else if is_group(raw_src) {
                    for user in self.expand_users_from_group(raw_src)? {
                        principals.push(SshPrincipal {
                            user_login: Some(user),
                            ..Default::default()
                        });
                    }
                } else {
                    if raw_src.starts_with(AUTOGROUP_MEMBER) {
                        let (new_dst, old_dst): (Vec<String>, Vec<String>) = destinations
                            .iter()
                            .cloned()
                            .partition(|dst| dst.starts_with(AUTOGROUP_SELF));

                        if old_dst.is_empty() {
                            raw_src = AUTOGROUP_SELF;
                        } else if !new_dst.is_empty() {
                            destinations = old_dst;
                            sshs.push(SshAclRule {
                                action: ssh_rule.action.clone(),
                                check_period: ssh_rule.check_period.clone(),
                                sources: vec![AUTOGROUP_SELF.to_string()],
                                destinations: new_dst,
                                users: ssh_rule.users.clone(),
                            });
                        }
                    }

                    let expanded = self.expand_alias(peers, Some(node), raw_src)?;
                    for prefix in expanded.prefixes() {
                        principals.push(SshPrincipal {
                            node_ip: Some(prefix.addr().to_string()),
                            ..Default::default()
                        });
                    }
                }
            }

            let ssh_users: HashMap<String, String> = ssh_rule
                .users
                .iter()
                .map(|user| (user.clone(), "=".to_string()))
                .collect();

            rules.push(SshRule {
                principals,
                ssh_users,
                action,
            });

            index += 1;
        }

        Ok(SshPolicy { rules })
    }
}
