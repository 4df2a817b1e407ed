//! filter rule compilation and per-node reduction.
//!
//! [`AclPolicy::compile_filter_rules`] turns the policy's access rules
//! into the wire filter, expanding aliases over the fleet and applying
//! the `autogroup:self` split. [`reduce_filter_rules`] then strips a
//! compiled filter down to what one recipient actually needs.

use std::net::IpAddr;

use tracing::trace;

use meshscale_proto::{FilterRule, NetPortRange, PortRange, filter_allow_all};
use meshscale_types::Node;
use meshscale_types::ipset::parse_ip_set;

use crate::alias::is_wildcard;
use crate::error::{Error, Result};
use crate::policy::{Acl, AclPolicy};

// iana assigned internet protocol numbers
const PROTOCOL_ICMP: i32 = 1;
const PROTOCOL_IGMP: i32 = 2;
const PROTOCOL_IPV4: i32 = 4;
const PROTOCOL_TCP: i32 = 6;
const PROTOCOL_EGP: i32 = 8;
const PROTOCOL_IGP: i32 = 9;
const PROTOCOL_UDP: i32 = 17;
const PROTOCOL_GRE: i32 = 47;
const PROTOCOL_ESP: i32 = 50;
const PROTOCOL_AH: i32 = 51;
const PROTOCOL_IPV6_ICMP: i32 = 58;
const PROTOCOL_SCTP: i32 = 132;

const AUTOGROUP_SELF: &str = "autogroup:self";
const AUTOGROUP_MEMBER: &str = "autogroup:member";

/// map an acl `proto` field to iana protocol numbers.
///
/// an empty protocol yields no explicit numbers; clients treat that as
/// the default set (icmpv4, icmpv6, tcp, udp). the second value is true
/// when the protocol cannot carry ports and destinations must use `*`.
pub fn parse_protocol(protocol: &str) -> Result<(Vec<i32>, bool)> {
    match protocol {
        "" => Ok((Vec::new(), false)),
        "igmp" => Ok((vec![PROTOCOL_IGMP], true)),
        "ipv4" | "ip-in-ip" => Ok((vec![PROTOCOL_IPV4], true)),
        "tcp" => Ok((vec![PROTOCOL_TCP], false)),
        "egp" => Ok((vec![PROTOCOL_EGP], true)),
        "igp" => Ok((vec![PROTOCOL_IGP], true)),
        "udp" => Ok((vec![PROTOCOL_UDP], false)),
        "gre" => Ok((vec![PROTOCOL_GRE], true)),
        "esp" => Ok((vec![PROTOCOL_ESP], true)),
        "ah" => Ok((vec![PROTOCOL_AH], true)),
        "sctp" => Ok((vec![PROTOCOL_SCTP], false)),
        "icmp" => Ok((vec![PROTOCOL_ICMP, PROTOCOL_IPV6_ICMP], true)),
        other => {
            let number: i32 = other.parse().map_err(|_| Error::UnknownProtocol {
                proto: other.to_string(),
            })?;
            let needs_wildcard =
                number != PROTOCOL_TCP && number != PROTOCOL_UDP && number != PROTOCOL_SCTP;
            Ok((vec![number], needs_wildcard))
        }
    }
}

/// expand a port spec (`*`, `N`, `N-M`, or a comma list) into ranges.
fn expand_ports(port_spec: &str, requires_wildcard: bool) -> Result<Vec<PortRange>> {
    if is_wildcard(port_spec) {
        return Ok(vec![PortRange::ALL]);
    }

    if requires_wildcard {
        return Err(Error::WildcardRequired);
    }

    let mut ports = Vec::new();
    for part in port_spec.split(',') {
        trace!(part, "parsing port range");
        match part.split('-').collect::<Vec<_>>().as_slice() {
            [single] => {
                let port = parse_port(single, port_spec)?;
                ports.push(PortRange {
                    first: port,
                    last: port,
                });
            }
            [first, last] => {
                ports.push(PortRange {
                    first: parse_port(first, port_spec)?,
                    last: parse_port(last, port_spec)?,
                });
            }
            _ => {
                return Err(Error::InvalidPortFormat {
                    spec: port_spec.to_string(),
                });
            }
        }
    }

    Ok(ports)
}

fn parse_port(port: &str, spec: &str) -> Result<u16> {
    port.parse().map_err(|_| Error::InvalidPortFormat {
        spec: spec.to_string(),
    })
}

/// split a destination entry into its alias and port spec.
///
/// entries look like `git-server:*`, `192.168.0.0/24:22`,
/// `tag:web:80,443`, or a bracketless ipv6 literal (optionally with a
/// prefix length) followed by `:port`, such as `fd7a:115c:a1e0::2:22`.
pub fn parse_destination(dest: &str) -> Result<(String, String)> {
    let tokens: Vec<&str> = dest.split(':').collect();

    match tokens.len() {
        2 => Ok((tokens[0].to_string(), tokens[1].to_string())),
        3 => Ok((format!("{}:{}", tokens[0], tokens[1]), tokens[2].to_string())),
        _ => {
            // too many separators for an alias: peel a trailing `:port`
            // and see whether the rest reads as an ipv6 literal
            let Some((head, port)) = dest.rsplit_once(':') else {
                return Err(Error::InvalidPortFormat {
                    spec: dest.to_string(),
                });
            };
            let addr_part = head.split('/').next().unwrap_or(head);
            if addr_part.parse::<IpAddr>().is_ok() {
                Ok((head.to_string(), port.to_string()))
            } else {
                Err(Error::InvalidPortFormat {
                    spec: dest.to_string(),
                })
            }
        }
    }
}

impl AclPolicy {
    /// compile the policy's access rules into client filter rules.
    ///
    /// `target` is the node the filter is compiled for; it anchors
    /// `autogroup:self` resolution. policies that never use
    /// `autogroup:self` compile identically for every target.
    pub fn compile_filter_rules(
        &self,
        target: Option<&Node>,
        nodes: &[Node],
    ) -> Result<Vec<FilterRule>> {
        let mut rules = Vec::new();

        // the self-split appends to this working list while it is being
        // walked; iterating by growing index keeps appended rules in
        // scope. this is the only place compilation mutates its input.
        let mut acls = self.acls.clone();
        let mut index = 0;

        while index < acls.len() {
            let acl = acls[index].clone();

            if acl.action != "accept" {
                return Err(Error::InvalidAction {
                    action: acl.action.clone(),
                });
            }

            let mut destinations = acl.destinations.clone();

            let mut src_ips = Vec::new();
            for source in &acl.sources {
                let mut source = source.as_str();
                if source.starts_with(AUTOGROUP_MEMBER) {
                    let (new_dst, old_dst): (Vec<String>, Vec<String>) = destinations
                        .iter()
                        .cloned()
                        .partition(|dst| dst.starts_with(AUTOGROUP_SELF));

                    if old_dst.is_empty() {
                        // every destination is self-flavored: narrow the
                        // source in place
                        source = AUTOGROUP_SELF;
                    } else if !new_dst.is_empty() {
                        // mixed: keep the plain destinations here and
                        // synthesize a self rule for the rest
                        destinations = old_dst;
                        acls.push(Acl {
                            action: acl.action.clone(),
                            sources: vec![AUTOGROUP_SELF.to_string()],
                            destinations: new_dst,
                            ..Default::default()
                        });
                    }
                }

                if is_wildcard(source) {
                    src_ips.push("*".to_string());
                    continue;
                }
                let expanded = self.expand_alias(nodes, target, source)?;
                src_ips.extend(expanded.prefixes().iter().map(ToString::to_string));
            }

            let (protocols, requires_wildcard) = parse_protocol(&acl.protocol)?;

            let mut dst_ports = Vec::new();
            for dest in &destinations {
                let (alias, port) = parse_destination(dest)?;

                if alias.starts_with(AUTOGROUP_SELF) {
                    let allowed = acl.sources.len() == 1
                        && (acl.sources[0] == AUTOGROUP_SELF || acl.sources[0] == AUTOGROUP_MEMBER);
                    if !allowed {
                        return Err(Error::AutogroupSelfRequirement);
                    }
                }

                let prefixes: Vec<String> = if is_wildcard(&alias) {
                    vec!["*".to_string()]
                } else {
                    self.expand_alias(nodes, target, &alias)?
                        .prefixes()
                        .iter()
                        .map(ToString::to_string)
                        .collect()
                };

                let ports = expand_ports(&port, requires_wildcard)?;

                for prefix in &prefixes {
                    for range in &ports {
                        dst_ports.push(NetPortRange {
                            ip: prefix.clone(),
                            ports: *range,
                        });
                    }
                }
            }

            rules.push(FilterRule {
                src_ips,
                dst_ports,
                ip_proto: protocols,
            });

            index += 1;
        }

        Ok(rules)
    }
}

/// compile filter rules for an optional policy.
///
/// an absent policy means "allow all" - a deliberate bootstrap
/// convenience, not a fail-open default for malformed input.
pub fn compile_filter_rules_or_allow_all(
    policy: Option<&AclPolicy>,
    target: Option<&Node>,
    nodes: &[Node],
) -> Result<Vec<FilterRule>> {
    match policy {
        Some(policy) => policy.compile_filter_rules(target, nodes),
        None => Ok(filter_allow_all()),
    }
}

/// strip rules and destinations that do not concern the given node.
///
/// a destination survives when its prefix covers one of the node's
/// addresses or overlaps a route the node advertises. destinations that
/// do not parse are dropped: the node cannot enforce what it cannot
/// read. rules left without destinations are dropped entirely.
pub fn reduce_filter_rules(node: &Node, rules: &[FilterRule]) -> Vec<FilterRule> {
    let mut ret = Vec::new();

    for rule in rules {
        let mut dests = Vec::new();

        for dest in &rule.dst_ports {
            let Ok(expanded) = parse_ip_set(&dest.ip) else {
                continue;
            };

            if node.in_ipset(&expanded) {
                dests.push(dest.clone());
                continue;
            }

            if node
                .routable_ips()
                .iter()
                .any(|route| expanded.overlaps_prefix(*route))
            {
                dests.push(dest.clone());
            }
        }

        if !dests.is_empty() {
            ret.push(FilterRule {
                src_ips: rule.src_ips.clone(),
                dst_ports: dests,
                ip_proto: rule.ip_proto.clone(),
            });
        }
    }

    ret
}

/// the peers a node may communicate with under the given filter.
///
/// a peer is visible when either direction is permitted. the node
/// itself is excluded.
pub fn filter_nodes_by_acl<'a>(
    node: &Node,
    nodes: &'a [Node],
    filter: &[FilterRule],
) -> Vec<&'a Node> {
    let mut result = Vec::new();

    for peer in nodes {
        if peer.id == node.id {
            continue;
        }
        if node.can_access(filter, peer) || peer.can_access(filter, node) {
            result.push(peer);
        }
    }

    result
}
