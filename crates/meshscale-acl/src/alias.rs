//! alias expansion: resolving policy aliases to ip sets over a fleet.
//!
//! every compile path funnels through [`AclPolicy::expand_alias`], which
//! recognizes seven alias kinds: the wildcard, `group:` references,
//! `tag:` references, `autogroup:` predicates, user names, declared host
//! names (recursive), and bare ip addresses or cidr prefixes. an alias
//! matching none of these resolves to the empty set; callers decide
//! whether that is fatal.

use std::collections::HashSet;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::OnceLock;

use ipnet::IpNet;
use tracing::{trace, warn};

use meshscale_types::ipset::{IpSet, IpSetBuilder, all_ips};
use meshscale_types::{Node, filter_by_ip};

use crate::error::{Error, Result};
use crate::policy::AclPolicy;

pub(crate) fn is_wildcard(alias: &str) -> bool {
    alias == "*"
}

pub(crate) fn is_group(alias: &str) -> bool {
    alias.starts_with("group:")
}

pub(crate) fn is_tag(alias: &str) -> bool {
    alias.starts_with("tag:")
}

pub(crate) fn is_autogroup(alias: &str) -> bool {
    alias.starts_with("autogroup:")
}

/// built-in autogroups with an ip expansion.
///
/// `autogroup:nonroot` deliberately has no variant: it names an ssh
/// user-match rule, not a set of addresses, and parsing it here fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autogroup {
    /// everything outside private, mesh, and link-local space.
    Internet,
    /// the current node's user's own nodes.
    SelfNodes,
    /// all untagged nodes.
    Member,
    /// all tagged nodes.
    Tagged,
    /// every address there is. an escape hatch.
    DangerAll,
}

impl FromStr for Autogroup {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "autogroup:internet" => Ok(Autogroup::Internet),
            "autogroup:self" => Ok(Autogroup::SelfNodes),
            "autogroup:member" => Ok(Autogroup::Member),
            "autogroup:tagged" => Ok(Autogroup::Tagged),
            "autogroup:danger-all" => Ok(Autogroup::DangerAll),
            other => Err(Error::UnknownAutogroup(other.to_string())),
        }
    }
}

/// the set for `autogroup:internet`: exit-node traffic.
///
/// the global unicast universe minus rfc1918, ula, the mesh cgnat and
/// ula ranges, and link-local space.
pub fn the_internet() -> &'static IpSet {
    static THE_INTERNET: OnceLock<IpSet> = OnceLock::new();
    THE_INTERNET.get_or_init(|| {
        let mut build = IpSetBuilder::new();
        build.add_prefix("2000::/3".parse().unwrap());
        build.add_prefix("0.0.0.0/0".parse().unwrap());

        // rfc1918 private networks
        build.remove_prefix("fc00::/7".parse().unwrap());
        build.remove_prefix("10.0.0.0/8".parse().unwrap());
        build.remove_prefix("172.16.0.0/12".parse().unwrap());
        build.remove_prefix("192.168.0.0/16".parse().unwrap());

        // the mesh's own address space
        build.remove_prefix("fd7a:115c:a1e0::/48".parse().unwrap());
        build.remove_prefix("100.64.0.0/10".parse().unwrap());

        // link-local
        build.remove_prefix("fe80::/10".parse().unwrap());
        build.remove_prefix("169.254.0.0/16".parse().unwrap());

        build.build()
    })
}

impl AclPolicy {
    /// expand an alias into the set of addresses it stands for.
    ///
    /// `for_node` is the node the artifact is being compiled for; it
    /// anchors `autogroup:self` resolution and may be `None` for
    /// policies that never use it.
    pub fn expand_alias(
        &self,
        nodes: &[Node],
        for_node: Option<&Node>,
        alias: &str,
    ) -> Result<IpSet> {
        self.expand_alias_guarded(nodes, for_node, alias, &mut HashSet::new())
    }

    fn expand_alias_guarded(
        &self,
        nodes: &[Node],
        for_node: Option<&Node>,
        alias: &str,
        visited: &mut HashSet<String>,
    ) -> Result<IpSet> {
        if is_wildcard(alias) {
            return Ok(all_ips().clone());
        }

        trace!(alias, "expanding alias");

        if is_group(alias) {
            return self.expand_ips_from_group(alias, nodes);
        }

        if is_tag(alias) {
            return self.expand_ips_from_tag(alias, nodes);
        }

        if is_autogroup(alias) {
            return self.expand_autogroup(alias, nodes, for_node);
        }

        if let Some(set) = self.expand_ips_from_user(alias, nodes) {
            return Ok(set);
        }

        // host entries may point at literals or other declared names;
        // the visited set bounds recursion through hostile policies
        if let Some(value) = self.hosts.get(alias) {
            if !visited.insert(alias.to_string()) {
                warn!(alias, "host alias cycle; resolving to nothing");
                return Ok(IpSet::default());
            }
            trace!(alias, value = %value, "expanding host entry");
            return self.expand_alias_guarded(nodes, for_node, value, visited);
        }

        if let Ok(ip) = alias.parse::<IpAddr>() {
            return Ok(self.expand_ips_from_single_ip(ip, nodes));
        }

        if let Ok(prefix) = alias.parse::<IpNet>() {
            return Ok(self.expand_ips_from_prefix(prefix, nodes));
        }

        warn!(alias, "no IPs found for alias");

        Ok(IpSet::default())
    }

    /// the users a group expands to.
    ///
    /// groups hold users only; a group inside a group is an error.
    pub(crate) fn expand_users_from_group(&self, group: &str) -> Result<Vec<String>> {
        let members = self.groups.get(group).ok_or_else(|| Error::UnknownGroup {
            group: group.to_string(),
        })?;

        let mut users = Vec::with_capacity(members.len());
        for member in members {
            if is_group(member) {
                return Err(Error::NestedGroup);
            }
            users.push(member.clone());
        }

        Ok(users)
    }

    /// the users allowed to attach a tag, with owner groups flattened.
    pub(crate) fn expand_owners_from_tag(&self, tag: &str) -> Result<Vec<String>> {
        let owners = self.tag_owners.get(tag).ok_or_else(|| Error::InvalidTag {
            tag: tag.to_string(),
        })?;

        let mut users = Vec::new();
        for owner in owners {
            if is_group(owner) {
                users.extend(self.expand_users_from_group(owner)?);
            } else {
                users.push(owner.clone());
            }
        }

        Ok(users)
    }

    /// partition a node's request-tags into valid and invalid.
    ///
    /// a request-tag is valid when the node's user is among the tag's
    /// owners. forced tags are not considered here; they are valid by
    /// definition.
    pub fn tags_of_node(&self, node: &Node) -> (Vec<String>, Vec<String>) {
        let mut valid: Vec<String> = Vec::new();
        let mut invalid: Vec<String> = Vec::new();

        for tag in node.request_tags() {
            if valid.iter().any(|t| t == tag) || invalid.iter().any(|t| t == tag) {
                continue;
            }
            match self.expand_owners_from_tag(tag) {
                Ok(owners) if owners.iter().any(|o| *o == node.user.name) => {
                    valid.push(tag.clone());
                }
                _ => invalid.push(tag.clone()),
            }
        }

        (valid, invalid)
    }

    /// true when the node's membership has shifted from its user to its
    /// tags: it carries a forced tag, or a request-tag owned by `user`.
    fn is_correctly_tagged(&self, node: &Node, user: &str) -> bool {
        if !node.forced_tags.is_empty() {
            return true;
        }
        node.request_tags().iter().any(|tag| {
            self.expand_owners_from_tag(tag)
                .map(|owners| owners.iter().any(|o| o == user))
                .unwrap_or(false)
        })
    }

    fn expand_ips_from_group(&self, group: &str, nodes: &[Node]) -> Result<IpSet> {
        let mut build = IpSetBuilder::new();

        for user in self.expand_users_from_group(group)? {
            for node in filter_nodes_by_user(nodes, &user) {
                node.append_to_ipset(&mut build);
            }
        }

        Ok(build.build())
    }

    fn expand_ips_from_tag(&self, alias: &str, nodes: &[Node]) -> Result<IpSet> {
        let mut build = IpSetBuilder::new();

        // forced tags count regardless of ownership
        for node in nodes {
            if node.has_forced_tag(alias) {
                node.append_to_ipset(&mut build);
            }
        }

        let owners = match self.expand_owners_from_tag(alias) {
            Ok(owners) => owners,
            Err(Error::InvalidTag { tag }) => {
                let set = build.build();
                if set.prefixes().is_empty() {
                    return Err(Error::InvalidTagNoForced { tag });
                }
                return Ok(set);
            }
            Err(err) => return Err(err),
        };

        for user in &owners {
            for node in filter_nodes_by_user(nodes, user) {
                if node.request_tags().iter().any(|t| t == alias) {
                    node.append_to_ipset(&mut build);
                }
            }
        }

        Ok(build.build())
    }

    /// a user's nodes, excluding correctly tagged ones: those belong to
    /// their tag, not their user. returns `None` when the name matches
    /// no nodes, so resolution can fall through to hosts and literals.
    fn expand_ips_from_user(&self, user: &str, nodes: &[Node]) -> Option<IpSet> {
        let owned = filter_nodes_by_user(nodes, user);
        let untagged: Vec<&Node> = owned
            .into_iter()
            .filter(|node| !self.is_correctly_tagged(node, user))
            .collect();

        if untagged.is_empty() {
            return None;
        }

        let mut build = IpSetBuilder::new();
        for node in untagged {
            node.append_to_ipset(&mut build);
        }

        Some(build.build())
    }

    fn expand_ips_from_single_ip(&self, ip: IpAddr, nodes: &[Node]) -> IpSet {
        trace!(%ip, "expanding ip literal");

        let mut build = IpSetBuilder::new();
        build.add(ip);

        // a node holding this address contributes all of its addresses
        for node in filter_by_ip(nodes, ip) {
            node.append_to_ipset(&mut build);
        }

        build.build()
    }

    fn expand_ips_from_prefix(&self, prefix: IpNet, nodes: &[Node]) -> IpSet {
        trace!(%prefix, "expanding cidr prefix");

        let mut build = IpSetBuilder::new();
        build.add_prefix(prefix);

        // nodes inside the prefix contribute their other-family
        // companions too (a v4 prefix alone would miss their v6 addrs)
        for node in nodes {
            if node.ips().iter().any(|ip| prefix.contains(ip)) {
                node.append_to_ipset(&mut build);
            }
        }

        build.build()
    }

    fn expand_autogroup(
        &self,
        alias: &str,
        nodes: &[Node],
        for_node: Option<&Node>,
    ) -> Result<IpSet> {
        match alias.parse::<Autogroup>()? {
            Autogroup::Internet => Ok(the_internet().clone()),

            Autogroup::SelfNodes => {
                let mut build = IpSetBuilder::new();
                if let Some(current) = for_node {
                    for node in nodes {
                        if node.user.id == current.user.id {
                            node.append_to_ipset(&mut build);
                        }
                    }
                }
                Ok(build.build())
            }

            Autogroup::Member => {
                let mut build = IpSetBuilder::new();
                for node in nodes {
                    if !node.forced_tags.is_empty() {
                        continue;
                    }
                    let (valid, _) = self.tags_of_node(node);
                    if !valid.is_empty() {
                        continue;
                    }
                    node.append_to_ipset(&mut build);
                }
                Ok(build.build())
            }

            Autogroup::Tagged => {
                let mut build = IpSetBuilder::new();
                for node in nodes {
                    if !node.forced_tags.is_empty() {
                        node.append_to_ipset(&mut build);
                        continue;
                    }
                    let (valid, _) = self.tags_of_node(node);
                    if !valid.is_empty() {
                        node.append_to_ipset(&mut build);
                    }
                }
                Ok(build.build())
            }

            Autogroup::DangerAll => Ok(all_ips().clone()),
        }
    }
}

pub(crate) fn filter_nodes_by_user<'a>(nodes: &'a [Node], user: &str) -> Vec<&'a Node> {
    nodes.iter().filter(|node| node.user.name == user).collect()
}
