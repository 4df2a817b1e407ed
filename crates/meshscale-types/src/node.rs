//! node type representing a device in the mesh.
//!
//! nodes are the core entity in meshscale. every node belongs to a user;
//! a node can additionally carry tags, either self-asserted by the client
//! (request-tags, subject to policy validation) or administratively
//! assigned (forced tags, always valid).

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use meshscale_proto::FilterRule;

use crate::ipset::{IpSet, IpSetBuilder};
use crate::matcher::Match;
use crate::tag::Tag;
use crate::user::User;

/// unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// a meshscale node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// unique identifier.
    pub id: NodeId,

    /// the owning user.
    pub user: User,

    /// hostname reported by the client during registration.
    pub hostname: String,

    /// dns-safe name for the node.
    pub given_name: String,

    /// ipv4 address assigned to this node.
    pub ipv4: Option<IpAddr>,

    /// ipv6 address assigned to this node.
    pub ipv6: Option<IpAddr>,

    /// host information from the client, carrying request-tags and
    /// advertised routes.
    pub hostinfo: Option<HostInfo>,

    /// tags assigned administratively; valid regardless of policy.
    pub forced_tags: Vec<Tag>,

    /// when the node registration expires.
    pub expiry: Option<DateTime<Utc>>,

    /// last time the node contacted the server.
    pub last_seen: Option<DateTime<Utc>>,

    /// when the node was created.
    pub created_at: DateTime<Utc>,

    /// when the node was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// returns whether the node registration has expired.
    pub fn is_expired(&self) -> bool {
        match &self.expiry {
            None => false,
            Some(expiry) => Utc::now() > *expiry,
        }
    }

    /// returns all ip addresses assigned to this node.
    pub fn ips(&self) -> Vec<IpAddr> {
        let mut ips = Vec::with_capacity(2);
        if let Some(ip) = self.ipv4 {
            ips.push(ip);
        }
        if let Some(ip) = self.ipv6 {
            ips.push(ip);
        }
        ips
    }

    /// returns whether the node carries a specific forced tag.
    pub fn has_forced_tag(&self, tag: &str) -> bool {
        self.forced_tags.iter().any(|t| t == tag)
    }

    /// the tags the client asserted for itself, unvalidated.
    pub fn request_tags(&self) -> &[String] {
        self.hostinfo
            .as_ref()
            .map(|h| h.request_tags.as_slice())
            .unwrap_or(&[])
    }

    /// the routes the node advertises.
    pub fn routable_ips(&self) -> &[IpNet] {
        self.hostinfo
            .as_ref()
            .map(|h| h.routable_ips.as_slice())
            .unwrap_or(&[])
    }

    /// add all of the node's addresses to an ip set builder.
    pub fn append_to_ipset(&self, build: &mut IpSetBuilder) {
        for ip in self.ips() {
            build.add(ip);
        }
    }

    /// returns whether any of the node's addresses is in the set.
    pub fn in_ipset(&self, set: &IpSet) -> bool {
        self.ips().iter().any(|ip| set.contains(*ip))
    }

    /// returns whether this node may reach `other` under the given filter.
    pub fn can_access(&self, filter: &[FilterRule], other: &Node) -> bool {
        let src = self.ips();
        let dst = other.ips();

        filter.iter().any(|rule| {
            let matcher = Match::from_filter_rule(rule);
            matcher.srcs_contain_ips(&src) && matcher.dests_contain_ips(&dst)
        })
    }
}

/// returns the nodes holding the given address.
pub fn filter_by_ip<'a>(nodes: &'a [Node], ip: IpAddr) -> Vec<&'a Node> {
    nodes
        .iter()
        .filter(|node| node.ipv4 == Some(ip) || node.ipv6 == Some(ip))
        .collect()
}

/// host information reported by the client.
///
/// field names match the client's wire struct (pascalcase in json). only
/// the fields the server consumes are modeled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostInfo {
    /// client version (e.g. "1.80.0").
    #[serde(rename = "IPNVersion", default)]
    pub ipn_version: Option<String>,

    /// operating system (e.g. "linux", "darwin").
    #[serde(rename = "OS", default)]
    pub os: Option<String>,

    /// hostname of the device.
    #[serde(default)]
    pub hostname: Option<String>,

    /// routes this node wants to advertise.
    #[serde(rename = "RoutableIPs", default)]
    pub routable_ips: Vec<IpNet>,

    /// tags the node is requesting; validity is a policy decision.
    #[serde(default)]
    pub request_tags: Vec<String>,
}
