//! test utilities for creating test nodes and other fixtures.
//!
//! this module provides builder patterns for creating test instances of
//! meshscale types without needing to specify all fields.

use std::net::{IpAddr, Ipv4Addr};

use chrono::Utc;
use ipnet::IpNet;

use crate::{HostInfo, Node, NodeId, Tag, User, UserId};

/// builder for creating test [`Node`] instances.
///
/// # example
/// ```
/// use meshscale_types::test_utils::TestNodeBuilder;
///
/// let node = TestNodeBuilder::new(1).build();
/// let tagged = TestNodeBuilder::new(2)
///     .with_forced_tags(vec!["tag:server".parse().unwrap()])
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestNodeBuilder {
    id: u64,
    user: Option<User>,
    hostname: Option<String>,
    ipv4: Option<IpAddr>,
    ipv6: Option<IpAddr>,
    forced_tags: Vec<Tag>,
    request_tags: Vec<String>,
    routable_ips: Vec<IpNet>,
}

impl TestNodeBuilder {
    /// create a new builder with the given node id.
    ///
    /// unless overridden, the node belongs to a synthetic user named
    /// `user-<id>` and holds the address `100.64.0.<id>`.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            user: None,
            hostname: None,
            ipv4: None,
            ipv6: None,
            forced_tags: vec![],
            request_tags: vec![],
            routable_ips: vec![],
        }
    }

    /// set the owning user.
    pub fn with_user(mut self, id: u64, name: impl Into<String>) -> Self {
        self.user = Some(User::new(UserId(id), name));
        self
    }

    /// set a custom hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// set the ipv4 address.
    pub fn with_ipv4(mut self, ip: IpAddr) -> Self {
        self.ipv4 = Some(ip);
        self
    }

    /// set the ipv6 address.
    pub fn with_ipv6(mut self, ip: IpAddr) -> Self {
        self.ipv6 = Some(ip);
        self
    }

    /// set forced (administratively assigned) tags.
    pub fn with_forced_tags(mut self, tags: Vec<Tag>) -> Self {
        self.forced_tags = tags;
        self
    }

    /// set the tags the client requests for itself.
    pub fn with_request_tags(mut self, tags: Vec<String>) -> Self {
        self.request_tags = tags;
        self
    }

    /// set the routes the node advertises.
    pub fn with_routable_ips(mut self, routes: Vec<IpNet>) -> Self {
        self.routable_ips = routes;
        self
    }

    /// build the [`Node`].
    pub fn build(self) -> Node {
        let hostname = self.hostname.unwrap_or_else(|| format!("node-{}", self.id));
        let user = self
            .user
            .unwrap_or_else(|| User::new(UserId(self.id), format!("user-{}", self.id)));

        let hostinfo = if self.request_tags.is_empty() && self.routable_ips.is_empty() {
            None
        } else {
            Some(HostInfo {
                request_tags: self.request_tags,
                routable_ips: self.routable_ips,
                ..Default::default()
            })
        };

        let now = Utc::now();

        Node {
            id: NodeId(self.id),
            user,
            hostname: hostname.clone(),
            given_name: hostname,
            ipv4: self
                .ipv4
                .or_else(|| Some(IpAddr::V4(Ipv4Addr::new(100, 64, 0, self.id as u8)))),
            ipv6: self.ipv6,
            hostinfo,
            forced_tags: self.forced_tags,
            expiry: None,
            last_seen: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}
