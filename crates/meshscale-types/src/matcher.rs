//! filter rule matching for node-to-node access checks.
//!
//! a compiled filter rule carries its sources and destinations as
//! strings. the matcher parses them back into ip sets once so a rule can
//! be tested against many address pairs.

use std::net::IpAddr;

use meshscale_proto::FilterRule;

use crate::ipset::{IpSet, IpSetBuilder, parse_ip_set};

/// a filter rule with its source and destination sets parsed for matching.
#[derive(Debug, Clone)]
pub struct Match {
    srcs: IpSet,
    dests: IpSet,
}

impl Match {
    /// parse a wire filter rule into matchable ip sets.
    ///
    /// entries that do not parse are skipped; a prefix the matcher cannot
    /// read must not widen access.
    pub fn from_filter_rule(rule: &FilterRule) -> Self {
        let mut srcs = IpSetBuilder::new();
        for src in &rule.src_ips {
            if let Ok(set) = parse_ip_set(src) {
                srcs.add_set(&set);
            }
        }

        let mut dests = IpSetBuilder::new();
        for dest in &rule.dst_ports {
            if let Ok(set) = parse_ip_set(&dest.ip) {
                dests.add_set(&set);
            }
        }

        Match {
            srcs: srcs.build(),
            dests: dests.build(),
        }
    }

    /// true when any of the given addresses matches the rule's sources.
    pub fn srcs_contain_ips(&self, ips: &[IpAddr]) -> bool {
        ips.iter().any(|ip| self.srcs.contains(*ip))
    }

    /// true when any of the given addresses matches the rule's destinations.
    pub fn dests_contain_ips(&self, ips: &[IpAddr]) -> bool {
        ips.iter().any(|ip| self.dests.contains(*ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshscale_proto::{NetPortRange, PortRange};

    fn rule(srcs: &[&str], dests: &[&str]) -> FilterRule {
        FilterRule {
            src_ips: srcs.iter().map(|s| s.to_string()).collect(),
            dst_ports: dests
                .iter()
                .map(|d| NetPortRange {
                    ip: d.to_string(),
                    ports: PortRange::ALL,
                })
                .collect(),
            ip_proto: vec![],
        }
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_match_prefix_sources() {
        let m = Match::from_filter_rule(&rule(&["100.64.0.0/24"], &["100.64.1.1/32"]));

        assert!(m.srcs_contain_ips(&[ip("100.64.0.7")]));
        assert!(!m.srcs_contain_ips(&[ip("100.64.1.7")]));
        assert!(m.dests_contain_ips(&[ip("100.64.1.1")]));
        assert!(!m.dests_contain_ips(&[ip("100.64.1.2")]));
    }

    #[test]
    fn test_match_wildcard() {
        let m = Match::from_filter_rule(&rule(&["*"], &["*"]));
        assert!(m.srcs_contain_ips(&[ip("8.8.8.8")]));
        assert!(m.dests_contain_ips(&[ip("2001:db8::1")]));
    }

    #[test]
    fn test_match_skips_unparseable() {
        let m = Match::from_filter_rule(&rule(&["not-an-ip", "10.0.0.0/8"], &["junk"]));
        assert!(m.srcs_contain_ips(&[ip("10.1.1.1")]));
        assert!(!m.dests_contain_ips(&[ip("10.1.1.1")]));
    }
}
