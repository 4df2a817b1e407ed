//! packet filter rules distributed to clients.

use serde::{Deserialize, Serialize};

/// first port of the full range.
pub const PORT_RANGE_BEGIN: u16 = 0;

/// last port of the full range.
pub const PORT_RANGE_END: u16 = 65535;

/// a single packet filter rule.
///
/// clients match incoming packets against the source prefixes and the
/// destination (prefix, port range) pairs. an empty protocol list means
/// the default set: icmpv4, icmpv6, tcp, and udp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// source ip prefixes, or the literal `"*"` for all addresses.
    #[serde(rename = "srcIPs")]
    pub src_ips: Vec<String>,

    /// allowed destinations as (prefix, port range) pairs.
    #[serde(rename = "dstPorts")]
    pub dst_ports: Vec<NetPortRange>,

    /// iana ip protocol numbers this rule applies to.
    #[serde(rename = "ipProto", default, skip_serializing_if = "Vec::is_empty")]
    pub ip_proto: Vec<i32>,
}

/// an ip prefix paired with a destination port range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetPortRange {
    /// destination prefix, single address, or `"*"`.
    #[serde(rename = "IP")]
    pub ip: String,

    /// destination port range (inclusive on both ends).
    #[serde(rename = "Ports")]
    pub ports: PortRange,
}

/// an inclusive port range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    /// first port of the range.
    #[serde(rename = "First")]
    pub first: u16,

    /// last port of the range.
    #[serde(rename = "Last")]
    pub last: u16,
}

impl PortRange {
    /// the full 0-65535 range.
    pub const ALL: PortRange = PortRange {
        first: PORT_RANGE_BEGIN,
        last: PORT_RANGE_END,
    };
}

/// the filter distributed when no policy is configured: allow everything.
pub fn filter_allow_all() -> Vec<FilterRule> {
    vec![FilterRule {
        src_ips: vec!["*".to_string()],
        dst_ports: vec![NetPortRange {
            ip: "*".to_string(),
            ports: PortRange::ALL,
        }],
        ip_proto: Vec::new(),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rule_wire_format() {
        let rule = FilterRule {
            src_ips: vec!["100.64.0.1/32".to_string()],
            dst_ports: vec![NetPortRange {
                ip: "100.64.0.2/32".to_string(),
                ports: PortRange {
                    first: 22,
                    last: 22,
                },
            }],
            ip_proto: vec![6],
        };

        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(
            json,
            r#"{"srcIPs":["100.64.0.1/32"],"dstPorts":[{"IP":"100.64.0.2/32","Ports":{"First":22,"Last":22}}],"ipProto":[6]}"#
        );
    }

    #[test]
    fn test_empty_ip_proto_omitted() {
        let rule = FilterRule {
            src_ips: vec!["*".to_string()],
            dst_ports: vec![],
            ip_proto: vec![],
        };

        let json = serde_json::to_string(&rule).unwrap();
        assert!(!json.contains("ipProto"));
    }

    #[test]
    fn test_ip_proto_defaults_on_deserialize() {
        let json = r#"{"srcIPs":["*"],"dstPorts":[]}"#;
        let rule: FilterRule = serde_json::from_str(json).unwrap();
        assert!(rule.ip_proto.is_empty());
    }

    #[test]
    fn test_filter_allow_all_shape() {
        let rules = filter_allow_all();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].src_ips, vec!["*"]);
        assert_eq!(rules[0].dst_ports.len(), 1);
        assert_eq!(rules[0].dst_ports[0].ip, "*");
        assert_eq!(rules[0].dst_ports[0].ports, PortRange::ALL);
        assert!(rules[0].ip_proto.is_empty());
    }

    #[test]
    fn test_filter_rule_roundtrip() {
        let rules = filter_allow_all();
        let json = serde_json::to_string(&rules).unwrap();
        let parsed: Vec<FilterRule> = serde_json::from_str(&json).unwrap();
        assert_eq!(rules, parsed);
    }
}
