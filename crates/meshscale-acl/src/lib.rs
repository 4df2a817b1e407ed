//! acl policy compilation for meshscale.
//!
//! administrators write one high-level policy document; this crate
//! compiles it, for every node in the fleet, into the two artifacts
//! clients enforce locally: packet filter rules and an ssh policy.
//!
//! the pipeline is: lexical loading of the json superset
//! ([`AclPolicy::from_bytes`]), alias expansion over a fleet snapshot
//! ([`AclPolicy::expand_alias`]), filter compilation
//! ([`AclPolicy::compile_filter_rules`]) and ssh compilation
//! ([`AclPolicy::compile_ssh_policy`]), then per-node reduction
//! ([`reduce_filter_rules`]) and peer visibility
//! ([`filter_nodes_by_acl`]).
//!
//! compilation is pure: it takes a policy value plus a fleet snapshot
//! and performs no i/o. malformed input rejects rather than defaulting
//! to allow; the one deliberate exception is an *absent* policy, which
//! means "allow all" as a bootstrap convenience.

#![warn(missing_docs)]

mod alias;
mod error;
mod filter;
mod hujson;
mod policy;
mod ssh;

pub use alias::{Autogroup, the_internet};
pub use error::{Error, Result};
pub use filter::{
    compile_filter_rules_or_allow_all, filter_nodes_by_acl, parse_destination, parse_protocol,
    reduce_filter_rules,
};
pub use hujson::{NormalizeError, normalize};
pub use policy::{Acl, AclPolicy, SshAclRule};

use meshscale_proto::{FilterRule, SshPolicy, filter_allow_all};
use meshscale_types::Node;

/// compile both artifacts for one recipient node.
///
/// without a policy the node gets the allow-all filter and an empty ssh
/// policy. with one, the filter is compiled over the whole fleet
/// (anchored on `node` for `autogroup:self`) and the ssh policy over
/// the node's peers.
pub fn generate_filter_and_ssh_rules(
    policy: Option<&AclPolicy>,
    node: &Node,
    peers: &[Node],
) -> Result<(Vec<FilterRule>, SshPolicy)> {
    let Some(policy) = policy else {
        return Ok((filter_allow_all(), SshPolicy::default()));
    };

    let mut nodes: Vec<Node> = peers.to_vec();
    nodes.push(node.clone());

    let rules = policy.compile_filter_rules(Some(node), &nodes)?;
    let ssh_policy = policy.compile_ssh_policy(node, peers)?;

    Ok((rules, ssh_policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshscale_types::test_utils::TestNodeBuilder;

    #[test]
    fn test_generate_without_policy_allows_all() {
        let node = TestNodeBuilder::new(1).build();
        let (rules, ssh) = generate_filter_and_ssh_rules(None, &node, &[]).unwrap();
        assert_eq!(rules, filter_allow_all());
        assert!(ssh.rules.is_empty());
    }

    #[test]
    fn test_generate_with_policy() {
        let policy = AclPolicy::from_bytes(
            br#"{
                "acls": [
                    {"action": "accept", "src": ["*"], "dst": ["*:*"]}
                ],
                "ssh": [
                    {"action": "accept", "src": ["*"], "dst": ["*"], "users": ["ubuntu"]}
                ]
            }"#,
        )
        .unwrap();
        let node = TestNodeBuilder::new(1).build();
        let peer = TestNodeBuilder::new(2).build();

        let (rules, ssh) =
            generate_filter_and_ssh_rules(Some(&policy), &node, &[peer]).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(ssh.rules.len(), 1);
        assert_eq!(ssh.rules[0].principals[0].any, Some(true));
    }

    #[test]
    fn test_generate_surfaces_compile_errors() {
        let policy = AclPolicy::from_bytes(
            br#"{"acls": [{"action": "block", "src": ["*"], "dst": ["*:*"]}]}"#,
        )
        .unwrap();
        let node = TestNodeBuilder::new(1).build();

        let err = generate_filter_and_ssh_rules(Some(&policy), &node, &[]).unwrap_err();
        assert!(matches!(err, Error::InvalidAction { .. }));
    }
}
