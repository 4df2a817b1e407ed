//! finite unions of ip prefixes.
//!
//! the policy compiler accumulates addresses into an [`IpSetBuilder`] and
//! then works with the immutable [`IpSet`]: containment, prefix overlap,
//! and enumeration as a canonical list of disjoint prefixes. ipv4 and
//! ipv6 contents are tracked separately; nothing here coerces between
//! families.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;

use ipnet::{IpNet, Ipv4Subnets, Ipv6Subnets};

use crate::error::Error;

// inclusive address ranges; ipv4 addresses live in the low 32 bits.
type Range = (u128, u128);

fn normalize(ranges: &mut Vec<Range>) {
    ranges.sort_unstable();
    let mut out: Vec<Range> = Vec::with_capacity(ranges.len());
    for &(lo, hi) in ranges.iter() {
        match out.last_mut() {
            Some((_, prev_hi)) if lo <= prev_hi.saturating_add(1) => {
                if hi > *prev_hi {
                    *prev_hi = hi;
                }
            }
            _ => out.push((lo, hi)),
        }
    }
    *ranges = out;
}

fn add_range(ranges: &mut Vec<Range>, lo: u128, hi: u128) {
    ranges.push((lo, hi));
    normalize(ranges);
}

fn remove_range(ranges: &mut Vec<Range>, lo: u128, hi: u128) {
    let mut out = Vec::with_capacity(ranges.len() + 1);
    for &(a, b) in ranges.iter() {
        if b < lo || a > hi {
            out.push((a, b));
            continue;
        }
        if a < lo {
            out.push((a, lo - 1));
        }
        if b > hi {
            out.push((hi + 1, b));
        }
    }
    *ranges = out;
}

/// accumulates addresses and prefixes into an [`IpSet`].
///
/// adds and removes apply in call order, so removing a prefix only
/// affects what has been added before it.
#[derive(Debug, Clone, Default)]
pub struct IpSetBuilder {
    v4: Vec<Range>,
    v6: Vec<Range>,
}

impl IpSetBuilder {
    /// create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// add a single address.
    pub fn add(&mut self, ip: IpAddr) {
        match ip {
            IpAddr::V4(v4) => {
                let n = u128::from(u32::from(v4));
                add_range(&mut self.v4, n, n);
            }
            IpAddr::V6(v6) => {
                let n = u128::from(v6);
                add_range(&mut self.v6, n, n);
            }
        }
    }

    /// add every address covered by a prefix.
    pub fn add_prefix(&mut self, net: IpNet) {
        match net {
            IpNet::V4(n) => add_range(
                &mut self.v4,
                u128::from(u32::from(n.network())),
                u128::from(u32::from(n.broadcast())),
            ),
            IpNet::V6(n) => add_range(
                &mut self.v6,
                u128::from(n.network()),
                u128::from(n.broadcast()),
            ),
        }
    }

    /// remove every address covered by a prefix.
    pub fn remove_prefix(&mut self, net: IpNet) {
        match net {
            IpNet::V4(n) => remove_range(
                &mut self.v4,
                u128::from(u32::from(n.network())),
                u128::from(u32::from(n.broadcast())),
            ),
            IpNet::V6(n) => remove_range(
                &mut self.v6,
                u128::from(n.network()),
                u128::from(n.broadcast()),
            ),
        }
    }

    /// union an existing set into the builder.
    pub fn add_set(&mut self, set: &IpSet) {
        for &(lo, hi) in &set.v4 {
            add_range(&mut self.v4, lo, hi);
        }
        for &(lo, hi) in &set.v6 {
            add_range(&mut self.v6, lo, hi);
        }
    }

    /// finish into an immutable set. the builder stays usable.
    pub fn build(&self) -> IpSet {
        let mut prefixes = Vec::new();
        for &(lo, hi) in &self.v4 {
            let subnets = Ipv4Subnets::new(Ipv4Addr::from(lo as u32), Ipv4Addr::from(hi as u32), 0);
            prefixes.extend(subnets.map(IpNet::V4));
        }
        for &(lo, hi) in &self.v6 {
            let subnets = Ipv6Subnets::new(Ipv6Addr::from(lo), Ipv6Addr::from(hi), 0);
            prefixes.extend(subnets.map(IpNet::V6));
        }
        IpSet {
            v4: self.v4.clone(),
            v6: self.v6.clone(),
            prefixes,
        }
    }
}

/// an immutable finite union of ip prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSet {
    v4: Vec<Range>,
    v6: Vec<Range>,
    prefixes: Vec<IpNet>,
}

impl IpSet {
    /// true when the set covers the given address.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => {
                let n = u128::from(u32::from(v4));
                self.v4.iter().any(|&(lo, hi)| lo <= n && n <= hi)
            }
            IpAddr::V6(v6) => {
                let n = u128::from(v6);
                self.v6.iter().any(|&(lo, hi)| lo <= n && n <= hi)
            }
        }
    }

    /// true when any address of the prefix is in the set.
    pub fn overlaps_prefix(&self, prefix: IpNet) -> bool {
        let (ranges, lo, hi) = match prefix {
            IpNet::V4(n) => (
                &self.v4,
                u128::from(u32::from(n.network())),
                u128::from(u32::from(n.broadcast())),
            ),
            IpNet::V6(n) => (
                &self.v6,
                u128::from(n.network()),
                u128::from(n.broadcast()),
            ),
        };
        ranges.iter().any(|&(a, b)| a <= hi && lo <= b)
    }

    /// the canonical disjoint prefixes of the set, ipv4 first.
    pub fn prefixes(&self) -> &[IpNet] {
        &self.prefixes
    }

    /// true when the set covers no addresses.
    pub fn is_empty(&self) -> bool {
        self.v4.is_empty() && self.v6.is_empty()
    }
}

/// the universal set: all of ipv4 and ipv6.
pub fn all_ips() -> &'static IpSet {
    static ALL: OnceLock<IpSet> = OnceLock::new();
    ALL.get_or_init(|| {
        let mut build = IpSetBuilder::new();
        build.add_prefix("::/0".parse().unwrap());
        build.add_prefix("0.0.0.0/0".parse().unwrap());
        build.build()
    })
}

/// parse an ip expression into a set.
///
/// accepts `*` (everything), a cidr prefix, or a single address.
pub fn parse_ip_set(expr: &str) -> Result<IpSet, Error> {
    if expr == "*" {
        return Ok(all_ips().clone());
    }
    let mut build = IpSetBuilder::new();
    if let Ok(prefix) = expr.parse::<IpNet>() {
        build.add_prefix(prefix);
        return Ok(build.build());
    }
    if let Ok(ip) = expr.parse::<IpAddr>() {
        build.add(ip);
        return Ok(build.build());
    }
    Err(Error::InvalidIpExpression(expr.to_string()))
}
