//! Component C — decides allow/deny for an IP against a rule's filter set,
//! with CIDR support.

use crate::model::{FilterKind, IpFilter, IpFilterOutcome};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// A parsed, ready-to-match filter spec. Parsing happens once when the rule
/// store publishes a snapshot, not on the hot path.
#[derive(Debug, Clone, Copy)]
enum ParsedSpec {
    /// Literal textual match (works for both IPv4 and IPv6 specs).
    Literal(IpAddr),
    /// IPv4 CIDR network/prefix. Never matches an IPv6 address.
    Cidr { network: u32, prefix: u32 },
    /// Unparseable text: never matches anything, but never errors either
    /// (spec.md §4.C's invalid-input policy).
    Invalid,
}

fn ipv4_to_u32(ip: Ipv4Addr) -> u32 {
    u32::from(ip)
}

fn mask_for(prefix: u32) -> u32 {
    if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    }
}

fn parse_spec(spec: &str) -> ParsedSpec {
    if let Some((addr, prefix)) = spec.split_once('/') {
        let Ok(prefix) = prefix.parse::<u32>() else {
            return ParsedSpec::Invalid;
        };
        if prefix > 32 {
            return ParsedSpec::Invalid;
        }
        let Ok(ip) = Ipv4Addr::from_str(addr) else {
            return ParsedSpec::Invalid;
        };
        ParsedSpec::Cidr { network: ipv4_to_u32(ip), prefix }
    } else {
        match IpAddr::from_str(spec) {
            Ok(ip) => ParsedSpec::Literal(ip),
            Err(_) => ParsedSpec::Invalid,
        }
    }
}

fn spec_matches(spec: &ParsedSpec, ip: IpAddr) -> bool {
    match spec {
        ParsedSpec::Literal(spec_ip) => *spec_ip == ip,
        ParsedSpec::Cidr { network, prefix } => match ip {
            IpAddr::V4(v4) => {
                let mask = mask_for(*prefix);
                (ipv4_to_u32(v4) & mask) == (network & mask)
            }
            IpAddr::V6(_) => false,
        },
        ParsedSpec::Invalid => false,
    }
}

/// Compiled filter list for one rule, ready for per-request evaluation.
#[derive(Debug, Clone, Default)]
pub struct CompiledFilterSet {
    blacklist: Vec<ParsedSpecOwned>,
    whitelist: Vec<ParsedSpecOwned>,
}

#[derive(Debug, Clone)]
struct ParsedSpecOwned(ParsedSpec);

impl CompiledFilterSet {
    pub fn compile(filters: &[IpFilter]) -> Self {
        let mut blacklist = Vec::new();
        let mut whitelist = Vec::new();
        for f in filters {
            if !f.enabled {
                continue;
            }
            let spec = parse_spec(&f.spec);
            if matches!(spec, ParsedSpec::Invalid) {
                tracing::warn!(filter_id = f.id, rule_id = f.rule_id.0, spec = %f.spec, "unparseable IP filter spec, treating as never-match");
            }
            let parsed = ParsedSpecOwned(spec);
            match f.kind {
                FilterKind::Blacklist => blacklist.push(parsed),
                FilterKind::Whitelist => whitelist.push(parsed),
            }
        }
        Self { blacklist, whitelist }
    }

    pub fn is_empty(&self) -> bool {
        self.blacklist.is_empty() && self.whitelist.is_empty()
    }

    /// Evaluate per spec.md §4.C: empty list allows, blacklist takes
    /// precedence, then whitelist-if-present.
    pub fn evaluate(&self, ip: IpAddr) -> IpFilterOutcome {
        if self.is_empty() {
            return IpFilterOutcome::Allowed;
        }
        if self.blacklist.iter().any(|s| spec_matches(&s.0, ip)) {
            return IpFilterOutcome::IpBlacklisted;
        }
        if self.whitelist.is_empty() {
            return IpFilterOutcome::Allowed;
        }
        if self.whitelist.iter().any(|s| spec_matches(&s.0, ip)) {
            IpFilterOutcome::Allowed
        } else {
            IpFilterOutcome::IpNotWhitelisted
        }
    }
}

/// Match a single spec against an IP. Exposed for the global blacklist,
/// which is a flat list of [`crate::model::GlobalBlacklistEntry`] rather than
/// a per-rule [`CompiledFilterSet`].
pub fn matches(spec: &str, ip: IpAddr) -> bool {
    spec_matches(&parse_spec(spec), ip)
}
