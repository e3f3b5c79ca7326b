//! Snapshot data structures published by [`crate::store::RuleStore`].
//!
//! A snapshot is the immutable picture of the control plane the pipeline
//! evaluates a request against. It is rebuilt wholesale on
//! `refresh_all`/`refresh_rule` and swapped in behind an `Arc`, so a request
//! in flight always sees one consistent generation even while a refresh is
//! running concurrently.

use crate::ip_filter::CompiledFilterSet;
use crate::model::{
    ConcurrentLimitConfig, CustomResponse, GlobalBlacklistEntry, Rule, RuleId, TimeRestriction,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Everything the pipeline needs for one rule.
#[derive(Clone)]
pub struct RuleEntry {
    pub rule: Rule,
    pub ip_filters: Arc<CompiledFilterSet>,
    pub rate_limit: Option<Arc<crate::model::RateLimitConfig>>,
    pub concurrent_limit: Option<Arc<ConcurrentLimitConfig>>,
    pub time_restrictions: Arc<[TimeRestriction]>,
    pub custom_response: Option<Arc<CustomResponse>>,
}

/// One immutable generation of the control plane.
#[derive(Clone, Default)]
pub struct SnapshotInner {
    /// Rules attached to each route, sorted by descending priority then
    /// ascending rule id, ready for the pipeline to iterate in order.
    pub rules_by_route: HashMap<crate::model::RouteId, Arc<[RuleEntry]>>,
    pub global_blacklist: Arc<[GlobalBlacklistEntry]>,
}

impl SnapshotInner {
    pub fn rules_for(&self, route_id: crate::model::RouteId) -> Arc<[RuleEntry]> {
        self.rules_by_route.get(&route_id).cloned().unwrap_or_else(|| Arc::from([]))
    }
}

/// Find the entry for a rule id across every route, used by
/// `RuleStore::refresh_rule` to locate what it's replacing.
pub fn find_rule_route(inner: &SnapshotInner, rule_id: RuleId) -> Option<crate::model::RouteId> {
    inner.rules_by_route.iter().find_map(|(route_id, entries)| {
        entries.iter().any(|e| e.rule.id == rule_id).then_some(*route_id)
    })
}
