//! Component B — the read-mostly snapshot of routes, rules, and their
//! attached configs.
//!
//! Publishing follows the same shape as `r2e_openfga`'s relationship-tuple
//! cache: readers take a cheap `Arc` clone under a short-lived read lock and
//! never block on a concurrent refresh; a refresh builds the next
//! generation off to the side and swaps it in with a single write.

use crate::error::StoreError;
use crate::ip_filter::CompiledFilterSet;
use crate::loader::{RuleSubgraph, SnapshotData};
use crate::model::{ConcurrentLimitConfig, RateLimitConfig, Route, RouteId, Rule, RuleId};
use crate::route_index::RouteIndex;
use crate::snapshot::{find_rule_route, RuleEntry, SnapshotInner};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Owns the route index and the published rule-graph snapshot.
pub struct RuleStore {
    routes: RouteIndex,
    inner: RwLock<Arc<SnapshotInner>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self { routes: RouteIndex::new(), inner: RwLock::new(Arc::new(SnapshotInner::default())) }
    }

    pub fn with_route_index(routes: RouteIndex) -> Self {
        Self { routes, inner: RwLock::new(Arc::new(SnapshotInner::default())) }
    }

    pub fn routes(&self) -> &RouteIndex {
        &self.routes
    }

    /// Current published snapshot. Cheap: one `Arc` clone under a read lock.
    pub fn snapshot(&self) -> Arc<SnapshotInner> {
        self.inner.read().unwrap().clone()
    }

    /// Full control-plane refresh: replaces the route index and rebuilds the
    /// entire rule-graph snapshot from scratch.
    pub fn refresh_all(&self, data: SnapshotData) -> Result<(), StoreError> {
        let next = build_snapshot(&data)?;
        self.routes.clear();
        for route in data.routes {
            self.routes.store(route);
        }
        *self.inner.write().unwrap() = Arc::new(next);
        Ok(())
    }

    /// Targeted refresh of one rule, per spec.md §9's resolution: rebuild a
    /// new top-level map, reusing the `Arc<[RuleEntry]>` for every
    /// unaffected route and only rebuilding the bucket the changed rule
    /// belongs to.
    pub fn refresh_rule(
        &self,
        rule_id: RuleId,
        subgraph: Option<RuleSubgraph>,
    ) -> Result<(), StoreError> {
        let current = self.snapshot();
        let mut rules_by_route: HashMap<RouteId, Arc<[RuleEntry]>> =
            current.rules_by_route.clone();

        // Drop the rule from its previous bucket, wherever that was.
        if let Some(old_route) = find_rule_route(&current, rule_id) {
            if let Some(bucket) = rules_by_route.get(&old_route) {
                let filtered: Vec<RuleEntry> =
                    bucket.iter().filter(|e| e.rule.id != rule_id).cloned().collect();
                rules_by_route.insert(old_route, Arc::from(filtered));
            }
        }

        if let Some(subgraph) = subgraph {
            let route_id = subgraph.rule.route_id;
            let entry = build_rule_entry(
                subgraph.rule,
                &subgraph.ip_filters,
                &subgraph.rate_limit,
                &subgraph.concurrent_limit,
                &subgraph.time_restrictions,
                &subgraph.custom_response,
            )?;
            let mut bucket: Vec<RuleEntry> = rules_by_route
                .get(&route_id)
                .map(|b| b.iter().cloned().collect())
                .unwrap_or_default();
            bucket.push(entry);
            sort_bucket(&mut bucket);
            rules_by_route.insert(route_id, Arc::from(bucket));
        }

        let next = SnapshotInner { rules_by_route, global_blacklist: current.global_blacklist.clone() };
        *self.inner.write().unwrap() = Arc::new(next);
        Ok(())
    }

    /// Route lookup convenience, delegating to the underlying [`RouteIndex`].
    pub fn lookup_route(&self, method: &str, path: &str) -> Option<Route> {
        self.routes.lookup(method, path)
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sort_bucket(bucket: &mut [RuleEntry]) {
    bucket.sort_by(|a, b| b.rule.priority.cmp(&a.rule.priority).then(a.rule.id.cmp(&b.rule.id)));
}

fn build_rule_entry(
    rule: Rule,
    ip_filters: &[crate::model::IpFilter],
    rate_limits: &[RateLimitConfig],
    concurrent_limits: &[ConcurrentLimitConfig],
    time_restrictions: &[crate::model::TimeRestriction],
    custom_responses: &[crate::model::CustomResponse],
) -> Result<RuleEntry, StoreError> {
    let active_rate_limits: Vec<&RateLimitConfig> =
        rate_limits.iter().filter(|c| c.enabled).collect();
    if active_rate_limits.len() > 1 {
        return Err(StoreError::MultipleActiveConfigs { rule_id: rule.id, kind: "RateLimitConfig" });
    }
    let active_concurrent_limits: Vec<&ConcurrentLimitConfig> =
        concurrent_limits.iter().filter(|c| c.enabled).collect();
    if active_concurrent_limits.len() > 1 {
        return Err(StoreError::MultipleActiveConfigs {
            rule_id: rule.id,
            kind: "ConcurrentLimitConfig",
        });
    }

    Ok(RuleEntry {
        ip_filters: Arc::new(CompiledFilterSet::compile(ip_filters)),
        rate_limit: active_rate_limits.first().map(|c| Arc::new((*c).clone())),
        concurrent_limit: active_concurrent_limits.first().map(|c| Arc::new((*c).clone())),
        time_restrictions: Arc::from(
            time_restrictions.iter().filter(|t| t.enabled).cloned().collect::<Vec<_>>(),
        ),
        custom_response: custom_responses.iter().find(|c| c.enabled).map(|c| Arc::new(c.clone())),
        rule,
    })
}

fn build_snapshot(data: &SnapshotData) -> Result<SnapshotInner, StoreError> {
    let mut buckets: HashMap<RouteId, Vec<RuleEntry>> = HashMap::new();

    for rule in &data.rules {
        if !rule.enabled {
            continue;
        }
        let ip_filters: Vec<_> =
            data.ip_filters.iter().filter(|f| f.rule_id == rule.id).cloned().collect();
        let rate_limits: Vec<_> =
            data.rate_limits.iter().filter(|c| c.rule_id == rule.id).cloned().collect();
        let concurrent_limits: Vec<_> =
            data.concurrent_limits.iter().filter(|c| c.rule_id == rule.id).cloned().collect();
        let time_restrictions: Vec<_> =
            data.time_restrictions.iter().filter(|t| t.rule_id == rule.id).cloned().collect();
        let custom_responses: Vec<_> =
            data.custom_responses.iter().filter(|c| c.rule_id == rule.id).cloned().collect();

        let entry = build_rule_entry(
            rule.clone(),
            &ip_filters,
            &rate_limits,
            &concurrent_limits,
            &time_restrictions,
            &custom_responses,
        )?;
        buckets.entry(rule.route_id).or_default().push(entry);
    }

    let mut rules_by_route = HashMap::with_capacity(buckets.len());
    for (route_id, mut bucket) in buckets {
        sort_bucket(&mut bucket);
        rules_by_route.insert(route_id, Arc::from(bucket));
    }

    Ok(SnapshotInner { rules_by_route, global_blacklist: Arc::from(data.global_blacklist.clone()) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;

    fn rule(id: u64, route_id: u64, priority: i64) -> Rule {
        Rule { id: RuleId(id), route_id: RouteId(route_id), enabled: true, priority, description: None }
    }

    #[test]
    fn refresh_all_groups_rules_by_route_in_priority_order() {
        let store = RuleStore::new();
        let data = SnapshotData {
            routes: vec![],
            rules: vec![rule(1, 10, 0), rule(2, 10, 5), rule(3, 20, 0)],
            ..Default::default()
        };
        store.refresh_all(data).unwrap();
        let snap = store.snapshot();
        let bucket = snap.rules_for(RouteId(10));
        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket[0].rule.id, RuleId(2)); // higher priority first
        assert_eq!(bucket[1].rule.id, RuleId(1));
    }

    #[test]
    fn disabled_rules_are_excluded_from_the_snapshot() {
        let store = RuleStore::new();
        let mut r = rule(1, 10, 0);
        r.enabled = false;
        store.refresh_all(SnapshotData { rules: vec![r], ..Default::default() }).unwrap();
        assert!(store.snapshot().rules_for(RouteId(10)).is_empty());
    }

    #[test]
    fn multiple_active_rate_limits_are_rejected() {
        let store = RuleStore::new();
        let data = SnapshotData {
            rules: vec![rule(1, 10, 0)],
            rate_limits: vec![
                RateLimitConfig { id: 1, rule_id: RuleId(1), requests_per_window: 10, window_seconds: 60, enabled: true },
                RateLimitConfig { id: 2, rule_id: RuleId(1), requests_per_window: 20, window_seconds: 60, enabled: true },
            ],
            ..Default::default()
        };
        let err = store.refresh_all(data).unwrap_err();
        assert!(matches!(err, StoreError::MultipleActiveConfigs { rule_id: RuleId(1), kind: "RateLimitConfig" }));
    }

    #[test]
    fn disabled_rate_limit_does_not_count_toward_the_conflict() {
        let store = RuleStore::new();
        let data = SnapshotData {
            rules: vec![rule(1, 10, 0)],
            rate_limits: vec![
                RateLimitConfig { id: 1, rule_id: RuleId(1), requests_per_window: 10, window_seconds: 60, enabled: true },
                RateLimitConfig { id: 2, rule_id: RuleId(1), requests_per_window: 20, window_seconds: 60, enabled: false },
            ],
            ..Default::default()
        };
        store.refresh_all(data).unwrap();
        let entry = &store.snapshot().rules_for(RouteId(10))[0];
        assert_eq!(entry.rate_limit.as_ref().unwrap().id, 1);
    }

    #[test]
    fn refresh_rule_replaces_only_its_own_route_bucket() {
        let store = RuleStore::new();
        store
            .refresh_all(SnapshotData { rules: vec![rule(1, 10, 0), rule(2, 20, 0)], ..Default::default() })
            .unwrap();
        let untouched = store.snapshot().rules_for(RouteId(20));

        let subgraph = RuleSubgraph {
            rule: rule(1, 10, 9),
            ip_filters: vec![],
            rate_limit: vec![],
            concurrent_limit: vec![],
            time_restrictions: vec![],
            custom_response: vec![],
        };
        store.refresh_rule(RuleId(1), Some(subgraph)).unwrap();

        let updated = store.snapshot();
        assert_eq!(updated.rules_for(RouteId(10))[0].rule.priority, 9);
        assert!(Arc::ptr_eq(&untouched, &updated.rules_for(RouteId(20))));
    }

    #[test]
    fn refresh_rule_with_none_removes_the_rule() {
        let store = RuleStore::new();
        store.refresh_all(SnapshotData { rules: vec![rule(1, 10, 0)], ..Default::default() }).unwrap();
        store.refresh_rule(RuleId(1), None).unwrap();
        assert!(store.snapshot().rules_for(RouteId(10)).is_empty());
    }
}
