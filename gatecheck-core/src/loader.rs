//! Pulls rule-graph data from wherever an operator actually stores it.
//!
//! `gatecheck-core` never talks to a database directly — same split as
//! `r2e-data`'s `Repository` trait — the host application implements
//! [`Loader`] against its own storage and hands it to
//! [`crate::store::RuleStore`].

use crate::model::{
    ConcurrentLimitConfig, CustomResponse, GlobalBlacklistEntry, IpFilter, RateLimitConfig, Route,
    Rule, RuleId, TimeRestriction,
};
use crate::error::LoaderError;
use async_trait::async_trait;

/// A full pull of the control plane, as returned by [`Loader::load_snapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotData {
    pub routes: Vec<Route>,
    pub rules: Vec<Rule>,
    pub ip_filters: Vec<IpFilter>,
    pub rate_limits: Vec<RateLimitConfig>,
    pub concurrent_limits: Vec<ConcurrentLimitConfig>,
    pub time_restrictions: Vec<TimeRestriction>,
    pub custom_responses: Vec<CustomResponse>,
    pub global_blacklist: Vec<GlobalBlacklistEntry>,
}

/// Everything attached to a single rule, as returned by
/// [`Loader::load_rule`] for a targeted refresh.
#[derive(Debug, Clone)]
pub struct RuleSubgraph {
    pub rule: Rule,
    pub ip_filters: Vec<IpFilter>,
    pub rate_limit: Vec<RateLimitConfig>,
    pub concurrent_limit: Vec<ConcurrentLimitConfig>,
    pub time_restrictions: Vec<TimeRestriction>,
    pub custom_response: Vec<CustomResponse>,
}

/// Source of truth for the control plane. Implement this against your own
/// storage (SQL table, config file, remote API) and pass it to
/// [`crate::store::RuleStore::refresh_all`].
#[async_trait]
pub trait Loader: Send + Sync {
    /// Pull the entire control plane. Called on startup and on a full
    /// periodic refresh.
    async fn load_snapshot(&self) -> Result<SnapshotData, LoaderError>;

    /// Pull a single rule's subgraph for a targeted refresh. `Ok(None)`
    /// means the rule no longer exists and should be dropped from the
    /// snapshot.
    async fn load_rule(&self, rule_id: RuleId) -> Result<Option<RuleSubgraph>, LoaderError>;
}

/// In-memory [`Loader`] backed by a fixed [`SnapshotData`], for tests and
/// small deployments that configure rules in process rather than in a
/// database.
pub struct StaticLoader {
    data: std::sync::Mutex<SnapshotData>,
}

impl StaticLoader {
    pub fn new(data: SnapshotData) -> Self {
        Self { data: std::sync::Mutex::new(data) }
    }

    /// Replace the in-memory data wholesale. Useful for tests that want to
    /// simulate an operator change between two refreshes.
    pub fn set(&self, data: SnapshotData) {
        *self.data.lock().unwrap() = data;
    }
}

#[async_trait]
impl Loader for StaticLoader {
    async fn load_snapshot(&self) -> Result<SnapshotData, LoaderError> {
        Ok(self.data.lock().unwrap().clone())
    }

    async fn load_rule(&self, rule_id: RuleId) -> Result<Option<RuleSubgraph>, LoaderError> {
        let data = self.data.lock().unwrap();
        let Some(rule) = data.rules.iter().find(|r| r.id == rule_id).cloned() else {
            return Ok(None);
        };
        Ok(Some(RuleSubgraph {
            ip_filters: data.ip_filters.iter().filter(|f| f.rule_id == rule_id).cloned().collect(),
            rate_limit: data
                .rate_limits
                .iter()
                .filter(|c| c.rule_id == rule_id)
                .cloned()
                .collect(),
            concurrent_limit: data
                .concurrent_limits
                .iter()
                .filter(|c| c.rule_id == rule_id)
                .cloned()
                .collect(),
            time_restrictions: data
                .time_restrictions
                .iter()
                .filter(|t| t.rule_id == rule_id)
                .cloned()
                .collect(),
            custom_response: data
                .custom_responses
                .iter()
                .filter(|c| c.rule_id == rule_id)
                .cloned()
                .collect(),
            rule,
        }))
    }
}
