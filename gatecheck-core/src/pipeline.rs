//! Component G — ties the route index, rule store, and the four evaluators
//! together into one per-request decision.
//!
//! `now` is an explicit parameter throughout rather than read from the
//! clock internally, so tests (and callers with their own clock source) can
//! drive every evaluator deterministically.

use crate::concurrent_limiter::{ConcurrencyToken, ConcurrentLimiter};
use crate::ip_filter;
use crate::model::{BlockReason, BucketKey, CustomResponse, Route, RuleId};
use crate::rate_limiter::RateLimiter;
use crate::store::RuleStore;
use crate::time_window;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

/// The inbound facts the pipeline needs to reach a decision.
#[derive(Debug, Clone)]
pub struct RequestFacts {
    pub method: String,
    pub path: String,
    pub ip: IpAddr,
}

/// The rule (if any) a block decision is attributed to, and the operator
/// override (if any) for rendering its response.
#[derive(Debug, Clone)]
pub struct BlockInfo {
    pub reason: BlockReason,
    pub rule_id: Option<RuleId>,
    pub custom_response: Option<Arc<CustomResponse>>,
}

/// The pipeline's verdict for one request.
#[derive(Debug, Clone)]
pub enum Decision {
    /// No matching route, or every matched rule passed every evaluator.
    Allowed { route: Option<Route> },
    Blocked(BlockInfo),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// A decision plus any concurrency slots it acquired. Holding this value for
/// the lifetime of the request releases those slots on drop; an explicit
/// [`PipelineOutcome::release`] does the same thing early.
pub struct PipelineOutcome {
    pub decision: Decision,
    tokens: Vec<ConcurrencyToken>,
}

impl PipelineOutcome {
    pub fn release(&self) {
        for token in &self.tokens {
            token.release();
        }
    }
}

/// The full access-control middleware: route index + rule store + the four
/// per-rule evaluators.
pub struct Pipeline {
    store: Arc<RuleStore>,
    rate_limiter: RateLimiter,
    concurrent_limiter: ConcurrentLimiter,
}

impl Pipeline {
    pub fn new(store: Arc<RuleStore>) -> Self {
        Self { store, rate_limiter: RateLimiter::new(), concurrent_limiter: ConcurrentLimiter::new() }
    }

    pub fn store(&self) -> &Arc<RuleStore> {
        &self.store
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn concurrent_limiter(&self) -> &ConcurrentLimiter {
        &self.concurrent_limiter
    }

    /// Evaluate one request. `wall_clock` drives the global blacklist expiry
    /// check and time-window evaluation; `monotonic` drives rate-limiter
    /// refill math. Callers that don't care about clock injection can pass
    /// `Utc::now()` and `Instant::now()`.
    pub fn evaluate(&self, facts: RequestFacts, wall_clock: DateTime<Utc>, monotonic: Instant) -> PipelineOutcome {
        let snapshot = self.store.snapshot();

        // Step 1: global blacklist, independent of route/rule matching.
        if snapshot
            .global_blacklist
            .iter()
            .any(|e| e.is_active(wall_clock) && ip_filter::matches(&e.spec, facts.ip))
        {
            tracing::debug!(ip = %facts.ip, "request blocked by global blacklist");
            return PipelineOutcome {
                decision: Decision::Blocked(BlockInfo {
                    reason: BlockReason::IpBlacklisted,
                    rule_id: None,
                    custom_response: None,
                }),
                tokens: Vec::new(),
            };
        }

        // Step 2: route lookup. No match is a pass-through, per spec.md §4.G.
        let Some(route) = self.store.lookup_route(&facts.method, &facts.path) else {
            return PipelineOutcome { decision: Decision::Allowed { route: None }, tokens: Vec::new() };
        };

        let rules = snapshot.rules_for(route.id);
        let mut tokens = Vec::new();

        for entry in rules.iter() {
            let key = BucketKey { ip: facts.ip, rule_id: entry.rule.id };

            let ip_outcome = entry.ip_filters.evaluate(facts.ip);
            if ip_outcome != crate::model::IpFilterOutcome::Allowed {
                release_all(&tokens);
                let reason = match ip_outcome {
                    crate::model::IpFilterOutcome::IpBlacklisted => BlockReason::IpBlacklisted,
                    crate::model::IpFilterOutcome::IpNotWhitelisted => BlockReason::IpNotWhitelisted,
                    crate::model::IpFilterOutcome::Allowed => unreachable!(),
                };
                return blocked(reason, entry.rule.id, entry.custom_response.clone());
            }

            let time_outcome = time_window::evaluate(&entry.time_restrictions, wall_clock);
            if time_outcome == crate::model::TimeWindowOutcome::TimeRestricted {
                release_all(&tokens);
                return blocked(BlockReason::TimeRestricted, entry.rule.id, entry.custom_response.clone());
            }

            if let Some(config) = &entry.rate_limit {
                if self.rate_limiter.check(key, config, monotonic) == crate::model::RateLimitOutcome::RateLimitExceeded
                {
                    release_all(&tokens);
                    return blocked(BlockReason::RateLimitExceeded, entry.rule.id, entry.custom_response.clone());
                }
            }

            if let Some(config) = &entry.concurrent_limit {
                match self.concurrent_limiter.try_acquire(key, config.max_concurrent) {
                    Ok(token) => tokens.push(token),
                    Err(_) => {
                        release_all(&tokens);
                        return blocked(
                            BlockReason::ConcurrentLimitExceeded,
                            entry.rule.id,
                            entry.custom_response.clone(),
                        );
                    }
                }
            }
        }

        PipelineOutcome { decision: Decision::Allowed { route: Some(route) }, tokens }
    }
}

fn release_all(tokens: &[ConcurrencyToken]) {
    for token in tokens {
        token.release();
    }
}

fn blocked(reason: BlockReason, rule_id: RuleId, custom_response: Option<Arc<CustomResponse>>) -> PipelineOutcome {
    tracing::debug!(?reason, rule_id = rule_id.0, "request blocked by rule");
    PipelineOutcome {
        decision: Decision::Blocked(BlockInfo { reason, rule_id: Some(rule_id), custom_response }),
        tokens: Vec::new(),
    }
}
