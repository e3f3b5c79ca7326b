//! Data model shared by the route index, rule store, and evaluators.
//!
//! Routes, rules, and their attached configs are owned by external storage;
//! this crate only ever holds copies published through [`crate::store::RuleStore`].

use serde::Deserialize;
use std::net::IpAddr;

/// Stable integer id for a [`Route`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct RouteId(pub u64);

/// Stable integer id for a [`Rule`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
pub struct RuleId(pub u64);

/// A route the enforcement pipeline can match against, e.g. `GET /users/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub id: RouteId,
    /// Uppercase HTTP method, e.g. `"GET"`.
    pub method: String,
    /// Path pattern with literal segments and `:name` placeholders.
    pub path_pattern: String,
    pub controller: Option<String>,
    pub action: Option<String>,
    pub helper: Option<String>,
}

/// The unit of protection attached to a route.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub route_id: RouteId,
    pub enabled: bool,
    /// Higher runs first.
    pub priority: i64,
    pub description: Option<String>,
}

/// Whitelist or blacklist membership for an [`IpFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Whitelist,
    Blacklist,
}

/// A literal IPv4 address or a CIDR block (`a.b.c.d/n`) attached to a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct IpFilter {
    pub id: u64,
    pub rule_id: RuleId,
    pub spec: String,
    pub kind: FilterKind,
    pub enabled: bool,
}

/// Token-bucket configuration for a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub id: u64,
    pub rule_id: RuleId,
    pub requests_per_window: u64,
    pub window_seconds: u64,
    pub enabled: bool,
}

/// In-flight request cap for a rule.
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrentLimitConfig {
    pub id: u64,
    pub rule_id: RuleId,
    pub max_concurrent: u64,
    pub enabled: bool,
}

/// Day of week, Monday=1 .. Sunday=7, as used by [`TimeRestriction`].
pub type DayOfWeek = u8;

/// A permitted time window for a rule. Multiple restrictions on the same
/// rule combine by disjunction (any one permits).
#[derive(Debug, Clone, Deserialize)]
pub struct TimeRestriction {
    pub id: u64,
    pub rule_id: RuleId,
    pub start_time: Option<chrono::NaiveTime>,
    pub end_time: Option<chrono::NaiveTime>,
    pub days_of_week: Option<Vec<DayOfWeek>>,
    /// Carried for forward compatibility; the evaluator always uses UTC (see
    /// DESIGN.md for the Open Question this resolves).
    pub timezone: Option<String>,
    pub enabled: bool,
}

/// Response content type for a [`CustomResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    #[serde(rename = "application/json")]
    Json,
    #[serde(rename = "text/html")]
    Html,
    #[serde(rename = "text/plain")]
    Plain,
    #[serde(rename = "application/xml")]
    Xml,
}

/// An operator-configured override for a rule's block response.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomResponse {
    pub id: u64,
    pub rule_id: RuleId,
    pub status: u16,
    pub message: Option<String>,
    pub content_type: ContentType,
    pub enabled: bool,
}

/// An IP or CIDR block denied across every route, independent of rule
/// evaluation.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalBlacklistEntry {
    pub id: u64,
    pub spec: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub enabled: bool,
}

impl GlobalBlacklistEntry {
    /// Active means enabled and not expired as of `now`.
    pub fn is_active(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.enabled && self.expires_at.map(|exp| exp > now).unwrap_or(true)
    }
}

/// The reason a request was blocked, or that it was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    RateLimitExceeded,
    IpBlacklisted,
    IpNotWhitelisted,
    TimeRestricted,
    ConcurrentLimitExceeded,
    Other,
}

impl BlockReason {
    /// Default status/message mapping from spec.md §6.
    pub fn default_status(&self) -> u16 {
        match self {
            BlockReason::RateLimitExceeded => 429,
            BlockReason::IpBlacklisted => 403,
            BlockReason::IpNotWhitelisted => 403,
            BlockReason::TimeRestricted => 403,
            BlockReason::ConcurrentLimitExceeded => 429,
            BlockReason::Other => 403,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            BlockReason::RateLimitExceeded => "Rate limit exceeded",
            BlockReason::IpBlacklisted => "IP address is blacklisted",
            BlockReason::IpNotWhitelisted => "IP address is not whitelisted",
            BlockReason::TimeRestricted => "Access restricted at this time",
            BlockReason::ConcurrentLimitExceeded => "Too many concurrent requests",
            BlockReason::Other => "Access denied",
        }
    }
}

/// Outcome of the IP filter evaluator (component C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFilterOutcome {
    Allowed,
    IpBlacklisted,
    IpNotWhitelisted,
}

/// Outcome of the rate limiter (component D).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    Allowed,
    RateLimitExceeded,
}

/// Outcome of the concurrent limiter (component E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrentLimitOutcome {
    Allowed,
    ConcurrentLimitExceeded,
}

/// Outcome of the time-window evaluator (component F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindowOutcome {
    Allowed,
    TimeRestricted,
}

/// Resolved address + rule pair used to key the rate limiter and concurrent
/// limiter maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub ip: IpAddr,
    pub rule_id: RuleId,
}
