//! Route-scoped access-control middleware engine: route matching, a
//! read-mostly rule store, and four per-rule evaluators (IP filter, rate
//! limit, concurrency limit, time window) composed into one enforcement
//! pipeline.
//!
//! This crate is transport-agnostic; `gatecheck-axum` wires it into an
//! `axum` request/response cycle.

pub mod concurrent_limiter;
pub mod error;
pub mod init;
pub mod ip_filter;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod rate_limiter;
pub mod response;
pub mod route_index;
pub mod snapshot;
pub mod store;
pub mod time_window;

pub mod prelude {
    pub use crate::error::{LoaderError, StoreError};
    pub use crate::loader::{Loader, RuleSubgraph, SnapshotData, StaticLoader};
    pub use crate::model::{
        BlockReason, ConcurrentLimitConfig, ContentType, CustomResponse, FilterKind,
        GlobalBlacklistEntry, IpFilter, RateLimitConfig, Route, RouteId, Rule, RuleId,
        TimeRestriction,
    };
    pub use crate::pipeline::{BlockInfo, Decision, Pipeline, PipelineOutcome, RequestFacts};
    pub use crate::response::{render, RenderedResponse};
    pub use crate::route_index::RouteIndex;
    pub use crate::store::RuleStore;
}
