//! `axum` integration for [`gatecheck_core`] — sole owner of the `axum`
//! dependency, the same split `r2e-http` keeps between "protocol-agnostic
//! core" and "the crate that actually depends on the web framework".
//!
//! # Setup
//!
//! ```ignore
//! let store = Arc::new(RuleStore::new());
//! store.refresh_all(loader.load_snapshot().await?)?;
//! let pipeline = Arc::new(Pipeline::new(store));
//!
//! let app = Router::new()
//!     .route("/api/widgets", get(list_widgets))
//!     .layer(axum::middleware::from_fn_with_state(pipeline, gatecheck_axum::gatecheck));
//! ```
//!
//! The middleware resolves the caller's IP from `X-Forwarded-For`, then
//! `X-Real-IP`, then the `ConnectInfo` axum records from the TCP peer
//! address — see [`extract::client_ip`]. Run `Router::into_make_service_with_connect_info`
//! if you need the last of those.

pub mod extract;
pub mod middleware;

pub use gatecheck_core;
pub use middleware::gatecheck;
