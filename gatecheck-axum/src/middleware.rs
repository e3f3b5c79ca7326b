//! `axum` integration for [`gatecheck_core::pipeline::Pipeline`].
//!
//! Installed the same way `r2e_core::secure_headers::SecureHeaders` installs
//! itself — an `axum::middleware::from_fn`-shaped function layered onto the
//! router — but as a plain function rather than a `Plugin`, since this crate
//! has no dependency on `r2e-core`'s builder.

use crate::extract::client_ip;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use gatecheck_core::pipeline::{Decision, Pipeline, RequestFacts};
use gatecheck_core::response::render;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Instant;

/// Evaluate the request against `pipeline` before forwarding it to `next`.
///
/// Register with:
/// ```ignore
/// Router::new().layer(axum::middleware::from_fn_with_state(pipeline, gatecheck));
/// ```
pub async fn gatecheck(State(pipeline): State<Arc<Pipeline>>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let facts = RequestFacts { method: req.method().as_str().to_string(), path: req.uri().path().to_string(), ip };

    // Concurrency tokens live in `outcome` and release on drop; keeping it
    // alive across `next.run` is what holds the slot for the request.
    let outcome = pipeline.evaluate(facts, chrono::Utc::now(), Instant::now());

    match &outcome.decision {
        Decision::Allowed { .. } => next.run(req).await,
        Decision::Blocked(info) => {
            tracing::info!(
                reason = ?info.reason,
                rule_id = ?info.rule_id,
                ip = %ip,
                "request blocked"
            );
            render_response(info)
        }
    }
}

fn render_response(info: &gatecheck_core::pipeline::BlockInfo) -> Response {
    let rendered = render(info);
    let mut response = Response::builder()
        .status(rendered.status)
        .header(axum::http::header::CONTENT_TYPE, rendered.content_type)
        .body(Body::from(rendered.body))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response());
    response.headers_mut().entry(axum::http::header::CONTENT_TYPE).or_insert_with(|| {
        axum::http::HeaderValue::from_static("application/json")
    });
    response
}
