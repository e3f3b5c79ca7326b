//! Renders a [`BlockInfo`] into an HTTP status, content type, and body,
//! applying an operator's [`CustomResponse`] override when one is attached
//! to the blocking rule.

use crate::model::ContentType;
use crate::pipeline::BlockInfo;

/// A block decision rendered down to wire-ready parts. The transport crate
/// (`gatecheck-axum`) turns this into an actual response.
#[derive(Debug, Clone)]
pub struct RenderedResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

/// Default content type when no [`crate::model::CustomResponse`] applies.
const DEFAULT_CONTENT_TYPE: ContentType = ContentType::Json;

pub fn render(info: &BlockInfo) -> RenderedResponse {
    match &info.custom_response {
        Some(custom) if custom.enabled => {
            let message = custom.message.clone().unwrap_or_else(|| info.reason.default_message().to_string());
            RenderedResponse {
                status: custom.status,
                content_type: mime_for(custom.content_type),
                body: render_body(custom.content_type, &message),
            }
        }
        _ => RenderedResponse {
            status: info.reason.default_status(),
            content_type: mime_for(DEFAULT_CONTENT_TYPE),
            body: render_body(DEFAULT_CONTENT_TYPE, info.reason.default_message()),
        },
    }
}

fn mime_for(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Json => "application/json",
        ContentType::Html => "text/html",
        ContentType::Plain => "text/plain",
        ContentType::Xml => "application/xml",
    }
}

fn render_body(content_type: ContentType, message: &str) -> String {
    match content_type {
        // An operator may configure a message that is already a JSON
        // document (e.g. `{"code":"BLOCKED"}`); spec.md §6 says to use it
        // verbatim in that case and only wrap plain text.
        ContentType::Json => {
            if serde_json::from_str::<serde_json::Value>(message).is_ok() {
                message.to_string()
            } else {
                serde_json::json!({ "error": message }).to_string()
            }
        }
        ContentType::Html => format!("<html><body><h1>{}</h1></body></html>", escape_xml(message)),
        ContentType::Plain => message.to_string(),
        ContentType::Xml => format!("<error>{}</error>", escape_xml(message)),
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}
