//! Request id propagation and per-response logging.

use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
const MAX_FORWARDED_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse a caller-supplied `x-request-id` when it is printable and short,
/// otherwise mint one; the id is echoed on the response.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id =
        forwarded_request_id(request.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    request.extensions_mut().insert(RequestContext {
        request_id: request_id.clone(),
    });

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }
    response
}

fn forwarded_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_FORWARDED_ID_LEN)
        .map(str::to_owned)
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if !status.is_client_error() && !status.is_server_error() {
        let cache = response
            .headers()
            .get("x-cache")
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        debug!(
            target = "coinrank::http::response",
            status = status.as_u16(),
            %method,
            path = %path,
            elapsed_ms,
            cache,
            request_id = %request_id,
            "request served",
        );
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let source = report.as_ref().map_or("unknown", |report| report.source);
    let chain = report.map(|report| report.messages).unwrap_or_default();
    let detail = chain
        .first()
        .map(String::as_str)
        .unwrap_or("no diagnostic available");

    if status.is_server_error() {
        error!(
            target = "coinrank::http::response",
            status = status.as_u16(),
            %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            chain = ?chain,
            request_id = %request_id,
            "request failed",
        );
    } else {
        warn!(
            target = "coinrank::http::response",
            status = status.as_u16(),
            %method,
            path = %path,
            elapsed_ms,
            source,
            detail,
            request_id = %request_id,
            "request rejected",
        );
    }

    response
}
