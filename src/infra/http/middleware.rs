use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::{Level, event};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 64;
const RESPONSE_TARGET: &str = "boardstore::http::response";

/// Per-request values shared by the middleware stack.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Reuse the caller's `x-request-id` when it is short and printable,
/// otherwise mint a fresh one. Echoed on the response either way.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let context = RequestContext { request_id };
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&context.request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(context);
    response
}

/// Log every failed response with the diagnostic chain attached by
/// [`ErrorReport`]. Successful responses are not logged.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|context| context.request_id.clone());

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let report = response.extensions_mut().remove::<ErrorReport>();
    let (source, chain) = report
        .map(|report| (report.source, report.messages))
        .unwrap_or(("unknown", Vec::new()));
    let detail = chain.first().map(String::as_str).unwrap_or("-");
    let elapsed_ms = started.elapsed().as_millis();
    let request_id = request_id.as_deref().unwrap_or("-");

    if status.is_server_error() {
        event!(
            target: RESPONSE_TARGET,
            Level::ERROR,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            detail,
            ?chain,
            request_id,
            "request failed"
        );
    } else {
        event!(
            target: RESPONSE_TARGET,
            Level::WARN,
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            source,
            detail,
            request_id,
            "request rejected"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::{Router, routing::get};
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn(log_responses))
            .layer(axum::middleware::from_fn(set_request_context))
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_minted() {
        let request = Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(Body::empty())
            .expect("request");
        let response = router().oneshot(request).await.expect("response");
        assert_eq!(
            response.headers().get(REQUEST_ID_HEADER).and_then(|v| v.to_str().ok()),
            Some("abc-123")
        );

        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        let response = router().oneshot(request).await.expect("response");
        let minted = response
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .expect("minted id");
        assert!(Uuid::parse_str(minted).is_ok());
    }
}
