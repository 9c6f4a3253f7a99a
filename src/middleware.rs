//! Access logging middleware.
//!
//! Generates a UUID v4 for each incoming request and creates a tracing span
//! carrying the request id, remote address, method and path. The completion
//! event adds the status code and duration, so every request produces one
//! access line. Timestamps come from the log formatter.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

/// Middleware that logs one access line per request.
///
/// This should be the outermost layer so the span wraps all request
/// processing.
pub async fn access_log_layer(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        remote = %remote,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let start = Instant::now();

    async move {
        let response = next.run(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            status = response.status().as_u16(),
            duration_ms,
            "Request completed"
        );

        response
    }
    .instrument(span)
    .await
}
