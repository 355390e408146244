//! # Request Metrics
//!
//! Counts requests by method and status class through the `metrics`
//! facade. Nothing is recorded unless a recorder is installed; the server
//! binary installs the Prometheus one and exposes it at `/metrics`.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let class = match response.status().as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    };
    metrics::counter!("fedlic_http_requests_total", "method" => method.clone(), "status" => class)
        .increment(1);
    metrics::histogram!("fedlic_http_request_duration_seconds", "method" => method)
        .record(started.elapsed().as_secs_f64());
    response
}
