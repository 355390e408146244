//! # fedlic-api — License Management and Enforcement Services
//!
//! Axum application exposing the license management API and applying the
//! license decision to every request that passes through it.
//!
//! ## API Surface
//!
//! | Route | Module | Notes |
//! |-------|--------|-------|
//! | `/v1/license` | [`routes::license`] | GET / PUT / POST / DELETE |
//! | `/health/liveness`, `/health/readiness` | here | unguarded health checks |
//! | `/metrics` | here | Prometheus exposition, when installed |
//!
//! Routes of the surrounding platform are mounted with [`app_with`] so they
//! sit behind the same enforcement filter.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → EnforcementFilter → Handler
//! ```
//!
//! ## Crate Policy
//!
//! - Handlers never recompute a persisted status; the filter reads only
//!   the in-process status cache.
//! - All errors map to structured HTTP responses via `AppError`.

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::AppError;
pub use middleware::enforcement::EnforcementConfig;
pub use state::AppState;

/// Assemble the application with the license API only.
pub fn app(state: AppState) -> Router {
    app_with(state, Router::new())
}

/// Assemble the application, placing `platform` routes behind the
/// enforcement filter next to the license API.
///
/// Health endpoints and `/metrics` are mounted outside the filter.
pub fn app_with(state: AppState, platform: Router) -> Router {
    let guarded = Router::new()
        .merge(routes::license::router())
        .with_state(state.clone())
        .merge(platform)
        .layer(from_fn_with_state(
            state.clone(),
            middleware::enforcement::enforcement_middleware,
        ));

    let health = Router::new()
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .route("/metrics", get(render_metrics))
        .with_state(state);

    Router::new()
        .merge(health)
        .merge(guarded)
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}

/// Liveness check: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 200 once the served license has a known status.
/// Members never evaluate, so they are always ready.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if !state.role().enforces() || state.cache().get(&state.key).is_some() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "license status pending")
    }
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
