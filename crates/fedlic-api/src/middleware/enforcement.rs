//! # Enforcement Filter
//!
//! Request-path middleware that applies the cached license decision.
//!
//! | Condition | Effect |
//! |-----------|--------|
//! | member role, unknown status, or no violation | pass through untouched |
//! | mutating verb on an exempt path | pass through |
//! | any other mutating verb | `460`, empty body |
//! | read verb | pass through, `x-license-violation-*` response headers |
//!
//! Exempt paths: the license management API, the authentication/session
//! API, and `DELETE` under the cluster API (so an operator can shrink the
//! federation back within limits).
//!
//! The filter reads the [`StatusCache`](fedlic_reconciler::StatusCache)
//! only. It never touches the store or the aggregator.

use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fedlic_core::{Violation, LICENSE_API_PATH};

use crate::state::AppState;

/// Reserved status for requests blocked by a license violation.
pub const LICENSE_VIOLATION_STATUS: u16 = 460;

pub const HEADER_TYPE: &str = "x-license-violation-type";
pub const HEADER_EXPECTED: &str = "x-license-violation-expected";
pub const HEADER_CURRENT: &str = "x-license-violation-current";
pub const HEADER_START_TIME: &str = "x-license-violation-start-time";
pub const HEADER_END_TIME: &str = "x-license-violation-end-time";

/// Path prefixes exempt from blocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementConfig {
    /// License management API (default: `/v1/license`).
    pub license_prefixes: Vec<String>,
    /// Authentication and session API (default: `/oauth`, `/v1/sessions`).
    pub session_prefixes: Vec<String>,
    /// Cluster management API; only `DELETE` is exempt (default: `/v1/clusters`).
    pub cluster_prefixes: Vec<String>,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            license_prefixes: vec![LICENSE_API_PATH.to_string()],
            session_prefixes: vec!["/oauth".to_string(), "/v1/sessions".to_string()],
            cluster_prefixes: vec!["/v1/clusters".to_string()],
        }
    }
}

impl EnforcementConfig {
    /// Whether a mutating request may proceed despite a violation.
    pub fn exempts(&self, method: &Method, path: &str) -> bool {
        let any_under = |prefixes: &[String]| prefixes.iter().any(|p| is_under(path, p));
        any_under(&self.license_prefixes)
            || any_under(&self.session_prefixes)
            || (method == Method::DELETE && any_under(&self.cluster_prefixes))
    }
}

/// `path` equals `prefix` or lies beneath it.
fn is_under(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn is_mutating(method: &Method) -> bool {
    matches!(
        *method,
        Method::POST | Method::PUT | Method::DELETE | Method::PATCH
    )
}

pub fn violation_status() -> StatusCode {
    StatusCode::from_u16(LICENSE_VIOLATION_STATUS).unwrap_or(StatusCode::FORBIDDEN)
}

/// Set the violation headers on `headers`. Absent fields are skipped.
pub fn annotate(headers: &mut HeaderMap, violation: &Violation) {
    let mut set = |name: &'static str, value: Option<HeaderValue>| {
        if let Some(value) = value {
            headers.insert(HeaderName::from_static(name), value);
        }
    };
    set(HEADER_TYPE, Some(HeaderValue::from_static(violation.kind.as_str())));
    set(HEADER_EXPECTED, violation.expected.map(HeaderValue::from));
    set(HEADER_CURRENT, violation.current.map(HeaderValue::from));
    set(
        HEADER_START_TIME,
        violation
            .start
            .and_then(|t| HeaderValue::from_str(&t.to_rfc3339()).ok()),
    );
    set(
        HEADER_END_TIME,
        violation
            .end
            .and_then(|t| HeaderValue::from_str(&t.to_rfc3339()).ok()),
    );
}

pub async fn enforcement_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if !state.role().enforces() {
        return next.run(request).await;
    }
    let violation = match state.cache().get(&state.key) {
        Some(status) if !status.violation.is_none() => status.violation.clone(),
        _ => return next.run(request).await,
    };

    let method = request.method().clone();
    if is_mutating(&method) {
        if state.enforcement.exempts(&method, request.uri().path()) {
            return next.run(request).await;
        }
        tracing::debug!(
            %method,
            path = request.uri().path(),
            violation = %violation.kind,
            "request blocked by license violation"
        );
        metrics::counter!(
            "fedlic_enforcement_blocked_total",
            "violation" => violation.kind.as_str()
        )
        .increment(1);
        return violation_status().into_response();
    }

    let mut response = next.run(request).await;
    annotate(response.headers_mut(), &violation);
    metrics::counter!("fedlic_enforcement_annotated_total", "violation" => violation.kind.as_str())
        .increment(1);
    response
}
