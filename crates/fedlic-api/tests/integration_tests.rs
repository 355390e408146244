//! # Integration Tests for fedlic-api
//!
//! Drives the assembled router with `oneshot` requests: the license
//! management API, the enforcement filter in front of platform routes,
//! and the health endpoints.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::routing::{delete, get};
use axum::Router;
use chrono::{Duration, SubsecRound, Utc};
use fedlic_core::{
    DeploymentRole, LicenseObject, LicenseRecord, LicenseStatus, LicenseView, RecordKey,
    ResourceCount, ResourceCounts, Violation, ViolationType,
};
use fedlic_crypto::{fixtures, signed};
use fedlic_policy::LicenseVerifier;
use fedlic_reconciler::{
    LicenseReconciler, LicenseStore, LoopConfig, MemoryLicenseStore, ReconcileLoop, StaticCounts,
    StatusCache,
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use fedlic_api::middleware::enforcement::{
    HEADER_CURRENT, HEADER_EXPECTED, HEADER_TYPE, LICENSE_VIOLATION_STATUS,
};
use fedlic_api::AppState;

struct Harness {
    app: Router,
    state: AppState,
    store: Arc<MemoryLicenseStore>,
}

fn counts(host_nodes: u64) -> ResourceCounts {
    ResourceCounts {
        host: ResourceCount {
            node_num: host_nodes,
            core_num: host_nodes * 4,
        },
        member: ResourceCount::default(),
        cluster_num: 1,
    }
}

/// Platform routes standing in for the rest of the management plane.
fn platform() -> Router {
    Router::new()
        .route(
            "/v1/workloads",
            get(|| async { "listed" }).post(|| async { StatusCode::CREATED }),
        )
        .route("/v1/clusters/{name}", delete(|| async { StatusCode::NO_CONTENT }))
}

fn harness(role: DeploymentRole, host_nodes: u64) -> Harness {
    let store = Arc::new(MemoryLicenseStore::new());
    let reconciler = Arc::new(LicenseReconciler::new(
        role,
        store.clone(),
        LicenseVerifier::new(Arc::new(fixtures::trust_anchor())),
        Arc::new(StaticCounts(counts(host_nodes))),
        Arc::new(StatusCache::new()),
    ));
    // The loop never runs; triggers from handlers are dropped.
    let handle = ReconcileLoop::new(reconciler.clone(), LoopConfig::default()).handle();
    let state = AppState::new(reconciler).with_reconcile_handle(handle);
    Harness {
        app: fedlic_api::app_with(state.clone(), platform()),
        state,
        store,
    }
}

fn record(max_node: u64) -> LicenseRecord {
    // Whole seconds, as records come back from the wire.
    let now = Utc::now().trunc_subsecs(0);
    let rec = LicenseRecord {
        id: "lic-api".into(),
        license_type: "subscription".into(),
        subject: "acme".into(),
        issuer: "fedlic".into(),
        not_before: Some(now - Duration::days(1)),
        not_after: Some(now + Duration::days(90)),
        max_cluster: 1,
        max_node,
        ..Default::default()
    };
    signed(&rec, &fixtures::signing_key()).unwrap()
}

fn publish(state: &AppState, violation: Violation) {
    state
        .cache()
        .publish(RecordKey::default(), LicenseStatus::new(counts(4), violation));
}

async fn send(app: &Router, method: Method, uri: &str, body: Body) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().method(method).uri(uri).body(body).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn view(response: axum::response::Response) -> LicenseView {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

// -- Health Endpoints ---------------------------------------------------------

#[tokio::test]
async fn liveness_is_always_ok() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::GET, "/health/liveness", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
}

#[tokio::test]
async fn readiness_waits_for_a_status() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::GET, "/health/readiness", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    publish(&h.state, Violation::none());
    let response = send(&h.app, Method::GET, "/health/readiness", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn member_is_ready_without_status() {
    let h = harness(DeploymentRole::Member, 1);
    let response = send(&h.app, Method::GET, "/health/readiness", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_absent_without_recorder() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::GET, "/metrics", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- License Management API ---------------------------------------------------

#[tokio::test]
async fn get_without_record_is_empty_license() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::GET, "/v1/license", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert!(v.record.is_none());
    assert_eq!(v.status.violation.kind, ViolationType::EmptyLicense);
}

#[tokio::test]
async fn put_valid_record_is_stored_with_status_cleared() {
    let h = harness(DeploymentRole::Standalone, 2);
    let rec = record(3);
    let response = send(&h.app, Method::PUT, "/v1/license", Body::from(rec.to_json().unwrap())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert_eq!(v.record.as_ref(), Some(&rec));
    assert!(v.status.violation.is_none());
    assert_eq!(v.status.host.node_num, 2);

    let stored = h.store.get(&RecordKey::default()).await.unwrap().unwrap();
    assert_eq!(stored.record().unwrap(), Some(rec));
    assert!(stored.status().is_none());
}

#[tokio::test]
async fn put_replaces_and_clears_previous_status() {
    let h = harness(DeploymentRole::Standalone, 2);
    let mut existing = LicenseObject::new(&RecordKey::default());
    existing.set_record(&record(1)).unwrap();
    existing
        .set_status(&LicenseStatus::new(
            counts(2),
            Violation::overflow(ViolationType::NodeOverflow, 2, 1),
        ))
        .unwrap();
    h.store.put(existing).await.unwrap();

    let rec = record(10);
    let response = send(&h.app, Method::POST, "/v1/license", Body::from(rec.to_json().unwrap())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let stored = h.store.get(&RecordKey::default()).await.unwrap().unwrap();
    assert_eq!(stored.record().unwrap().unwrap().max_node, 10);
    assert!(stored.status().is_none());
}

#[tokio::test]
async fn over_limit_record_is_stored_and_reported() {
    let h = harness(DeploymentRole::Host, 5);
    let response = send(
        &h.app,
        Method::PUT,
        "/v1/license",
        Body::from(record(3).to_json().unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert!(v.record.is_some());
    assert_eq!(
        v.status.violation,
        Violation::overflow(ViolationType::NodeOverflow, 5, 3)
    );
    assert!(h.store.get(&RecordKey::default()).await.unwrap().is_some());
}

#[tokio::test]
async fn malformed_record_is_reported_not_stored() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::PUT, "/v1/license", Body::from("{\"id\": 7,")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert!(v.record.is_none());
    assert_eq!(v.status.violation.kind, ViolationType::FormatError);
    assert!(h.store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn tampered_record_is_reported_not_stored() {
    let h = harness(DeploymentRole::Standalone, 1);
    let mut rec = record(3);
    rec.max_node = 1000;
    let response = send(&h.app, Method::PUT, "/v1/license", Body::from(rec.to_json().unwrap())).await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert!(v.record.is_none());
    assert_eq!(v.status.violation.kind, ViolationType::InvalidSignature);
    assert!(h.store.list_keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_body_is_empty_license() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::PUT, "/v1/license", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(view(response).await.status.violation.kind, ViolationType::EmptyLicense);
}

#[tokio::test]
async fn get_returns_persisted_status_verbatim() {
    let h = harness(DeploymentRole::Standalone, 1);
    let persisted = LicenseStatus::new(
        ResourceCounts {
            cluster_num: 2,
            ..counts(1)
        },
        Violation::overflow(ViolationType::ClusterOverflow, 2, 1),
    );
    let mut object = LicenseObject::new(&RecordKey::default());
    object.set_record(&record(3)).unwrap();
    object.set_status(&persisted).unwrap();
    h.store.put(object).await.unwrap();

    let v = view(send(&h.app, Method::GET, "/v1/license", Body::empty()).await).await;
    assert_eq!(v.status, persisted);
    assert_eq!(v.record.unwrap().id, "lic-api");
}

#[tokio::test]
async fn get_without_status_evaluates_live() {
    let h = harness(DeploymentRole::Standalone, 4);
    let mut object = LicenseObject::new(&RecordKey::default());
    object.set_record(&record(3)).unwrap();
    h.store.put(object).await.unwrap();

    let v = view(send(&h.app, Method::GET, "/v1/license", Body::empty()).await).await;
    assert_eq!(v.status.violation.kind, ViolationType::NodeOverflow);
    // Nothing is persisted by a read.
    let stored = h.store.get(&RecordKey::default()).await.unwrap().unwrap();
    assert!(stored.status().is_none());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::DELETE, "/v1/license", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let mut object = LicenseObject::new(&RecordKey::default());
    object.set_record(&record(3)).unwrap();
    h.store.put(object).await.unwrap();
    let response = send(&h.app, Method::DELETE, "/v1/license", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(h.store.get(&RecordKey::default()).await.unwrap().is_none());
}

// -- Enforcement Filter -------------------------------------------------------

#[tokio::test]
async fn violation_blocks_mutations_outside_exempt_paths() {
    let h = harness(DeploymentRole::Standalone, 4);
    publish(&h.state, Violation::overflow(ViolationType::NodeOverflow, 4, 3));

    let response = send(&h.app, Method::POST, "/v1/workloads", Body::empty()).await;
    assert_eq!(response.status().as_u16(), LICENSE_VIOLATION_STATUS);
    assert!(body_bytes(response).await.is_empty());

    // The license API stays writable so the violation can be fixed.
    let response = send(
        &h.app,
        Method::PUT,
        "/v1/license",
        Body::from(record(10).to_json().unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Removing a member cluster is allowed.
    let response = send(&h.app, Method::DELETE, "/v1/clusters/member-1", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn violation_annotates_reads() {
    let h = harness(DeploymentRole::Standalone, 4);
    publish(&h.state, Violation::overflow(ViolationType::NodeOverflow, 4, 3));

    let response = send(&h.app, Method::GET, "/v1/workloads", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[HEADER_TYPE], "NodeOverflow");
    assert_eq!(headers[HEADER_CURRENT], "4");
    assert_eq!(headers[HEADER_EXPECTED], "3");
    assert_eq!(body_bytes(response).await, b"listed");
}

#[tokio::test]
async fn compliant_status_passes_through_untouched() {
    let h = harness(DeploymentRole::Standalone, 1);
    publish(&h.state, Violation::none());

    let response = send(&h.app, Method::POST, "/v1/workloads", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(&h.app, Method::GET, "/v1/workloads", Body::empty()).await;
    assert!(response.headers().get(HEADER_TYPE).is_none());
}

#[tokio::test]
async fn unknown_status_fails_open() {
    let h = harness(DeploymentRole::Standalone, 1);
    let response = send(&h.app, Method::POST, "/v1/workloads", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn member_get_reports_record_without_local_limits() {
    let h = harness(DeploymentRole::Member, 9);
    let mut existing = LicenseObject::new(&RecordKey::default());
    existing.set_record(&record(3)).unwrap();
    h.store.put(existing).await.unwrap();

    let response = send(&h.app, Method::GET, "/v1/license", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let v = view(response).await;
    assert_eq!(v.record.unwrap().max_node, 3);
    assert!(v.status.violation.is_none());
    assert_eq!(v.status.counts(), ResourceCounts::default());
}

#[tokio::test]
async fn member_put_accepts_record_over_local_counts() {
    let h = harness(DeploymentRole::Member, 9);
    let response = send(
        &h.app,
        Method::PUT,
        "/v1/license",
        Body::from(record(3).to_json().unwrap()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(view(response).await.status.violation.is_none());

    // Content is still checked.
    let response = send(&h.app, Method::PUT, "/v1/license", Body::from("{\"id\":")).await;
    let v = view(response).await;
    assert!(v.record.is_none());
    assert_eq!(v.status.violation.kind, ViolationType::FormatError);
}

#[tokio::test]
async fn member_role_is_never_enforced() {
    let h = harness(DeploymentRole::Member, 1);
    publish(&h.state, Violation::new(ViolationType::TimeExpired));

    let response = send(&h.app, Method::POST, "/v1/workloads", Body::empty()).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = send(&h.app, Method::GET, "/v1/workloads", Body::empty()).await;
    assert!(response.headers().get(HEADER_TYPE).is_none());
}

#[tokio::test]
async fn health_endpoints_are_not_annotated() {
    let h = harness(DeploymentRole::Standalone, 1);
    publish(&h.state, Violation::empty_license());
    let response = send(&h.app, Method::GET, "/health/liveness", Body::empty()).await;
    assert!(response.headers().get(HEADER_TYPE).is_none());
}
