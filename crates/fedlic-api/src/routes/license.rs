//! # License Management API
//!
//! `GET|PUT|POST|DELETE /v1/license` on the served license object.
//!
//! - GET returns the persisted status as stored. An object that has no
//!   status yet is evaluated on the spot against live counts.
//! - PUT and POST verify and evaluate the submitted record inline and
//!   always answer `200` with `{record, status}`. A record rejected on
//!   content grounds (empty, malformed, bad signature, unknown type) is
//!   not stored and `record` is absent. An accepted record is stored with
//!   its status cleared, and the reconciler is triggered.
//! - DELETE removes the object; an absent object is not an error.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use fedlic_core::{LicenseObject, LicenseRecord, LicenseView, LICENSE_API_PATH};
use fedlic_reconciler::StoreError;
use tracing::{debug, info};

use crate::error::AppError;
use crate::state::AppState;

/// Read-modify-write attempts before a contended write gives up.
const WRITE_ATTEMPTS: usize = 3;

pub fn router() -> Router<AppState> {
    Router::new().route(
        LICENSE_API_PATH,
        get(get_license)
            .put(put_license)
            .post(put_license)
            .delete(delete_license),
    )
}

async fn get_license(State(state): State<AppState>) -> Result<Json<LicenseView>, AppError> {
    let object = state.store().get(&state.key).await?;
    if let Some(status) = object.as_ref().and_then(LicenseObject::status) {
        let record = object
            .as_ref()
            .and_then(|o| o.record().ok())
            .flatten();
        return Ok(Json(LicenseView { record, status }));
    }

    let payload = object.as_ref().and_then(LicenseObject::record_payload);
    let evaluation = state.reconciler.evaluate_live(payload).await?;
    Ok(Json(LicenseView {
        record: evaluation.record,
        status: evaluation.status,
    }))
}

async fn put_license(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<LicenseView>, AppError> {
    let payload = String::from_utf8_lossy(&body);
    let evaluation = state.reconciler.evaluate_live(Some(&payload)).await?;
    let status = evaluation.status;

    let record = match evaluation.record {
        Some(record) if !status.violation.kind.rejects_content() => record,
        _ => {
            info!(violation = %status.violation, "submitted license rejected");
            return Ok(Json(LicenseView {
                record: None,
                status,
            }));
        }
    };

    store_record(&state, &record).await?;
    info!(
        id = %record.id,
        license_type = %record.license_type,
        violation = %status.violation,
        "license installed"
    );
    state.record_changed();
    Ok(Json(LicenseView {
        record: Some(record),
        status,
    }))
}

async fn delete_license(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    match state.store().delete(&state.key).await {
        Ok(()) => info!(key = %state.key, "license removed"),
        Err(e) if e.is_not_found() => debug!(key = %state.key, "no license to remove"),
        Err(e) => return Err(e.into()),
    }
    state.record_changed();
    Ok(StatusCode::NO_CONTENT)
}

/// Write `record` into the served object with its status cleared,
/// re-reading on conflicting concurrent writes.
async fn store_record(state: &AppState, record: &LicenseRecord) -> Result<(), AppError> {
    let mut attempt = 1;
    loop {
        let mut object = state
            .store()
            .get(&state.key)
            .await?
            .unwrap_or_else(|| LicenseObject::new(&state.key));
        object
            .set_record(record)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        object.clear_status();

        match state.store().put(object).await {
            Ok(_) => return Ok(()),
            Err(e @ (StoreError::Conflict { .. } | StoreError::NotFound(_)))
                if attempt < WRITE_ATTEMPTS =>
            {
                debug!(attempt, error = %e, "license write raced, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
