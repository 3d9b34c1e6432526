//! HTTP routing for the distribution and enrollment surfaces.
//!
//! Two routers, two listeners. The distribution router (`/init`, `/domain`)
//! is read-only and safe to expose to every node in the network; the
//! enrollment router carries the write path and stays on the admin
//! listener so it can be firewalled separately.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use genpool_store::GenesisStore;
use genpool_types::{EnrollmentRequest, PoolError, SequenceName, VERSION_HEADER};

use crate::coordinator::EnrollmentCoordinator;

/// Build the read-only genesis distribution router.
pub fn distribution_router(store: Arc<GenesisStore>) -> Router {
    Router::new()
        .route("/init", get(serve_pool_bundle))
        .route("/domain", get(serve_domain_bundle))
        .with_state(store)
}

/// Build the enrollment router for the admin listener.
pub fn enrollment_router(coordinator: Arc<EnrollmentCoordinator>) -> Router {
    Router::new()
        .route("/enroll", axum::routing::post(submit_enrollment))
        .route(
            "/enroll/:nonce",
            get(enrollment_status).delete(acknowledge_enrollment),
        )
        .with_state(coordinator)
}

async fn serve_pool_bundle(State(store): State<Arc<GenesisStore>>) -> Response {
    serve_bundle(&store, SequenceName::Pool)
}

async fn serve_domain_bundle(State(store): State<Arc<GenesisStore>>) -> Response {
    serve_bundle(&store, SequenceName::Domain)
}

/// Serve the current bundle for a sequence.
///
/// An empty sequence is a 503, not an empty 200: consumers must never
/// mistake a coordinator that has not been seeded for one distributing a
/// zero-record genesis. The 503 carries a `Retry-After` hint, since the
/// sequence becomes available as soon as it is seeded.
fn serve_bundle(store: &GenesisStore, sequence: SequenceName) -> Response {
    let snapshot = store.snapshot(sequence);
    if snapshot.is_empty() {
        tracing::debug!(sequence = %sequence, "bundle requested before sequence was seeded");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, HeaderValue::from_static("1"))],
            format!("{} genesis is not yet available\n", sequence),
        )
            .into_response();
    }

    let Ok(version_value) = HeaderValue::from_str(&snapshot.version.to_string()) else {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };
    let mut response = (StatusCode::OK, snapshot.to_text()).into_response();
    let headers = response.headers_mut();
    headers.insert(VERSION_HEADER, version_value);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

async fn submit_enrollment(
    State(coordinator): State<Arc<EnrollmentCoordinator>>,
    Json(request): Json<EnrollmentRequest>,
) -> Response {
    match coordinator.submit(&request).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e @ PoolError::Validation { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": e.to_string() })))
                .into_response()
        },
        Err(e) => {
            tracing::error!(nonce = %request.nonce, error = %e, "enrollment submission failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e.to_string() })))
                .into_response()
        },
    }
}

async fn enrollment_status(
    State(coordinator): State<Arc<EnrollmentCoordinator>>,
    Path(nonce): Path<String>,
) -> Response {
    match coordinator.status(&nonce) {
        Some(status) => (StatusCode::OK, Json(status)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no enrollment under nonce {nonce}") })),
        )
            .into_response(),
    }
}

async fn acknowledge_enrollment(
    State(coordinator): State<Arc<EnrollmentCoordinator>>,
    Path(nonce): Path<String>,
) -> Response {
    match coordinator.acknowledge(&nonce) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no terminal enrollment under nonce {nonce}") })),
        )
            .into_response(),
    }
}
