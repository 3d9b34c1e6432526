//! Integration tests for genesis bundle fetching against a live HTTP
//! server backed by a real on-disk store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use genpool_client::{ClientError, PoolClient, RetryPolicy, VERSION_HEADER};
use genpool_store::GenesisStore;
use genpool_test_utils::{TestDir, write_genesis_files};
use genpool_types::SequenceName;

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(10),
        multiplier: 2.0,
        jitter: 0.0,
    }
}

fn bundle_response(store: &GenesisStore, sequence: SequenceName) -> Response {
    let snapshot = store.snapshot(sequence);
    if snapshot.is_empty() {
        return (StatusCode::SERVICE_UNAVAILABLE, "genesis not yet available").into_response();
    }
    let mut response = (StatusCode::OK, snapshot.to_text()).into_response();
    response.headers_mut().insert(
        VERSION_HEADER,
        HeaderValue::from_str(&snapshot.version.to_string()).unwrap(),
    );
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

async fn spawn_server(store: Arc<GenesisStore>) -> String {
    let app = Router::new()
        .route("/init", get(|State(s): State<Arc<GenesisStore>>| async move {
            bundle_response(&s, SequenceName::Pool)
        }))
        .route("/domain", get(|State(s): State<Arc<GenesisStore>>| async move {
            bundle_response(&s, SequenceName::Domain)
        }))
        .with_state(store);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_fetch_pool_and_domain_bundles() {
    let dir = TestDir::new();
    write_genesis_files(dir.path(), 4);
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let base = spawn_server(Arc::clone(&store)).await;

    let client = PoolClient::new(&base).with_retry_policy(fast_retry());

    let pool = client.fetch_genesis(SequenceName::Pool).await.unwrap();
    assert_eq!(pool.version, 1);
    assert_eq!(pool.len(), 4);

    let domain = client.fetch_genesis(SequenceName::Domain).await.unwrap();
    assert_eq!(domain.version, 1);
    assert!(domain.records.iter().any(|r| r.as_str().contains("TRUSTEE")));
}

#[tokio::test]
async fn test_empty_sequence_yields_retry_exhausted() {
    let dir = TestDir::new();
    // No genesis files on disk: both sequences are empty, server returns 503.
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let base = spawn_server(store).await;

    let client = PoolClient::new(&base).with_retry_policy(fast_retry());
    let err = client.fetch_genesis(SequenceName::Pool).await.unwrap_err();
    assert!(matches!(err, ClientError::RetryExhausted { attempts: 3, .. }), "got {err}");
}

#[tokio::test]
async fn test_missing_version_header_is_not_retried() {
    let app = Router::new().route("/init", get(|| async { "some-record\n" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = PoolClient::new(format!("http://{addr}")).with_retry_policy(fast_retry());
    let err = client.fetch_genesis(SequenceName::Pool).await.unwrap_err();
    assert!(matches!(err, ClientError::MissingVersion { .. }), "got {err}");
}

#[tokio::test]
async fn test_fetch_reflects_appended_records() {
    let dir = TestDir::new();
    write_genesis_files(dir.path(), 4);
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let base = spawn_server(Arc::clone(&store)).await;

    let client = PoolClient::new(&base).with_retry_policy(fast_retry());
    let before = client.fetch_genesis(SequenceName::Pool).await.unwrap();
    assert_eq!(before.version, 1);

    let record = genpool_test_utils::validator_record(5);
    let new_version = store.append(SequenceName::Pool, record, before.version).unwrap();
    assert_eq!(new_version, 2);

    let after = client.fetch_genesis(SequenceName::Pool).await.unwrap();
    assert_eq!(after.version, 2);
    assert_eq!(after.len(), 5);
}
