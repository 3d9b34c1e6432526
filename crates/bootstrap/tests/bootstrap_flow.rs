//! End-to-end bootstrap tests against a live in-process coordinator.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use axum::{
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use genpool_bootstrap::{BootstrapConfig, BootstrapError, BootstrapState, NodeBootstrapper};
use genpool_server::{coordinator::EnrollmentCoordinator, routes};
use genpool_store::GenesisStore;
use genpool_test_utils::{TestDir, write_genesis_files};
use genpool_types::{NodeIdentity, SequenceName, VERSION_HEADER};

struct Coordinator {
    url: String,
    store: Arc<GenesisStore>,
    _dir: TestDir,
}

/// Seed a store with 4 validators and serve the full surface on one port.
async fn spawn_coordinator() -> Coordinator {
    let dir = TestDir::new();
    write_genesis_files(dir.path(), 4);
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let coordinator = Arc::new(EnrollmentCoordinator::new(Arc::clone(&store), 5));

    let app = routes::enrollment_router(coordinator)
        .merge(routes::distribution_router(Arc::clone(&store)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Coordinator { url, store, _dir: dir }
}

#[tokio::test]
async fn test_full_bootstrap_reaches_registered() {
    let coordinator = spawn_coordinator().await;
    let node_dir = TestDir::new();
    let config = BootstrapConfig::for_test(
        &coordinator.url,
        node_dir.path().to_path_buf(),
        "Node5",
    );

    let bootstrapper = NodeBootstrapper::new(config);
    let state = bootstrapper.run().await.unwrap();
    assert_eq!(state, BootstrapState::Registered);

    // All artifacts are on disk.
    let paths = bootstrapper.paths();
    assert!(paths.install_marker.exists());
    assert!(paths.identity.exists());
    assert!(paths.receipt.exists());
    for sequence in SequenceName::ALL {
        let content = std::fs::read_to_string(paths.genesis(sequence)).unwrap();
        assert!(content.ends_with('\n'));
        assert!(!content.is_empty());
    }

    // The node landed in the pool bundle as version 2 of 5 records.
    let pool = coordinator.store.snapshot(SequenceName::Pool);
    assert_eq!((pool.version, pool.len()), (2, 5));
    assert!(pool.records.iter().any(|r| r.as_str().contains("Node5")));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let coordinator = spawn_coordinator().await;
    let node_dir = TestDir::new();
    let config = BootstrapConfig::for_test(
        &coordinator.url,
        node_dir.path().to_path_buf(),
        "Node5",
    );

    let bootstrapper = NodeBootstrapper::new(config.clone());
    bootstrapper.run().await.unwrap();
    let identity_before = NodeIdentity::load(&bootstrapper.paths().identity).unwrap();

    // Second run: same identity, same nonce, no second record.
    let state = NodeBootstrapper::new(config).run().await.unwrap();
    assert_eq!(state, BootstrapState::Registered);

    let identity_after = NodeIdentity::load(&bootstrapper.paths().identity).unwrap();
    assert_eq!(identity_before, identity_after, "re-run must not re-derive the identity");

    let pool = coordinator.store.snapshot(SequenceName::Pool);
    assert_eq!((pool.version, pool.len()), (2, 5));
}

#[tokio::test]
async fn test_run_command_reaches_running_and_substitutes() {
    let coordinator = spawn_coordinator().await;
    let node_dir = TestDir::new();
    let marker = node_dir.join("started");
    let mut config = BootstrapConfig::for_test(
        &coordinator.url,
        node_dir.path().to_path_buf(),
        "Node5",
    );
    config.run_command =
        Some(format!("echo {{alias}}:{{node_port}}:{{client_port}} > {}", marker.display()));

    let state = NodeBootstrapper::new(config).run().await.unwrap();
    assert_eq!(state, BootstrapState::Running);
    assert_eq!(std::fs::read_to_string(&marker).unwrap().trim(), "Node5:9701:9702");
}

#[tokio::test]
async fn test_install_runs_once_across_reruns() {
    let coordinator = spawn_coordinator().await;
    let node_dir = TestDir::new();
    let log = node_dir.join("install.log");
    let mut config = BootstrapConfig::for_test(
        &coordinator.url,
        node_dir.path().to_path_buf(),
        "Node5",
    );
    config.install_command = Some(format!("echo installed >> {}", log.display()));

    NodeBootstrapper::new(config.clone()).run().await.unwrap();
    NodeBootstrapper::new(config).run().await.unwrap();

    // The marker short-circuits the second run's install step.
    assert_eq!(std::fs::read_to_string(&log).unwrap().lines().count(), 1);
}

#[tokio::test]
async fn test_failing_run_command_is_fatal() {
    let coordinator = spawn_coordinator().await;
    let node_dir = TestDir::new();
    let mut config = BootstrapConfig::for_test(
        &coordinator.url,
        node_dir.path().to_path_buf(),
        "Node5",
    );
    config.run_command = Some("exit 7".to_string());

    let err = NodeBootstrapper::new(config).run().await.unwrap_err();
    assert!(matches!(err, BootstrapError::Process { code: 7, .. }));
    assert_eq!(err.exit_code(), genpool_bootstrap::EXIT_SOFTWARE);
}

fn bundle_response(store: &GenesisStore, sequence: SequenceName) -> Response {
    let snapshot = store.snapshot(sequence);
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

/// `/init` that fails with 503 for the first three requests.
async fn flaky_init(
    State((store, hits)): State<(Arc<GenesisStore>, Arc<AtomicU32>)>,
) -> Response {
    if hits.fetch_add(1, Ordering::SeqCst) < 3 {
        return (StatusCode::SERVICE_UNAVAILABLE, "warming up").into_response();
    }
    bundle_response(&store, SequenceName::Pool)
}

async fn steady_domain(
    State((store, _)): State<(Arc<GenesisStore>, Arc<AtomicU32>)>,
) -> Response {
    bundle_response(&store, SequenceName::Domain)
}

#[tokio::test]
async fn test_fetch_retries_through_transient_unavailability() {
    let dir = TestDir::new();
    write_genesis_files(dir.path(), 4);
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let coordinator = Arc::new(EnrollmentCoordinator::new(Arc::clone(&store), 5));
    let hits = Arc::new(AtomicU32::new(0));

    // A distribution surface whose /init fails three times, then recovers.
    let app = axum::Router::new()
        .route("/init", get(flaky_init))
        .route("/domain", get(steady_domain))
        .with_state((Arc::clone(&store), Arc::clone(&hits)))
        .merge(routes::enrollment_router(coordinator));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let node_dir = TestDir::new();
    let config = BootstrapConfig::for_test(&url, node_dir.path().to_path_buf(), "Node5");
    let bootstrapper = NodeBootstrapper::new(config);
    let state = bootstrapper.run().await.unwrap();

    assert_eq!(state, BootstrapState::Registered);
    assert!(hits.load(Ordering::SeqCst) >= 4, "the 503s must have been retried through");
    let content = std::fs::read_to_string(bootstrapper.paths().genesis(SequenceName::Pool)).unwrap();
    assert_eq!(content.lines().count(), 4);
}
