//! Shared helpers for server integration tests.

#![allow(clippy::unwrap_used, clippy::expect_used, dead_code)]

use std::sync::Arc;

use genpool_server::{coordinator::EnrollmentCoordinator, routes};
use genpool_store::GenesisStore;
use genpool_test_utils::TestDir;

/// A coordinator serving on two ephemeral ports.
pub struct SpawnedServer {
    /// Base URL of the distribution listener (`/init`, `/domain`).
    pub base_url: String,
    /// Base URL of the enrollment listener (`/enroll`).
    pub admin_url: String,
    /// Handle on the backing store, for direct inspection.
    pub store: Arc<GenesisStore>,
    /// Handle on the coordinator, for direct inspection.
    pub coordinator: Arc<EnrollmentCoordinator>,
    // Dropped with the server; keeps the data directory alive.
    _dir: TestDir,
}

/// Open a store over `dir` and serve both routers on ephemeral ports.
pub async fn spawn_server(dir: TestDir) -> SpawnedServer {
    let store = Arc::new(GenesisStore::open(dir.path()).unwrap());
    let coordinator = Arc::new(EnrollmentCoordinator::new(Arc::clone(&store), 5));

    let distribution = routes::distribution_router(Arc::clone(&store));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, distribution).await.unwrap();
    });

    // Admin surface carries enrollment plus bundle reads, as in production.
    let enrollment = routes::enrollment_router(Arc::clone(&coordinator))
        .merge(routes::distribution_router(Arc::clone(&store)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let admin_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, enrollment).await.unwrap();
    });

    SpawnedServer { base_url, admin_url, store, coordinator, _dir: dir }
}
