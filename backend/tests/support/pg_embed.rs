//! Embedded PostgreSQL bootstrap for the Diesel adapter suites.
//!
//! Each test gets its own temporary database on a process-wide cluster,
//! migrated with the crate's embedded migrations so the schema under test is
//! exactly what the server applies.
//!
//! When the cluster cannot start (no binaries, no network) the suite prints
//! a `SKIP-TEST-CLUSTER` marker and skips. Set `REQUIRE_TEST_CLUSTER=1` to
//! turn setup failures into test failures instead.

use fastpay_backend::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use pg_embedded_setup_unpriv::TemporaryDatabase;
use tokio::runtime::Runtime;

/// True when `REQUIRE_TEST_CLUSTER` is `1`, `true` or `yes`.
fn cluster_required() -> bool {
    std::env::var("REQUIRE_TEST_CLUSTER")
        .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Skip with a marker, or panic when the cluster is required.
pub fn handle_cluster_setup_failure<T>(reason: impl std::fmt::Display) -> Option<T> {
    if cluster_required() {
        panic!("Test cluster setup failed: {reason}");
    }
    eprintln!("SKIP-TEST-CLUSTER: {reason}");
    None
}

/// A migrated temporary database with a pool and the runtime that owns it.
///
/// Field order matters: the pool is dropped while its runtime is still alive
/// and the database is dropped last.
pub struct PgDatabase {
    pub pool: DbPool,
    pub runtime: Runtime,
    _database: TemporaryDatabase,
}

impl PgDatabase {
    /// Run `future` to completion on the database runtime.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Provision and migrate a fresh database.
///
/// Must be called outside any Tokio runtime; cluster bootstrap blocks.
pub fn migrated_database() -> Result<PgDatabase, String> {
    let cluster = pg_embedded_setup_unpriv::test_support::shared_cluster_handle()
        .map_err(|err| format!("start cluster: {err:?}"))?;
    let database = cluster
        .temporary_database(format!("fastpay_test_{}", uuid::Uuid::new_v4().simple()))
        .map_err(|err| format!("create database: {err:?}"))?;
    let url = database.url().to_string();

    let runtime = Runtime::new().map_err(|err| err.to_string())?;
    runtime
        .block_on(run_pending_migrations(&url))
        .map_err(|err| format!("migrate: {err}"))?;
    let pool = runtime
        .block_on(DbPool::new(
            PoolConfig::new(&url)
                .with_max_size(2)
                .with_min_idle(Some(1)),
        ))
        .map_err(|err| format!("pool: {err}"))?;

    Ok(PgDatabase {
        pool,
        runtime,
        _database: database,
    })
}
