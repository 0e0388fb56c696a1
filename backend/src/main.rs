//! Backend entry-point: loads settings, applies migrations on request, and
//! serves the sync REST endpoints with OpenAPI docs.

mod server;

use std::io;

use actix_web::web;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use fastpay_backend::inbound::http::health::HealthState;
use fastpay_backend::outbound::persistence::{DbPool, PoolConfig, run_pending_migrations};
use fastpay_backend::settings::FleetSyncSettings;
use fastpay_backend::wiring;
use server::{ServerConfig, create_server};

/// Application bootstrap.
#[actix_web::main]
async fn main() -> io::Result<()> {
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = FleetSyncSettings::load_ambient("fastpay-backend").map_err(io::Error::other)?;
    let database_url = settings
        .resolve_database_url(None)
        .map_err(io::Error::other)?;

    if settings.run_migrations {
        let applied = run_pending_migrations(&database_url)
            .await
            .map_err(|e| io::Error::other(format!("apply migrations: {e}")))?;
        info!(applied, "database migrations applied");
    }

    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .map_err(|e| io::Error::other(format!("create database pool: {e}")))?;
    let tree_source = wiring::tree_source(&settings).map_err(io::Error::other)?;
    let bind_addr = settings.bind_addr().map_err(io::Error::other)?;

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(
        health_state,
        ServerConfig::new(bind_addr, pool, tree_source),
    )?;
    info!(%bind_addr, "server listening");
    server.await
}
