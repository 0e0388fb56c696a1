//! Copy messages from Firebase into Postgres and prune Firebase to the newest N.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use tokio::runtime::Builder;
use tracing::info;

use fastpay_backend::cli::{
    DRY_RUN_BANNER, init_tracing, message_sync_device_summary, message_sync_fleet_summary,
};
use fastpay_backend::domain::{DeviceId, DeviceIdError};
use fastpay_backend::outbound::persistence::{DbPool, PoolConfig};
use fastpay_backend::settings::FleetSyncSettings;
use fastpay_backend::wiring;

/// `sync-firebase-messages` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sync-firebase-messages",
    about = "Sync messages from Firebase and keep only the latest N per device in Firebase",
    version
)]
struct CliArgs {
    /// Stored device to sync; every stored device when omitted.
    #[arg(long = "device-id", value_name = "id", value_parser = parse_device_id)]
    device_id: Option<DeviceId>,
    /// Messages to keep in Firebase after the sync. Defaults to the
    /// configured value (100).
    #[arg(long = "keep-latest", value_name = "n")]
    keep_latest: Option<usize>,
    /// Report what would be synced without writing or pruning.
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Database connection URL. Falls back to settings, then `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

fn parse_device_id(raw: &str) -> Result<DeviceId, DeviceIdError> {
    DeviceId::new(raw)
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = CliArgs::parse();
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to create Tokio runtime")?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: CliArgs) -> Result<()> {
    init_tracing();
    let settings = FleetSyncSettings::load_ambient("sync-firebase-messages")?;
    let database_url = settings.resolve_database_url(args.database_url.clone())?;
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .wrap_err("failed to create database pool")?;
    let tree = wiring::tree_source(&settings)?;
    let (service, _) = wiring::sync_services(&pool, tree);
    let keep_latest = args.keep_latest.unwrap_or_else(|| settings.keep_latest());

    if args.dry_run {
        println!("{DRY_RUN_BANNER}");
    }
    let lines = match &args.device_id {
        Some(device_id) => {
            println!("Syncing device: {device_id}");
            let run = service
                .run_message_sync_device(device_id, keep_latest, args.dry_run)
                .await
                .map_err(|error| eyre!("{}", error.message()))?;
            info!(device_id = %device_id, log_id = ?run.log_id, "message sync finished");
            message_sync_device_summary(device_id, keep_latest, &run)
        }
        None => {
            println!("Syncing all devices...");
            let run = service
                .run_message_sync_fleet(keep_latest, args.dry_run)
                .await;
            info!(log_id = ?run.log_id, "fleet message sync finished");
            message_sync_fleet_summary(keep_latest, &run)
        }
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}
