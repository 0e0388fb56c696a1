//! Reconcile device info, messages, notifications and contacts from Firebase.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use clap::Parser;
use color_eyre::eyre::{Context, Result};
use tokio::runtime::Builder;
use tracing::info;

use fastpay_backend::cli::{
    DRY_RUN_BANNER, hard_sync_device_summary, hard_sync_fleet_summary, init_tracing,
};
use fastpay_backend::domain::{DeviceId, DeviceIdError};
use fastpay_backend::outbound::persistence::{DbPool, PoolConfig};
use fastpay_backend::settings::FleetSyncSettings;
use fastpay_backend::wiring;

/// `hard-sync-firebase` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "hard-sync-firebase",
    about = "Hard sync: pull complete Firebase data device by device into Postgres",
    version
)]
struct CliArgs {
    /// Device to sync; every device listed in Firebase when omitted.
    #[arg(long = "device-id", value_name = "id", value_parser = parse_device_id)]
    device_id: Option<DeviceId>,
    /// Overwrite rows that already exist (the default).
    #[arg(long = "update-existing", overrides_with = "no_update_existing")]
    update_existing: bool,
    /// Only create missing rows; leave existing ones untouched.
    #[arg(long = "no-update-existing", overrides_with = "update_existing")]
    no_update_existing: bool,
    /// Report what would be synced without writing anything.
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Database connection URL. Falls back to settings, then `DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url")]
    database_url: Option<String>,
}

impl CliArgs {
    const fn overwrite(&self) -> bool {
        !self.no_update_existing
    }
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
    let settings = FleetSyncSettings::load_ambient("hard-sync-firebase")?;
    let database_url = settings.resolve_database_url(args.database_url.clone())?;
    let pool = DbPool::new(PoolConfig::new(&database_url))
        .await
        .wrap_err("failed to create database pool")?;
    let tree = wiring::tree_source(&settings)?;
    let (service, _) = wiring::sync_services(&pool, tree);
    let update_existing = args.overwrite();

    if args.dry_run {
        println!("{DRY_RUN_BANNER}");
    }
    let lines = match &args.device_id {
        Some(device_id) => {
            println!("Hard syncing device: {device_id}");
            let run = service
                .run_hard_sync_device(device_id, update_existing, args.dry_run)
                .await;
            info!(device_id = %device_id, log_id = ?run.log_id, "hard sync finished");
            hard_sync_device_summary(device_id, update_existing, &run)
        }
        None => {
            println!("Hard syncing all devices...");
            let run = service
                .run_hard_sync_fleet(update_existing, args.dry_run)
                .await;
            info!(log_id = ?run.log_id, "fleet hard sync finished");
            hard_sync_fleet_summary(update_existing, &run)
        }
    };
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    //! Unit tests for argument parsing.

    use clap::Parser;
    use rstest::rstest;

    use super::CliArgs;

    #[rstest]
    #[case(&[], true)]
    #[case(&["--update-existing"], true)]
    #[case(&["--no-update-existing"], false)]
    #[case(&["--no-update-existing", "--update-existing"], true)]
    #[case(&["--update-existing", "--no-update-existing"], false)]
    fn update_existing_defaults_to_true(#[case] flags: &[&str], #[case] expected: bool) {
        let argv = std::iter::once("hard-sync-firebase").chain(flags.iter().copied());
        let args = CliArgs::try_parse_from(argv).expect("arguments parse");
        assert_eq!(args.overwrite(), expected);
    }

    #[rstest]
    fn device_id_is_validated() {
        assert!(CliArgs::try_parse_from(["hard-sync-firebase", "--device-id", "a/b"]).is_err());
        let args =
            CliArgs::try_parse_from(["hard-sync-firebase", "--device-id", "d1", "--dry-run"])
                .expect("arguments parse");
        assert_eq!(args.device_id.map(String::from), Some("d1".to_owned()));
        assert!(args.dry_run);
    }
}
