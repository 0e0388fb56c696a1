//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the device, record and sync log ports, backed
//! by `diesel-async` with `bb8` pooling.
//!
//! - Repositories only translate between Diesel rows and domain types; the
//!   profile overlay and outcome rules live in the domain.
//! - Row structs (`models.rs`) and table definitions (`schema.rs`) stay
//!   private to this module.
//! - Every database failure maps onto the port's `connection` or `query`
//!   variant.
//!
//! # Example
//!
//! ```ignore
//! use fastpay_backend::outbound::persistence::{DbPool, DieselDeviceRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/fastpay")).await?;
//! let devices = DieselDeviceRepository::new(pool);
//! ```

mod diesel_device_repository;
pub(crate) mod diesel_helpers;
mod diesel_record_repositories;
mod diesel_sync_log_repository;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_device_repository::DieselDeviceRepository;
pub use diesel_record_repositories::{
    DieselContactRepository, DieselMessageRepository, DieselNotificationRepository,
};
pub use diesel_sync_log_repository::DieselSyncLogRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
