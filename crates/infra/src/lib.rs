//! Infrastructure layer: Postgres storage, configuration, startup seeding.

pub mod bootstrap;
pub mod config;
pub mod db;

pub use bootstrap::{BootstrapOutcome, ensure_admin, seed_catalog};
pub use config::{AdminSeed, AppConfig, ConfigError};
pub use db::PostgresAuthStore;
