//! Schema migrations for the reference-data tables.
//!
//! Migrations are embedded at compile time from `./migrations` and applied
//! before any sync run writes to the database.

use sqlx::{PgPool, migrate::Migrator};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations.
///
/// This is idempotent - migrations that have already been applied will be skipped.
/// SQLx tracks applied versions and verifies their checksums.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("checking database migration state");

    MIGRATOR.run(pool).await?;

    log::info!("database migrations up to date");
    Ok(())
}

/// Revert every migration and apply them again, dropping all synced rows.
///
/// Intended for development databases.
pub async fn reset_database(pool: &PgPool) -> Result<(), sqlx::Error> {
    log::info!("resetting database schema");

    MIGRATOR.undo(pool, 0).await?;
    log::info!("all tables dropped, running migrations");

    MIGRATOR.run(pool).await?;
    log::info!("database schema recreated via migrations");
    Ok(())
}
