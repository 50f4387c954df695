use crate::sync::database::migration::MIGRATOR;
use log::LevelFilter;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use testcontainers::{GenericImage, ImageExt, core::WaitFor};
use testcontainers_modules::testcontainers::{
    ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TestDatabaseError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("container error: {0}")]
    Container(#[from] TestcontainersError),
}

impl TestDatabaseError {
    /// True when no container runtime could be reached; callers skip the test.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, TestDatabaseError::Container(_))
    }
}

/// Disposable Postgres container for integration tests.
///
/// The container is removed when the value is dropped.
pub struct TestDatabase {
    pool: PgPool,
    _container: ContainerAsync<GenericImage>,
}

impl TestDatabase {
    /// Provision a fresh, migrated database in a disposable Postgres container.
    pub async fn new() -> Result<Self, TestDatabaseError> {
        Self::provision(true).await
    }

    /// Provision a fresh database without applying migrations.
    pub async fn unmigrated() -> Result<Self, TestDatabaseError> {
        Self::provision(false).await
    }

    async fn provision(migrate: bool) -> Result<Self, TestDatabaseError> {
        let container = GenericImage::new("postgres", "16-alpine")
            .with_wait_for(WaitFor::message_on_stdout(
                "database system is ready to accept connections",
            ))
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_DB", "oasa")
            .with_env_var("POSTGRES_USER", "postgres")
            .with_env_var("POSTGRES_PASSWORD", "postgres")
            .start()
            .await?;

        let host = container.get_host().await?;
        let port = container.get_host_port_ipv4(5432).await?;
        let options = format!("postgres://postgres:postgres@{host}:{port}/oasa")
            .parse::<PgConnectOptions>()?
            .log_statements(LevelFilter::Off);

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        if migrate {
            MIGRATOR.run(&pool).await?;
        }

        Ok(Self {
            pool,
            _container: container,
        })
    }

    pub fn pool(&self) -> PgPool {
        self.pool.clone()
    }

    /// Close pool connections, then remove the container.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
