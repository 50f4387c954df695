use crate::config::DatabaseConfig;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Open the connection pool for the reference-data database.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    log::debug!("connecting to database (max {} connections)", config.max_connections);

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}
