use sqlx::{PgPool, Postgres, Transaction};

/// Session settings for snapshot replacement transactions.
pub struct PgTuning;

impl PgTuning {
    /// Apply bulk-load settings for the rest of the transaction.
    ///
    /// `SET LOCAL` reverts on commit or rollback, so pooled connections come
    /// back with their defaults.
    pub async fn apply_bulk_load(tx: &mut Transaction<'_, Postgres>) -> Result<(), sqlx::Error> {
        log::debug!("applying bulk load session settings");

        // Data is still durable via WAL, just committed asynchronously
        sqlx::query("SET LOCAL synchronous_commit = 'off'")
            .execute(&mut **tx)
            .await?;

        sqlx::query("SET LOCAL work_mem = '64MB'")
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Refresh planner statistics of the given tables after a load.
    pub async fn analyze_tables(pool: &PgPool, tables: &[&str]) -> Result<(), sqlx::Error> {
        for table in tables {
            log::debug!("running ANALYZE on table: {}", table);
            let query = format!("ANALYZE {}", table);
            sqlx::query(&query).execute(pool).await?;
        }

        Ok(())
    }

    /// Current value of a session setting.
    pub async fn show(pool: &PgPool, setting: &str) -> Result<String, sqlx::Error> {
        let query = format!("SHOW {}", setting);
        let (value,): (String,) = sqlx::query_as(&query).fetch_one(pool).await?;
        Ok(value)
    }
}
