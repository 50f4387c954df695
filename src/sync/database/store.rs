//! Bulk snapshot writes against PostgreSQL.
//!
//! Every insert sends a whole batch in one statement using `UNNEST` over
//! columnar arrays. `i8` fields are widened to `SMALLINT`, the narrowest
//! integer type PostgreSQL offers.

use super::tuning::PgTuning;
use crate::models::{Line, Route, RouteStop, Stop};
use crate::sync::store::{EntityTable, SnapshotStore};
use sqlx::{PgPool, Postgres, Transaction};

/// Transactional store over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    bulk_tuning: bool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            bulk_tuning: false,
        }
    }

    /// Apply [`PgTuning::apply_bulk_load`] in every transaction this store opens.
    pub fn with_bulk_tuning(mut self, enabled: bool) -> Self {
        self.bulk_tuning = enabled;
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn delete_from(
        tx: &mut Transaction<'static, Postgres>,
        table: &'static str,
    ) -> Result<u64, sqlx::Error> {
        let query = format!("DELETE FROM {}", table);
        let result = sqlx::query(&query).execute(&mut **tx).await?;

        log::trace!("deleted {} rows from {}", result.rows_affected(), table);
        Ok(result.rows_affected())
    }
}

impl SnapshotStore for PgStore {
    type Tx = Transaction<'static, Postgres>;
    type Error = sqlx::Error;

    async fn begin(&self) -> Result<Self::Tx, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        if self.bulk_tuning {
            PgTuning::apply_bulk_load(&mut tx).await?;
        }
        Ok(tx)
    }

    async fn commit(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.commit().await
    }

    async fn rollback(&self, tx: Self::Tx) -> Result<(), sqlx::Error> {
        tx.rollback().await
    }
}

impl EntityTable<Line> for PgStore {
    async fn delete_all(&self, tx: &mut Self::Tx) -> Result<u64, sqlx::Error> {
        Self::delete_from(tx, "lines").await
    }

    async fn insert_array(&self, tx: &mut Self::Tx, batch: &[Line]) -> Result<u64, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut line_codes = Vec::with_capacity(batch.len());
        let mut line_ids = Vec::with_capacity(batch.len());
        let mut descrs = Vec::with_capacity(batch.len());
        let mut descrs_eng = Vec::with_capacity(batch.len());
        let mut ml_codes = Vec::with_capacity(batch.len());
        let mut sdc_codes = Vec::with_capacity(batch.len());
        let mut mld_masters = Vec::with_capacity(batch.len());

        for line in batch {
            line_codes.push(line.line_code);
            line_ids.push(line.line_id.as_str());
            descrs.push(line.line_descr.as_str());
            descrs_eng.push(line.line_descr_eng.as_str());
            ml_codes.push(line.ml_code);
            sdc_codes.push(line.sdc_code);
            mld_masters.push(line.mld_master);
        }

        let result = sqlx::query(
            r#"INSERT INTO lines (
                line_code, line_id, line_descr, line_descr_eng, ml_code, sdc_code, mld_master
               )
               SELECT * FROM UNNEST(
                   $1::int[],
                   $2::text[],
                   $3::text[],
                   $4::text[],
                   $5::smallint[],
                   $6::smallint[],
                   $7::smallint[]
               )"#,
        )
        .bind(&line_codes)
        .bind(&line_ids)
        .bind(&descrs)
        .bind(&descrs_eng)
        .bind(&ml_codes)
        .bind(&sdc_codes)
        .bind(&mld_masters)
        .execute(&mut **tx)
        .await?;

        log::trace!("bulk inserted {} lines", result.rows_affected());
        Ok(result.rows_affected())
    }
}

impl EntityTable<Route> for PgStore {
    async fn delete_all(&self, tx: &mut Self::Tx) -> Result<u64, sqlx::Error> {
        Self::delete_from(tx, "routes").await
    }

    async fn insert_array(&self, tx: &mut Self::Tx, batch: &[Route]) -> Result<u64, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut route_codes = Vec::with_capacity(batch.len());
        let mut line_codes = Vec::with_capacity(batch.len());
        let mut descrs = Vec::with_capacity(batch.len());
        let mut descrs_eng = Vec::with_capacity(batch.len());
        let mut route_types = Vec::with_capacity(batch.len());
        let mut distances = Vec::with_capacity(batch.len());

        for route in batch {
            route_codes.push(route.route_code);
            line_codes.push(route.line_code);
            descrs.push(route.route_descr.as_str());
            descrs_eng.push(route.route_descr_eng.as_str());
            route_types.push(i16::from(route.route_type));
            distances.push(route.route_distance);
        }

        let result = sqlx::query(
            r#"INSERT INTO routes (
                route_code, line_code, route_descr, route_descr_eng, route_type, route_distance
               )
               SELECT * FROM UNNEST(
                   $1::int[],
                   $2::int[],
                   $3::text[],
                   $4::text[],
                   $5::smallint[],
                   $6::real[]
               )"#,
        )
        .bind(&route_codes)
        .bind(&line_codes)
        .bind(&descrs)
        .bind(&descrs_eng)
        .bind(&route_types)
        .bind(&distances)
        .execute(&mut **tx)
        .await?;

        log::trace!("bulk inserted {} routes", result.rows_affected());
        Ok(result.rows_affected())
    }
}

impl EntityTable<Stop> for PgStore {
    async fn delete_all(&self, tx: &mut Self::Tx) -> Result<u64, sqlx::Error> {
        Self::delete_from(tx, "stops").await
    }

    async fn insert_array(&self, tx: &mut Self::Tx, batch: &[Stop]) -> Result<u64, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut stop_codes = Vec::with_capacity(batch.len());
        let mut stop_ids = Vec::with_capacity(batch.len());
        let mut descrs = Vec::with_capacity(batch.len());
        let mut descrs_eng = Vec::with_capacity(batch.len());
        let mut streets = Vec::with_capacity(batch.len());
        let mut streets_eng = Vec::with_capacity(batch.len());
        let mut headings = Vec::with_capacity(batch.len());
        let mut lngs = Vec::with_capacity(batch.len());
        let mut lats = Vec::with_capacity(batch.len());
        let mut stop_types = Vec::with_capacity(batch.len());
        let mut ameas = Vec::with_capacity(batch.len());
        let mut destinations = Vec::with_capacity(batch.len());
        let mut destinations_eng = Vec::with_capacity(batch.len());

        for stop in batch {
            stop_codes.push(stop.stop_code);
            stop_ids.push(stop.stop_id.as_str());
            descrs.push(stop.stop_descr.as_str());
            descrs_eng.push(stop.stop_descr_eng.as_str());
            streets.push(stop.stop_street.as_str());
            streets_eng.push(stop.stop_street_eng.as_str());
            headings.push(stop.stop_heading);
            lngs.push(stop.stop_lng);
            lats.push(stop.stop_lat);
            stop_types.push(i16::from(stop.stop_type));
            ameas.push(i16::from(stop.stop_amea));
            destinations.push(stop.destinations.as_str());
            destinations_eng.push(stop.destinations_eng.as_str());
        }

        let result = sqlx::query(
            r#"INSERT INTO stops (
                stop_code, stop_id, stop_descr, stop_descr_eng, stop_street, stop_street_eng,
                stop_heading, stop_lng, stop_lat, stop_type, stop_amea,
                destinations, destinations_eng
               )
               SELECT * FROM UNNEST(
                   $1::int[],
                   $2::text[],
                   $3::text[],
                   $4::text[],
                   $5::text[],
                   $6::text[],
                   $7::int[],
                   $8::float8[],
                   $9::float8[],
                   $10::smallint[],
                   $11::smallint[],
                   $12::text[],
                   $13::text[]
               )"#,
        )
        .bind(&stop_codes)
        .bind(&stop_ids)
        .bind(&descrs)
        .bind(&descrs_eng)
        .bind(&streets)
        .bind(&streets_eng)
        .bind(&headings)
        .bind(&lngs)
        .bind(&lats)
        .bind(&stop_types)
        .bind(&ameas)
        .bind(&destinations)
        .bind(&destinations_eng)
        .execute(&mut **tx)
        .await?;

        log::trace!("bulk inserted {} stops", result.rows_affected());
        Ok(result.rows_affected())
    }
}

impl EntityTable<RouteStop> for PgStore {
    async fn delete_all(&self, tx: &mut Self::Tx) -> Result<u64, sqlx::Error> {
        Self::delete_from(tx, "route_stops").await
    }

    async fn insert_array(
        &self,
        tx: &mut Self::Tx,
        batch: &[RouteStop],
    ) -> Result<u64, sqlx::Error> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut route_codes = Vec::with_capacity(batch.len());
        let mut stop_codes = Vec::with_capacity(batch.len());
        let mut senus = Vec::with_capacity(batch.len());

        for route_stop in batch {
            route_codes.push(route_stop.route_code);
            stop_codes.push(route_stop.stop_code);
            senus.push(route_stop.senu);
        }

        let result = sqlx::query(
            r#"INSERT INTO route_stops (route_code, stop_code, senu)
               SELECT * FROM UNNEST($1::int[], $2::bigint[], $3::smallint[])"#,
        )
        .bind(&route_codes)
        .bind(&stop_codes)
        .bind(&senus)
        .execute(&mut **tx)
        .await?;

        log::trace!("bulk inserted {} route stops", result.rows_affected());
        Ok(result.rows_affected())
    }
}
