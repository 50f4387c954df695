//! Reference-data synchronization.
//!
//! This module replicates the OASA transit reference data (lines, routes, stops
//! and route-stop associations) into a local store, replacing the previous
//! snapshot of an entity type on every run.
//!
//! # Architecture Overview
//!
//! - **`coerce`**: converts loosely-typed source values into the primitive
//!   field types of the domain entities.
//! - **`mapper`**: binds JSON objects to entities through static field tables
//!   and projects DTOs onto persistence rows.
//! - **`parser`**: splits delimited text lines and binds their positional fields.
//! - **`batch`**: buffers entities and writes them as bounded bulk inserts.
//! - **`store`**: the transactional capability points the pipeline writes to.
//! - **`database`**: the PostgreSQL store and schema migrations.
//! - **`run`**: phase tracking and run reports.
//!
//! ## Data Flow
//!
//! For one entity type, [`SyncService`] runs:
//!
//! 1. **Fetching**: request the entity's action from the telematics API
//! 2. **Clearing**: open a transaction and delete the prior snapshot
//! 3. **Streaming**: map every record and hand it to the batch writer
//! 4. **Committing**: flush the trailing batch and commit
//!
//! Any failure after the transaction is opened rolls it back, so a run ends
//! either with the snapshot fully replaced or exactly as it was. The four entity
//! types are independent; nothing spans more than one of them.

pub mod batch;
pub mod coerce;
pub mod database;
pub mod mapper;
pub mod parser;
pub mod run;
pub mod store;

use crate::api::TelemetrySource;
use crate::config::SyncConfig;
use crate::error::{StoreOperation, SyncError};
use crate::models::{EntityKind, Line, LineDto, Route, RouteStop, Stop};
use crate::sync::batch::{BatchStats, BatchWriter};
use crate::sync::mapper::{RecordError, map_tagged_value};
use crate::sync::parser::DelimitedRecord;
use crate::sync::run::{SyncPhase, SyncReport, SyncRun};
use crate::sync::store::{EntityTable, SnapshotStore};
use tokio_util::sync::CancellationToken;

pub use database::{PgStore, run_migrations};

/// Replaces the snapshot of each entity type with freshly fetched records.
pub struct SyncService<S, A> {
    store: S,
    source: A,
    config: SyncConfig,
    cancellation_token: CancellationToken,
}

impl<S, A> SyncService<S, A>
where
    S: SnapshotStore
        + EntityTable<Line>
        + EntityTable<Route>
        + EntityTable<Stop>
        + EntityTable<RouteStop>,
    A: TelemetrySource,
{
    pub fn new(store: S, source: A, config: SyncConfig) -> Self {
        Self {
            store,
            source,
            config,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Use `token` to cancel in-flight runs.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &A {
        &self.source
    }

    pub async fn sync_lines(&self) -> Result<SyncReport, SyncError> {
        let mut run = self.start(EntityKind::Line);
        let records = match self.source.fetch_json_records(run.action()).await {
            Ok(records) => records,
            Err(source) => return Err(Self::abort(run, fetch_error(EntityKind::Line, source))),
        };
        run.record_fetched(records.len());

        let lines = records
            .iter()
            .map(|record| map_tagged_value::<LineDto>(record).map(Line::from));
        self.replace_snapshot(run, lines).await
    }

    pub async fn sync_routes(&self) -> Result<SyncReport, SyncError> {
        self.sync_delimited::<Route>(EntityKind::Route).await
    }

    pub async fn sync_stops(&self) -> Result<SyncReport, SyncError> {
        self.sync_delimited::<Stop>(EntityKind::Stop).await
    }

    pub async fn sync_route_stops(&self) -> Result<SyncReport, SyncError> {
        self.sync_delimited::<RouteStop>(EntityKind::RouteStop).await
    }

    pub async fn sync(&self, kind: EntityKind) -> Result<SyncReport, SyncError> {
        match kind {
            EntityKind::Line => self.sync_lines().await,
            EntityKind::Route => self.sync_routes().await,
            EntityKind::Stop => self.sync_stops().await,
            EntityKind::RouteStop => self.sync_route_stops().await,
        }
    }

    /// Sync every entity type in order, stopping at the first failure.
    pub async fn sync_all(&self) -> Result<Vec<SyncReport>, SyncError> {
        let mut reports = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            reports.push(self.sync(kind).await?);
        }
        Ok(reports)
    }

    fn start(&self, kind: EntityKind) -> SyncRun {
        let mut run = SyncRun::new(
            kind,
            kind.default_action(),
            self.cancellation_token.clone(),
        );
        log::info!("{} sync {} started (act={})", kind, run.id(), run.action());
        run.advance(SyncPhase::Fetching);
        run
    }

    async fn sync_delimited<E>(&self, kind: EntityKind) -> Result<SyncReport, SyncError>
    where
        S: EntityTable<E>,
        E: DelimitedRecord + Send + Sync,
    {
        let mut run = self.start(kind);
        let lines = match self.source.fetch_text_records(run.action()).await {
            Ok(lines) => lines,
            Err(source) => return Err(Self::abort(run, fetch_error(kind, source))),
        };
        run.record_fetched(lines.len());

        let entities = lines.iter().map(|line| E::parse(line));
        self.replace_snapshot(run, entities).await
    }

    /// Replace the snapshot of `E` with `records` inside one transaction.
    async fn replace_snapshot<E, I>(
        &self,
        mut run: SyncRun,
        records: I,
    ) -> Result<SyncReport, SyncError>
    where
        S: EntityTable<E>,
        E: Send + Sync,
        I: Iterator<Item = Result<E, RecordError>> + Send,
    {
        let kind = run.entity();
        if run.is_cancelled() {
            return Err(Self::abort(run, SyncError::Cancelled { entity: kind }));
        }

        run.advance(SyncPhase::Clearing);
        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                let error = SyncError::persistence(kind, StoreOperation::Begin, err);
                return Err(Self::abort(run, error));
            }
        };

        let stats = match self.load(&mut run, &mut tx, records).await {
            Ok(stats) => stats,
            Err(error) => {
                if let Err(rollback) = self.store.rollback(tx).await {
                    log::warn!("{} sync rollback failed: {}", kind, rollback);
                }
                return Err(Self::abort(run, error));
            }
        };

        if let Err(err) = self.store.commit(tx).await {
            let error = SyncError::persistence(kind, StoreOperation::Commit, err);
            return Err(Self::abort(run, error));
        }

        Ok(run.complete(stats))
    }

    async fn load<E, I>(
        &self,
        run: &mut SyncRun,
        tx: &mut <S as SnapshotStore>::Tx,
        records: I,
    ) -> Result<BatchStats, SyncError>
    where
        S: EntityTable<E>,
        E: Send + Sync,
        I: Iterator<Item = Result<E, RecordError>> + Send,
    {
        let kind = run.entity();

        let deleted = EntityTable::<E>::delete_all(&self.store, tx)
            .await
            .map_err(|err| SyncError::persistence(kind, StoreOperation::Delete, err))?;
        run.record_deleted(deleted);
        log::debug!("{} sync cleared {} rows", kind, deleted);

        run.advance(SyncPhase::Streaming);
        let mut writer: BatchWriter<'_, S, E> =
            BatchWriter::new(&self.store, kind, self.config.batch_size(kind));

        for (index, record) in records.enumerate() {
            if run.is_cancelled() {
                return Err(SyncError::Cancelled { entity: kind });
            }

            let entity = record.map_err(|source| SyncError::Record {
                entity: kind,
                position: index + 1,
                source,
            })?;
            writer.accumulate(tx, entity).await?;
        }

        run.advance(SyncPhase::Committing);
        writer.flush_remainder(tx).await?;
        Ok(writer.into_stats())
    }

    fn abort(mut run: SyncRun, error: SyncError) -> SyncError {
        run.abort(&error);
        error
    }
}

fn fetch_error(entity: EntityKind, source: crate::api::ClientError) -> SyncError {
    SyncError::Fetch { entity, source }
}
