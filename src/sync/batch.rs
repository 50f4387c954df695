//! Bounded-batch bulk loading.
//!
//! A [`BatchWriter`] buffers entities and hands every full buffer to
//! [`EntityTable::insert_array`] inside the caller's transaction. The trailing
//! partial buffer is written by [`BatchWriter::flush_remainder`]. Insert
//! failures are not retried; the caller is expected to roll back.

use crate::error::{StoreOperation, SyncError};
use crate::models::EntityKind;
use crate::sync::store::EntityTable;
use serde::Serialize;
use std::marker::PhantomData;

/// Rows written by one writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Rows the store reported as inserted.
    pub inserted: u64,
    /// Size of every flushed batch, in flush order.
    pub batches: Vec<usize>,
}

pub struct BatchWriter<'s, S, E> {
    store: &'s S,
    entity: EntityKind,
    capacity: usize,
    batch: Vec<E>,
    stats: BatchStats,
    _table: PhantomData<fn(E)>,
}

impl<'s, S, E> BatchWriter<'s, S, E>
where
    S: EntityTable<E>,
    E: Send + Sync,
{
    /// Create a writer flushing every `capacity` entities. A zero capacity is
    /// treated as one.
    pub fn new(store: &'s S, entity: EntityKind, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            store,
            entity,
            capacity,
            batch: Vec::with_capacity(capacity),
            stats: BatchStats::default(),
            _table: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entities buffered but not yet written.
    pub fn pending(&self) -> usize {
        self.batch.len()
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub fn into_stats(self) -> BatchStats {
        self.stats
    }

    /// Buffer `entity`, flushing when the buffer reaches capacity.
    pub async fn accumulate(&mut self, tx: &mut S::Tx, entity: E) -> Result<(), SyncError> {
        self.batch.push(entity);
        self.flush_if_full(tx).await?;
        Ok(())
    }

    /// Flush the buffer if it is full. Returns whether a flush happened.
    pub async fn flush_if_full(&mut self, tx: &mut S::Tx) -> Result<bool, SyncError> {
        if self.batch.len() < self.capacity {
            return Ok(false);
        }

        self.flush(tx).await?;
        Ok(true)
    }

    /// Write whatever is left in the buffer. Does nothing when it is empty.
    pub async fn flush_remainder(&mut self, tx: &mut S::Tx) -> Result<(), SyncError> {
        if self.batch.is_empty() {
            return Ok(());
        }

        self.flush(tx).await
    }

    async fn flush(&mut self, tx: &mut S::Tx) -> Result<(), SyncError> {
        let next = Vec::with_capacity(self.capacity);
        let batch = std::mem::replace(&mut self.batch, next);

        let inserted = self
            .store
            .insert_array(tx, &batch)
            .await
            .map_err(|err| SyncError::persistence(self.entity, StoreOperation::Insert, err))?;

        log::info!("batch of {} {} rows saved", batch.len(), self.entity);

        self.stats.inserted += inserted;
        self.stats.batches.push(batch.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouteStop;
    use crate::sync::store::SnapshotStore;
    use crate::test_support::{MemoryStore, StoreCall};

    fn route_stop(senu: i16) -> RouteStop {
        RouteStop {
            route_code: 2081,
            stop_code: 10373 + i64::from(senu),
            senu,
        }
    }

    #[tokio::test]
    async fn test_full_batches_flush_in_order() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut writer = BatchWriter::new(&store, EntityKind::RouteStop, 1000);

        for senu in 0..2500 {
            writer.accumulate(&mut tx, route_stop(senu)).await.unwrap();
        }
        assert_eq!(writer.pending(), 500);

        writer.flush_remainder(&mut tx).await.unwrap();
        store.commit(tx).await.unwrap();

        let stats = writer.into_stats();
        assert_eq!(stats.batches, vec![1000, 1000, 500]);
        assert_eq!(stats.inserted, 2500);
        assert_eq!(store.rows::<RouteStop>().len(), 2500);
    }

    #[tokio::test]
    async fn test_exact_multiple_leaves_no_trailing_batch() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut writer = BatchWriter::new(&store, EntityKind::RouteStop, 3);

        for senu in 0..6 {
            writer.accumulate(&mut tx, route_stop(senu)).await.unwrap();
        }
        writer.flush_remainder(&mut tx).await.unwrap();
        writer.flush_remainder(&mut tx).await.unwrap();

        assert_eq!(writer.stats().batches, vec![3, 3]);
        assert_eq!(store.insert_sizes(EntityKind::RouteStop), vec![3, 3]);
    }

    #[tokio::test]
    async fn test_zero_capacity_flushes_every_entity() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let mut writer = BatchWriter::new(&store, EntityKind::RouteStop, 0);
        assert_eq!(writer.capacity(), 1);

        writer.accumulate(&mut tx, route_stop(1)).await.unwrap();
        writer.accumulate(&mut tx, route_stop(2)).await.unwrap();

        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.stats().batches, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_insert_failure_is_a_persistence_error() {
        let store = MemoryStore::new().fail_on_insert(2);
        let mut tx = store.begin().await.unwrap();
        let mut writer = BatchWriter::new(&store, EntityKind::RouteStop, 2);

        for senu in 0..3 {
            writer.accumulate(&mut tx, route_stop(senu)).await.unwrap();
        }
        let err = writer.accumulate(&mut tx, route_stop(3)).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::Persistence {
                entity: EntityKind::RouteStop,
                operation: StoreOperation::Insert,
                ..
            }
        ));
        assert_eq!(writer.stats().batches, vec![2]);
        assert!(store.calls().contains(&StoreCall::Insert(EntityKind::RouteStop, 2)));
    }
}
