//! Transactional capability points of the sync pipeline.
//!
//! The orchestrator never talks to a database directly. It opens a transaction
//! through [`SnapshotStore`], clears and refills one table through
//! [`EntityTable`], and commits or rolls back. The transaction handle is passed
//! explicitly to every write so a batch can never land outside the run that
//! produced it.

use std::future::Future;

/// A store whose writes are grouped into explicit transactions.
pub trait SnapshotStore: Send + Sync {
    /// Open transaction handle. Dropping it without commit discards its writes.
    type Tx: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, Self::Error>> + Send;

    fn commit(&self, tx: Self::Tx) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn rollback(&self, tx: Self::Tx) -> impl Future<Output = Result<(), Self::Error>> + Send;
}

/// The table holding the snapshot of one entity type.
pub trait EntityTable<E>: SnapshotStore {
    /// Delete every row, returning how many were removed.
    fn delete_all(
        &self,
        tx: &mut Self::Tx,
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Insert a whole batch in one round trip, returning the rows written.
    fn insert_array(
        &self,
        tx: &mut Self::Tx,
        batch: &[E],
    ) -> impl Future<Output = Result<u64, Self::Error>> + Send;
}
