use crate::models::{EntityKind, Line, Route, RouteStop, Stop};
use crate::sync::store::{EntityTable, SnapshotStore};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("injected {operation} failure")]
pub struct MemoryStoreError {
    pub operation: &'static str,
}

/// One call made against a [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Begin,
    Delete(EntityKind),
    Insert(EntityKind, usize),
    Commit,
    Rollback,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    pub lines: Vec<Line>,
    pub routes: Vec<Route>,
    pub stops: Vec<Stop>,
    pub route_stops: Vec<RouteStop>,
}

impl MemoryTables {
    fn copy_table(&mut self, from: &MemoryTables, kind: EntityKind) {
        match kind {
            EntityKind::Line => self.lines = from.lines.clone(),
            EntityKind::Route => self.routes = from.routes.clone(),
            EntityKind::Stop => self.stops = from.stops.clone(),
            EntityKind::RouteStop => self.route_stops = from.route_stops.clone(),
        }
    }
}

/// An entity with a table in [`MemoryTables`].
pub trait MemoryRow: Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    fn table(tables: &MemoryTables) -> &Vec<Self>;
    fn table_mut(tables: &mut MemoryTables) -> &mut Vec<Self>;
}

macro_rules! memory_row {
    ($($ty:ty => $kind:ident, $field:ident;)+) => {
        $(
            impl MemoryRow for $ty {
                const KIND: EntityKind = EntityKind::$kind;

                fn table(tables: &MemoryTables) -> &Vec<Self> {
                    &tables.$field
                }

                fn table_mut(tables: &mut MemoryTables) -> &mut Vec<Self> {
                    &mut tables.$field
                }
            }
        )+
    };
}

memory_row! {
    Line => Line, lines;
    Route => Route, routes;
    Stop => Stop, stops;
    RouteStop => RouteStop, route_stops;
}

/// Working copy of the tables, published on commit.
#[derive(Debug)]
pub struct MemoryTx {
    tables: MemoryTables,
    touched: BTreeSet<EntityKind>,
}

#[derive(Debug, Default)]
struct Faults {
    begin: bool,
    delete: bool,
    insert_at: Option<usize>,
    commit: bool,
    rollback: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    committed: MemoryTables,
    calls: Vec<StoreCall>,
    inserts: usize,
    faults: Faults,
}

/// In-memory transactional store with fault injection and a call log.
///
/// Transactions work on a copy of the committed tables; commit publishes the
/// tables the transaction wrote to, rollback discards the copy.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the committed snapshot of `E`.
    pub fn with_rows<E: MemoryRow>(self, rows: Vec<E>) -> Self {
        *E::table_mut(&mut self.state.lock().committed) = rows;
        self
    }

    pub fn fail_on_begin(self) -> Self {
        self.state.lock().faults.begin = true;
        self
    }

    pub fn fail_on_delete(self) -> Self {
        self.state.lock().faults.delete = true;
        self
    }

    /// Fail the `n`th insert call (1-based) made against this store.
    pub fn fail_on_insert(self, n: usize) -> Self {
        self.state.lock().faults.insert_at = Some(n);
        self
    }

    pub fn fail_on_commit(self) -> Self {
        self.state.lock().faults.commit = true;
        self
    }

    pub fn fail_on_rollback(self) -> Self {
        self.state.lock().faults.rollback = true;
        self
    }

    /// Committed rows of `E`.
    pub fn rows<E: MemoryRow>(&self) -> Vec<E> {
        E::table(&self.state.lock().committed).clone()
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    /// Sizes of the insert calls made for `kind`, failed ones included.
    pub fn insert_sizes(&self, kind: EntityKind) -> Vec<usize> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StoreCall::Insert(inserted, size) if *inserted == kind => Some(*size),
                _ => None,
            })
            .collect()
    }

    fn fault(operation: &'static str) -> MemoryStoreError {
        MemoryStoreError { operation }
    }
}

impl SnapshotStore for MemoryStore {
    type Tx = MemoryTx;
    type Error = MemoryStoreError;

    async fn begin(&self) -> Result<MemoryTx, MemoryStoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Begin);
        if state.faults.begin {
            return Err(Self::fault("begin"));
        }

        Ok(MemoryTx {
            tables: state.committed.clone(),
            touched: BTreeSet::new(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), MemoryStoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Commit);
        if state.faults.commit {
            return Err(Self::fault("commit"));
        }

        for kind in tx.touched {
            state.committed.copy_table(&tx.tables, kind);
        }
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<(), MemoryStoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Rollback);
        if state.faults.rollback {
            return Err(Self::fault("rollback"));
        }
        Ok(())
    }
}

impl<E: MemoryRow> EntityTable<E> for MemoryStore {
    async fn delete_all(&self, tx: &mut MemoryTx) -> Result<u64, MemoryStoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Delete(E::KIND));
        if state.faults.delete {
            return Err(Self::fault("delete"));
        }

        tx.touched.insert(E::KIND);
        let removed = E::table_mut(&mut tx.tables).drain(..).count();
        Ok(removed as u64)
    }

    async fn insert_array(&self, tx: &mut MemoryTx, batch: &[E]) -> Result<u64, MemoryStoreError> {
        let mut state = self.state.lock();
        state.calls.push(StoreCall::Insert(E::KIND, batch.len()));
        state.inserts += 1;
        if state.faults.insert_at == Some(state.inserts) {
            return Err(Self::fault("insert"));
        }

        tx.touched.insert(E::KIND);
        E::table_mut(&mut tx.tables).extend_from_slice(batch);
        Ok(batch.len() as u64)
    }
}
