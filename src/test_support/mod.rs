//! Collaborators for exercising sync runs without the live API.
//!
//! [`MemoryStore`] and [`StaticSource`] stand in for PostgreSQL and the
//! telematics API; [`TestDatabase`] provisions a real, disposable PostgreSQL
//! instance for the store's own tests.

mod database;
mod memory;
mod source;

pub use database::{TestDatabase, TestDatabaseError};
pub use memory::{MemoryRow, MemoryStore, MemoryStoreError, MemoryTables, MemoryTx, StoreCall};
pub use source::StaticSource;
