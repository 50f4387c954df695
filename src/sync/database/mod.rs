//! PostgreSQL persistence for the sync system.
//!
//! This module provides:
//! - Schema migrations for the four reference-data tables
//! - [`PgStore`], the transactional store used by production runs
//! - Session tuning applied inside bulk-load transactions

pub mod migration;
pub mod store;
pub mod tuning;

pub use migration::{reset_database, run_migrations};
pub use store::PgStore;
pub use tuning::PgTuning;
