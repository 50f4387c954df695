use crate::api::ClientError;
use crate::models::EntityKind;
use crate::sync::mapper::RecordError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Boxed error raised by a store implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Store call that failed during a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOperation {
    Begin,
    Delete,
    Insert,
    Commit,
}

impl fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOperation::Begin => "begin",
            StoreOperation::Delete => "delete",
            StoreOperation::Insert => "insert",
            StoreOperation::Commit => "commit",
        };
        f.write_str(name)
    }
}

/// Reason a sync run for one entity type was aborted.
///
/// Every variant leaves the prior snapshot in place.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("fetching {entity} records failed: {source}")]
    Fetch {
        entity: EntityKind,
        #[source]
        source: ClientError,
    },
    #[error("{entity} record {position} rejected: {source}")]
    Record {
        entity: EntityKind,
        /// 1-based position of the record in the response.
        position: usize,
        #[source]
        source: RecordError,
    },
    #[error("{operation} on {entity} table failed: {source}")]
    Persistence {
        entity: EntityKind,
        operation: StoreOperation,
        #[source]
        source: StoreError,
    },
    #[error("{entity} sync cancelled")]
    Cancelled { entity: EntityKind },
}

impl SyncError {
    pub fn entity(&self) -> EntityKind {
        match self {
            SyncError::Fetch { entity, .. }
            | SyncError::Record { entity, .. }
            | SyncError::Persistence { entity, .. }
            | SyncError::Cancelled { entity } => *entity,
        }
    }

    pub(crate) fn persistence<E>(entity: EntityKind, operation: StoreOperation, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SyncError::Persistence {
            entity,
            operation,
            source: Box::new(source),
        }
    }
}

/// Missing or invalid runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value `{value}`")]
    Invalid { key: &'static str, value: String },
}
