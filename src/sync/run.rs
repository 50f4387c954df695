use crate::error::SyncError;
use crate::models::EntityKind;
use crate::sync::batch::BatchStats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Lifecycle of one entity type's sync.
///
/// `Idle -> Fetching -> Clearing -> Streaming -> Committing -> Done`, with
/// `Aborted` reachable from every phase after `Idle`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    Fetching,
    Clearing,
    Streaming,
    Committing,
    Done,
    Aborted,
}

impl SyncPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SyncPhase::Done | SyncPhase::Aborted)
    }

    pub fn can_advance_to(self, next: SyncPhase) -> bool {
        use SyncPhase::*;

        match (self, next) {
            (Idle, Fetching)
            | (Fetching, Clearing)
            | (Clearing, Streaming)
            | (Streaming, Committing)
            | (Committing, Done) => true,
            (Idle, Aborted) => false,
            (current, Aborted) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Summary of a finished sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub id: Uuid,
    pub entity: EntityKind,
    pub action: String,
    pub phase: SyncPhase,
    /// Records returned by the API.
    pub fetched: usize,
    /// Rows removed from the prior snapshot.
    pub deleted: u64,
    pub inserted: u64,
    /// Size of every insert batch, in flush order.
    pub batches: Vec<usize>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Tracks the phase and counters of one in-flight run.
pub struct SyncRun {
    report: SyncReport,
    cancellation_token: CancellationToken,
}

impl SyncRun {
    pub fn new(entity: EntityKind, action: &str, cancellation_token: CancellationToken) -> Self {
        Self {
            report: SyncReport {
                id: Uuid::new_v4(),
                entity,
                action: action.to_string(),
                phase: SyncPhase::Idle,
                fetched: 0,
                deleted: 0,
                inserted: 0,
                batches: Vec::new(),
                started_at: Some(Utc::now()),
                completed_at: None,
            },
            cancellation_token,
        }
    }

    pub fn id(&self) -> Uuid {
        self.report.id
    }

    pub fn entity(&self) -> EntityKind {
        self.report.entity
    }

    pub fn action(&self) -> &str {
        &self.report.action
    }

    pub fn phase(&self) -> SyncPhase {
        self.report.phase
    }

    pub fn advance(&mut self, next: SyncPhase) {
        debug_assert!(
            self.report.phase.can_advance_to(next),
            "invalid sync transition {:?} -> {:?}",
            self.report.phase,
            next
        );
        log::debug!(
            "{} sync {}: {:?} -> {:?}",
            self.report.entity,
            self.report.id,
            self.report.phase,
            next
        );
        self.report.phase = next;
    }

    pub fn record_fetched(&mut self, count: usize) {
        self.report.fetched = count;
    }

    pub fn record_deleted(&mut self, count: u64) {
        self.report.deleted = count;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Mark the run committed and produce its report.
    pub fn complete(mut self, stats: BatchStats) -> SyncReport {
        self.advance(SyncPhase::Done);
        self.report.inserted = stats.inserted;
        self.report.batches = stats.batches;
        self.report.completed_at = Some(Utc::now());

        log::info!(
            "{} sync completed: {} rows replaced by {} ({} batches)",
            self.report.entity,
            self.report.deleted,
            self.report.inserted,
            self.report.batches.len()
        );
        self.report
    }

    /// Mark the run aborted by `error`.
    pub fn abort(&mut self, error: &SyncError) {
        log::error!(
            "{} sync aborted during {:?}: {}",
            self.report.entity,
            self.report.phase,
            error
        );
        self.advance(SyncPhase::Aborted);
    }
}
