//! # Transfer Run State & Results
//!
//! Run lifecycle, progress snapshots and the per-collection outcome types.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Transferring → Complete
//!   ↑         │    ↘
//!   └─────────┘     Cancelled
//!  (aborted before
//!   processing)
//! ```
//!
//! `Complete` and `Cancelled` are terminal for a run but the engine may
//! start a new run from either.

use crate::history::TransferRecord;
use crate::reconciliation::ReconciliationDecision;
use crate::{Result, TransferError};
use bridge_traits::CatalogCollection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a transfer run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferRunId(Uuid);

impl TransferRunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TransferError::InvalidRunId(e.to_string()))
    }
}

impl Default for TransferRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransferRunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Run State
// ============================================================================

/// Engine run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Transferring,
    Complete,
    Cancelled,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Transferring => "transferring",
            RunState::Complete => "complete",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Transferring)
    }

    /// Validate and perform a transition.
    pub fn transition(self, to: RunState) -> Result<RunState> {
        let valid = match (self, to) {
            (RunState::Idle, RunState::Transferring) => true,
            (RunState::Complete, RunState::Transferring) => true,
            (RunState::Cancelled, RunState::Transferring) => true,

            (RunState::Transferring, RunState::Complete) => true,
            (RunState::Transferring, RunState::Cancelled) => true,
            // Aborted before any collection was processed
            (RunState::Transferring, RunState::Idle) => true,

            _ => false,
        };

        if !valid {
            return Err(TransferError::InvalidStateTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("Cannot transition from {} to {}", self, to),
            });
        }
        Ok(to)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Progress snapshot emitted once per finished collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub current: u32,
    pub total: u32,
    pub message: String,
}

impl ProgressState {
    pub fn new(total: u32) -> Self {
        Self {
            current: 0,
            total,
            message: String::new(),
        }
    }

    /// Record one more finished collection.
    pub fn advance(&mut self, message: impl Into<String>) {
        self.current = (self.current + 1).min(self.total);
        self.message = message.into();
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((u64::from(self.current) * 100) / u64::from(self.total)) as u8
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Final classification of a processed collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeBucket {
    Successful,
    Merged,
    Skipped,
    Failed,
}

impl OutcomeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeBucket::Successful => "successful",
            OutcomeBucket::Merged => "merged",
            OutcomeBucket::Skipped => "skipped",
            OutcomeBucket::Failed => "failed",
        }
    }
}

impl fmt::Display for OutcomeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutcomeBucket {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "successful" => Ok(OutcomeBucket::Successful),
            "merged" => Ok(OutcomeBucket::Merged),
            "skipped" => Ok(OutcomeBucket::Skipped),
            "failed" => Ok(OutcomeBucket::Failed),
            other => Err(TransferError::InvalidDecision(format!(
                "unknown bucket {}",
                other
            ))),
        }
    }
}

/// Item-level counters for one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMatchStats {
    pub matched: u32,
    pub unmatched: u32,
    /// Matched items successfully added to the target
    pub added: u32,
    /// Matched items the target refused to add
    pub add_failed: u32,
}

/// Result for one selected collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub collection_id: String,
    pub collection_name: String,
    pub bucket: OutcomeBucket,
    /// `None` when the collection never reached a decision
    pub decision: Option<ReconciliationDecision>,
    pub target_collection_id: Option<String>,
    pub stats: ItemMatchStats,
    pub error: Option<String>,
}

impl CollectionOutcome {
    pub fn new(
        collection_id: impl Into<String>,
        collection_name: impl Into<String>,
        bucket: OutcomeBucket,
    ) -> Self {
        Self {
            collection_id: collection_id.into(),
            collection_name: collection_name.into(),
            bucket,
            decision: None,
            target_collection_id: None,
            stats: ItemMatchStats::default(),
            error: None,
        }
    }

    pub fn with_decision(mut self, decision: ReconciliationDecision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Human-readable status line used for progress messages.
    pub fn status_message(&self) -> String {
        let name = &self.collection_name;
        let total = self.stats.matched + self.stats.unmatched;
        match self.bucket {
            OutcomeBucket::Successful => format!(
                "Transferred \"{}\" ({}/{} items matched)",
                name, self.stats.matched, total
            ),
            OutcomeBucket::Merged => format!(
                "Merged {} new items into \"{}\"",
                self.stats.added, name
            ),
            OutcomeBucket::Skipped => format!("Skipped \"{}\"", name),
            OutcomeBucket::Failed => match &self.error {
                Some(error) => format!("Failed \"{}\": {}", name, error),
                None => format!("Failed \"{}\"", name),
            },
        }
    }
}

/// Aggregate result of a run.
///
/// Every selected collection ends up in exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferSummary {
    pub successful: Vec<String>,
    pub merged: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    pub outcomes: Vec<CollectionOutcome>,
    pub cancelled: bool,
}

impl TransferSummary {
    pub fn record(&mut self, outcome: CollectionOutcome) {
        let name = outcome.collection_name.clone();
        match outcome.bucket {
            OutcomeBucket::Successful => self.successful.push(name),
            OutcomeBucket::Merged => self.merged.push(name),
            OutcomeBucket::Skipped => self.skipped.push(name),
            OutcomeBucket::Failed => self.failed.push(name),
        }
        self.outcomes.push(outcome);
    }

    pub fn outcome_for(&self, collection_id: &str) -> Option<&CollectionOutcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.collection_id == collection_id)
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

// ============================================================================
// Unit of Work
// ============================================================================

/// A collection bound to the decision that will be applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub collection: CatalogCollection,
    pub decision: ReconciliationDecision,
    pub existing_record: Option<TransferRecord>,
}

impl TransferJob {
    pub fn new(
        collection: CatalogCollection,
        decision: ReconciliationDecision,
        existing_record: Option<TransferRecord>,
    ) -> Self {
        Self {
            collection,
            decision,
            existing_record,
        }
    }

    /// Target collection from the previous transfer, if any.
    pub fn existing_target_id(&self) -> Option<&str> {
        self.existing_record
            .as_ref()
            .map(|record| record.target_collection_id.as_str())
    }
}
