//! # Transfer Reconciliation Module
//!
//! Copies collections from a source catalog to a target catalog, and
//! reconciles repeat transfers of the same collection.
//!
//! ## Overview
//!
//! A run walks the selected source collections in order. A collection seen
//! for the first time is created on the target. A collection with transfer
//! history is a duplicate, and the caller picks how to reconcile it:
//! merge new items, overwrite, create a numbered copy, or skip.
//!
//! ## Components
//!
//! - **Identity** (`identity`): Item identity keys, order-independent fingerprints, diffs
//! - **History** (`history`): Per-collection transfer records, write-through to SQLite
//! - **Reconciliation** (`reconciliation`): Decision policy, duplicate candidates, caller prompts
//! - **Matcher** (`matcher`): Item search on the target with retry and backoff
//! - **Job** (`job`): Run state machine, progress and outcome types
//! - **Orchestrator** (`orchestrator`): The [`TransferEngine`] driving a run

pub mod error;
pub mod history;
pub mod identity;
pub mod job;
pub mod matcher;
pub mod orchestrator;
pub mod reconciliation;

pub use error::{Result, TransferError};
pub use history::{
    SqliteTransferHistoryRepository, TransferHistory, TransferHistoryRepository, TransferRecord,
};
pub use identity::{diff, fingerprint, identity_key, ItemDiff, EMPTY_FINGERPRINT};
pub use job::{
    CollectionOutcome, ItemMatchStats, OutcomeBucket, ProgressState, RunState, TransferJob,
    TransferRunId, TransferSummary,
};
pub use matcher::{
    with_backoff, with_backoff_on_throttle, BackoffPolicy, EntityMatcher, MatchOutcome,
    SearchMatcher,
};
pub use orchestrator::{ProgressStream, RunOptions, TransferEngine, TransferRun};
pub use reconciliation::{
    copy_name, ChannelResolver, DecisionSet, DuplicateCandidate, DuplicateResolution,
    DuplicateResolver, PendingDecision, PolicyOutcome, ReconciliationDecision,
    ReconciliationPolicy,
};
