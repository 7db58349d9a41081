//! # Transfer Orchestrator
//!
//! Drives a run over the selected collections.
//!
//! ## Workflow
//!
//! 1. Claim the engine (`idle → transferring`); a second concurrent run is rejected
//! 2. Fetch the selection from the source catalog; failure aborts the run
//! 3. For each collection, in selection order:
//!    - stop here if cancellation was requested; everything left is `skipped`
//!    - evaluate the reconciliation policy, asking the caller about duplicates
//!    - apply the decision against the target catalog
//!    - persist the transfer record, publish progress
//! 4. Settle in `complete` or `cancelled`
//!
//! Collections are processed one after another. Inside a collection, item
//! searches run with bounded parallelism while additions to the target are
//! issued in source order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_transfer::{DecisionSet, DuplicateResolution, RunOptions, TransferEngine};
//! use futures::StreamExt;
//!
//! let candidates = engine.plan_duplicates(&selection).await?;
//! let mut decisions = DecisionSet::new();
//! for candidate in &candidates {
//!     decisions = decisions.with_answer(&candidate.collection_id, DuplicateResolution::Merge);
//! }
//!
//! let mut run = engine.run(&selection, decisions, RunOptions::default()).await?;
//! while let Some(progress) = run.progress().next().await {
//!     println!("{}/{} {}", progress.current, progress.total, progress.message);
//! }
//! let summary = run.outcome().await?;
//! ```

use crate::history::{TransferHistory, TransferRecord};
use crate::identity::{diff, fingerprint};
use crate::job::{
    CollectionOutcome, ItemMatchStats, OutcomeBucket, ProgressState, RunState, TransferJob,
    TransferRunId, TransferSummary,
};
use crate::matcher::{with_backoff, with_backoff_on_throttle, BackoffPolicy, EntityMatcher, MatchOutcome, SearchMatcher};
use crate::reconciliation::{
    copy_name, DecisionSet, DuplicateCandidate, PolicyOutcome, ReconciliationDecision,
    ReconciliationPolicy,
};
use crate::{Result, TransferError};
use bridge_traits::{
    CatalogCollection, CatalogItem, Clock, NewCollection, SourceCatalog, SystemClock,
    TargetCatalog, Visibility,
};
use core_runtime::config::{TransferConfig, MAX_CONCURRENT_ITEM_OPS};
use core_runtime::events::{CoreEvent, EventBus, TransferEvent};
use futures::stream::{self, Stream, StreamExt};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

const MISSING_FROM_SOURCE: &str = "collection not found in source";

// ============================================================================
// Options & Handles
// ============================================================================

/// Per-run settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub default_visibility: Visibility,
    /// Clamped to `1..=4`
    pub max_concurrent_item_ops: usize,
    /// `Some(0)` is rejected by [`RunOptions::validate`]
    pub max_items_per_collection: Option<usize>,
}

impl From<&TransferConfig> for RunOptions {
    fn from(config: &TransferConfig) -> Self {
        Self {
            default_visibility: config.default_visibility,
            max_concurrent_item_ops: config.max_concurrent_item_ops,
            max_items_per_collection: config.max_items_per_collection,
        }
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self::from(&TransferConfig::default())
    }
}

impl RunOptions {
    /// Reject settings a run cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_items_per_collection == Some(0) {
            return Err(core_runtime::Error::Config(
                "max_items_per_collection must be positive when set".to_string(),
            )
            .into());
        }
        Ok(())
    }

    fn item_parallelism(&self) -> usize {
        self.max_concurrent_item_ops.clamp(1, MAX_CONCURRENT_ITEM_OPS)
    }

    fn limit<'a>(&self, items: &'a [CatalogItem]) -> &'a [CatalogItem] {
        match self.max_items_per_collection {
            Some(limit) if limit < items.len() => &items[..limit],
            _ => items,
        }
    }
}

/// Progress updates of one run; ends when the run reaches a terminal state.
pub struct ProgressStream {
    receiver: mpsc::UnboundedReceiver<ProgressState>,
}

impl ProgressStream {
    pub async fn recv(&mut self) -> Option<ProgressState> {
        self.receiver.recv().await
    }
}

impl Stream for ProgressStream {
    type Item = ProgressState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Handle to a started run.
pub struct TransferRun {
    run_id: TransferRunId,
    progress: ProgressStream,
    handle: JoinHandle<Result<TransferSummary>>,
}

impl TransferRun {
    pub fn run_id(&self) -> TransferRunId {
        self.run_id
    }

    pub fn progress(&mut self) -> &mut ProgressStream {
        &mut self.progress
    }

    /// Wait for the run to settle and return its summary.
    pub async fn outcome(self) -> Result<TransferSummary> {
        self.handle
            .await
            .map_err(|e| TransferError::Task(e.to_string()))?
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Clone)]
struct ActiveRun {
    run_id: TransferRunId,
    cancellation_token: CancellationToken,
}

struct EngineState {
    run_state: RunState,
    active: Option<ActiveRun>,
}

/// Result of applying a decision to the target.
struct Applied {
    bucket: OutcomeBucket,
    target_collection_id: String,
    stats: ItemMatchStats,
}

/// Reconciles selected source collections onto the target catalog.
pub struct TransferEngine {
    config: TransferConfig,
    source: Arc<dyn SourceCatalog>,
    target: Arc<dyn TargetCatalog>,
    matcher: Arc<dyn EntityMatcher>,
    history: Arc<TransferHistory>,
    event_bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    policy: ReconciliationPolicy,
    backoff: BackoffPolicy,
    state: Arc<Mutex<EngineState>>,
}

impl TransferEngine {
    /// Create an engine searching the target catalog for item matches.
    pub fn new(
        config: TransferConfig,
        source: Arc<dyn SourceCatalog>,
        target: Arc<dyn TargetCatalog>,
        history: Arc<TransferHistory>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let backoff = BackoffPolicy::from(&config.retry);
        let matcher: Arc<dyn EntityMatcher> =
            Arc::new(SearchMatcher::new(Arc::clone(&target), backoff.clone()));

        Self {
            config,
            source,
            target,
            matcher,
            history,
            event_bus,
            clock: Arc::new(SystemClock),
            policy: ReconciliationPolicy,
            backoff,
            state: Arc::new(Mutex::new(EngineState {
                run_state: RunState::Idle,
                active: None,
            })),
        }
    }

    /// Wire an engine from configuration alone: opens the configured
    /// history store and an event bus sized by `event_buffer_size`.
    pub async fn bootstrap(
        config: TransferConfig,
        source: Arc<dyn SourceCatalog>,
        target: Arc<dyn TargetCatalog>,
    ) -> Result<Self> {
        config.validate()?;
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let history = TransferHistory::open(&config)
            .await?
            .with_event_bus(Arc::clone(&event_bus));

        Ok(Self::new(config, source, target, Arc::new(history), event_bus))
    }

    /// Replace the item matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn EntityMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// Replace the clock used to stamp transfer records.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<TransferHistory> {
        &self.history
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    pub async fn state(&self) -> RunState {
        self.state.lock().await.run_state
    }

    /// Clone for background task (avoids Arc<Arc<...>>)
    fn clone_for_task(&self) -> Self {
        Self {
            config: self.config.clone(),
            source: Arc::clone(&self.source),
            target: Arc::clone(&self.target),
            matcher: Arc::clone(&self.matcher),
            history: Arc::clone(&self.history),
            event_bus: Arc::clone(&self.event_bus),
            clock: Arc::clone(&self.clock),
            policy: self.policy,
            backoff: self.backoff.clone(),
            state: Arc::clone(&self.state),
        }
    }

    fn emit(&self, event: TransferEvent) {
        self.event_bus.emit(CoreEvent::Transfer(event)).ok();
    }

    /// List the selected collections that were transferred before and so
    /// need a caller decision, in selection order.
    #[instrument(skip(self, selection), fields(selected = selection.len()))]
    pub async fn plan_duplicates(&self, selection: &[String]) -> Result<Vec<DuplicateCandidate>> {
        let selection = dedupe(selection);
        let collections = self
            .source
            .list_selected_collections(&selection)
            .await
            .map_err(TransferError::source_unavailable)?;
        let by_id: HashMap<&str, &CatalogCollection> =
            collections.iter().map(|c| (c.id.as_str(), c)).collect();

        let mut candidates = Vec::new();
        for id in &selection {
            let Some(collection) = by_id.get(id.as_str()) else {
                continue;
            };
            let record = self.history.get(id).await;
            if let PolicyOutcome::NeedsDecision(candidate) =
                self.policy.evaluate(collection, record.as_ref())
            {
                candidates.push(candidate);
            }
        }

        debug!(duplicates = candidates.len(), "Planned duplicate decisions");
        Ok(candidates)
    }

    /// Start a run over `selection`.
    ///
    /// Fails immediately with `TransferInProgress` if another run is active,
    /// `SourceUnavailable` if the selection cannot be fetched, and
    /// `MissingDecision` if a duplicate has neither an answer nor a resolver,
    /// and `Config` for invalid `options`. Otherwise processing continues in the background; see [`TransferRun`].
    #[instrument(skip(self, selection, decisions, options), fields(selected = selection.len()))]
    pub async fn run(
        &self,
        selection: &[String],
        decisions: DecisionSet,
        options: RunOptions,
    ) -> Result<TransferRun> {
        options.validate()?;
        let selection = dedupe(selection);
        let run_id = TransferRunId::new();
        let cancellation_token = CancellationToken::new();

        self.ensure_no_active_run().await?;

        let collections = match self.source.list_selected_collections(&selection).await {
            Ok(collections) => collections,
            Err(e) => {
                let error = TransferError::source_unavailable(e);
                error!(run_id = %run_id, error = %error, "Aborting transfer before processing");
                self.emit(TransferEvent::Failed {
                    run_id: run_id.to_string(),
                    message: error.to_string(),
                });
                return Err(error);
            }
        };

        if !decisions.is_interactive() {
            self.check_decisions(&collections, &decisions).await?;
        }

        // Nothing may await between claiming the run and spawning it.
        {
            let mut state = self.state.lock().await;
            if let Some(active) = &state.active {
                return Err(TransferError::TransferInProgress {
                    run_id: active.run_id.to_string(),
                });
            }
            state.run_state = state.run_state.transition(RunState::Transferring)?;
            state.active = Some(ActiveRun {
                run_id,
                cancellation_token: cancellation_token.clone(),
            });
        }

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let engine = Arc::new(self.clone_for_task());

        info!(run_id = %run_id, total = selection.len(), "Started transfer");

        let handle = tokio::spawn(async move {
            let (summary, remaining) = engine
                .execute_run(
                    run_id,
                    selection,
                    collections,
                    decisions,
                    options,
                    cancellation_token,
                    progress_tx,
                )
                .await;

            let final_state = if summary.cancelled {
                RunState::Cancelled
            } else {
                RunState::Complete
            };
            engine.settle(final_state).await;

            if summary.cancelled {
                engine.emit(TransferEvent::Cancelled {
                    run_id: run_id.to_string(),
                    completed: (summary.total() - remaining) as u32,
                    remaining: remaining as u32,
                });
            } else {
                engine.emit(TransferEvent::Completed {
                    run_id: run_id.to_string(),
                    successful: summary.successful.len() as u32,
                    merged: summary.merged.len() as u32,
                    skipped: summary.skipped.len() as u32,
                    failed: summary.failed.len() as u32,
                });
            }

            info!(
                run_id = %run_id,
                state = %final_state,
                successful = summary.successful.len(),
                merged = summary.merged.len(),
                skipped = summary.skipped.len(),
                failed = summary.failed.len(),
                "Transfer finished"
            );
            Ok(summary)
        });

        Ok(TransferRun {
            run_id,
            progress: ProgressStream {
                receiver: progress_rx,
            },
            handle,
        })
    }

    /// Request cooperative cancellation of the active run.
    ///
    /// The collection in flight finishes; the rest are skipped.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> Result<()> {
        let state = self.state.lock().await;
        match &state.active {
            Some(active) => {
                active.cancellation_token.cancel();
                info!(run_id = %active.run_id, "Cancellation requested");
                Ok(())
            }
            None => Err(TransferError::NoActiveTransfer),
        }
    }

    async fn ensure_no_active_run(&self) -> Result<()> {
        let state = self.state.lock().await;
        match &state.active {
            Some(active) => Err(TransferError::TransferInProgress {
                run_id: active.run_id.to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn settle(&self, to: RunState) {
        let mut state = self.state.lock().await;
        match state.run_state.transition(to) {
            Ok(next) => state.run_state = next,
            Err(e) => warn!(error = %e, "Ignoring invalid run state transition"),
        }
        state.active = None;
    }

    async fn check_decisions(
        &self,
        collections: &[CatalogCollection],
        decisions: &DecisionSet,
    ) -> Result<()> {
        for collection in collections {
            let has_history = self.history.get(&collection.id).await.is_some();
            if has_history && decisions.answer_for(&collection.id).is_none() {
                return Err(TransferError::MissingDecision {
                    collection_id: collection.id.clone(),
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Run loop
    // ------------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(run_id = %run_id, total = selection.len()))]
    async fn execute_run(
        &self,
        run_id: TransferRunId,
        selection: Vec<String>,
        collections: Vec<CatalogCollection>,
        decisions: DecisionSet,
        options: RunOptions,
        cancellation_token: CancellationToken,
        progress_tx: mpsc::UnboundedSender<ProgressState>,
    ) -> (TransferSummary, usize) {
        let total = selection.len() as u32;
        let mut by_id: HashMap<String, CatalogCollection> = collections
            .into_iter()
            .map(|collection| (collection.id.clone(), collection))
            .collect();
        let mut progress = ProgressState::new(total);
        let mut summary = TransferSummary::default();
        let mut remaining = 0;

        self.emit(TransferEvent::Started {
            run_id: run_id.to_string(),
            total,
        });

        for (index, collection_id) in selection.iter().enumerate() {
            if cancellation_token.is_cancelled() {
                info!(
                    processed = index,
                    remaining = selection.len() - index,
                    "Cancellation observed at collection boundary"
                );
                for remaining_id in &selection[index..] {
                    let name = by_id
                        .get(remaining_id)
                        .map_or_else(|| remaining_id.clone(), |c| c.name.clone());
                    summary.record(CollectionOutcome::new(
                        remaining_id.clone(),
                        name,
                        OutcomeBucket::Skipped,
                    ));
                }
                summary.cancelled = true;
                remaining = selection.len() - index;
                progress.message = "Transfer cancelled".to_string();
                progress_tx.send(progress.clone()).ok();
                break;
            }

            let outcome = match by_id.remove(collection_id) {
                None => {
                    warn!(collection_id = %collection_id, "Selected collection missing from source");
                    CollectionOutcome::new(
                        collection_id.clone(),
                        collection_id.clone(),
                        OutcomeBucket::Failed,
                    )
                    .with_error(MISSING_FROM_SOURCE)
                }
                Some(collection) => {
                    let id = collection.id.clone();
                    let name = collection.name.clone();
                    match self
                        .resolve_job(run_id, collection, &decisions, &cancellation_token)
                        .await
                    {
                        Some(job) => self.process_job(job, &options).await,
                        None => {
                            if cancellation_token.is_cancelled() {
                                summary.cancelled = true;
                            }
                            info!(collection = %name, "No decision received, skipping");
                            CollectionOutcome::new(id, name, OutcomeBucket::Skipped)
                        }
                    }
                }
            };

            progress.advance(outcome.status_message());
            progress_tx.send(progress.clone()).ok();

            self.emit(TransferEvent::Progress {
                run_id: run_id.to_string(),
                current: progress.current,
                total: progress.total,
                message: progress.message.clone(),
            });
            self.emit(TransferEvent::CollectionFinished {
                run_id: run_id.to_string(),
                collection_id: outcome.collection_id.clone(),
                collection_name: outcome.collection_name.clone(),
                bucket: outcome.bucket.to_string(),
                matched: outcome.stats.matched,
                unmatched: outcome.stats.unmatched,
            });

            summary.record(outcome);
        }

        (summary, remaining)
    }

    /// Bind a decision to the collection; `None` if the caller gave none
    /// (prompt channel gone, or cancelled while waiting).
    async fn resolve_job(
        &self,
        run_id: TransferRunId,
        collection: CatalogCollection,
        decisions: &DecisionSet,
        cancellation_token: &CancellationToken,
    ) -> Option<TransferJob> {
        let record = self.history.get(&collection.id).await;

        let candidate = match self.policy.evaluate(&collection, record.as_ref()) {
            PolicyOutcome::Resolved(decision) => {
                return Some(TransferJob::new(collection, decision, record))
            }
            PolicyOutcome::NeedsDecision(candidate) => candidate,
        };

        let resolution = match (decisions.answer_for(&collection.id), decisions.resolver()) {
            (Some(answer), _) => Some(answer),
            (None, Some(resolver)) => {
                self.emit(TransferEvent::DecisionRequired {
                    run_id: run_id.to_string(),
                    collection_id: collection.id.clone(),
                    collection_name: collection.name.clone(),
                });
                tokio::select! {
                    _ = cancellation_token.cancelled() => None,
                    answer = resolver.resolve(&candidate) => answer,
                }
            }
            (None, None) => None,
        };

        resolution.map(|answer| TransferJob::new(collection, answer.into(), record))
    }

    #[instrument(
        skip(self, job, options),
        fields(collection = %job.collection.name, decision = %job.decision)
    )]
    async fn process_job(&self, job: TransferJob, options: &RunOptions) -> CollectionOutcome {
        let mut outcome = CollectionOutcome::new(
            job.collection.id.clone(),
            job.collection.name.clone(),
            OutcomeBucket::Skipped,
        )
        .with_decision(job.decision);

        let applied = match job.decision {
            ReconciliationDecision::Skip => return outcome,
            ReconciliationDecision::Create | ReconciliationDecision::CreateCopy => {
                self.apply_create(&job, options).await
            }
            ReconciliationDecision::Overwrite => self.apply_overwrite(&job, options).await,
            ReconciliationDecision::Merge => self.apply_merge(&job, options).await,
        };

        let applied = match applied {
            Ok(applied) => applied,
            Err(e) => {
                warn!(error = %e, "Collection failed");
                outcome.bucket = OutcomeBucket::Failed;
                outcome.target_collection_id = job.existing_target_id().map(str::to_string);
                return outcome.with_error(e.to_string());
            }
        };

        let record = TransferRecord {
            source_collection_id: job.collection.id.clone(),
            target_collection_id: applied.target_collection_id.clone(),
            fingerprint: fingerprint(&job.collection.items),
            item_count: job.collection.items.len() as u64,
            timestamp: self.clock.unix_timestamp(),
        };
        if let Err(e) = self.history.put(record).await {
            error!(error = %e, "Failed to persist transfer record");
            outcome.error = Some(e.to_string());
        }

        outcome.bucket = applied.bucket;
        outcome.target_collection_id = Some(applied.target_collection_id);
        outcome.stats = applied.stats;
        outcome
    }

    // ------------------------------------------------------------------------
    // Decision handlers
    // ------------------------------------------------------------------------

    async fn apply_create(&self, job: &TransferJob, options: &RunOptions) -> Result<Applied> {
        let collection = &job.collection;
        let name = if job.decision == ReconciliationDecision::CreateCopy {
            let existing = with_backoff(&self.backoff, "list_collections", || {
                self.target.list_collections()
            })
            .await
            .map_err(TransferError::target_unavailable)?;
            copy_name(&collection.name, existing.iter().map(|c| c.name.as_str()))
        } else {
            collection.name.clone()
        };

        let request = NewCollection {
            name,
            description: collection.description.clone().unwrap_or_default(),
            visibility: options.default_visibility,
        };
        let target_collection_id = with_backoff_on_throttle(&self.backoff, "create_collection", || {
            self.target.create_collection(&request)
        })
        .await
        .map_err(TransferError::target_unavailable)?;

        info!(target_collection_id = %target_collection_id, name = %request.name, "Created target collection");

        let stats = self
            .transfer_items(&target_collection_id, options.limit(&collection.items), options)
            .await;

        Ok(Applied {
            bucket: OutcomeBucket::Successful,
            target_collection_id,
            stats,
        })
    }

    async fn apply_overwrite(&self, job: &TransferJob, options: &RunOptions) -> Result<Applied> {
        let target_collection_id = existing_target(job)?;

        with_backoff(&self.backoff, "clear_collection", || {
            self.target.clear_collection(&target_collection_id)
        })
        .await
        .map_err(TransferError::target_unavailable)?;

        debug!(target_collection_id = %target_collection_id, "Cleared target collection");

        let stats = self
            .transfer_items(
                &target_collection_id,
                options.limit(&job.collection.items),
                options,
            )
            .await;

        Ok(Applied {
            bucket: OutcomeBucket::Successful,
            target_collection_id,
            stats,
        })
    }

    async fn apply_merge(&self, job: &TransferJob, options: &RunOptions) -> Result<Applied> {
        let target_collection_id = existing_target(job)?;

        let target_items = with_backoff(&self.backoff, "list_collection_items", || {
            self.target.list_collection_items(&target_collection_id)
        })
        .await
        .map_err(TransferError::target_unavailable)?;

        let added = diff(&target_items, options.limit(&job.collection.items)).added;
        if added.is_empty() {
            debug!("Target already holds every source item");
            return Ok(Applied {
                bucket: OutcomeBucket::Skipped,
                target_collection_id,
                stats: ItemMatchStats::default(),
            });
        }

        debug!(added = added.len(), "Appending missing items");
        let stats = self
            .transfer_items(&target_collection_id, &added, options)
            .await;

        Ok(Applied {
            bucket: OutcomeBucket::Merged,
            target_collection_id,
            stats,
        })
    }

    /// Resolve `items` and append the matches to the target in order.
    ///
    /// Resolution runs ahead with bounded parallelism; additions are issued
    /// one at a time so the target keeps the source order.
    async fn transfer_items(
        &self,
        target_collection_id: &str,
        items: &[CatalogItem],
        options: &RunOptions,
    ) -> ItemMatchStats {
        let matcher = &self.matcher;
        let pending: Vec<_> = items
            .iter()
            .map(|item| async move { (item, matcher.resolve(item).await) })
            .collect();
        let mut resolved = stream::iter(pending).buffered(options.item_parallelism());

        let mut stats = ItemMatchStats::default();
        while let Some((item, outcome)) = resolved.next().await {
            let entity_id = match outcome {
                MatchOutcome::Matched(entity_id) => entity_id,
                MatchOutcome::NotFound => {
                    stats.unmatched += 1;
                    debug!(title = %item.title, "No match on target");
                    continue;
                }
            };
            stats.matched += 1;

            let added = with_backoff_on_throttle(&self.backoff, "add_item", || {
                self.target.add_item(target_collection_id, &entity_id)
            })
            .await;

            match added {
                Ok(()) => stats.added += 1,
                Err(e) => {
                    stats.add_failed += 1;
                    warn!(title = %item.title, entity_id = %entity_id, error = %e, "Failed to add item");
                }
            }
        }

        stats
    }
}

fn existing_target(job: &TransferJob) -> Result<String> {
    job.existing_target_id().map(str::to_string).ok_or_else(|| {
        TransferError::InvalidDecision(format!(
            "{} requires a previous transfer of {}",
            job.decision, job.collection.id
        ))
    })
}

/// Drop repeated ids, keeping the first occurrence.
fn dedupe(selection: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    selection
        .iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let selection = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ];
        assert_eq!(dedupe(&selection), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_run_options_limits() {
        let options = RunOptions {
            default_visibility: Visibility::Private,
            max_concurrent_item_ops: 12,
            max_items_per_collection: Some(2),
        };
        assert_eq!(options.item_parallelism(), MAX_CONCURRENT_ITEM_OPS);

        let items: Vec<_> = (0..5).map(|i| CatalogItem::new(format!("t{}", i))).collect();
        assert_eq!(options.limit(&items).len(), 2);

        let unlimited = RunOptions::default();
        assert_eq!(unlimited.limit(&items).len(), 5);
        assert_eq!(unlimited.item_parallelism(), 3);
    }

    #[test]
    fn test_run_options_reject_zero_item_limit() {
        let options = RunOptions {
            max_items_per_collection: Some(0),
            ..RunOptions::default()
        };
        assert!(matches!(options.validate(), Err(TransferError::Config(_))));
        assert!(RunOptions::default().validate().is_ok());
    }

    #[test]
    fn test_existing_target_required() {
        let job = TransferJob::new(
            CatalogCollection::new("pl-1", "Road Trip"),
            ReconciliationDecision::Merge,
            None,
        );
        assert!(matches!(
            existing_target(&job),
            Err(TransferError::InvalidDecision(_))
        ));
    }
}
