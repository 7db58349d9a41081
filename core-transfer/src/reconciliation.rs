//! # Reconciliation Policy
//!
//! Decides what happens to each selected collection before any target-side
//! call is made.
//!
//! ## Rules
//!
//! - No history record: [`ReconciliationDecision::Create`], without asking.
//! - History record present: the collection is a [`DuplicateCandidate`] and
//!   the caller must pick a [`DuplicateResolution`]. Equal fingerprints do
//!   not short-circuit to skip; `content_unchanged()` is informational only.
//!
//! ## Pull-based resolution
//!
//! Candidates are put to the caller one at a time, in selection order, while
//! the run is in progress. [`ChannelResolver`] turns each pending decision
//! into a message carrying a `oneshot` responder:
//!
//! ```ignore
//! let (resolver, mut prompts) = ChannelResolver::new();
//! let run = engine.run(selection, DecisionSet::interactive(Arc::new(resolver)), options).await?;
//!
//! while let Some(pending) = prompts.recv().await {
//!     let choice = ask_user(&pending.candidate);
//!     pending.respond(choice);
//! }
//! ```

use crate::history::TransferRecord;
use crate::identity::fingerprint;
use crate::{Result, TransferError};
use async_trait::async_trait;
use bridge_traits::CatalogCollection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// Action applied to one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconciliationDecision {
    /// First transfer: new target collection with the source name
    Create,
    /// Append items missing from the previously created target collection
    Merge,
    /// Empty the previous target collection and refill it
    Overwrite,
    /// New target collection named with a numeric suffix
    CreateCopy,
    /// Leave the target untouched
    Skip,
}

impl ReconciliationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationDecision::Create => "create",
            ReconciliationDecision::Merge => "merge",
            ReconciliationDecision::Overwrite => "overwrite",
            ReconciliationDecision::CreateCopy => "createCopy",
            ReconciliationDecision::Skip => "skip",
        }
    }

    /// Whether the decision needs the target collection of an earlier transfer.
    pub fn requires_existing_target(&self) -> bool {
        matches!(
            self,
            ReconciliationDecision::Merge | ReconciliationDecision::Overwrite
        )
    }
}

impl fmt::Display for ReconciliationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconciliationDecision {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(ReconciliationDecision::Create),
            "merge" => Ok(ReconciliationDecision::Merge),
            "overwrite" => Ok(ReconciliationDecision::Overwrite),
            "createCopy" | "create_copy" => Ok(ReconciliationDecision::CreateCopy),
            "skip" => Ok(ReconciliationDecision::Skip),
            other => Err(TransferError::InvalidDecision(other.to_string())),
        }
    }
}

/// Answers a caller may give for a duplicate candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DuplicateResolution {
    Merge,
    Overwrite,
    CreateCopy,
    Skip,
}

impl From<DuplicateResolution> for ReconciliationDecision {
    fn from(resolution: DuplicateResolution) -> Self {
        match resolution {
            DuplicateResolution::Merge => ReconciliationDecision::Merge,
            DuplicateResolution::Overwrite => ReconciliationDecision::Overwrite,
            DuplicateResolution::CreateCopy => ReconciliationDecision::CreateCopy,
            DuplicateResolution::Skip => ReconciliationDecision::Skip,
        }
    }
}

impl TryFrom<ReconciliationDecision> for DuplicateResolution {
    type Error = TransferError;

    fn try_from(decision: ReconciliationDecision) -> Result<Self> {
        match decision {
            ReconciliationDecision::Merge => Ok(DuplicateResolution::Merge),
            ReconciliationDecision::Overwrite => Ok(DuplicateResolution::Overwrite),
            ReconciliationDecision::CreateCopy => Ok(DuplicateResolution::CreateCopy),
            ReconciliationDecision::Skip => Ok(DuplicateResolution::Skip),
            ReconciliationDecision::Create => Err(TransferError::InvalidDecision(
                "create is not an answer for a collection with history; use createCopy"
                    .to_string(),
            )),
        }
    }
}

/// A selected collection that was transferred before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub collection_id: String,
    pub collection_name: String,
    /// Unix timestamp of the previous transfer
    pub previous_timestamp: i64,
    pub previous_item_count: u64,
    pub current_item_count: u64,
    /// Positive for net additions, negative for net removals
    pub item_count_delta: i64,
    pub stored_fingerprint: String,
    pub current_fingerprint: String,
    pub target_collection_id: String,
}

impl DuplicateCandidate {
    pub fn new(collection: &CatalogCollection, record: &TransferRecord) -> Self {
        let current_item_count = collection.items.len() as u64;
        Self {
            collection_id: collection.id.clone(),
            collection_name: collection.name.clone(),
            previous_timestamp: record.timestamp,
            previous_item_count: record.item_count,
            current_item_count,
            item_count_delta: current_item_count as i64 - record.item_count as i64,
            stored_fingerprint: record.fingerprint.clone(),
            current_fingerprint: fingerprint(&collection.items),
            target_collection_id: record.target_collection_id.clone(),
        }
    }

    /// Same item set as at the previous transfer.
    pub fn content_unchanged(&self) -> bool {
        self.stored_fingerprint == self.current_fingerprint
    }

    /// Short human summary, e.g. `"+3 new"` or `"2 removed"`.
    pub fn delta_summary(&self) -> String {
        match self.item_count_delta {
            0 if self.content_unchanged() => "no changes".to_string(),
            0 => "same size, different items".to_string(),
            d if d > 0 => format!("+{} new", d),
            d => format!("{} removed", d.unsigned_abs()),
        }
    }
}

/// Result of evaluating one collection against its history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyOutcome {
    Resolved(ReconciliationDecision),
    NeedsDecision(DuplicateCandidate),
}

/// Stateless rule set mapping (collection, history) to an outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationPolicy;

impl ReconciliationPolicy {
    pub fn evaluate(
        &self,
        collection: &CatalogCollection,
        record: Option<&TransferRecord>,
    ) -> PolicyOutcome {
        match record {
            None => PolicyOutcome::Resolved(ReconciliationDecision::Create),
            Some(record) => PolicyOutcome::NeedsDecision(DuplicateCandidate::new(collection, record)),
        }
    }
}

/// Name for a `createCopy` target: `"{base} (N)"` with N one past the
/// highest existing suffix, starting at 2.
pub fn copy_name<'a, I>(base: &str, existing_names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("{} (", base);
    let highest = existing_names
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()))
        .filter_map(|rest| rest.strip_suffix(')'))
        .filter_map(|digits| digits.parse::<u32>().ok())
        .filter(|n| *n >= 2)
        .max();

    let next = highest.map_or(2, |n| n.saturating_add(1));
    format!("{} ({})", base, next)
}

// ============================================================================
// Caller-side resolution
// ============================================================================

/// Source of answers for duplicate candidates, asked one at a time.
#[async_trait]
pub trait DuplicateResolver: Send + Sync {
    /// Return the caller's choice, or `None` if the caller walked away.
    async fn resolve(&self, candidate: &DuplicateCandidate) -> Option<DuplicateResolution>;
}

/// One outstanding question to the caller.
#[derive(Debug)]
pub struct PendingDecision {
    pub candidate: DuplicateCandidate,
    responder: oneshot::Sender<DuplicateResolution>,
}

impl PendingDecision {
    /// Answer the question; returns `false` if the run no longer waits for it.
    pub fn respond(self, resolution: DuplicateResolution) -> bool {
        self.responder.send(resolution).is_ok()
    }
}

/// [`DuplicateResolver`] that forwards each candidate over a channel and
/// waits for the reply.
#[derive(Debug, Clone)]
pub struct ChannelResolver {
    prompts: mpsc::Sender<PendingDecision>,
}

impl ChannelResolver {
    /// Create the resolver and the receiving end the caller drains.
    pub fn new() -> (Self, mpsc::Receiver<PendingDecision>) {
        // One prompt at a time is the whole protocol.
        let (prompts, receiver) = mpsc::channel(1);
        (Self { prompts }, receiver)
    }
}

#[async_trait]
impl DuplicateResolver for ChannelResolver {
    async fn resolve(&self, candidate: &DuplicateCandidate) -> Option<DuplicateResolution> {
        let (responder, reply) = oneshot::channel();
        let pending = PendingDecision {
            candidate: candidate.clone(),
            responder,
        };

        self.prompts.send(pending).await.ok()?;
        reply.await.ok()
    }
}

/// Decisions supplied to a run.
#[derive(Clone, Default)]
pub struct DecisionSet {
    answered: HashMap<String, DuplicateResolution>,
    resolver: Option<Arc<dyn DuplicateResolver>>,
}

impl DecisionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask `resolver` for every duplicate not answered up front.
    pub fn interactive(resolver: Arc<dyn DuplicateResolver>) -> Self {
        Self {
            answered: HashMap::new(),
            resolver: Some(resolver),
        }
    }

    pub fn with_answer(mut self, collection_id: impl Into<String>, resolution: DuplicateResolution) -> Self {
        self.answered.insert(collection_id.into(), resolution);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn DuplicateResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn answer_for(&self, collection_id: &str) -> Option<DuplicateResolution> {
        self.answered.get(collection_id).copied()
    }

    pub fn resolver(&self) -> Option<&Arc<dyn DuplicateResolver>> {
        self.resolver.as_ref()
    }

    pub fn is_interactive(&self) -> bool {
        self.resolver.is_some()
    }
}

impl fmt::Debug for DecisionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionSet")
            .field("answered", &self.answered)
            .field("interactive", &self.is_interactive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::CatalogItem;

    fn road_trip(ids: &[&str]) -> CatalogCollection {
        CatalogCollection::new("pl-road", "Road Trip").with_items(
            ids.iter()
                .map(|id| CatalogItem::new(format!("Song {}", id)).with_id(*id))
                .collect(),
        )
    }

    fn record_for(collection: &CatalogCollection) -> TransferRecord {
        TransferRecord {
            source_collection_id: collection.id.clone(),
            target_collection_id: "yt-road".to_string(),
            fingerprint: fingerprint(&collection.items),
            item_count: collection.items.len() as u64,
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_no_history_resolves_to_create() {
        let outcome = ReconciliationPolicy.evaluate(&road_trip(&["1", "2"]), None);
        assert_eq!(outcome, PolicyOutcome::Resolved(ReconciliationDecision::Create));
    }

    #[test]
    fn test_unchanged_history_still_needs_decision() {
        let collection = road_trip(&["1", "2"]);
        let record = record_for(&collection);

        match ReconciliationPolicy.evaluate(&collection, Some(&record)) {
            PolicyOutcome::NeedsDecision(candidate) => {
                assert!(candidate.content_unchanged());
                assert_eq!(candidate.item_count_delta, 0);
                assert_eq!(candidate.delta_summary(), "no changes");
            }
            other => panic!("expected a duplicate candidate, got {:?}", other),
        }
    }

    #[test]
    fn test_candidate_reports_signed_delta() {
        let before = road_trip(&["1", "2", "3"]);
        let record = record_for(&before);

        let shrunk = DuplicateCandidate::new(&road_trip(&["1"]), &record);
        assert_eq!(shrunk.item_count_delta, -2);
        assert_eq!(shrunk.delta_summary(), "2 removed");
        assert!(!shrunk.content_unchanged());

        let grown = DuplicateCandidate::new(&road_trip(&["1", "2", "3", "4"]), &record);
        assert_eq!(grown.item_count_delta, 1);
        assert_eq!(grown.previous_item_count, 3);
        assert_eq!(grown.current_item_count, 4);
        assert_eq!(grown.delta_summary(), "+1 new");

        let swapped = DuplicateCandidate::new(&road_trip(&["1", "2", "9"]), &record);
        assert_eq!(swapped.delta_summary(), "same size, different items");
    }

    #[test]
    fn test_copy_name_increments_past_existing() {
        assert_eq!(copy_name("Road Trip", Vec::<&str>::new()), "Road Trip (2)");
        assert_eq!(
            copy_name("Road Trip", ["Road Trip", "Road Trip (2)"]),
            "Road Trip (3)"
        );
        assert_eq!(
            copy_name("Road Trip", ["Road Trip (2)", "Road Trip (4)", "Road Trip (x)"]),
            "Road Trip (5)"
        );
        assert_eq!(
            copy_name("Road Trip", ["Road Trip (Live) (2)", "Other (7)"]),
            "Road Trip (2)"
        );
    }

    #[test]
    fn test_decision_parsing() {
        assert_eq!(
            "createCopy".parse::<ReconciliationDecision>().unwrap(),
            ReconciliationDecision::CreateCopy
        );
        assert!("rename".parse::<ReconciliationDecision>().is_err());
        assert_eq!(ReconciliationDecision::Merge.to_string(), "merge");
        assert!(ReconciliationDecision::Overwrite.requires_existing_target());
        assert!(!ReconciliationDecision::CreateCopy.requires_existing_target());
    }

    #[test]
    fn test_create_is_not_a_duplicate_answer() {
        assert!(DuplicateResolution::try_from(ReconciliationDecision::Create).is_err());
        assert_eq!(
            DuplicateResolution::try_from(ReconciliationDecision::Skip).unwrap(),
            DuplicateResolution::Skip
        );
    }

    #[tokio::test]
    async fn test_channel_resolver_round_trip() {
        let (resolver, mut prompts) = ChannelResolver::new();
        let collection = road_trip(&["1"]);
        let candidate = DuplicateCandidate::new(&collection, &record_for(&collection));

        let answering = tokio::spawn(async move {
            let pending = prompts.recv().await.unwrap();
            assert_eq!(pending.candidate.collection_name, "Road Trip");
            pending.respond(DuplicateResolution::Overwrite)
        });

        assert_eq!(
            resolver.resolve(&candidate).await,
            Some(DuplicateResolution::Overwrite)
        );
        assert!(answering.await.unwrap());
    }

    #[tokio::test]
    async fn test_channel_resolver_caller_gone() {
        let (resolver, prompts) = ChannelResolver::new();
        drop(prompts);
        let collection = road_trip(&["1"]);
        let candidate = DuplicateCandidate::new(&collection, &record_for(&collection));

        assert_eq!(resolver.resolve(&candidate).await, None);
    }

    #[test]
    fn test_decision_set_lookup() {
        let decisions = DecisionSet::new().with_answer("pl-road", DuplicateResolution::Merge);
        assert_eq!(decisions.answer_for("pl-road"), Some(DuplicateResolution::Merge));
        assert_eq!(decisions.answer_for("pl-other"), None);
        assert!(!decisions.is_interactive());
    }
}
