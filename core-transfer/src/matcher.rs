//! # Item Matcher
//!
//! Resolves a source item to an entity on the target platform.
//!
//! ## Overview
//!
//! [`EntityMatcher`] is the single-method capability the orchestrator
//! depends on. [`SearchMatcher`] implements it by searching the target
//! catalog for `"{title} {artist}"` and taking the top hit.
//!
//! Throttling and transient faults are retried with exponential backoff
//! plus jitter (see [`BackoffPolicy`]). Once retries run out, or the search
//! finds nothing, the item is reported as [`MatchOutcome::NotFound`]. A
//! miss never fails the collection.

use async_trait::async_trait;
use bridge_traits::{error::Result as BridgeResult, BridgeError, CatalogItem, EntityQuery, TargetCatalog};
use core_runtime::config::RetryConfig;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Result of resolving one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Target entity id of the best match
    Matched(String),
    NotFound,
}

impl MatchOutcome {
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            MatchOutcome::Matched(id) => Some(id),
            MatchOutcome::NotFound => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matched(_))
    }
}

/// Capability: find the target entity corresponding to a source item.
///
/// Implementations must not fail; every error condition maps to
/// [`MatchOutcome::NotFound`].
#[async_trait]
pub trait EntityMatcher: Send + Sync {
    async fn resolve(&self, item: &CatalogItem) -> MatchOutcome;
}

// ============================================================================
// Backoff
// ============================================================================

/// Exponential backoff with proportional jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay,
            multiplier: config.multiplier,
            max_delay: config.max_delay,
            jitter_ratio: config.jitter_ratio,
        }
    }
}

impl BackoffPolicy {
    /// Retry `max_attempts` times without sleeping.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
            jitter_ratio: 0.0,
        }
    }

    /// Delay after failed attempt `attempt` (1-based), before jitter.
    pub fn nominal_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled)
    }

    /// Nominal delay spread by +/- `jitter_ratio`, never above `max_delay`.
    pub fn jittered_delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let nominal = self.nominal_delay(attempt).as_secs_f64();
        if nominal == 0.0 || self.jitter_ratio <= 0.0 {
            return Duration::from_secs_f64(nominal);
        }

        let spread = nominal * self.jitter_ratio;
        let lower = (nominal - spread).max(0.0);
        let upper = (nominal + spread).min(self.max_delay.as_secs_f64()).max(lower);

        Duration::from_secs_f64(rng.gen_range(lower..=upper))
    }

    fn delay_before_retry(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let jittered = self.jittered_delay(attempt, &mut rand::thread_rng());
        match hint {
            Some(hint) => jittered.max(hint).min(self.max_delay.max(jittered)),
            None => jittered,
        }
    }
}

/// Run `call` until it succeeds, fails definitively, or the attempt budget
/// is spent. Only [`BridgeError::is_retryable`] errors are retried.
pub async fn with_backoff<T, F, Fut>(
    policy: &BackoffPolicy,
    operation: &str,
    call: F,
) -> BridgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<T>>,
{
    retry_while(policy, operation, BridgeError::is_retryable, call).await
}

/// Like [`with_backoff`], but only retries throttling.
///
/// Used for mutations, where a transient failure may already have been
/// applied on the remote side.
pub async fn with_backoff_on_throttle<T, F, Fut>(
    policy: &BackoffPolicy,
    operation: &str,
    call: F,
) -> BridgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<T>>,
{
    retry_while(
        policy,
        operation,
        |error| matches!(error, BridgeError::RateLimited { .. }),
        call,
    )
    .await
}

async fn retry_while<T, F, Fut>(
    policy: &BackoffPolicy,
    operation: &str,
    should_retry: fn(&BridgeError) -> bool,
    mut call: F,
) -> BridgeResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = BridgeResult<T>>,
{
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) if should_retry(&error) && attempt < policy.max_attempts => {
                let delay = policy.delay_before_retry(attempt, error.retry_after());
                warn!(
                    operation,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Retryable target failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

// ============================================================================
// Search-based matcher
// ============================================================================

/// [`EntityMatcher`] backed by [`TargetCatalog::search_entity`].
pub struct SearchMatcher {
    target: Arc<dyn TargetCatalog>,
    policy: BackoffPolicy,
}

impl SearchMatcher {
    pub fn new(target: Arc<dyn TargetCatalog>, policy: BackoffPolicy) -> Self {
        Self { target, policy }
    }
}

#[async_trait]
impl EntityMatcher for SearchMatcher {
    #[instrument(skip(self, item), fields(title = %item.title))]
    async fn resolve(&self, item: &CatalogItem) -> MatchOutcome {
        let query = EntityQuery::for_item(item);

        let result = with_backoff(&self.policy, "search_entity", || {
            self.target.search_entity(&query)
        })
        .await;

        match result {
            Ok(Some(entity_id)) => MatchOutcome::Matched(entity_id),
            Ok(None) => {
                debug!(query = %query.to_query_string(), "No search result");
                MatchOutcome::NotFound
            }
            Err(BridgeError::NotFound(_)) => MatchOutcome::NotFound,
            Err(error) => {
                warn!(error = %error, "Search failed, treating item as unmatched");
                MatchOutcome::NotFound
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{NewCollection, TargetCollectionSummary};
    use mockall::{mock, predicate::*};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    mock! {
        Target {}

        #[async_trait]
        impl TargetCatalog for Target {
            async fn create_collection(&self, request: &NewCollection) -> BridgeResult<String>;
            async fn list_collections(&self) -> BridgeResult<Vec<TargetCollectionSummary>>;
            async fn list_collection_items(&self, collection_id: &str) -> BridgeResult<Vec<CatalogItem>>;
            async fn add_item(&self, collection_id: &str, entity_id: &str) -> BridgeResult<()>;
            async fn clear_collection(&self, collection_id: &str) -> BridgeResult<()>;
            async fn search_entity(&self, query: &EntityQuery) -> BridgeResult<Option<String>>;
        }
    }

    fn holocene() -> CatalogItem {
        CatalogItem::new("Holocene").with_artist("Bon Iver")
    }

    #[tokio::test]
    async fn test_resolve_takes_search_hit() {
        let mut target = MockTarget::new();
        target
            .expect_search_entity()
            .with(eq(EntityQuery {
                title: "Holocene".to_string(),
                artist: Some("Bon Iver".to_string()),
            }))
            .times(1)
            .returning(|_| Ok(Some("TWcyIpul8OE".to_string())));

        let matcher = SearchMatcher::new(Arc::new(target), BackoffPolicy::immediate(3));
        let outcome = matcher.resolve(&holocene()).await;

        assert_eq!(outcome, MatchOutcome::Matched("TWcyIpul8OE".to_string()));
        assert_eq!(outcome.entity_id(), Some("TWcyIpul8OE"));
    }

    #[tokio::test]
    async fn test_resolve_empty_search_is_not_found() {
        let mut target = MockTarget::new();
        target
            .expect_search_entity()
            .times(1)
            .returning(|_| Ok(None));

        let matcher = SearchMatcher::new(Arc::new(target), BackoffPolicy::immediate(3));
        assert_eq!(matcher.resolve(&holocene()).await, MatchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_then_succeeds() {
        let mut target = MockTarget::new();
        let mut seq = mockall::Sequence::new();
        target
            .expect_search_entity()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(BridgeError::RateLimited { retry_after: None }));
        target
            .expect_search_entity()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some("abc".to_string())));

        let matcher = SearchMatcher::new(Arc::new(target), BackoffPolicy::immediate(3));
        assert!(matcher.resolve(&holocene()).await.is_match());
    }

    #[tokio::test]
    async fn test_exhausted_retries_degrade_to_not_found() {
        let mut target = MockTarget::new();
        target
            .expect_search_entity()
            .times(3)
            .returning(|_| Err(BridgeError::Transient("connection reset".to_string())));

        let matcher = SearchMatcher::new(Arc::new(target), BackoffPolicy::immediate(3));
        assert_eq!(matcher.resolve(&holocene()).await, MatchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_definitive_failure_not_retried() {
        let mut target = MockTarget::new();
        target
            .expect_search_entity()
            .times(1)
            .returning(|_| Err(BridgeError::OperationFailed("HTTP 403".to_string())));

        let matcher = SearchMatcher::new(Arc::new(target), BackoffPolicy::immediate(3));
        assert_eq!(matcher.resolve(&holocene()).await, MatchOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_throttle_only_retry_skips_transient() {
        let mut calls = 0;
        let result: BridgeResult<()> =
            with_backoff_on_throttle(&BackoffPolicy::immediate(3), "add_item", || {
                calls += 1;
                async { Err(BridgeError::Transient("timeout".to_string())) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);

        let mut calls = 0;
        let result = with_backoff_on_throttle(&BackoffPolicy::immediate(3), "add_item", || {
            calls += 1;
            let attempt = calls;
            async move {
                if attempt < 3 {
                    Err(BridgeError::RateLimited { retry_after: None })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_nominal_delay_doubles_and_caps() {
        let policy = BackoffPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(350),
            jitter_ratio: 0.0,
        };
        assert_eq!(policy.nominal_delay(1), Duration::from_millis(100));
        assert_eq!(policy.nominal_delay(2), Duration::from_millis(200));
        assert_eq!(policy.nominal_delay(3), Duration::from_millis(350));
        assert_eq!(policy.nominal_delay(40), Duration::from_millis(350));
    }

    #[test]
    fn test_jitter_stays_within_spread() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(400),
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            jitter_ratio: 0.25,
        };
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let delay = policy.jittered_delay(1, &mut rng);
            assert!(delay >= Duration::from_millis(300));
            assert!(delay <= Duration::from_millis(500));
            seen.insert(delay.as_micros());
        }
        assert!(seen.len() > 1, "jitter should vary the delay");
    }

    #[test]
    fn test_retry_after_hint_raises_delay() {
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            multiplier: 2.0,
            max_delay: Duration::from_secs(5),
            jitter_ratio: 0.0,
        };
        assert_eq!(
            policy.delay_before_retry(1, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
        assert_eq!(
            policy.delay_before_retry(1, Some(Duration::from_secs(60))),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_policy_from_retry_config() {
        let policy = BackoffPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.nominal_delay(2), Duration::from_secs(1));
    }
}
