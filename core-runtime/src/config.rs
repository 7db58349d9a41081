//! # Configuration
//!
//! Settings for the transfer engine and the host capabilities it needs.
//!
//! ## Overview
//!
//! - [`TransferConfig`] tunes how a run behaves: default visibility of new
//!   collections, item-level parallelism, retry/backoff, history location.
//! - [`CoreConfig`] bundles a `TransferConfig` with logging settings and the
//!   injected [`HttpClient`].
//!
//! Both are assembled through builders that validate on `build()`.
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, TransferConfig};
//! use bridge_traits::Visibility;
//!
//! let transfer = TransferConfig::builder()
//!     .default_visibility(Visibility::Unlisted)
//!     .max_concurrent_item_ops(2)
//!     .max_items_per_collection(50)
//!     .history_database_path("/home/me/.crossfade/history.db")
//!     .build()?;
//!
//! // With the `desktop-shims` feature the reqwest client is filled in.
//! let core = CoreConfig::builder().transfer(transfer).build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::{HttpClient, Visibility};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound for concurrent item operations inside one collection.
pub const MAX_CONCURRENT_ITEM_OPS: usize = 4;

/// Retry/backoff settings for target-platform calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Fraction of the computed delay used as +/- random spread, in `[0, 1)`
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(8),
            jitter_ratio: 0.25,
        }
    }
}

impl RetryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if !(self.multiplier.is_finite() && self.multiplier >= 1.0) {
            return Err(Error::Config(format!(
                "retry.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter_ratio) {
            return Err(Error::Config(format!(
                "retry.jitter_ratio must be in [0, 1), got {}",
                self.jitter_ratio
            )));
        }
        if self.max_delay < self.base_delay {
            return Err(Error::Config(
                "retry.max_delay must not be shorter than retry.base_delay".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Visibility applied to collections the engine creates
    pub default_visibility: Visibility,
    /// Item resolutions in flight at once within one collection
    pub max_concurrent_item_ops: usize,
    /// Only the first N items of each collection are transferred when set
    pub max_items_per_collection: Option<usize>,
    pub retry: RetryConfig,
    /// SQLite file for transfer history; `None` keeps history in memory
    pub history_database_path: Option<PathBuf>,
    pub event_buffer_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_visibility: Visibility::Private,
            max_concurrent_item_ops: 3,
            max_items_per_collection: None,
            retry: RetryConfig::default(),
            history_database_path: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl TransferConfig {
    pub fn builder() -> TransferConfigBuilder {
        TransferConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_item_ops == 0 || self.max_concurrent_item_ops > MAX_CONCURRENT_ITEM_OPS
        {
            return Err(Error::Config(format!(
                "max_concurrent_item_ops must be between 1 and {}, got {}",
                MAX_CONCURRENT_ITEM_OPS, self.max_concurrent_item_ops
            )));
        }
        if self.max_items_per_collection == Some(0) {
            return Err(Error::Config(
                "max_items_per_collection must be positive when set".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "event_buffer_size must be positive".to_string(),
            ));
        }
        self.retry.validate()
    }
}

/// Builder for [`TransferConfig`].
#[derive(Debug, Default)]
pub struct TransferConfigBuilder {
    config: TransferConfig,
}

impl TransferConfigBuilder {
    pub fn default_visibility(mut self, visibility: Visibility) -> Self {
        self.config.default_visibility = visibility;
        self
    }

    pub fn max_concurrent_item_ops(mut self, ops: usize) -> Self {
        self.config.max_concurrent_item_ops = ops;
        self
    }

    pub fn max_items_per_collection(mut self, limit: usize) -> Self {
        self.config.max_items_per_collection = Some(limit);
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.config.retry.max_attempts = attempts;
        self
    }

    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.config.retry.base_delay = delay;
        self
    }

    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn history_database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.history_database_path = Some(path.into());
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn build(self) -> Result<TransferConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Complete runtime configuration handed to the host's composition root.
#[derive(Clone)]
pub struct CoreConfig {
    pub transfer: TransferConfig,
    pub logging: LoggingConfig,
    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("transfer", &self.transfer)
            .field("logging", &self.logging)
            .field("http_client", &"<dyn HttpClient>")
            .finish()
    }
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: format!("Default reqwest client could not be created: {}", e),
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Enable the `desktop-shims` feature or inject one with .http_client()."
            .to_string(),
    })
}

/// Builder for [`CoreConfig`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    transfer: Option<TransferConfig>,
    logging: Option<LoggingConfig>,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl CoreConfigBuilder {
    pub fn transfer(mut self, config: TransferConfig) -> Self {
        self.transfer = Some(config);
        self
    }

    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging = Some(config);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn build(self) -> Result<CoreConfig> {
        let transfer = self.transfer.unwrap_or_default();
        transfer.validate()?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        Ok(CoreConfig {
            transfer,
            logging: self.logging.unwrap_or_default(),
            http_client,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult,
        http::{HttpRequest, HttpResponse},
    };

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Err(bridge_traits::BridgeError::NotAvailable("noop".to_string()))
        }
    }

    #[test]
    fn test_transfer_config_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.default_visibility, Visibility::Private);
        assert_eq!(config.max_concurrent_item_ops, 3);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.max_items_per_collection.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = TransferConfig::builder()
            .default_visibility(Visibility::Public)
            .max_concurrent_item_ops(4)
            .max_items_per_collection(50)
            .retry_attempts(5)
            .retry_base_delay(Duration::from_millis(10))
            .retry_max_delay(Duration::from_millis(100))
            .history_database_path("/tmp/history.db")
            .build()
            .unwrap();

        assert_eq!(config.default_visibility, Visibility::Public);
        assert_eq!(config.max_items_per_collection, Some(50));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.history_database_path,
            Some(PathBuf::from("/tmp/history.db"))
        );
    }

    #[test]
    fn test_concurrency_bounds_rejected() {
        let zero = TransferConfig::builder().max_concurrent_item_ops(0).build();
        assert!(matches!(zero, Err(Error::Config(_))));

        let too_many = TransferConfig::builder().max_concurrent_item_ops(16).build();
        assert!(matches!(too_many, Err(Error::Config(_))));
    }

    #[test]
    fn test_retry_validation() {
        let no_attempts = TransferConfig::builder().retry_attempts(0).build();
        assert!(no_attempts.is_err());

        let inverted = TransferConfig::builder()
            .retry_base_delay(Duration::from_secs(10))
            .retry_max_delay(Duration::from_secs(1))
            .build();
        assert!(inverted.is_err());

        let bad_jitter = RetryConfig {
            jitter_ratio: 1.5,
            ..RetryConfig::default()
        };
        assert!(bad_jitter.validate().is_err());
    }

    #[test]
    fn test_core_config_with_injected_client() {
        let config = CoreConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .build()
            .unwrap();
        assert_eq!(config.transfer, TransferConfig::default());
        assert!(format!("{:?}", config).contains("<dyn HttpClient>"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_missing_http_client_is_reported() {
        let result = CoreConfig::builder().build();
        assert!(matches!(result, Err(Error::CapabilityMissing { .. })));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_desktop_shims_provide_http_client() {
        assert!(CoreConfig::builder().build().is_ok());
    }
}
