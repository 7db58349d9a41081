//! # Host Bridge Traits
//!
//! Contracts between the transfer core and the outside world.
//!
//! ## Overview
//!
//! The core never talks to a catalog platform, the network, or the system
//! clock directly. Each of those capabilities is expressed here as a trait
//! and injected by the host application.
//!
//! ## Traits
//!
//! ### Catalog Platforms
//! - [`SourceCatalog`](catalog::SourceCatalog) - Read selected collections with their items
//! - [`TargetCatalog`](catalog::TargetCatalog) - Create, list, fill, clear and search on the target
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Single-shot async HTTP requests
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! must classify failures so callers can tell throttling and transient
//! faults (retryable) from definitive failures:
//!
//! | Condition | Variant |
//! |-----------|---------|
//! | HTTP 429 | `RateLimited { retry_after }` |
//! | HTTP 5xx, timeouts, connection resets | `Transient` |
//! | HTTP 404 | `NotFound` |
//! | Anything else | `OperationFailed` |
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared across
//! tokio tasks behind an `Arc`.

pub mod catalog;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

pub use catalog::{
    CatalogCollection, CatalogItem, EntityQuery, NewCollection, SourceCatalog, TargetCatalog,
    TargetCollectionSummary, Visibility,
};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
pub use time::{Clock, FixedClock, LogLevel, SystemClock};
