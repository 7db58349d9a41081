//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the crossfade crates:
//! - Logging and tracing bootstrap
//! - Configuration with validation
//! - Event bus for transfer notifications
//!
//! ## Overview
//!
//! Nothing in here knows about transfers beyond the event payloads; the
//! engine itself lives in `core-transfer`.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, RetryConfig, TransferConfig};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, HistoryEvent, TransferEvent};
