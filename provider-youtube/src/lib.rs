//! # YouTube Provider
//!
//! Implements the catalog contracts for the YouTube Data API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Playlist creation, listing, clearing and item insertion (`TargetCatalog`)
//! - Video search used to match source items
//! - Reading selected playlists with their items (`SourceCatalog`)
//! - Classification of API failures into retryable and definitive errors
//!
//! Retries are not performed here; callers decide based on the returned
//! `BridgeError`.

pub mod connector;
pub mod error;
pub mod types;

pub use connector::YouTubeConnector;
pub use error::{Result, YouTubeError};
