//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-runtime`, `core-transfer`, `provider-youtube`).
//! Host applications can depend on `crossfade-workspace` and enable the
//! documented features without needing to wire each crate individually.
//!
//! - `desktop-shims` (default): fill in a `reqwest`-backed HTTP client
//! - `youtube`: the YouTube Data API catalog provider

pub use core_runtime;
pub use core_transfer;

#[cfg(feature = "youtube")]
pub use provider_youtube;
