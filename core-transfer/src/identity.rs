//! # Item Identity & Collection Fingerprints
//!
//! Pure functions for comparing collections across runs:
//! - [`identity_key`] names an item for set comparison
//! - [`fingerprint`] digests a collection's key set, ignoring order
//! - [`diff`] computes added/removed items between two snapshots

use bridge_traits::CatalogItem;
use std::collections::HashSet;

/// Fingerprint of a collection with no items.
pub const EMPTY_FINGERPRINT: &str = "empty";

const COMPOSITE_SEPARATOR: &str = "::";
const KEY_JOIN_SEPARATOR: &str = "|";
const UNKNOWN_ARTIST: &str = "unknown";
const DJB2_SEED: i32 = 5381;

/// Stable key for an item.
///
/// The platform id when present, otherwise `"title::artist"` with both
/// parts trimmed and lowercased. A missing artist is spelled `unknown`.
pub fn identity_key(item: &CatalogItem) -> String {
    if let Some(id) = item.id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    let artist = item
        .primary_artist
        .as_deref()
        .map(str::trim)
        .filter(|artist| !artist.is_empty())
        .unwrap_or(UNKNOWN_ARTIST);

    format!(
        "{}{}{}",
        normalize(&item.title),
        COMPOSITE_SEPARATOR,
        normalize(artist)
    )
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Order-insensitive digest of a collection's identity keys.
///
/// Keys are sorted, joined with `|` and run through a 32-bit djb2 hash;
/// the absolute value is rendered as lowercase hex. An empty collection
/// yields [`EMPTY_FINGERPRINT`].
pub fn fingerprint<'a, I>(items: I) -> String
where
    I: IntoIterator<Item = &'a CatalogItem>,
{
    let mut keys: Vec<String> = items.into_iter().map(identity_key).collect();
    if keys.is_empty() {
        return EMPTY_FINGERPRINT.to_string();
    }

    keys.sort_unstable();
    let joined = keys.join(KEY_JOIN_SEPARATOR);

    format!("{:x}", djb2(&joined).unsigned_abs())
}

fn djb2(input: &str) -> i32 {
    input.encode_utf16().fold(DJB2_SEED, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_add(hash)
            .wrapping_add(i32::from(unit))
    })
}

/// Items present on one side of a comparison only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDiff {
    /// Items of the new list whose key is absent from the old list, in new-list order
    pub added: Vec<CatalogItem>,
    /// Items of the old list whose key is absent from the new list, in old-list order
    pub removed: Vec<CatalogItem>,
}

impl ItemDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compare two snapshots by identity key.
pub fn diff(old_items: &[CatalogItem], new_items: &[CatalogItem]) -> ItemDiff {
    let old_keys: HashSet<String> = old_items.iter().map(identity_key).collect();
    let new_keys: HashSet<String> = new_items.iter().map(identity_key).collect();

    let added = new_items
        .iter()
        .filter(|item| !old_keys.contains(&identity_key(item)))
        .cloned()
        .collect();

    let removed = old_items
        .iter()
        .filter(|item| !new_keys.contains(&identity_key(item)))
        .cloned()
        .collect();

    ItemDiff { added, removed }
}
