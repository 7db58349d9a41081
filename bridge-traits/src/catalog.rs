//! Catalog Provider Contracts
//!
//! Value types describing collections and items as delivered by a catalog
//! platform, and the two collaborator traits the transfer engine consumes:
//! [`SourceCatalog`] (read side) and [`TargetCatalog`] (write side).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// A single entry of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Platform-native id, when the platform exposes one.
    pub id: Option<String>,
    pub title: String,
    pub primary_artist: Option<String>,
    pub duration_ms: Option<u64>,
}

impl CatalogItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            primary_artist: None,
            duration_ms: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.primary_artist = Some(artist.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// An ordered collection ("playlist") fetched from the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCollection {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub items: Vec<CatalogItem>,
}

impl CatalogCollection {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            items: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_items(mut self, items: Vec<CatalogItem>) -> Self {
        self.items = items;
        self
    }
}

/// Summary of a collection that already exists on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCollectionSummary {
    pub id: String,
    pub name: String,
    pub item_count: Option<u64>,
}

/// Visibility of a newly created target collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Unlisted => "unlisted",
            Visibility::Public => "public",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Visibility {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(Visibility::Private),
            "unlisted" => Ok(Visibility::Unlisted),
            "public" => Ok(Visibility::Public),
            other => Err(BridgeError::OperationFailed(format!(
                "Unknown visibility: {}",
                other
            ))),
        }
    }
}

/// Parameters for creating a target collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    pub name: String,
    pub description: String,
    pub visibility: Visibility,
}

/// Search parameters for resolving one item on the target platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityQuery {
    pub title: String,
    pub artist: Option<String>,
}

impl EntityQuery {
    pub fn for_item(item: &CatalogItem) -> Self {
        Self {
            title: item.title.clone(),
            artist: item.primary_artist.clone(),
        }
    }

    /// Free-text form: `"{title} {artist}"`, or the bare title.
    pub fn to_query_string(&self) -> String {
        match self.artist.as_deref().map(str::trim) {
            Some(artist) if !artist.is_empty() => format!("{} {}", self.title.trim(), artist),
            _ => self.title.trim().to_string(),
        }
    }
}

/// Read-side catalog platform.
///
/// Authorization and pagination are the implementation's concern: every
/// returned collection carries its complete, ordered item list.
#[async_trait]
pub trait SourceCatalog: Send + Sync {
    /// Fetch the collections with the given ids.
    ///
    /// Ids unknown to the platform are omitted from the result. Any
    /// auth or network failure is an error.
    async fn list_selected_collections(&self, ids: &[String]) -> Result<Vec<CatalogCollection>>;
}

/// Write-side catalog platform.
///
/// Errors follow the [`BridgeError`] classification: `RateLimited` and
/// `Transient` may be retried by the caller, anything else is fatal to that
/// call.
#[async_trait]
pub trait TargetCatalog: Send + Sync {
    /// Create a collection and return its platform id.
    async fn create_collection(&self, request: &NewCollection) -> Result<String>;

    /// List the collections owned by the authorized account.
    async fn list_collections(&self) -> Result<Vec<TargetCollectionSummary>>;

    /// List the items of a collection in their current order.
    async fn list_collection_items(&self, collection_id: &str) -> Result<Vec<CatalogItem>>;

    /// Append an entity to the tail of a collection.
    async fn add_item(&self, collection_id: &str, entity_id: &str) -> Result<()>;

    /// Remove every item from a collection, keeping the collection itself.
    async fn clear_collection(&self, collection_id: &str) -> Result<()>;

    /// Return the id of the best matching entity, or `None` when the
    /// search yields nothing.
    async fn search_entity(&self, query: &EntityQuery) -> Result<Option<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_string_with_and_without_artist() {
        let item = CatalogItem::new("Holocene").with_artist("Bon Iver");
        assert_eq!(EntityQuery::for_item(&item).to_query_string(), "Holocene Bon Iver");

        let bare = CatalogItem::new("Intro ");
        assert_eq!(EntityQuery::for_item(&bare).to_query_string(), "Intro");

        let blank_artist = CatalogItem::new("Intro").with_artist("  ");
        assert_eq!(EntityQuery::for_item(&blank_artist).to_query_string(), "Intro");
    }

    #[test]
    fn test_visibility_parse_and_default() {
        assert_eq!(Visibility::default(), Visibility::Private);
        assert_eq!("PUBLIC".parse::<Visibility>().unwrap(), Visibility::Public);
        assert!("friends-only".parse::<Visibility>().is_err());
        assert_eq!(Visibility::Unlisted.to_string(), "unlisted");
    }

    #[test]
    fn test_collection_builders() {
        let collection = CatalogCollection::new("pl-1", "Road Trip")
            .with_description("summer")
            .with_items(vec![CatalogItem::new("A").with_id("1").with_duration_ms(1000)]);
        assert_eq!(collection.items.len(), 1);
        assert_eq!(collection.items[0].duration_ms, Some(1000));
        assert_eq!(collection.description.as_deref(), Some("summer"));
    }
}
