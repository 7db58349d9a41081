//! YouTube Data API connector implementation
//!
//! Implements `TargetCatalog` and `SourceCatalog` for YouTube Data API v3.

use async_trait::async_trait;
use bridge_traits::catalog::{
    CatalogCollection, CatalogItem, EntityQuery, NewCollection, SourceCatalog, TargetCatalog,
    TargetCollectionSummary,
};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use core_runtime::logging::redact_if_sensitive;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, YouTubeError};
use crate::types::{
    CreatedResource, ListResponse, Playlist, PlaylistInsert, PlaylistInsertSnippet,
    PlaylistInsertStatus, PlaylistItem, PlaylistItemInsert, PlaylistItemInsertSnippet,
    ResourceId, SearchResult,
};

/// YouTube Data API base URL
const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Maximum results per page (YouTube API limit)
const MAX_PAGE_SIZE: usize = 50;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const VIDEO_KIND: &str = "youtube#video";

/// YouTube Data API connector
///
/// # Example
///
/// ```ignore
/// use provider_youtube::YouTubeConnector;
/// use bridge_traits::TargetCatalog;
///
/// let connector = YouTubeConnector::new(http_client, access_token);
/// let playlists = connector.list_collections().await?;
/// ```
pub struct YouTubeConnector {
    http_client: Arc<dyn HttpClient>,
    /// OAuth 2.0 access token with the `youtube` scope
    access_token: String,
    base_url: String,
}

impl YouTubeConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, access_token: impl Into<String>) -> Self {
        Self {
            http_client,
            access_token: access_token.into(),
            base_url: YOUTUBE_API_BASE.to_string(),
        }
    }

    /// Point the connector at another API root (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, method: HttpMethod, path_and_query: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}/{}", self.base_url, path_and_query))
            .bearer_token(&self.access_token)
            .header("Accept", "application/json")
            .timeout(REQUEST_TIMEOUT)
    }

    /// Execute once; non-2xx statuses become a classified [`YouTubeError`].
    async fn send(&self, request: HttpRequest, resource: &str) -> Result<HttpResponse> {
        let response = self.http_client.execute(request).await?;
        if response.is_success() {
            return Ok(response);
        }

        let error = YouTubeError::from_response(&response, resource);
        warn!(status = response.status, resource, error = %error, "YouTube API request failed");
        Err(error)
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str, resource: &str) -> Result<T> {
        let response = self
            .send(self.request(HttpMethod::Get, path_and_query), resource)
            .await?;
        parse(&response)
    }

    /// Follow `nextPageToken` until the listing is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path_and_query: &str,
        resource: &str,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut path = path_and_query.to_string();
            if let Some(token) = &page_token {
                path.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let page: ListResponse<T> = self.get_json(&path, resource).await?;
            items.extend(page.items);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistItem>> {
        let path = format!(
            "playlistItems?part=snippet,contentDetails&playlistId={}&maxResults={}",
            urlencoding::encode(playlist_id),
            MAX_PAGE_SIZE
        );
        self.get_all_pages(&path, &format!("playlist {}", playlist_id))
            .await
    }

    /// Convert a playlist entry; entries without a video are dropped.
    fn to_catalog_item(item: &PlaylistItem) -> Option<CatalogItem> {
        let video_id = item.video_id()?;
        let mut catalog_item = CatalogItem::new(item.snippet.title.clone()).with_id(video_id);
        if let Some(artist) = item.artist() {
            catalog_item = catalog_item.with_artist(artist);
        }
        Some(catalog_item)
    }

    fn to_collection(playlist: Playlist, items: &[PlaylistItem]) -> CatalogCollection {
        let mut collection = CatalogCollection::new(playlist.id, playlist.snippet.title)
            .with_items(items.iter().filter_map(Self::to_catalog_item).collect());
        if !playlist.snippet.description.is_empty() {
            collection = collection.with_description(playlist.snippet.description);
        }
        collection
    }
}

impl fmt::Debug for YouTubeConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeConnector")
            .field("base_url", &self.base_url)
            .field(
                "access_token",
                &redact_if_sensitive("access_token", &self.access_token),
            )
            .finish_non_exhaustive()
    }
}

fn parse<T: DeserializeOwned>(response: &HttpResponse) -> Result<T> {
    serde_json::from_slice(&response.body).map_err(|e| YouTubeError::ParseError(e.to_string()))
}

#[async_trait]
impl TargetCatalog for YouTubeConnector {
    #[instrument(skip(self, request), fields(name = %request.name, visibility = %request.visibility))]
    async fn create_collection(&self, request: &NewCollection) -> BridgeResult<String> {
        let body = PlaylistInsert {
            snippet: PlaylistInsertSnippet {
                title: &request.name,
                description: &request.description,
            },
            status: PlaylistInsertStatus {
                privacy_status: request.visibility.as_str(),
            },
        };
        let http_request = self
            .request(HttpMethod::Post, "playlists?part=snippet,status")
            .json(&body)?;

        let response = self.send(http_request, "playlists").await?;
        let created: CreatedResource = parse(&response)?;

        info!(playlist_id = %created.id, "Created playlist");
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn list_collections(&self) -> BridgeResult<Vec<TargetCollectionSummary>> {
        let path = format!(
            "playlists?part=snippet,contentDetails&mine=true&maxResults={}",
            MAX_PAGE_SIZE
        );
        let playlists: Vec<Playlist> = self.get_all_pages(&path, "playlists").await?;

        debug!(count = playlists.len(), "Listed playlists");
        Ok(playlists
            .into_iter()
            .map(|playlist| TargetCollectionSummary {
                id: playlist.id,
                name: playlist.snippet.title,
                item_count: playlist.content_details.map(|details| details.item_count),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_collection_items(&self, collection_id: &str) -> BridgeResult<Vec<CatalogItem>> {
        let items = self.playlist_items(collection_id).await?;
        Ok(items.iter().filter_map(Self::to_catalog_item).collect())
    }

    #[instrument(skip(self))]
    async fn add_item(&self, collection_id: &str, entity_id: &str) -> BridgeResult<()> {
        let body = PlaylistItemInsert {
            snippet: PlaylistItemInsertSnippet {
                playlist_id: collection_id,
                resource_id: ResourceId {
                    kind: VIDEO_KIND.to_string(),
                    video_id: Some(entity_id.to_string()),
                },
            },
        };
        let http_request = self
            .request(HttpMethod::Post, "playlistItems?part=snippet")
            .json(&body)?;

        self.send(http_request, &format!("playlist {}", collection_id))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_collection(&self, collection_id: &str) -> BridgeResult<()> {
        let items = self.playlist_items(collection_id).await?;
        info!(count = items.len(), "Removing playlist items");

        for item in &items {
            let path = format!("playlistItems?id={}", urlencoding::encode(&item.id));
            self.send(
                self.request(HttpMethod::Delete, &path),
                &format!("playlist item {}", item.id),
            )
            .await?;
        }
        Ok(())
    }

    #[instrument(skip(self, query), fields(q = %query.to_query_string()))]
    async fn search_entity(&self, query: &EntityQuery) -> BridgeResult<Option<String>> {
        let path = format!(
            "search?part=snippet&type=video&maxResults=1&q={}",
            urlencoding::encode(&query.to_query_string())
        );
        let page: ListResponse<SearchResult> = self.get_json(&path, "search").await?;

        Ok(page
            .items
            .into_iter()
            .find_map(|result| result.id.video_id))
    }
}

#[async_trait]
impl SourceCatalog for YouTubeConnector {
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    async fn list_selected_collections(&self, ids: &[String]) -> BridgeResult<Vec<CatalogCollection>> {
        let mut playlists: HashMap<String, Playlist> = HashMap::new();
        for chunk in ids.chunks(MAX_PAGE_SIZE) {
            let joined = chunk.join(",");
            let path = format!(
                "playlists?part=snippet,contentDetails&id={}&maxResults={}",
                urlencoding::encode(&joined),
                MAX_PAGE_SIZE
            );
            let page: ListResponse<Playlist> = self.get_json(&path, "playlists").await?;
            playlists.extend(page.items.into_iter().map(|p| (p.id.clone(), p)));
        }

        let mut collections = Vec::with_capacity(playlists.len());
        for id in ids {
            let Some(playlist) = playlists.remove(id) else {
                debug!(playlist_id = %id, "Playlist not returned by YouTube");
                continue;
            };
            let items = self.playlist_items(id).await?;
            collections.push(Self::to_collection(playlist, &items));
        }

        info!(count = collections.len(), "Fetched selected playlists");
        Ok(collections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::catalog::Visibility;
    use bridge_traits::error::BridgeError;
    use bytes::Bytes;
    use mockall::{mock, Sequence};

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn ok_json(body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn status(status: u16, headers: &[(&str, &str)]) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::new(),
        })
    }

    fn connector(mock: MockHttpClient) -> YouTubeConnector {
        YouTubeConnector::new(Arc::new(mock), "ya29.secret")
    }

    fn body_json(request: &HttpRequest) -> serde_json::Value {
        serde_json::from_slice(request.body.as_deref().unwrap_or_default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_collection_posts_snippet_and_status() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|req| {
                let body = body_json(req);
                req.method == HttpMethod::Post
                    && req.url == "https://www.googleapis.com/youtube/v3/playlists?part=snippet,status"
                    && req.headers.get("Authorization").map(String::as_str) == Some("Bearer ya29.secret")
                    && body["snippet"]["title"] == "Road Trip"
                    && body["status"]["privacyStatus"] == "unlisted"
            })
            .returning(|_| ok_json(r#"{"id": "PLnew"}"#));

        let request = NewCollection {
            name: "Road Trip".to_string(),
            description: String::new(),
            visibility: Visibility::Unlisted,
        };
        let id = connector(mock_http).create_collection(&request).await.unwrap();
        assert_eq!(id, "PLnew");
    }

    #[tokio::test]
    async fn test_list_collection_items_follows_pages() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = Sequence::new();
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.contains("playlistId=PL1") && !req.url.contains("pageToken"))
            .returning(|_| {
                ok_json(
                    r#"{"items": [{"id": "i1", "snippet": {"title": "Holocene",
                        "videoOwnerChannelTitle": "Bon Iver - Topic",
                        "resourceId": {"kind": "youtube#video", "videoId": "v1"}}}],
                        "nextPageToken": "CAEQAA"}"#,
                )
            });
        mock_http
            .expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .withf(|req| req.url.ends_with("&pageToken=CAEQAA"))
            .returning(|_| {
                ok_json(
                    r#"{"items": [{"id": "i2", "snippet": {"title": "Skinny Love",
                        "resourceId": {"kind": "youtube#video", "videoId": "v2"}}}]}"#,
                )
            });

        let items = connector(mock_http).list_collection_items("PL1").await.unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id.as_deref(), Some("v1"));
        assert_eq!(items[0].primary_artist.as_deref(), Some("Bon Iver"));
        assert_eq!(items[1].title, "Skinny Love");
        assert_eq!(items[1].primary_artist, None);
    }

    #[tokio::test]
    async fn test_search_entity_encodes_query() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|req| req.url.ends_with("search?part=snippet&type=video&maxResults=1&q=Holocene%20Bon%20Iver"))
            .returning(|_| ok_json(r#"{"items": [{"id": {"kind": "youtube#video", "videoId": "TWcyIpul8OE"}}]}"#));

        let query = EntityQuery {
            title: "Holocene".to_string(),
            artist: Some("Bon Iver".to_string()),
        };
        let hit = connector(mock_http).search_entity(&query).await.unwrap();
        assert_eq!(hit.as_deref(), Some("TWcyIpul8OE"));
    }

    #[tokio::test]
    async fn test_search_without_results() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| ok_json(r#"{"items": []}"#));

        let query = EntityQuery {
            title: "Unreleased demo".to_string(),
            artist: None,
        };
        assert_eq!(connector(mock_http).search_entity(&query).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_throttling_maps_to_rate_limited() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| status(429, &[("Retry-After", "3")]));

        let err = connector(mock_http)
            .add_item("PL1", "v1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::RateLimited { retry_after: Some(d) } if d == Duration::from_secs(3)
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_transient_and_not_retried_here() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| status(503, &[]));

        let err = connector(mock_http).list_collections().await.unwrap_err();
        assert!(matches!(err, BridgeError::Transient(_)));
    }

    #[tokio::test]
    async fn test_clear_collection_deletes_each_item() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|req| req.method == HttpMethod::Get)
            .returning(|_| {
                ok_json(
                    r#"{"items": [
                        {"id": "m1", "snippet": {"title": "A", "resourceId": {"kind": "youtube#video", "videoId": "v1"}}},
                        {"id": "m2", "snippet": {"title": "B", "resourceId": {"kind": "youtube#video", "videoId": "v2"}}}
                    ]}"#,
                )
            });
        mock_http
            .expect_execute()
            .times(2)
            .withf(|req| req.method == HttpMethod::Delete && req.url.contains("playlistItems?id=m"))
            .returning(|_| status(204, &[]));

        connector(mock_http).clear_collection("PL1").await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_playlist_is_not_found() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| status(404, &[]));

        let err = connector(mock_http)
            .list_collection_items("PLgone")
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(ref r) if r == "playlist PLgone"));
    }

    #[tokio::test]
    async fn test_selected_playlists_follow_requested_order() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .withf(|req| req.url.contains("playlists?") && req.url.contains("id=PL2%2CPL1%2CPLx"))
            .returning(|_| {
                ok_json(
                    r#"{"items": [
                        {"id": "PL1", "snippet": {"title": "Road Trip", "description": "Highway"}},
                        {"id": "PL2", "snippet": {"title": "Gym"}}
                    ]}"#,
                )
            });
        mock_http
            .expect_execute()
            .times(2)
            .withf(|req| req.url.contains("playlistItems?"))
            .returning(|_| ok_json(r#"{"items": []}"#));

        let ids = vec!["PL2".to_string(), "PL1".to_string(), "PLx".to_string()];
        let collections = connector(mock_http)
            .list_selected_collections(&ids)
            .await
            .unwrap();

        assert_eq!(collections.len(), 2);
        assert_eq!(collections[0].name, "Gym");
        assert_eq!(collections[0].description, None);
        assert_eq!(collections[1].description.as_deref(), Some("Highway"));
    }

    #[test]
    fn test_debug_hides_access_token() {
        let rendered = format!("{:?}", connector(MockHttpClient::new()));
        assert!(!rendered.contains("ya29.secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
