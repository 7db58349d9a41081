//! YouTube Data API response and request types
//!
//! Only the fields the connector reads or writes are modelled.

use serde::{Deserialize, Serialize};

/// Suffix YouTube appends to auto-generated artist channels.
const TOPIC_SUFFIX: &str = " - Topic";

/// Paged list envelope shared by `playlists.list`, `playlistItems.list`
/// and `search.list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Playlist resource
///
/// See: https://developers.google.com/youtube/v3/docs/playlists#resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub snippet: PlaylistSnippet,
    #[serde(default)]
    pub content_details: Option<PlaylistContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistSnippet {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistContentDetails {
    pub item_count: u64,
}

/// Playlist item resource
///
/// See: https://developers.google.com/youtube/v3/docs/playlistItems#resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItem {
    /// Id of the membership, used for deletion
    pub id: String,
    pub snippet: PlaylistItemSnippet,
    #[serde(default)]
    pub content_details: Option<PlaylistItemContentDetails>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub title: String,
    /// Absent for deleted or private videos
    #[serde(default)]
    pub video_owner_channel_title: Option<String>,
    pub resource_id: ResourceId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemContentDetails {
    pub video_id: String,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.content_details
            .as_ref()
            .map(|details| details.video_id.as_str())
            .or(self.snippet.resource_id.video_id.as_deref())
    }

    /// Channel title with the auto-generated `" - Topic"` suffix removed.
    pub fn artist(&self) -> Option<&str> {
        self.snippet
            .video_owner_channel_title
            .as_deref()
            .map(|channel| channel.strip_suffix(TOPIC_SUFFIX).unwrap_or(channel))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

/// `search.list` result
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: ResourceId,
}

/// Body of `playlists.insert`
#[derive(Debug, Serialize)]
pub struct PlaylistInsert<'a> {
    pub snippet: PlaylistInsertSnippet<'a>,
    pub status: PlaylistInsertStatus<'a>,
}

#[derive(Debug, Serialize)]
pub struct PlaylistInsertSnippet<'a> {
    pub title: &'a str,
    pub description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInsertStatus<'a> {
    pub privacy_status: &'a str,
}

/// Body of `playlistItems.insert`
#[derive(Debug, Serialize)]
pub struct PlaylistItemInsert<'a> {
    pub snippet: PlaylistItemInsertSnippet<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemInsertSnippet<'a> {
    pub playlist_id: &'a str,
    pub resource_id: ResourceId,
}

/// Created resource; only the id is read back.
#[derive(Debug, Deserialize)]
pub struct CreatedResource {
    pub id: String,
}

/// Error envelope returned with 4xx/5xx statuses
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub reason: String,
}

impl ApiErrorResponse {
    /// First machine-readable reason, e.g. `quotaExceeded`.
    pub fn reason(&self) -> Option<&str> {
        self.error
            .errors
            .first()
            .map(|detail| detail.reason.as_str())
            .filter(|reason| !reason.is_empty())
    }
}
