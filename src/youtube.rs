use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const PAGE_SIZE: &str = "50";

/// One video's worth of metadata: everything the title parser needs.
#[derive(Debug, Clone)]
pub struct VideoItem {
    pub video_id: String,
    pub title: String,
    pub published_at: String,
}

impl VideoItem {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

/// Thin client for the YouTube Data API v3. Only the two list endpoints the
/// ingestion commands need.
pub struct YoutubeClient {
    http: reqwest::Client,
    api_key: String,
}

impl YoutubeClient {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("YOUTUBE_API_KEY")
            .context("YOUTUBE_API_KEY environment variable must be set")?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
        })
    }

    /// All videos a channel search returns for `query`, following page
    /// tokens until exhausted.
    pub async fn search_channel(&self, channel_id: &str, query: &str) -> Result<Vec<VideoItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: SearchResponse = self
                .get_page(
                    "search",
                    &[("channelId", channel_id), ("q", query)],
                    page_token.as_deref(),
                )
                .await?;
            // Search results include playlists and channels; keep videos only.
            items.extend(page.items.into_iter().filter_map(|item| {
                let video_id = item.id.video_id?;
                Some(VideoItem {
                    video_id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!("Channel search returned {} videos", items.len());
        Ok(items)
    }

    /// All videos in a playlist, in playlist order.
    pub async fn playlist_videos(&self, playlist_id: &str) -> Result<Vec<VideoItem>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page: PlaylistResponse = self
                .get_page(
                    "playlistItems",
                    &[("playlistId", playlist_id)],
                    page_token.as_deref(),
                )
                .await?;
            items.extend(page.items.into_iter().filter_map(|item| {
                let video_id = item.snippet.resource_id.video_id?;
                Some(VideoItem {
                    video_id,
                    title: item.snippet.title,
                    published_at: item.snippet.published_at,
                })
            }));
            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        info!("Playlist returned {} videos", items.len());
        Ok(items)
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        extra: &[(&str, &str)],
        page_token: Option<&str>,
    ) -> Result<T> {
        let mut params = vec![
            ("part", "snippet"),
            ("maxResults", PAGE_SIZE),
            ("key", self.api_key.as_str()),
        ];
        params.extend_from_slice(extra);
        if let Some(token) = page_token {
            params.push(("pageToken", token));
        }

        self.http
            .get(format!("{}/{}", API_BASE, endpoint))
            .query(&params)
            .send()
            .await
            .with_context(|| format!("YouTube {} request failed", endpoint))?
            .error_for_status()
            .with_context(|| format!("YouTube {} request rejected", endpoint))?
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode YouTube {} response", endpoint))
    }
}

/// Pull the playlist id out of a playlist URL's `list` query parameter.
pub fn playlist_id(playlist_url: &str) -> Result<String> {
    let parsed = url::Url::parse(playlist_url)
        .with_context(|| format!("Invalid playlist URL {:?}", playlist_url))?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == "list")
        .map(|(_, value)| value.into_owned())
        .context("Playlist URL has no list parameter")
}

// ── Response shapes ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Deserialize)]
struct PlaylistItem {
    snippet: PlaylistSnippet,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistSnippet {
    title: String,
    published_at: String,
    resource_id: ResourceId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    published_at: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_id_from_url() {
        let id = playlist_id("https://www.youtube.com/playlist?list=PLabc123&feature=share");
        assert_eq!(id.unwrap(), "PLabc123");
    }

    #[test]
    fn playlist_url_without_list_is_an_error() {
        assert!(playlist_id("https://www.youtube.com/watch?v=abc").is_err());
        assert!(playlist_id("not a url").is_err());
    }

    #[test]
    fn search_response_skips_non_videos() {
        let body = r#"{
            "nextPageToken": null,
            "items": [
                {"id": {"kind": "youtube#video", "videoId": "abc"},
                 "snippet": {"title": "Alex vs Bob", "publishedAt": "2024-01-01T00:00:00Z"}},
                {"id": {"kind": "youtube#playlist", "playlistId": "xyz"},
                 "snippet": {"title": "Tournament playlist", "publishedAt": "2024-01-01T00:00:00Z"}}
            ]
        }"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let videos: Vec<_> = parsed
            .items
            .into_iter()
            .filter_map(|i| i.id.video_id)
            .collect();
        assert_eq!(videos, vec!["abc"]);
    }

    #[test]
    fn watch_url_format() {
        let item = VideoItem {
            video_id: "abc".into(),
            title: String::new(),
            published_at: String::new(),
        };
        assert_eq!(item.watch_url(), "https://www.youtube.com/watch?v=abc");
    }
}
