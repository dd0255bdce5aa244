//! YouTube 视频元数据

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::ensure_success;
use crate::config::ProviderConfig;

/// 视频元数据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub channel_title: String,
    pub published_at: Option<String>,
    pub duration: Option<String>,
    pub duration_seconds: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub tags: Vec<String>,
    pub view_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Option<Snippet>,
    #[serde(default)]
    content_details: Option<ContentDetails>,
    #[serde(default)]
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    #[serde(default)]
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    // API 以字符串返回计数
    #[serde(default)]
    view_count: Option<String>,
}

#[derive(Clone)]
pub struct YouTubeClient {
    http: reqwest::Client,
    config: Arc<ProviderConfig>,
}

impl YouTubeClient {
    pub fn new(http: reqwest::Client, config: Arc<ProviderConfig>) -> Self {
        Self { http, config }
    }

    /// 查询视频信息，视频不存在时返回 `None`
    pub async fn fetch_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let key = ProviderConfig::key(&self.config.youtube_api_key)
            .ok_or_else(|| anyhow!("YOUTUBE_API_KEY is not configured"))?;
        let url = format!(
            "{}/youtube/v3/videos",
            self.config.youtube_base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .get(&url)
            .query(&[
                ("part", "snippet,contentDetails,statistics"),
                ("id", video_id),
                ("key", key),
            ])
            .send()
            .await
            .context("YouTube request failed")?;
        let response = ensure_success(response, "YouTube").await?;

        let parsed: VideoListResponse = response
            .json()
            .await
            .context("Failed to parse YouTube response")?;

        Ok(parsed.items.into_iter().next().map(into_metadata))
    }
}

fn into_metadata(item: VideoItem) -> VideoMetadata {
    let snippet = item.snippet.unwrap_or(Snippet {
        title: String::new(),
        description: String::new(),
        channel_title: String::new(),
        published_at: None,
        tags: Vec::new(),
        thumbnails: HashMap::new(),
    });
    let duration = item.content_details.and_then(|d| d.duration);
    let duration_seconds = duration.as_deref().and_then(parse_iso8601_duration);
    let thumbnail_url = ["maxres", "high", "medium", "default"]
        .iter()
        .find_map(|size| snippet.thumbnails.get(*size))
        .map(|t| t.url.clone());

    VideoMetadata {
        video_id: item.id,
        title: snippet.title,
        description: snippet.description,
        channel_title: snippet.channel_title,
        published_at: snippet.published_at,
        duration,
        duration_seconds,
        thumbnail_url,
        tags: snippet.tags,
        view_count: item
            .statistics
            .and_then(|s| s.view_count)
            .and_then(|v| v.parse().ok()),
    }
}

fn video_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?:youtube\.com/(?:watch\?(?:.*&)?v=|embed/|shorts/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})",
        )
        .expect("video id pattern")
    })
}

fn bare_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("bare id pattern"))
}

/// 从视频 ID 或各种链接格式中取出 11 位 ID
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if bare_id_pattern().is_match(input) {
        return Some(input.to_string());
    }
    video_id_pattern()
        .captures(input)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// 解析 ISO 8601 时长，如 `PT1H2M3S`、`P1DT5M`
pub fn parse_iso8601_duration(value: &str) -> Option<u64> {
    let rest = value.strip_prefix('P')?;
    let mut total = 0u64;
    let mut number = String::new();
    let mut in_time = false;
    let mut seen_unit = false;

    for c in rest.chars() {
        match c {
            'T' => {
                if !number.is_empty() {
                    return None;
                }
                in_time = true;
            }
            '0'..='9' => number.push(c),
            unit => {
                let n: u64 = number.parse().ok()?;
                number.clear();
                let factor = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(n.checked_mul(factor)?)?;
                seen_unit = true;
            }
        }
    }

    if !number.is_empty() || !seen_unit {
        return None;
    }
    Some(total)
}
