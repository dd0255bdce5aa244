//! YouTube 视频信息与学科分类

use axum::{body::Bytes, extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dispatch::parse_json;
use super::{ApiError, AppState};
use crate::services::llm::parse_subject;
use crate::services::youtube::extract_video_id;
use crate::services::{
    ChatMessage, InferenceRequest, LlmProvider, QuizPrompt, TextStatistics, VideoMetadata,
};

const DEFAULT_SUBJECT: &str = "General";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoRequest {
    #[serde(default)]
    video_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    pub success: bool,
    #[serde(flatten)]
    pub video: VideoMetadata,
    pub subject: String,
    pub statistics: TextStatistics,
    pub processing_steps: Vec<String>,
    pub processed_at: DateTime<Utc>,
}

pub async fn fetch_video(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<VideoResponse>, ApiError> {
    let request: VideoRequest = parse_json(&body)?;
    let video_id = request
        .video_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .or(request.url.as_deref())
        .and_then(extract_video_id)
        .ok_or_else(|| ApiError::bad_request("A valid YouTube video ID or URL is required"))?;

    let video = state
        .providers
        .youtube
        .fetch_video(&video_id)
        .await?
        .ok_or_else(|| ApiError::bad_request("Video not found"))?;
    let mut steps = vec![format!("Fetched metadata for video {}", video_id)];

    let subject = classify_subject(&state, &video, &mut steps).await;
    let statistics = TextStatistics::from_text(&format!("{}\n{}", video.title, video.description));

    log::info!("YouTube video {} classified as {}", video_id, subject);

    Ok(Json(VideoResponse {
        success: true,
        video,
        subject,
        statistics,
        processing_steps: steps,
        processed_at: Utc::now(),
    }))
}

/// 分类失败时退回 "General"
async fn classify_subject(state: &AppState, video: &VideoMetadata, steps: &mut Vec<String>) -> String {
    if !state.providers.llm.is_configured(LlmProvider::OpenAi) {
        steps.push("Skipped subject classification (not configured)".to_string());
        return DEFAULT_SUBJECT.to_string();
    }

    let request = InferenceRequest::new(vec![
        QuizPrompt::system(),
        ChatMessage::user(QuizPrompt::classify_subject(&video.title, &video.description)),
    ])
    .temperature(0.0)
    .max_tokens(16);

    match state.providers.llm.complete(LlmProvider::OpenAi, request).await {
        Ok(response) => match parse_subject(&response.text) {
            Some(subject) => {
                steps.push(format!("Classified subject as {}", subject));
                subject
            }
            None => {
                steps.push("Subject classification was inconclusive".to_string());
                DEFAULT_SUBJECT.to_string()
            }
        },
        Err(e) => {
            log::warn!("Subject classification failed: {:#}", e);
            steps.push("Subject classification failed".to_string());
            DEFAULT_SUBJECT.to_string()
        }
    }
}
