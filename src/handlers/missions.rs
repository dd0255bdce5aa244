//! 学习任务：创建、生成内容、查询

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::dispatch::{invalid_action, required, ActionEnvelope};
use super::{ApiError, AppState};
use crate::models::{Mission, MissionStatus};
use crate::services::llm::parse_generated_content;
use crate::services::{ChatMessage, InferenceRequest, QuizPrompt};

const CONTENT_TYPES: [&str; 4] = ["text", "pdf", "image", "youtube"];
const DEFAULT_LIST_LIMIT: u32 = 20;
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateParams {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    source_text: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MissionIdParams {
    #[serde(default)]
    mission_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissionResponse {
    pub success: bool,
    pub mission: Mission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_generated: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl MissionResponse {
    fn new(mission: Mission) -> Self {
        Self {
            success: true,
            mission,
            already_generated: None,
            provider: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MissionListResponse {
    pub success: bool,
    pub missions: Vec<Mission>,
}

pub async fn dispatch(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let envelope = ActionEnvelope::parse(&body)?;
    let action = envelope.action().map(str::to_string);
    match action.as_deref() {
        Some("create") => create(&state, envelope.params()?).map(into_json),
        Some("generate") => generate(&state, envelope.params()?).await.map(into_json),
        Some("get") => get(&state, envelope.params()?).map(into_json),
        Some("list") => list(&state, envelope.params()?).map(into_json),
        _ => Err(invalid_action()),
    }
}

fn into_json<T: Serialize>(value: T) -> Response {
    Json(value).into_response()
}

fn create(state: &AppState, params: CreateParams) -> Result<MissionResponse, ApiError> {
    let title = required(&params.title, "Title is required")?.to_string();
    let source_text = required(&params.source_text, "Source text is required")?.to_string();
    let content_type = params
        .content_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or("text");
    if !CONTENT_TYPES.contains(&content_type) {
        return Err(ApiError::bad_request(format!(
            "Invalid content type '{}'",
            content_type
        )));
    }

    let now = Utc::now();
    let mission = Mission {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: params.user_id.filter(|u| !u.trim().is_empty()),
        title,
        description: params.description.filter(|d| !d.trim().is_empty()),
        content_type: content_type.to_string(),
        source_text,
        generated_content: None,
        status: MissionStatus::Pending,
        created_at: now,
        updated_at: now,
    };
    state.db.create_mission(&mission)?;
    log::info!("Created mission {} ({})", mission.id, mission.content_type);

    Ok(MissionResponse::new(mission))
}

/// 生成内容；只在任务仍为 pending 时写入
async fn generate(state: &AppState, params: MissionIdParams) -> Result<MissionResponse, ApiError> {
    let mission = load_mission(state, &params)?;
    if mission.status == MissionStatus::Completed {
        return Ok(MissionResponse {
            already_generated: Some(true),
            ..MissionResponse::new(mission)
        });
    }

    let provider = state
        .providers
        .llm
        .preferred_provider()
        .ok_or_else(|| ApiError::Downstream("No AI provider is configured".to_string()))?;

    let request = InferenceRequest::new(vec![
        QuizPrompt::system(),
        ChatMessage::user(QuizPrompt::mission_content(&mission)),
    ])
    .max_tokens(4096);
    let response = state.providers.llm.complete(provider, request).await?;
    let content = parse_generated_content(&response.text)?;
    let value = serde_json::to_value(&content).map_err(anyhow::Error::from)?;

    let updated = state.db.complete_mission(&mission.id, &value)?;
    let stored = state
        .db
        .get_mission(&mission.id)?
        .ok_or_else(|| ApiError::bad_request("Mission not found"))?;

    if !updated {
        // 并发请求已经先写入
        log::info!("Mission {} was generated concurrently", mission.id);
        return Ok(MissionResponse {
            already_generated: Some(true),
            ..MissionResponse::new(stored)
        });
    }

    log::info!(
        "Generated mission {} with {} in {}ms ({} questions)",
        mission.id,
        response.provider.name(),
        response.inference_time_ms,
        content.questions.len()
    );
    Ok(MissionResponse {
        already_generated: Some(false),
        provider: Some(response.provider.name().to_string()),
        ..MissionResponse::new(stored)
    })
}

fn get(state: &AppState, params: MissionIdParams) -> Result<MissionResponse, ApiError> {
    load_mission(state, &params).map(MissionResponse::new)
}

fn list(state: &AppState, params: ListParams) -> Result<MissionListResponse, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let user_id = params
        .user_id
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty());
    let missions = state.db.list_missions(user_id, limit)?;
    Ok(MissionListResponse {
        success: true,
        missions,
    })
}

fn load_mission(state: &AppState, params: &MissionIdParams) -> Result<Mission, ApiError> {
    let id = required(&params.mission_id, "Mission ID is required")?;
    state
        .db
        .get_mission(id)?
        .ok_or_else(|| ApiError::bad_request("Mission not found"))
}
