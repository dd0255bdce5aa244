//! 每日测验

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::dispatch::{invalid_action, ActionEnvelope};
use super::{ApiError, AppState};
use crate::models::DailyQuiz;
use crate::services::llm::parse_questions;
use crate::services::{ChatMessage, InferenceRequest, LlmProvider, QuizPrompt};
use crate::utils::parse_date_or_today;

/// 每日测验题量
pub const DAILY_QUESTION_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
struct DateParams {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpireParams {
    #[serde(default)]
    before: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuizResponse {
    pub success: bool,
    pub quiz: DailyQuiz,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpireResponse {
    pub success: bool,
    pub expired_count: usize,
}

pub async fn dispatch(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let envelope = ActionEnvelope::parse(&body)?;
    let action = envelope.action().map(str::to_string);
    match action.as_deref() {
        Some("get_or_create") => {
            let params: DateParams = envelope.params()?;
            let date = parse_date(params.date.as_deref())?;
            let (quiz, created) = get_or_create_quiz(&state, date).await?;
            Ok(Json(QuizResponse {
                success: true,
                quiz,
                created: Some(created),
            })
            .into_response())
        }
        Some("get") => {
            let params: DateParams = envelope.params()?;
            let date = parse_date(params.date.as_deref())?;
            let quiz = state
                .db
                .get_daily_quiz(date)?
                .ok_or_else(|| ApiError::bad_request(format!("No daily quiz for {}", date)))?;
            Ok(Json(QuizResponse {
                success: true,
                quiz,
                created: None,
            })
            .into_response())
        }
        Some("expire") => {
            let params: ExpireParams = envelope.params()?;
            let before = parse_date(params.before.as_deref())?;
            let expired_count = state.db.expire_daily_quizzes(before)?;
            log::info!("Expired {} daily quizzes before {}", expired_count, before);
            Ok(Json(ExpireResponse {
                success: true,
                expired_count,
            })
            .into_response())
        }
        _ => Err(invalid_action()),
    }
}

pub(crate) fn parse_date(value: Option<&str>) -> Result<NaiveDate, ApiError> {
    parse_date_or_today(value).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// 取当天测验，不存在时生成；生成失败不写库
pub(crate) async fn get_or_create_quiz(
    state: &AppState,
    date: NaiveDate,
) -> Result<(DailyQuiz, bool), ApiError> {
    if let Some(existing) = state.db.get_daily_quiz(date)? {
        return Ok((existing, false));
    }

    let request = InferenceRequest::new(vec![
        QuizPrompt::system(),
        ChatMessage::user(QuizPrompt::daily_quiz(date, DAILY_QUESTION_COUNT)),
    ])
    .max_tokens(4096);
    let response = state.providers.llm.complete(LlmProvider::OpenAi, request).await?;

    let mut questions = parse_questions(&response.text)?;
    if questions.len() < DAILY_QUESTION_COUNT {
        log::warn!(
            "Daily quiz for {} has only {} usable questions",
            date,
            questions.len()
        );
    }
    questions.truncate(DAILY_QUESTION_COUNT);

    let (quiz, created) = state
        .db
        .insert_daily_quiz_if_absent(&DailyQuiz::assemble(date, questions))?;
    if created {
        log::info!(
            "Created daily quiz for {} ({} questions, {} points)",
            date,
            quiz.questions.len(),
            quiz.total_points
        );
    }
    Ok((quiz, created))
}
