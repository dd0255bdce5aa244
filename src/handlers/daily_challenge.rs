//! 每日挑战

use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::daily_quiz::{get_or_create_quiz, parse_date};
use super::dispatch::{invalid_action, required, ActionEnvelope};
use super::{run_blocking, ApiError, AppState};
use crate::models::{
    ChallengeParticipant, DailyChallenge, LeaderboardEntry, PublicQuestion, TournamentMoment,
};
use crate::services::challenge::{self, rank_entries};
use crate::services::{AnswerOutcome, AnswerSubmission};

const DEFAULT_LEADERBOARD_LIMIT: u32 = 50;
const DEFAULT_MOMENTS_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
struct DateParams {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JoinParams {
    challenge_id: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubmitParams {
    challenge_id: String,
    #[serde(default)]
    user_id: Option<String>,
    question_index: usize,
    selected_answer: String,
    #[serde(default)]
    time_taken_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    challenge_id: String,
    #[serde(default)]
    limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ParticipantParams {
    challenge_id: String,
    #[serde(default)]
    user_id: Option<String>,
}

/// 不含答案的挑战视图
#[derive(Debug, Serialize)]
pub struct ChallengeView {
    pub id: String,
    pub challenge_date: NaiveDate,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub question_count: usize,
    pub questions: Vec<PublicQuestion>,
}

impl From<DailyChallenge> for ChallengeView {
    fn from(challenge: DailyChallenge) -> Self {
        Self {
            question_count: challenge.questions.len(),
            questions: challenge
                .questions
                .iter()
                .map(|q| q.without_answer())
                .collect(),
            id: challenge.id,
            challenge_date: challenge.challenge_date,
            starts_at: challenge.starts_at,
            ends_at: challenge.ends_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub success: bool,
    pub challenge: ChallengeView,
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct ParticipantResponse {
    pub success: bool,
    pub participant: ChallengeParticipant,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joined: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: AnswerOutcome,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub success: bool,
    pub challenge_id: String,
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Serialize)]
pub struct MomentsResponse {
    pub success: bool,
    pub challenge_id: String,
    pub moments: Vec<TournamentMoment>,
}

pub async fn dispatch(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let envelope = ActionEnvelope::parse(&body)?;
    let action = envelope.action().map(str::to_string);
    match action.as_deref() {
        Some("get_today") => get_today(&state, envelope.params()?).await.map(into_json),
        Some("join") => join(&state, envelope.params()?).await.map(into_json),
        Some("submit_answer") => submit_answer(&state, envelope.params()?).await.map(into_json),
        Some("leaderboard") => leaderboard(&state, envelope.params()?).map(into_json),
        Some("moments") => moments(&state, envelope.params()?).map(into_json),
        Some("get_participant") => get_participant(&state, envelope.params()?).map(into_json),
        _ => Err(invalid_action()),
    }
}

fn into_json<T: Serialize>(value: T) -> Response {
    Json(value).into_response()
}

/// 当天挑战，题目来自同日期的每日测验
async fn get_today(state: &AppState, params: DateParams) -> Result<ChallengeResponse, ApiError> {
    let date = parse_date(params.date.as_deref())?;
    if let Some(challenge) = state.db.get_challenge_by_date(date)? {
        return Ok(ChallengeResponse {
            success: true,
            challenge: challenge.into(),
            created: false,
        });
    }

    let (quiz, _) = get_or_create_quiz(state, date).await?;
    let (challenge, created) = state
        .db
        .insert_challenge_if_absent(&DailyChallenge::for_date(date, quiz.questions))?;
    if created {
        log::info!("Created daily challenge {} for {}", challenge.id, date);
    }

    Ok(ChallengeResponse {
        success: true,
        challenge: challenge.into(),
        created,
    })
}

async fn join(state: &AppState, params: JoinParams) -> Result<ParticipantResponse, ApiError> {
    let user_id = required(&params.user_id, "User ID is required")?.to_string();
    let display_name = params.display_name.filter(|n| !n.trim().is_empty());
    let challenge_id = params.challenge_id;

    let db = state.db.clone();
    let (participant, joined) = run_blocking({
        let (challenge_id, user_id) = (challenge_id.clone(), user_id.clone());
        move || challenge::join_challenge(&db, &challenge_id, &user_id, display_name, Utc::now())
    })
    .await?;
    if joined {
        log::info!("User {} joined challenge {}", user_id, challenge_id);
    }

    Ok(ParticipantResponse {
        success: true,
        participant,
        joined: Some(joined),
    })
}

/// 判分事务在阻塞线程池执行
async fn submit_answer(state: &AppState, params: SubmitParams) -> Result<SubmitResponse, ApiError> {
    let user_id = required(&params.user_id, "User ID is required")?.to_string();
    let submission = AnswerSubmission {
        challenge_id: params.challenge_id,
        user_id,
        question_index: params.question_index,
        selected_answer: params.selected_answer,
        time_taken_ms: params.time_taken_ms,
    };

    let db = state.db.clone();
    let outcome =
        run_blocking(move || challenge::submit_answer(&db, &submission, Utc::now())).await?;
    for moment in &outcome.moments {
        log::info!("Challenge {}: {}", moment.challenge_id, moment.description);
    }

    Ok(SubmitResponse {
        success: true,
        outcome,
    })
}

fn leaderboard(state: &AppState, params: ListParams) -> Result<LeaderboardResponse, ApiError> {
    ensure_challenge(state, &params.challenge_id)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LIMIT);
    let participants = state.db.leaderboard(&params.challenge_id, limit)?;

    Ok(LeaderboardResponse {
        success: true,
        leaderboard: rank_entries(participants),
        challenge_id: params.challenge_id,
    })
}

fn moments(state: &AppState, params: ListParams) -> Result<MomentsResponse, ApiError> {
    ensure_challenge(state, &params.challenge_id)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_MOMENTS_LIMIT)
        .clamp(1, MAX_LIMIT);
    let moments = state.db.list_moments(&params.challenge_id, limit)?;

    Ok(MomentsResponse {
        success: true,
        moments,
        challenge_id: params.challenge_id,
    })
}

fn get_participant(
    state: &AppState,
    params: ParticipantParams,
) -> Result<ParticipantResponse, ApiError> {
    let user_id = required(&params.user_id, "User ID is required")?;
    let participant = state
        .db
        .get_participant(&params.challenge_id, user_id)?
        .ok_or_else(|| ApiError::bad_request("Participant not found"))?;

    Ok(ParticipantResponse {
        success: true,
        participant,
        joined: None,
    })
}

fn ensure_challenge(state: &AppState, challenge_id: &str) -> Result<(), ApiError> {
    match state.db.get_challenge(challenge_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::bad_request("Challenge not found")),
    }
}
