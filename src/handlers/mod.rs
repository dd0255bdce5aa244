//! HTTP 请求处理
//!
//! 每个函数对应一个 POST 路由，多操作的路由按 `action` 分发。

mod daily_challenge;
mod daily_quiz;
mod dispatch;
mod missions;
mod ocr;
mod pdf;
mod youtube;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::{Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

use crate::services::text::{normalize_extracted_text, strip_code_fence};
use crate::services::{
    ChallengeError, ChatMessage, DatabaseService, InferenceRequest, LlmProvider, Providers,
    QuizPrompt,
};

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseService>,
    pub providers: Providers,
}

/// 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: String,
}

/// 处理错误：输入问题返回 400，下游失败返回 500
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Downstream(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Downstream(message) => {
                log::error!("Request failed: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Downstream(format!("{:#}", err))
    }
}

impl From<ChallengeError> for ApiError {
    fn from(err: ChallengeError) -> Self {
        match err {
            ChallengeError::Invalid(message) => ApiError::BadRequest(message),
            ChallengeError::Storage(err) => err.into(),
        }
    }
}

/// 在阻塞线程池里执行同步的数据库操作
pub(crate) async fn run_blocking<T, E, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Downstream(format!("Database task aborted: {}", e)))?
        .map_err(Into::into)
}

/// 构建路由，所有接口挂在 `/api/v1` 下
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    let api_v1 = Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr::extract_text))
        .route("/pdf", post(pdf::extract_text))
        .route("/youtube", post(youtube::fetch_video))
        .route("/missions", post(missions::dispatch))
        .route("/daily-quiz", post(daily_quiz::dispatch))
        .route("/daily-challenge", post(daily_challenge::dispatch))
        .with_state(state);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(middleware::from_fn(log_requests))
        .layer(cors)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    log::info!(
        "{} {} -> {} ({}ms)",
        method,
        path,
        response.status().as_u16(),
        start.elapsed().as_millis()
    );
    response
}

/// 用第二个模型整理提取的文本
///
/// 未配置或调用失败时返回原文，失败只记日志。
pub(crate) async fn cleanup_pass(
    state: &AppState,
    provider: LlmProvider,
    raw: &str,
    source: &str,
    steps: &mut Vec<String>,
) -> String {
    let fallback = normalize_extracted_text(raw);
    if !state.providers.llm.is_configured(provider) {
        steps.push(format!("Skipped {} cleanup (not configured)", provider.name()));
        return fallback;
    }

    let request = InferenceRequest::new(vec![
        QuizPrompt::system(),
        ChatMessage::user(QuizPrompt::clean_text(raw, source)),
    ])
    .temperature(0.2)
    .max_tokens(4096);

    match state.providers.llm.complete(provider, request).await {
        Ok(response) => {
            let cleaned = normalize_extracted_text(&strip_code_fence(&response.text));
            if cleaned.is_empty() {
                steps.push(format!("{} cleanup returned nothing, kept raw text", provider.name()));
                return fallback;
            }
            steps.push(format!("Cleaned text with {}", provider.name()));
            cleaned
        }
        Err(e) => {
            log::warn!("{} cleanup failed, using raw text: {:#}", provider.name(), e);
            steps.push(format!("{} cleanup failed, kept raw text", provider.name()));
            fallback
        }
    }
}
