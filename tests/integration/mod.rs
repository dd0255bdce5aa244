//! HTTP 集成测试：真实路由 + 内存数据库 + 本地模拟的第三方服务

mod challenge_test;
mod missions_test;
mod quiz_test;
mod router_test;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::util::ServiceExt; // for `oneshot`

use quiz_functions::config::{ProviderConfig, DEFAULT_MAX_BODY_BYTES};
use quiz_functions::handlers::{build_router, AppState};
use quiz_functions::services::{DatabaseService, Providers};

/// 本地模拟的第三方服务，对任何路径返回同一个响应
pub struct MockProvider {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    body: Arc<Value>,
    hits: Arc<AtomicUsize>,
}

async fn respond(State(mock): State<MockState>) -> (StatusCode, Json<Value>) {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    (mock.status, Json((*mock.body).clone()))
}

pub async fn spawn_mock(status: StatusCode, body: Value) -> MockProvider {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().fallback(respond).with_state(MockState {
        status,
        body: Arc::new(body),
        hits: hits.clone(),
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockProvider {
        base_url: format!("http://{}", addr),
        hits,
    }
}

/// 没有任何密钥的配置，基址指向不可达端口
pub fn offline_config() -> ProviderConfig {
    ProviderConfig {
        openai_base_url: "http://127.0.0.1:9".to_string(),
        anthropic_base_url: "http://127.0.0.1:9".to_string(),
        vision_base_url: "http://127.0.0.1:9".to_string(),
        youtube_base_url: "http://127.0.0.1:9".to_string(),
        timeout_secs: 5,
        ..Default::default()
    }
}

pub fn with_openai(mut config: ProviderConfig, mock: &MockProvider) -> ProviderConfig {
    config.openai_api_key = Some("sk-test".to_string());
    config.openai_base_url = mock.base_url.clone();
    config
}

pub fn with_claude(mut config: ProviderConfig, mock: &MockProvider) -> ProviderConfig {
    config.anthropic_api_key = Some("sk-ant-test".to_string());
    config.anthropic_base_url = mock.base_url.clone();
    config
}

pub fn test_app(config: ProviderConfig) -> (Router, Arc<DatabaseService>) {
    let db = Arc::new(DatabaseService::open_in_memory().unwrap());
    let state = AppState {
        db: db.clone(),
        providers: Providers::new(config).unwrap(),
    };
    (build_router(state, DEFAULT_MAX_BODY_BYTES), db)
}

pub async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// OpenAI chat completions 格式的回复
pub fn openai_reply(content: &str) -> Value {
    json!({
        "id": "chatcmpl-test",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

/// Claude messages 格式的回复
pub fn claude_reply(content: &str) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "content": [{"type": "text", "text": content}]
    })
}

/// 三道题的测验，正确答案依次为 4、Paris、H2O
pub fn quiz_questions_json() -> String {
    json!({
        "questions": [
            {"question": "2 + 2 = ?", "options": ["3", "4", "5", "6"], "correct_answer": "4",
             "explanation": "Basic addition.", "subject": "Math", "difficulty": "easy"},
            {"question": "Capital of France?", "options": ["Paris", "Rome", "Berlin", "Madrid"],
             "correct_answer": "Paris", "subject": "Geography", "difficulty": "medium"},
            {"question": "Chemical formula of water?", "options": ["CO2", "H2O", "O2", "NaCl"],
             "correct_answer": "H2O", "subject": "Science", "difficulty": "hard"}
        ]
    })
    .to_string()
}
