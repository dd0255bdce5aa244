use axum::{http::StatusCode, Router};
use serde_json::{json, Value};

use crate::{
    claude_reply, offline_config, openai_reply, post_json, spawn_mock, test_app, with_claude,
    with_openai,
};

fn mission_content_json() -> String {
    json!({
        "summary": "Cells are the basic unit of life.",
        "keyPoints": ["All living things are made of cells", "Cells come from other cells"],
        "questions": [
            {"question": "What is the basic unit of life?", "options": ["Atom", "Cell", "Organ", "Tissue"],
             "correct_answer": "Cell", "difficulty": "easy", "subject": "Biology"}
        ],
        "flashcards": [{"front": "Cell", "back": "Basic unit of life"}]
    })
    .to_string()
}

async fn create_mission(app: &Router) -> String {
    let (status, body) = post_json(
        app,
        "/api/v1/missions",
        json!({
            "action": "create",
            "title": "Cell biology",
            "sourceText": "All living things are made of cells.",
            "contentType": "text",
            "userId": "user-1"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"]["status"], "pending");
    body["mission"]["id"].as_str().unwrap().to_string()
}

async fn generate(app: &Router, id: &str) -> (StatusCode, Value) {
    post_json(app, "/api/v1/missions", json!({"action": "generate", "missionId": id})).await
}

#[tokio::test]
async fn test_create_validates_input() {
    let (app, _) = test_app(offline_config());

    let (status, body) = post_json(&app, "/api/v1/missions", json!({"action": "create", "title": "x"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Source text is required");

    let (status, body) = post_json(
        &app,
        "/api/v1/missions",
        json!({"action": "create", "title": "x", "sourceText": "y", "contentType": "video"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("video"));
}

#[tokio::test]
async fn test_generate_with_claude_completes_once() {
    let claude = spawn_mock(StatusCode::OK, claude_reply(&mission_content_json())).await;
    let (app, _) = test_app(with_claude(offline_config(), &claude));
    let id = create_mission(&app).await;

    let (status, body) = generate(&app, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["alreadyGenerated"], false);
    assert_eq!(body["provider"], "Claude");
    assert_eq!(body["mission"]["status"], "completed");
    assert_eq!(
        body["mission"]["generated_content"]["summary"],
        "Cells are the basic unit of life."
    );
    assert_eq!(
        body["mission"]["generated_content"]["questions"][0]["points"],
        10
    );

    let (status, again) = generate(&app, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["alreadyGenerated"], true);
    assert_eq!(again["mission"]["generated_content"], body["mission"]["generated_content"]);
    assert_eq!(claude.hits(), 1);
}

#[tokio::test]
async fn test_generate_falls_back_to_openai() {
    let openai = spawn_mock(StatusCode::OK, openai_reply(&mission_content_json())).await;
    let (app, _) = test_app(with_openai(offline_config(), &openai));
    let id = create_mission(&app).await;

    let (status, body) = generate(&app, &id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provider"], "OpenAI");
    assert_eq!(openai.hits(), 1);
}

#[tokio::test]
async fn test_generate_failure_leaves_mission_pending() {
    let claude = spawn_mock(
        StatusCode::SERVICE_UNAVAILABLE,
        json!({"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}),
    )
    .await;
    let (app, _) = test_app(with_claude(offline_config(), &claude));
    let id = create_mission(&app).await;

    let (status, body) = generate(&app, &id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("Overloaded"));

    let (status, body) = post_json(&app, "/api/v1/missions", json!({"action": "get", "missionId": id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"]["status"], "pending");
    assert!(body["mission"]["generated_content"].is_null());
}

#[tokio::test]
async fn test_generate_without_provider_is_server_error() {
    let (app, _) = test_app(offline_config());
    let id = create_mission(&app).await;

    let (status, body) = generate(&app, &id).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "No AI provider is configured");
}

#[tokio::test]
async fn test_get_and_list() {
    let (app, _) = test_app(offline_config());
    let id = create_mission(&app).await;
    create_mission(&app).await;

    let (status, body) = post_json(&app, "/api/v1/missions", json!({"action": "get", "missionId": "nope"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Mission not found");

    let (status, body) = post_json(&app, "/api/v1/missions", json!({"action": "get", "missionId": id})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mission"]["title"], "Cell biology");

    let (status, body) = post_json(
        &app,
        "/api/v1/missions",
        json!({"action": "list", "userId": "user-1", "limit": 1}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["missions"].as_array().unwrap().len(), 1);

    let (_, body) = post_json(&app, "/api/v1/missions", json!({"action": "list", "userId": "user-2"})).await;
    assert!(body["missions"].as_array().unwrap().is_empty());
}
