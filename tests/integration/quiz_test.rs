use axum::http::StatusCode;
use chrono::NaiveDate;
use serde_json::json;

use crate::{
    offline_config, openai_reply, post_json, quiz_questions_json, spawn_mock, test_app, with_openai,
};

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let openai = spawn_mock(StatusCode::OK, openai_reply(&quiz_questions_json())).await;
    let (app, _) = test_app(with_openai(offline_config(), &openai));
    let request = json!({"action": "get_or_create", "date": "2026-10-19"});

    let (status, first) = post_json(&app, "/api/v1/daily-quiz", request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);
    assert_eq!(first["quiz"]["quiz_date"], "2026-10-19");
    assert_eq!(first["quiz"]["questions"].as_array().unwrap().len(), 3);
    // easy 10 + medium 20 + hard 30
    assert_eq!(first["quiz"]["total_points"], 60);
    assert_eq!(first["quiz"]["subject_counts"]["Math"], 1);

    let (status, second) = post_json(&app, "/api/v1/daily-quiz", request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(second["quiz"]["id"], first["quiz"]["id"]);
    assert_eq!(openai.hits(), 1);
}

#[tokio::test]
async fn test_provider_failure_stores_nothing() {
    let openai = spawn_mock(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": {"message": "The server had an error"}}),
    )
    .await;
    let (app, db) = test_app(with_openai(offline_config(), &openai));

    let (status, body) = post_json(
        &app,
        "/api/v1/daily-quiz",
        json!({"action": "get_or_create", "date": "2026-10-19"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("The server had an error"));

    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert!(db.get_daily_quiz(date).unwrap().is_none());

    let (status, _) = post_json(
        &app,
        "/api/v1/daily-quiz",
        json!({"action": "get", "date": "2026-10-19"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unusable_ai_reply_stores_nothing() {
    let openai = spawn_mock(StatusCode::OK, openai_reply("Sorry, I cannot help with that.")).await;
    let (app, db) = test_app(with_openai(offline_config(), &openai));

    let (status, _) = post_json(
        &app,
        "/api/v1/daily-quiz",
        json!({"action": "get_or_create", "date": "2026-10-19"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
    assert!(db.get_daily_quiz(date).unwrap().is_none());
}

#[tokio::test]
async fn test_get_and_expire() {
    let openai = spawn_mock(StatusCode::OK, openai_reply(&quiz_questions_json())).await;
    let (app, _) = test_app(with_openai(offline_config(), &openai));

    for date in ["2026-10-17", "2026-10-18", "2026-10-19"] {
        let (status, _) = post_json(
            &app,
            "/api/v1/daily-quiz",
            json!({"action": "get_or_create", "date": date}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = post_json(
        &app,
        "/api/v1/daily-quiz",
        json!({"action": "expire", "before": "2026-10-19"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiredCount"], 2);

    let (_, old) = post_json(&app, "/api/v1/daily-quiz", json!({"action": "get", "date": "2026-10-17"})).await;
    assert_eq!(old["quiz"]["is_expired"], true);
    let (_, current) =
        post_json(&app, "/api/v1/daily-quiz", json!({"action": "get", "date": "2026-10-19"})).await;
    assert_eq!(current["quiz"]["is_expired"], false);
}

#[tokio::test]
async fn test_invalid_date_is_bad_request() {
    let (app, _) = test_app(offline_config());
    let (status, body) = post_json(
        &app,
        "/api/v1/daily-quiz",
        json!({"action": "get", "date": "19/10/2026"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("YYYY-MM-DD"));
}
