use axum::{http::StatusCode, Router};
use serde_json::{json, Value};

use crate::{
    offline_config, openai_reply, post_json, quiz_questions_json, spawn_mock, test_app, with_openai,
};

const ANSWERS: [&str; 3] = ["4", "Paris", "H2O"];

/// 创建今天的挑战，返回路由与挑战 ID
async fn today_challenge() -> (Router, String) {
    let openai = spawn_mock(StatusCode::OK, openai_reply(&quiz_questions_json())).await;
    let (app, _) = test_app(with_openai(offline_config(), &openai));

    let (status, body) = post_json(&app, "/api/v1/daily-challenge", json!({"action": "get_today"})).await;
    assert_eq!(status, StatusCode::OK);
    let id = body["challenge"]["id"].as_str().unwrap().to_string();
    (app, id)
}

async fn challenge_call(app: &Router, body: Value) -> (StatusCode, Value) {
    post_json(app, "/api/v1/daily-challenge", body).await
}

async fn join(app: &Router, challenge_id: &str, user_id: &str) {
    let (status, _) = challenge_call(
        app,
        json!({"action": "join", "challenge_id": challenge_id, "user_id": user_id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

async fn answer(app: &Router, challenge_id: &str, user_id: &str, index: usize, selected: &str) -> (StatusCode, Value) {
    challenge_call(
        app,
        json!({
            "action": "submit_answer",
            "challenge_id": challenge_id,
            "user_id": user_id,
            "question_index": index,
            "selected_answer": selected,
            "time_taken_ms": 2500
        }),
    )
    .await
}

#[tokio::test]
async fn test_get_today_hides_answers_and_reuses_challenge() {
    let openai = spawn_mock(StatusCode::OK, openai_reply(&quiz_questions_json())).await;
    let (app, _) = test_app(with_openai(offline_config(), &openai));

    let (status, first) = challenge_call(&app, json!({"action": "get_today"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["created"], true);

    let challenge = &first["challenge"];
    assert_eq!(challenge["question_count"], 3);
    for question in challenge["questions"].as_array().unwrap() {
        assert!(question.get("correct_answer").is_none());
        assert!(question.get("options").is_some());
    }
    let starts = challenge["starts_at"].as_str().unwrap();
    assert!(starts.ends_with("T00:00:00Z"));

    let (_, second) = challenge_call(&app, json!({"action": "get_today"})).await;
    assert_eq!(second["created"], false);
    assert_eq!(second["challenge"]["id"], challenge["id"]);

    // 题目来自同一天的每日测验，只生成一次
    let (_, quiz) = post_json(&app, "/api/v1/daily-quiz", json!({"action": "get"})).await;
    assert_eq!(quiz["quiz"]["questions"][0]["question"], "2 + 2 = ?");
    assert_eq!(openai.hits(), 1);
}

#[tokio::test]
async fn test_join_is_idempotent() {
    let (app, id) = today_challenge().await;

    let request = json!({"action": "join", "challenge_id": id, "user_id": "alice", "display_name": "Alice"});
    let (status, first) = challenge_call(&app, request.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["joined"], true);
    assert_eq!(first["participant"]["display_name"], "Alice");

    let (status, second) = challenge_call(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["joined"], false);
    assert_eq!(second["participant"]["id"], first["participant"]["id"]);
}

#[tokio::test]
async fn test_join_unknown_challenge() {
    let (app, _) = test_app(offline_config());
    let (status, body) = challenge_call(
        &app,
        json!({"action": "join", "challenge_id": "missing", "user_id": "alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Challenge not found");
}

#[tokio::test]
async fn test_correct_answer_scores_ten() {
    let (app, id) = today_challenge().await;
    join(&app, &id, "alice").await;

    let (status, body) = answer(&app, &id, "alice", 0, " 4 ").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_correct"], true);
    assert_eq!(body["points_awarded"], 10);
    assert_eq!(body["correct_answer"], "4");
    assert_eq!(body["explanation"], "Basic addition.");
    assert_eq!(body["participant"]["score"], 10);
    assert_eq!(body["participant"]["correct_answers"], 1);
    assert_eq!(body["participant"]["questions_answered"], 1);

    let (status, wrong) = answer(&app, &id, "alice", 1, "Rome").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wrong["is_correct"], false);
    assert_eq!(wrong["participant"]["score"], 10);
    assert_eq!(wrong["participant"]["current_streak"], 0);
    assert_eq!(wrong["participant"]["questions_answered"], 2);
}

#[tokio::test]
async fn test_submit_rejections() {
    let (app, id) = today_challenge().await;

    let (status, body) = answer(&app, &id, "ghost", 0, "4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Participant not found");

    join(&app, &id, "alice").await;
    let (status, body) = answer(&app, &id, "alice", 3, "4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid question index");

    answer(&app, &id, "alice", 0, "4").await;
    let (status, body) = answer(&app, &id, "alice", 0, "4").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Question already answered");

    let (status, body) = challenge_call(
        &app,
        json!({"action": "submit_answer", "challenge_id": id, "user_id": "alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid parameters"));
}

#[tokio::test]
async fn test_full_round_leaderboard_and_moments() {
    let (app, id) = today_challenge().await;
    join(&app, &id, "alice").await;
    join(&app, &id, "bob").await;

    // bob 只答对一题，alice 全对
    answer(&app, &id, "bob", 0, "4").await;
    answer(&app, &id, "bob", 1, "Rome").await;
    for (index, selected) in ANSWERS.iter().enumerate() {
        let (status, _) = answer(&app, &id, "alice", index, selected).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, board) = challenge_call(
        &app,
        json!({"action": "leaderboard", "challenge_id": id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entries = board["leaderboard"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["user_id"], "alice");
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["score"], 30);
    assert_eq!(entries[0]["completed"], true);
    assert_eq!(entries[1]["user_id"], "bob");
    assert_eq!(entries[1]["completed"], false);

    let (status, moments) = challenge_call(
        &app,
        json!({"action": "moments", "challenge_id": id}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<&str> = moments["moments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"streak"));
    assert!(kinds.contains(&"perfect_round"));
    assert!(kinds.contains(&"took_lead"));
    // 最新的在前
    assert_eq!(kinds[0], "perfect_round");

    let (status, participant) = challenge_call(
        &app,
        json!({"action": "get_participant", "challenge_id": id, "user_id": "alice"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(participant["participant"]["answers"].as_array().unwrap().len(), 3);
    assert!(participant["participant"]["completed_at"].is_string());
}

#[tokio::test]
async fn test_get_unknown_participant() {
    let (app, id) = today_challenge().await;
    let (status, body) = challenge_call(
        &app,
        json!({"action": "get_participant", "challenge_id": id, "user_id": "nobody"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Participant not found");
}
