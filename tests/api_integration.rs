//! Integration tests for Nutrack API endpoints.
//!
//! These tests verify the full request/response cycle through the HTTP API.

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

// Import from the nutrack crate
use nutrack::api::{AppState, router};
use nutrack::storage::Storage;

async fn create_test_server() -> TestServer {
    let storage = Storage::new("sqlite::memory:").await.unwrap();
    let state = AppState { storage };

    TestServer::new(router(state)).unwrap()
}

/// Create a user and return its id.
async fn create_user(server: &TestServer, username: &str) -> i64 {
    let response = server
        .post("/users")
        .json(&json!({
            "username": username,
            "email": format!("{}@example.com", username)
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_user_lifecycle() {
    let server = create_test_server().await;

    let id = create_user(&server, "ada").await;

    let response = server.get(&format!("/users/{}", id)).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["username"], "ada");
    assert_eq!(body["email"], "ada@example.com");

    server
        .get("/users/9999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_user_requires_fields() {
    let server = create_test_server().await;

    let response = server
        .post("/users")
        .json(&json!({"username": "  ", "email": "a@example.com"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_post_food_macros_only() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "chicken bowl",
            "meal_type": "lunch",
            "carbs_g": 50,
            "protein_g": 30,
            "fat_g": 20
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["entry"]["calories"], 500.0);
    assert_eq!(body["entry"]["meal_type"], "lunch");
    assert_eq!(body["validation"]["from_macros"], true);
    assert_eq!(body["validation"]["is_valid"], true);
    assert_eq!(
        body["validation"]["message"],
        "Calories calculated from macronutrients"
    );
    // First qualifying event starts the streak
    assert_eq!(body["streak"]["current_streak"], 1);
}

#[tokio::test]
async fn test_post_food_calories_only() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "espresso",
            "calories": 95
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["entry"]["calories"], 95.0);
    assert_eq!(body["validation"]["from_macros"], false);
    assert_eq!(body["validation"]["message"], "Using provided calorie value");
}

#[tokio::test]
async fn test_post_food_accepts_numeric_strings() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "toast",
            "calories": "250"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["entry"]["calories"], 250.0);
}

#[tokio::test]
async fn test_post_food_no_data_rejected() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "mystery"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["is_valid"], false);
    assert_eq!(
        body["message"],
        "Either calories or macronutrients must be provided"
    );

    // Nothing was stored
    let listed = server
        .get(&format!("/foods?user_id={}", user_id))
        .await;
    listed.assert_status_ok();
    assert!(listed.json::<serde_json::Value>().as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_post_food_mismatch_rejected() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    // Macros derive 500 kcal; 300 is far outside the ±5 tolerance
    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "chicken bowl",
            "calories": 300,
            "carbs_g": 50,
            "protein_g": 30,
            "fat_g": 20
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["is_valid"], false);
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Calorie mismatch")
    );
}

#[tokio::test]
async fn test_post_food_within_tolerance_trusts_caller() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "chicken bowl",
            "calories": 503,
            "carbs_g": 50,
            "protein_g": 30,
            "fat_g": 20
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["entry"]["calories"], 503.0);
    assert_eq!(body["validation"]["from_macros"], false);
}

#[tokio::test]
async fn test_post_food_unknown_user() {
    let server = create_test_server().await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": 42,
            "name": "toast",
            "calories": 100
        }))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_food_invalid_date() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "toast",
            "calories": 100,
            "date": "yesterday"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_streak_progression_across_days() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let log_food = |date: &'static str| {
        let server = &server;
        async move {
            let response = server
                .post("/foods")
                .json(&json!({
                    "user_id": user_id,
                    "name": "meal",
                    "calories": 400,
                    "date": date
                }))
                .await;
            response.assert_status(StatusCode::CREATED);
            response.json::<serde_json::Value>()["streak"].clone()
        }
    };

    // Day one starts the streak
    let streak = log_food("2024-03-01").await;
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["streak_start_date"], "2024-03-01");

    // Next day continues it
    let streak = log_food("2024-03-02").await;
    assert_eq!(streak["current_streak"], 2);
    assert_eq!(streak["longest_streak"], 2);
    assert_eq!(streak["streak_start_date"], "2024-03-01");

    // Second entry on the same day changes nothing
    let streak = log_food("2024-03-02").await;
    assert_eq!(streak["current_streak"], 2);

    // A three-day gap resets the streak but keeps the record
    let streak = log_food("2024-03-05").await;
    assert_eq!(streak["current_streak"], 1);
    assert_eq!(streak["longest_streak"], 2);
    assert_eq!(streak["streak_start_date"], "2024-03-05");

    // GET /streak reflects the persisted state; the last log is in the
    // past, so the streak is not active relative to today
    let response = server.get(&format!("/streak?user_id={}", user_id)).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["longest_streak"], 2);
    assert_eq!(body["last_log_date"], "2024-03-05");
    assert_eq!(body["active"], false);
}

#[tokio::test]
async fn test_streak_active_after_logging_today() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    // No date: defaults to today
    server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "meal",
            "calories": 400
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.get(&format!("/streak?user_id={}", user_id)).await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["current_streak"], 1);
    assert_eq!(body["active"], true);
}

#[tokio::test]
async fn test_post_meal_sums_items() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/meals")
        .json(&json!({
            "user_id": user_id,
            "name": "post-run lunch",
            "meal_type": "lunch",
            "items": [
                {"name": "rice", "carbs_g": 45},
                {"name": "chicken", "protein_g": 30, "fat_g": 5}
            ]
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    // 45*4 + 30*4 + 5*9 = 345 kcal
    let body: serde_json::Value = response.json();
    assert_eq!(body["entry"]["calories"], 345.0);
    assert_eq!(body["entry"]["carbs_g"], 45.0);
    assert_eq!(body["entry"]["items"].as_array().unwrap().len(), 2);
    assert_eq!(body["validation"]["from_macros"], true);
    // Meals qualify for the logging streak too
    assert_eq!(body["streak"]["current_streak"], 1);

    let listed = server.get(&format!("/meals?user_id={}", user_id)).await;
    listed.assert_status_ok();
    let meals: serde_json::Value = listed.json();
    assert_eq!(meals.as_array().unwrap().len(), 1);
    assert_eq!(meals[0]["name"], "post-run lunch");
}

#[tokio::test]
async fn test_water_logging_and_total() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    for amount in [250, 500, 330] {
        server
            .post("/water")
            .json(&json!({
                "user_id": user_id,
                "amount_ml": amount,
                "date": "2024-03-01"
            }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let response = server
        .get(&format!("/water?user_id={}&date=2024-03-01", user_id))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["entries"].as_array().unwrap().len(), 3);
    assert_eq!(body["total_ml"], 1080);

    // Water on another day stays separate
    let other = server
        .get(&format!("/water?user_id={}&date=2024-03-02", user_id))
        .await;
    let other_body: serde_json::Value = other.json();
    assert_eq!(other_body["total_ml"], 0);
}

#[tokio::test]
async fn test_water_rejects_non_positive_amount() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/water")
        .json(&json!({
            "user_id": user_id,
            "amount_ml": 0
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_exercise_logging() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/exercises")
        .json(&json!({
            "user_id": user_id,
            "name": "running",
            "duration_minutes": 30,
            "calories_burned": 320,
            "date": "2024-03-01"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["duration_minutes"], 30.0);
    assert_eq!(body["calories_burned"], 320.0);

    // Negative duration is a caller error, not a degrade-to-zero case
    server
        .post("/exercises")
        .json(&json!({
            "user_id": user_id,
            "name": "nothing",
            "duration_minutes": -5
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_habit_completion_idempotent_per_day() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/habits")
        .json(&json!({
            "user_id": user_id,
            "name": "morning stretch"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let habit_id = response.json::<serde_json::Value>()["id"].as_i64().unwrap();

    let complete = |date: &'static str| {
        let server = &server;
        async move {
            let response = server
                .post(&format!("/habits/{}/complete", habit_id))
                .json(&json!({"date": date}))
                .await;
            response.assert_status_ok();
            response.json::<serde_json::Value>()
        }
    };

    let streak = complete("2024-03-01").await;
    assert_eq!(streak["current_streak"], 1);

    // Same day again: no double-increment
    let streak = complete("2024-03-01").await;
    assert_eq!(streak["current_streak"], 1);

    let streak = complete("2024-03-02").await;
    assert_eq!(streak["current_streak"], 2);

    // The habit listing carries the streak counters
    let listed = server.get(&format!("/habits?user_id={}", user_id)).await;
    listed.assert_status_ok();
    let habits: serde_json::Value = listed.json();
    assert_eq!(habits.as_array().unwrap().len(), 1);
    assert_eq!(habits[0]["name"], "morning stretch");
    assert_eq!(habits[0]["streak"]["current_streak"], 2);

    // Completing an unknown habit is a 404
    server
        .post("/habits/9999/complete")
        .json(&json!({"date": "2024-03-01"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_goal_progress() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    let response = server
        .post("/goals")
        .json(&json!({
            "user_id": user_id,
            "metric": "water",
            "target_value": 2000
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    server
        .post("/water")
        .json(&json!({
            "user_id": user_id,
            "amount_ml": 2200,
            "date": "2024-03-01"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get(&format!("/goals?user_id={}&date=2024-03-01", user_id))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let progress = &body.as_array().unwrap()[0];
    assert_eq!(progress["goal"]["metric"], "water");
    assert_eq!(progress["current_value"], 2200.0);
    assert_eq!(progress["achieved"], true);

    // An unknown metric is rejected up front
    server
        .post("/goals")
        .json(&json!({
            "user_id": user_id,
            "metric": "steps",
            "target_value": 10000
        }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_calorie_validate_endpoint() {
    let server = create_test_server().await;

    // Macros only
    let response = server
        .post("/calories/validate")
        .json(&json!({"carbs_g": 50, "protein_g": 30, "fat_g": 20}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_calories"], 500.0);
    assert_eq!(body["is_valid"], true);
    assert_eq!(body["from_macros"], true);

    // Mismatch is still a 200; is_valid is the signal
    let response = server
        .post("/calories/validate")
        .json(&json!({"calories": 300, "carbs_g": 50, "protein_g": 30, "fat_g": 20}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["is_valid"], false);
    assert!(body["message"].as_str().unwrap().contains("Calorie mismatch"));

    // Garbage macro strings degrade to zero rather than erroring
    let response = server
        .post("/calories/validate")
        .json(&json!({"calories": 250, "carbs_g": "abc"}))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["total_calories"], 250.0);
    assert_eq!(body["is_valid"], true);

    // Nothing at all
    let response = server.post("/calories/validate").json(&json!({})).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["is_valid"], false);
}

#[tokio::test]
async fn test_dashboard_full_workflow() {
    let server = create_test_server().await;
    let user_id = create_user(&server, "ada").await;

    // Log a day: one food entry, water, and a run
    server
        .post("/foods")
        .json(&json!({
            "user_id": user_id,
            "name": "chicken bowl",
            "meal_type": "lunch",
            "carbs_g": 50,
            "protein_g": 30,
            "fat_g": 20,
            "date": "2024-03-01"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post("/water")
        .json(&json!({
            "user_id": user_id,
            "amount_ml": 750,
            "date": "2024-03-01"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post("/exercises")
        .json(&json!({
            "user_id": user_id,
            "name": "running",
            "duration_minutes": 30,
            "calories_burned": 320,
            "date": "2024-03-01"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post("/goals")
        .json(&json!({
            "user_id": user_id,
            "metric": "calories",
            "target_value": 2000
        }))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .post("/habits")
        .json(&json!({
            "user_id": user_id,
            "name": "stretch"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get(&format!("/dashboard?user_id={}&date=2024-03-01", user_id))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["date"], "2024-03-01");
    assert_eq!(body["summary"]["calories_consumed"], 500.0);
    assert_eq!(body["summary"]["calories_burned"], 320.0);
    assert_eq!(body["summary"]["net_calories"], 180.0);
    assert_eq!(body["summary"]["water_ml"], 750);
    assert_eq!(body["summary"]["exercise_minutes"], 30.0);
    assert_eq!(body["summary"]["foods_logged"], 1);
    assert_eq!(body["summary"]["macro_split"]["carbs_pct"], 40.0);
    assert_eq!(body["streak"]["current_streak"], 1);
    assert_eq!(body["habits_tracked"], 1);

    let goals = body["goals"].as_array().unwrap();
    assert_eq!(goals.len(), 1);
    assert_eq!(goals[0]["current_value"], 500.0);
    assert_eq!(goals[0]["percent_of_target"], 25.0);
    assert_eq!(goals[0]["achieved"], false);

    // Dashboard for an unknown user is a 404
    server
        .get("/dashboard?user_id=9999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
