//! HTTP API handlers for Nutrack.
//!
//! # Overview
//!
//! Every handler is thin: validate the request, call into the calorie or
//! streak core and the storage layer, serialize the result. The HTTP layer
//! owns the mapping from data outcomes to status codes:
//!
//! - A reconciliation that comes back `is_valid == false` on a create is a
//!   400 with the reconciler's diagnostics in the body, and the entry is not
//!   stored. The dedicated `POST /calories/validate` endpoint instead
//!   returns 200 and lets the client branch on `is_valid`.
//! - An unparseable `date` field or parameter is a 400.
//! - Unknown users and habits are 404s.
//! - Storage failures are 500s, logged via `tracing::warn!`.
//!
//! Only food and meal entries advance the user's daily logging streak;
//! habit completions advance that habit's own streak.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::aggregation::{GoalProgress, compute_goal_progress};
use crate::calories::{CalorieResult, clamp_non_negative, reconcile};
use crate::dashboard::{DashboardResponse, build_dashboard};
use crate::model::{
    CalorieCheckRequest, CreateGoalRequest, CreateHabitRequest, CreateUserRequest, ExerciseLog,
    ExerciseLogRequest, FoodLog, FoodLogRequest, GoalMetric, HabitCompleteRequest,
    HabitWithStreak, HabitsQuery, MealLog, MealLogRequest, StreakQuery, StreakResponse, User,
    UserDayQuery, UserLogsQuery, WaterListResponse, WaterLog, WaterLogRequest, parse_log_date,
};
use crate::storage::{Storage, StreakOwner};
use crate::streak::{StreakState, is_streak_active};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
}

/// Response body for POST /foods.
#[derive(Debug, Serialize)]
pub struct FoodLogCreated {
    pub entry: FoodLog,
    pub validation: CalorieResult,
    pub streak: StreakState,
}

/// Response body for POST /meals.
#[derive(Debug, Serialize)]
pub struct MealLogCreated {
    pub entry: MealLog,
    pub validation: CalorieResult,
    pub streak: StreakState,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// 404 when the user does not exist, 500 on a lookup failure.
async fn require_user(storage: &Storage, user_id: i64) -> Result<(), StatusCode> {
    match storage.get_user(user_id).await {
        Ok(Some(_)) => Ok(()),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(user_id, error = %e, "Failed to look up user");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// POST /users - Create a user.
#[instrument(skip(state, request))]
pub async fn post_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Response {
    let username = request.username.trim();
    let email = request.email.trim();

    if username.is_empty() || email.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "username and email are required");
    }

    match state.storage.create_user(username, email, Utc::now()).await {
        Ok(user) => {
            info!(user_id = user.id, username = %user.username, "User created");
            (StatusCode::CREATED, Json(user)).into_response()
        }
        Err(e) => {
            warn!(username = %username, error = %e, "Failed to create user");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /users/:id - Fetch a user.
#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<User>, StatusCode> {
    match state.storage.get_user(id).await {
        Ok(Some(user)) => Ok(Json(user)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(user_id = id, error = %e, "Failed to fetch user");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Food logs
// ============================================================================

/// POST /foods - Log a food entry.
///
/// The entry's calories are reconciled before anything is stored. An
/// invalid reconciliation (no data at all, or a mismatch beyond tolerance)
/// rejects the entry with 400 and the reconciler's diagnostics. A stored
/// entry advances the user's daily logging streak.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_food(
    State(state): State<AppState>,
    Json(request): Json<FoodLogRequest>,
) -> Response {
    let now = Utc::now();

    let log_date = match parse_log_date(request.date.as_deref(), now) {
        Ok(date) => date,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    let validation = reconcile(&request.calorie_input());
    if !validation.is_valid {
        info!(
            user_id = request.user_id,
            message = %validation.message,
            "Food entry rejected"
        );
        return (StatusCode::BAD_REQUEST, Json(validation)).into_response();
    }

    let entry = FoodLog {
        user_id: request.user_id,
        name: request.name.clone(),
        meal_type: request.meal_type,
        calories: validation.total_calories,
        carbs_g: validation.breakdown.carbs_g,
        protein_g: validation.breakdown.protein_g,
        fat_g: validation.breakdown.fat_g,
        from_macros: validation.from_macros,
        log_date,
        logged_at: now,
    };

    if let Err(e) = state.storage.insert_food_log(&entry).await {
        warn!(user_id = entry.user_id, error = %e, "Failed to store food entry");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let streak = match state
        .storage
        .record_qualifying_event(StreakOwner::User(entry.user_id), log_date)
        .await
    {
        Ok(streak) => streak,
        Err(e) => {
            warn!(user_id = entry.user_id, error = %e, "Failed to update streak");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(
        user_id = entry.user_id,
        calories = entry.calories,
        current_streak = streak.current_streak,
        "Food entry recorded"
    );

    (
        StatusCode::CREATED,
        Json(FoodLogCreated {
            entry,
            validation,
            streak,
        }),
    )
        .into_response()
}

/// GET /foods - List a user's food entries, optionally for one day.
#[instrument(skip(state))]
pub async fn get_foods(
    State(state): State<AppState>,
    Query(query): Query<UserLogsQuery>,
) -> Result<Json<Vec<FoodLog>>, StatusCode> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(
            parse_log_date(Some(raw), Utc::now()).map_err(|_| StatusCode::BAD_REQUEST)?,
        ),
        None => None,
    };

    match state.storage.list_food_logs(query.user_id, date).await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to list food entries");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Meal logs
// ============================================================================

/// POST /meals - Log a meal.
///
/// Item macros are summed and reconciled against the optional meal-level
/// calorie total; the same validity rules as POST /foods apply, and a
/// stored meal advances the user's daily logging streak.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_meal(
    State(state): State<AppState>,
    Json(request): Json<MealLogRequest>,
) -> Response {
    let now = Utc::now();

    let log_date = match parse_log_date(request.date.as_deref(), now) {
        Ok(date) => date,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    let validation = reconcile(&request.calorie_input());
    if !validation.is_valid {
        info!(
            user_id = request.user_id,
            message = %validation.message,
            "Meal rejected"
        );
        return (StatusCode::BAD_REQUEST, Json(validation)).into_response();
    }

    let entry = MealLog {
        user_id: request.user_id,
        name: request.name.clone(),
        meal_type: request.meal_type,
        items: request.items.clone(),
        calories: validation.total_calories,
        carbs_g: validation.breakdown.carbs_g,
        protein_g: validation.breakdown.protein_g,
        fat_g: validation.breakdown.fat_g,
        from_macros: validation.from_macros,
        log_date,
        logged_at: now,
    };

    if let Err(e) = state.storage.insert_meal_log(&entry).await {
        warn!(user_id = entry.user_id, error = %e, "Failed to store meal");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let streak = match state
        .storage
        .record_qualifying_event(StreakOwner::User(entry.user_id), log_date)
        .await
    {
        Ok(streak) => streak,
        Err(e) => {
            warn!(user_id = entry.user_id, error = %e, "Failed to update streak");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    info!(
        user_id = entry.user_id,
        calories = entry.calories,
        items = entry.items.len(),
        "Meal recorded"
    );

    (
        StatusCode::CREATED,
        Json(MealLogCreated {
            entry,
            validation,
            streak,
        }),
    )
        .into_response()
}

/// GET /meals - List a user's meals, optionally for one day.
#[instrument(skip(state))]
pub async fn get_meals(
    State(state): State<AppState>,
    Query(query): Query<UserLogsQuery>,
) -> Result<Json<Vec<MealLog>>, StatusCode> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(
            parse_log_date(Some(raw), Utc::now()).map_err(|_| StatusCode::BAD_REQUEST)?,
        ),
        None => None,
    };

    match state.storage.list_meal_logs(query.user_id, date).await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to list meals");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Exercise logs
// ============================================================================

/// POST /exercises - Log an exercise session.
///
/// Exercise does not advance the logging streak; only food and meal
/// entries qualify.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_exercise(
    State(state): State<AppState>,
    Json(request): Json<ExerciseLogRequest>,
) -> Response {
    let now = Utc::now();

    let log_date = match parse_log_date(request.date.as_deref(), now) {
        Ok(date) => date,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if !(request.duration_minutes.is_finite() && request.duration_minutes > 0.0) {
        return error_response(StatusCode::BAD_REQUEST, "duration_minutes must be positive");
    }

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    let entry = ExerciseLog {
        user_id: request.user_id,
        name: request.name.clone(),
        duration_minutes: request.duration_minutes,
        calories_burned: clamp_non_negative(request.calories_burned),
        log_date,
        logged_at: now,
    };

    match state.storage.insert_exercise_log(&entry).await {
        Ok(()) => {
            info!(
                user_id = entry.user_id,
                duration_minutes = entry.duration_minutes,
                "Exercise recorded"
            );
            (StatusCode::CREATED, Json(entry)).into_response()
        }
        Err(e) => {
            warn!(user_id = entry.user_id, error = %e, "Failed to store exercise");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /exercises - List a user's exercise sessions, optionally for one day.
#[instrument(skip(state))]
pub async fn get_exercises(
    State(state): State<AppState>,
    Query(query): Query<UserLogsQuery>,
) -> Result<Json<Vec<ExerciseLog>>, StatusCode> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(
            parse_log_date(Some(raw), Utc::now()).map_err(|_| StatusCode::BAD_REQUEST)?,
        ),
        None => None,
    };

    match state.storage.list_exercise_logs(query.user_id, date).await {
        Ok(entries) => Ok(Json(entries)),
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to list exercises");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Water logs
// ============================================================================

/// POST /water - Log a water intake entry.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_water(
    State(state): State<AppState>,
    Json(request): Json<WaterLogRequest>,
) -> Response {
    let now = Utc::now();

    let log_date = match parse_log_date(request.date.as_deref(), now) {
        Ok(date) => date,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    if request.amount_ml <= 0 {
        return error_response(StatusCode::BAD_REQUEST, "amount_ml must be positive");
    }

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    let entry = WaterLog {
        user_id: request.user_id,
        amount_ml: request.amount_ml,
        log_date,
        logged_at: now,
    };

    match state.storage.insert_water_log(&entry).await {
        Ok(()) => {
            info!(user_id = entry.user_id, amount_ml = entry.amount_ml, "Water recorded");
            (StatusCode::CREATED, Json(entry)).into_response()
        }
        Err(e) => {
            warn!(user_id = entry.user_id, error = %e, "Failed to store water entry");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /water - List a user's water entries plus their running total.
#[instrument(skip(state))]
pub async fn get_water(
    State(state): State<AppState>,
    Query(query): Query<UserLogsQuery>,
) -> Result<Json<WaterListResponse>, StatusCode> {
    let date = match query.date.as_deref() {
        Some(raw) => Some(
            parse_log_date(Some(raw), Utc::now()).map_err(|_| StatusCode::BAD_REQUEST)?,
        ),
        None => None,
    };

    match state.storage.list_water_logs(query.user_id, date).await {
        Ok(entries) => {
            let total_ml = entries.iter().map(|e| e.amount_ml).sum();
            Ok(Json(WaterListResponse { entries, total_ml }))
        }
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to list water entries");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Habits
// ============================================================================

/// POST /habits - Create a habit.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_habit(
    State(state): State<AppState>,
    Json(request): Json<CreateHabitRequest>,
) -> Response {
    let name = request.name.trim();
    if name.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "name is required");
    }

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    match state
        .storage
        .create_habit(request.user_id, name, request.description.as_deref(), Utc::now())
        .await
    {
        Ok(habit) => {
            info!(habit_id = habit.id, user_id = habit.user_id, "Habit created");
            (StatusCode::CREATED, Json(habit)).into_response()
        }
        Err(e) => {
            warn!(user_id = request.user_id, error = %e, "Failed to create habit");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /habits - List a user's habits with their streak counters.
#[instrument(skip(state))]
pub async fn get_habits(
    State(state): State<AppState>,
    Query(query): Query<HabitsQuery>,
) -> Result<Json<Vec<HabitWithStreak>>, StatusCode> {
    let today = Utc::now().date_naive();

    let habits = match state.storage.list_habits(query.user_id).await {
        Ok(habits) => habits,
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to list habits");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let mut listed = Vec::with_capacity(habits.len());
    for habit in habits {
        let streak = match state.storage.get_streak(StreakOwner::Habit(habit.id)).await {
            Ok(streak) => streak,
            Err(e) => {
                warn!(habit_id = habit.id, error = %e, "Failed to fetch habit streak");
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        let active = is_streak_active(streak.last_log_date, today);
        listed.push(HabitWithStreak {
            habit,
            streak,
            active,
        });
    }

    Ok(Json(listed))
}

/// POST /habits/:id/complete - Mark a habit done for a day.
///
/// Idempotent per calendar day: completing a habit twice on the same day
/// returns the same streak state.
#[instrument(skip(state, request))]
pub async fn post_habit_complete(
    State(state): State<AppState>,
    Path(habit_id): Path<i64>,
    request: Option<Json<HabitCompleteRequest>>,
) -> Response {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let now = Utc::now();

    let log_date = match parse_log_date(request.date.as_deref(), now) {
        Ok(date) => date,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match state.storage.get_habit(habit_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(habit_id, error = %e, "Failed to look up habit");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match state
        .storage
        .record_qualifying_event(StreakOwner::Habit(habit_id), log_date)
        .await
    {
        Ok(streak) => {
            info!(
                habit_id,
                current_streak = streak.current_streak,
                "Habit completion recorded"
            );
            Json(streak).into_response()
        }
        Err(e) => {
            warn!(habit_id, error = %e, "Failed to update habit streak");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Goals
// ============================================================================

/// POST /goals - Create a daily goal.
#[instrument(skip(state, request), fields(user_id = request.user_id))]
pub async fn post_goal(
    State(state): State<AppState>,
    Json(request): Json<CreateGoalRequest>,
) -> Response {
    let metric = match GoalMetric::parse(&request.metric) {
        Some(metric) => metric,
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "metric must be one of: calories, protein, carbs, fat, water, exercise_minutes",
            );
        }
    };

    if !(request.target_value.is_finite() && request.target_value > 0.0) {
        return error_response(StatusCode::BAD_REQUEST, "target_value must be positive");
    }

    if let Err(status) = require_user(&state.storage, request.user_id).await {
        return status.into_response();
    }

    match state
        .storage
        .create_goal(request.user_id, metric, request.target_value, Utc::now())
        .await
    {
        Ok(goal) => {
            info!(
                goal_id = goal.id,
                user_id = goal.user_id,
                metric = metric.as_str(),
                "Goal created"
            );
            (StatusCode::CREATED, Json(goal)).into_response()
        }
        Err(e) => {
            warn!(user_id = request.user_id, error = %e, "Failed to create goal");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// GET /goals - List a user's goals with progress for a day.
#[instrument(skip(state))]
pub async fn get_goals(
    State(state): State<AppState>,
    Query(query): Query<UserDayQuery>,
) -> Result<Json<Vec<GoalProgress>>, StatusCode> {
    let date = parse_log_date(query.date.as_deref(), Utc::now())
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    match compute_goal_progress(&state.storage, query.user_id, date).await {
        Ok(progress) => Ok(Json(progress)),
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to compute goal progress");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

// ============================================================================
// Streak, calories, dashboard
// ============================================================================

/// GET /streak - The user's daily logging streak and whether it is alive.
#[instrument(skip(state))]
pub async fn get_streak(
    State(state): State<AppState>,
    Query(query): Query<StreakQuery>,
) -> Result<Json<StreakResponse>, StatusCode> {
    require_user(&state.storage, query.user_id).await?;

    match state.storage.get_streak(StreakOwner::User(query.user_id)).await {
        Ok(streak) => {
            let active = is_streak_active(streak.last_log_date, Utc::now().date_naive());
            Ok(Json(StreakResponse {
                user_id: query.user_id,
                streak,
                active,
            }))
        }
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to fetch streak");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// POST /calories/validate - Run the calorie reconciler on a raw payload.
///
/// Always 200: `is_valid == false` is a data outcome for the client to
/// branch on, not an HTTP error.
#[instrument(skip(request))]
pub async fn post_validate_calories(
    Json(request): Json<CalorieCheckRequest>,
) -> Json<CalorieResult> {
    Json(reconcile(&request.calorie_input()))
}

/// GET /dashboard - The composite per-user/per-day dashboard.
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<UserDayQuery>,
) -> Result<Json<DashboardResponse>, StatusCode> {
    let now = Utc::now();
    let date = parse_log_date(query.date.as_deref(), now).map_err(|_| StatusCode::BAD_REQUEST)?;

    require_user(&state.storage, query.user_id).await?;

    match build_dashboard(&state.storage, query.user_id, date, now).await {
        Ok(dashboard) => {
            info!(
                user_id = query.user_id,
                date = %date,
                calories = dashboard.summary.calories_consumed,
                "Dashboard queried"
            );
            Ok(Json(dashboard))
        }
        Err(e) => {
            warn!(user_id = query.user_id, error = %e, "Failed to build dashboard");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Build the application router over the given state.
///
/// Shared between `main` and the integration tests so both exercise the
/// same route table.
pub fn router(state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/users", post(post_user))
        .route("/users/:id", get(get_user))
        .route("/foods", post(post_food).get(get_foods))
        .route("/meals", post(post_meal).get(get_meals))
        .route("/exercises", post(post_exercise).get(get_exercises))
        .route("/water", post(post_water).get(get_water))
        .route("/habits", post(post_habit).get(get_habits))
        .route("/habits/:id/complete", post(post_habit_complete))
        .route("/goals", post(post_goal).get(get_goals))
        .route("/streak", get(get_streak))
        .route("/calories/validate", post(post_validate_calories))
        .route("/dashboard", get(get_dashboard))
        .route("/health", get(health_check))
        .with_state(state)
}
