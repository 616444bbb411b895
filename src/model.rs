//! Data models for Nutrack.
//!
//! # Overview
//!
//! This module holds the domain entities (users, logs, habits, goals),
//! the request/response/query types the HTTP layer works with, and the
//! lenient numeric parsing that sits between loosely-typed request bodies
//! and the strictly-typed calorie core.
//!
//! # Numeric leniency
//!
//! Calorie and macronutrient fields in request bodies accept JSON numbers,
//! numeric strings, or nothing at all. Anything that is not a usable number
//! deserializes to `None` and is treated as zero downstream: bad macro
//! input degrades, it never rejects a request. Dates, by contrast, fail
//! hard: an unparseable date is a caller error and maps to 400.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::calories::CalorieInput;
use crate::streak::StreakState;

/// A registered user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Database identifier.
    pub id: i64,

    /// Display name, unique per instance.
    pub username: String,

    /// Contact address. Stored verbatim; no mail is ever sent.
    pub email: String,

    /// When the account was created (UTC).
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /users.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
}

/// Which meal of the day an entry belongs to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
    /// Unspecified or anything else.
    #[default]
    Other,
}

impl MealType {
    /// Parse a meal type from a free-form string, defaulting to `Other`.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "breakfast" => MealType::Breakfast,
            "lunch" => MealType::Lunch,
            "dinner" => MealType::Dinner,
            "snack" => MealType::Snack,
            _ => MealType::Other,
        }
    }

    /// Stable string form used for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
            MealType::Other => "other",
        }
    }
}

/// A single logged food entry.
///
/// The calorie fields hold the *reconciled* values: `calories` is the
/// total the reconciler settled on, and `from_macros` records whether it
/// was derived from grams or taken from the caller-supplied number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodLog {
    /// Owning user.
    pub user_id: i64,

    /// Food name as entered.
    pub name: String,

    /// Meal this entry belongs to.
    pub meal_type: MealType,

    /// Reconciled calorie total (kcal).
    pub calories: f64,

    /// Carbohydrate grams (zero when not supplied).
    pub carbs_g: f64,

    /// Protein grams (zero when not supplied).
    pub protein_g: f64,

    /// Fat grams (zero when not supplied).
    pub fat_g: f64,

    /// Whether `calories` was derived from the macro grams.
    pub from_macros: bool,

    /// Calendar day this entry counts toward (UTC).
    pub log_date: NaiveDate,

    /// Server-side timestamp when the entry was recorded (UTC).
    pub logged_at: DateTime<Utc>,
}

/// Request body for POST /foods.
#[derive(Debug, Clone, Deserialize)]
pub struct FoodLogRequest {
    pub user_id: i64,

    pub name: String,

    /// Meal slot; defaults to `other`.
    #[serde(default)]
    pub meal_type: MealType,

    /// Caller-supplied calorie total.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_g: Option<f64>,

    /// Day to record the entry under (YYYY-MM-DD). Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

impl FoodLogRequest {
    /// The raw numbers the reconciler cares about.
    pub fn calorie_input(&self) -> CalorieInput {
        CalorieInput {
            calories: self.calories,
            carbs_g: self.carbs_g,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
        }
    }
}

/// One component food within a meal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealItem {
    pub name: String,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_g: Option<f64>,
}

/// A logged meal: a named group of food items with reconciled totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealLog {
    pub user_id: i64,

    /// Meal name as entered (e.g. "post-run lunch").
    pub name: String,

    pub meal_type: MealType,

    /// Component items as entered.
    pub items: Vec<MealItem>,

    /// Reconciled calorie total for the whole meal (kcal).
    pub calories: f64,

    /// Summed carbohydrate grams across items.
    pub carbs_g: f64,

    /// Summed protein grams across items.
    pub protein_g: f64,

    /// Summed fat grams across items.
    pub fat_g: f64,

    /// Whether `calories` was derived from the summed macro grams.
    pub from_macros: bool,

    pub log_date: NaiveDate,

    pub logged_at: DateTime<Utc>,
}

/// Request body for POST /meals.
#[derive(Debug, Clone, Deserialize)]
pub struct MealLogRequest {
    pub user_id: i64,

    pub name: String,

    #[serde(default)]
    pub meal_type: MealType,

    /// Component items. May be empty when only a calorie total is known.
    #[serde(default)]
    pub items: Vec<MealItem>,

    /// Caller-supplied total for the whole meal.
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: Option<f64>,

    #[serde(default)]
    pub date: Option<String>,
}

impl MealLogRequest {
    /// Sum the item macros into one reconciler input.
    ///
    /// Per-item garbage degrades to zero exactly like top-level fields,
    /// so a meal with one bad item still reconciles on the rest.
    pub fn calorie_input(&self) -> CalorieInput {
        use crate::calories::clamp_non_negative;

        let mut carbs = 0.0;
        let mut protein = 0.0;
        let mut fat = 0.0;

        for item in &self.items {
            carbs += clamp_non_negative(item.carbs_g);
            protein += clamp_non_negative(item.protein_g);
            fat += clamp_non_negative(item.fat_g);
        }

        CalorieInput {
            calories: self.calories,
            carbs_g: Some(carbs),
            protein_g: Some(protein),
            fat_g: Some(fat),
        }
    }
}

/// A logged exercise session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseLog {
    pub user_id: i64,

    /// Activity name as entered (e.g. "running").
    pub name: String,

    /// Session length in minutes.
    pub duration_minutes: f64,

    /// Estimated energy burned (kcal, zero when not supplied).
    pub calories_burned: f64,

    pub log_date: NaiveDate,

    pub logged_at: DateTime<Utc>,
}

/// Request body for POST /exercises.
#[derive(Debug, Clone, Deserialize)]
pub struct ExerciseLogRequest {
    pub user_id: i64,

    pub name: String,

    pub duration_minutes: f64,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories_burned: Option<f64>,

    #[serde(default)]
    pub date: Option<String>,
}

/// A logged water intake entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLog {
    pub user_id: i64,

    /// Amount in milliliters.
    pub amount_ml: i64,

    pub log_date: NaiveDate,

    pub logged_at: DateTime<Utc>,
}

/// Request body for POST /water.
#[derive(Debug, Clone, Deserialize)]
pub struct WaterLogRequest {
    pub user_id: i64,

    pub amount_ml: i64,

    #[serde(default)]
    pub date: Option<String>,
}

/// Response for GET /water: the day's entries plus their running total.
#[derive(Debug, Clone, Serialize)]
pub struct WaterListResponse {
    pub entries: Vec<WaterLog>,

    /// Sum of `amount_ml` across `entries`.
    pub total_ml: i64,
}

/// A daily habit being tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Habit {
    pub id: i64,

    pub user_id: i64,

    /// Habit name (e.g. "morning stretch").
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Request body for POST /habits.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateHabitRequest {
    pub user_id: i64,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,
}

/// Request body for POST /habits/:id/complete.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitCompleteRequest {
    /// Day the habit was done (YYYY-MM-DD). Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

/// A habit joined with its streak counters, as listed by GET /habits.
#[derive(Debug, Clone, Serialize)]
pub struct HabitWithStreak {
    #[serde(flatten)]
    pub habit: Habit,

    pub streak: StreakState,

    /// Whether the habit was completed today or yesterday.
    pub active: bool,
}

/// The daily metric a goal targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalMetric {
    /// Calories consumed (kcal).
    Calories,
    /// Protein consumed (g).
    Protein,
    /// Carbohydrate consumed (g).
    Carbs,
    /// Fat consumed (g).
    Fat,
    /// Water intake (ml).
    Water,
    /// Exercise duration (minutes).
    ExerciseMinutes,
}

impl GoalMetric {
    /// Parse from the wire/database form. Unknown strings are `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calories" => Some(GoalMetric::Calories),
            "protein" => Some(GoalMetric::Protein),
            "carbs" => Some(GoalMetric::Carbs),
            "fat" => Some(GoalMetric::Fat),
            "water" => Some(GoalMetric::Water),
            "exercise_minutes" => Some(GoalMetric::ExerciseMinutes),
            _ => None,
        }
    }

    /// Stable string form used for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalMetric::Calories => "calories",
            GoalMetric::Protein => "protein",
            GoalMetric::Carbs => "carbs",
            GoalMetric::Fat => "fat",
            GoalMetric::Water => "water",
            GoalMetric::ExerciseMinutes => "exercise_minutes",
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            GoalMetric::Calories => "Calories",
            GoalMetric::Protein => "Protein",
            GoalMetric::Carbs => "Carbohydrates",
            GoalMetric::Fat => "Fat",
            GoalMetric::Water => "Water",
            GoalMetric::ExerciseMinutes => "Exercise minutes",
        }
    }
}

/// A per-user daily target over one metric.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,

    pub user_id: i64,

    pub metric: GoalMetric,

    /// Daily target in the metric's unit.
    pub target_value: f64,

    pub created_at: DateTime<Utc>,
}

/// Request body for POST /goals.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateGoalRequest {
    pub user_id: i64,

    /// Metric name: calories, protein, carbs, fat, water, exercise_minutes.
    pub metric: String,

    pub target_value: f64,
}

/// Response for GET /streak.
#[derive(Debug, Clone, Serialize)]
pub struct StreakResponse {
    pub user_id: i64,

    #[serde(flatten)]
    pub streak: StreakState,

    /// Whether the user logged today or yesterday.
    pub active: bool,
}

/// Query parameters for per-user log listings (GET /foods, /meals, ...).
#[derive(Debug, Deserialize)]
pub struct UserLogsQuery {
    pub user_id: i64,

    /// Restrict to one day (YYYY-MM-DD). All days when absent.
    #[serde(default)]
    pub date: Option<String>,
}

/// Query parameters for GET /streak.
#[derive(Debug, Deserialize)]
pub struct StreakQuery {
    pub user_id: i64,
}

/// Query parameters for GET /habits.
#[derive(Debug, Deserialize)]
pub struct HabitsQuery {
    pub user_id: i64,
}

/// Query parameters for GET /goals and GET /dashboard.
#[derive(Debug, Deserialize)]
pub struct UserDayQuery {
    pub user_id: i64,

    /// Day to evaluate against (YYYY-MM-DD). Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

/// Request body for POST /calories/validate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CalorieCheckRequest {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub calories: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub carbs_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub protein_g: Option<f64>,

    #[serde(default, deserialize_with = "lenient_f64")]
    pub fat_g: Option<f64>,
}

impl CalorieCheckRequest {
    pub fn calorie_input(&self) -> CalorieInput {
        CalorieInput {
            calories: self.calories,
            carbs_g: self.carbs_g,
            protein_g: self.protein_g,
            fat_g: self.fat_g,
        }
    }
}

/// A date string that could not be parsed where a calendar day was required.
#[derive(Debug, Error)]
#[error("invalid date '{0}': expected YYYY-MM-DD")]
pub struct InvalidDate(pub String);

/// Resolve an optional request-supplied day, defaulting to today (UTC).
///
/// This is the one place a "not a date" input can surface; unlike macro
/// fields it is a hard error the HTTP layer turns into 400.
pub fn parse_log_date(raw: Option<&str>, now: DateTime<Utc>) -> Result<NaiveDate, InvalidDate> {
    match raw {
        Some(s) => s
            .trim()
            .parse::<NaiveDate>()
            .map_err(|_| InvalidDate(s.to_string())),
        None => Ok(now.date_naive()),
    }
}

/// Deserialize a JSON number, numeric string, or null into `Option<f64>`.
///
/// Anything else (including non-numeric strings) becomes `None` rather
/// than a deserialization error, preserving the degrade-to-zero contract
/// for macro and calorie fields.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;

    Ok(value.and_then(|v| match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }))
}
