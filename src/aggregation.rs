//! Aggregation logic for daily summaries and goal progress.
//!
//! # Overview
//!
//! Everything a dashboard or goal listing shows is computed here from the
//! day's stored logs: calorie and macro totals, the percentage split of
//! calories across macronutrients, water and exercise totals, and how far
//! along each goal is. The math is deliberately plain (sums, one division
//! guarded against a zero denominator) so each number is traceable back
//! to the entries it came from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::calories::{calories_from_carbs, calories_from_fat, calories_from_protein};
use crate::model::{Goal, GoalMetric};
use crate::storage::Storage;

/// Percentage of consumed calories contributed by each macronutrient.
///
/// Percentages are computed on the kcal each macro contributes (fat grams
/// weigh 9 kcal against 4 for carbs and protein), so they sum to ~100
/// whenever any macro is present. With no macros at all, every field is
/// zero, never NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroSplit {
    pub carbs_pct: f64,
    pub protein_pct: f64,
    pub fat_pct: f64,
}

impl MacroSplit {
    /// Compute the kcal-share split from macro grams.
    pub fn from_grams(carbs_g: f64, protein_g: f64, fat_g: f64) -> Self {
        let carbs_kcal = calories_from_carbs(Some(carbs_g));
        let protein_kcal = calories_from_protein(Some(protein_g));
        let fat_kcal = calories_from_fat(Some(fat_g));

        let total = carbs_kcal + protein_kcal + fat_kcal;
        if total <= 0.0 {
            return MacroSplit {
                carbs_pct: 0.0,
                protein_pct: 0.0,
                fat_pct: 0.0,
            };
        }

        MacroSplit {
            carbs_pct: carbs_kcal / total * 100.0,
            protein_pct: protein_kcal / total * 100.0,
            fat_pct: fat_kcal / total * 100.0,
        }
    }
}

/// Everything logged by one user on one calendar day, summed.
#[derive(Debug, Clone, Serialize)]
pub struct DailySummary {
    pub user_id: i64,

    /// The day being summarized (UTC).
    pub date: NaiveDate,

    /// Calories consumed across food and meal entries (kcal).
    pub calories_consumed: f64,

    /// Calories burned across exercise sessions (kcal).
    pub calories_burned: f64,

    /// Consumed minus burned (kcal). Can be negative.
    pub net_calories: f64,

    pub carbs_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,

    /// Kcal-share percentage split of the day's macros.
    pub macro_split: MacroSplit,

    /// Total water intake (ml).
    pub water_ml: i64,

    /// Total exercise duration (minutes).
    pub exercise_minutes: f64,

    /// Number of individual food entries.
    pub foods_logged: i64,

    /// Number of meal entries.
    pub meals_logged: i64,
}

/// One goal with how the user is tracking against it on a given day.
#[derive(Debug, Clone, Serialize)]
pub struct GoalProgress {
    pub goal: Goal,

    /// The day's value of the goal's metric.
    pub current_value: f64,

    /// `current_value` as a percentage of the target. Uncapped; 0 when
    /// the target is not positive.
    pub percent_of_target: f64,

    /// Whether the day's value has reached the target.
    pub achieved: bool,
}

/// Compute the full daily summary for one user-day.
pub async fn compute_daily_summary(
    storage: &Storage,
    user_id: i64,
    date: NaiveDate,
) -> anyhow::Result<DailySummary> {
    let nutrition = storage.nutrition_totals_for_day(user_id, date).await?;
    let exercise = storage.exercise_totals_for_day(user_id, date).await?;
    let water_ml = storage.water_total_for_day(user_id, date).await?;

    let macro_split = MacroSplit::from_grams(nutrition.carbs_g, nutrition.protein_g, nutrition.fat_g);

    Ok(DailySummary {
        user_id,
        date,
        calories_consumed: nutrition.calories,
        calories_burned: exercise.calories_burned,
        net_calories: nutrition.calories - exercise.calories_burned,
        carbs_g: nutrition.carbs_g,
        protein_g: nutrition.protein_g,
        fat_g: nutrition.fat_g,
        macro_split,
        water_ml,
        exercise_minutes: exercise.duration_minutes,
        foods_logged: nutrition.foods_logged,
        meals_logged: nutrition.meals_logged,
    })
}

/// The day's value of one metric, read off a computed summary.
pub fn metric_value(summary: &DailySummary, metric: GoalMetric) -> f64 {
    match metric {
        GoalMetric::Calories => summary.calories_consumed,
        GoalMetric::Protein => summary.protein_g,
        GoalMetric::Carbs => summary.carbs_g,
        GoalMetric::Fat => summary.fat_g,
        GoalMetric::Water => summary.water_ml as f64,
        GoalMetric::ExerciseMinutes => summary.exercise_minutes,
    }
}

/// Evaluate one goal against a day's summary.
pub fn goal_progress(goal: &Goal, summary: &DailySummary) -> GoalProgress {
    let current_value = metric_value(summary, goal.metric);

    let percent_of_target = if goal.target_value > 0.0 {
        current_value / goal.target_value * 100.0
    } else {
        0.0
    };

    GoalProgress {
        goal: goal.clone(),
        current_value,
        percent_of_target,
        achieved: current_value >= goal.target_value,
    }
}

/// Evaluate all of a user's goals against one day.
pub async fn compute_goal_progress(
    storage: &Storage,
    user_id: i64,
    date: NaiveDate,
) -> anyhow::Result<Vec<GoalProgress>> {
    let summary = compute_daily_summary(storage, user_id, date).await?;
    let goals = storage.list_goals(user_id).await?;

    Ok(goals
        .iter()
        .map(|goal| goal_progress(goal, &summary))
        .collect())
}
