//! Dashboard assembly: one composite view per user per day.
//!
//! The dashboard is what the mobile client renders on its home screen. It
//! pulls together the pieces the other modules compute (the daily summary,
//! the logging streak, goal progress, habit count) into a single response
//! so the client needs one round trip.
//!
//! # Usage
//!
//! ```ignore
//! let dashboard = build_dashboard(&storage, user_id, date, Utc::now()).await?;
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::aggregation::{DailySummary, GoalProgress, compute_daily_summary, goal_progress};
use crate::storage::{Storage, StreakOwner};
use crate::streak::{StreakState, is_streak_active};

/// The composite dashboard for one user-day.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardResponse {
    pub user_id: i64,

    /// The day being shown.
    pub date: NaiveDate,

    /// When this response was generated.
    pub generated_at: DateTime<Utc>,

    /// The day's summed logs and macro split.
    pub summary: DailySummary,

    /// The user's daily logging streak.
    pub streak: StreakState,

    /// Whether the streak is still within its one-day grace window.
    pub streak_active: bool,

    /// Every goal evaluated against the day.
    pub goals: Vec<GoalProgress>,

    /// Number of habits the user is tracking.
    pub habits_tracked: usize,
}

/// Assemble the dashboard for one user-day.
///
/// `now` supplies both the generation timestamp and the reference day for
/// the streak-active check, so a dashboard for a past date still reports
/// streak liveness relative to the present.
pub async fn build_dashboard(
    storage: &Storage,
    user_id: i64,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<DashboardResponse> {
    let summary = compute_daily_summary(storage, user_id, date).await?;

    let streak = storage.get_streak(StreakOwner::User(user_id)).await?;
    let streak_active = is_streak_active(streak.last_log_date, now.date_naive());

    // Goals are evaluated against the already-computed summary rather than
    // re-aggregating the day once per goal.
    let goals = storage
        .list_goals(user_id)
        .await?
        .iter()
        .map(|goal| goal_progress(goal, &summary))
        .collect();

    let habits_tracked = storage.list_habits(user_id).await?.len();

    Ok(DashboardResponse {
        user_id,
        date,
        generated_at: now,
        summary,
        streak,
        streak_active,
        goals,
        habits_tracked,
    })
}
