//! SQLite storage layer for Nutrack.
//!
//! # Overview
//!
//! One [`Storage`] wrapper owns the connection pool and exposes typed
//! methods for every entity: users, food/meal/exercise/water logs, habits,
//! goals, and streak state. Instants are stored as unix seconds in `ts`
//! columns; day-granularity dates are stored as ISO `TEXT` so per-day
//! filtering is a plain equality match.
//!
//! # Streak updates
//!
//! [`Storage::record_qualifying_event`] runs the fetch-evaluate-upsert
//! cycle for a streak inside a single transaction. Concurrent qualifying
//! events for the same owner serialize on SQLite's single-writer lock, so
//! the invariants of [`StreakState`] hold under concurrent requests.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};

use crate::model::{
    ExerciseLog, FoodLog, Goal, GoalMetric, Habit, MealItem, MealLog, MealType, User, WaterLog,
};
use crate::streak::{StreakState, apply_log_event};

/// Who a streak belongs to.
///
/// The user variant tracks the daily logging streak (any food or meal entry
/// qualifies); the habit variant tracks completions of one habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakOwner {
    User(i64),
    Habit(i64),
}

impl StreakOwner {
    fn kind(self) -> &'static str {
        match self {
            StreakOwner::User(_) => "user",
            StreakOwner::Habit(_) => "habit",
        }
    }

    fn id(self) -> i64 {
        match self {
            StreakOwner::User(id) | StreakOwner::Habit(id) => id,
        }
    }
}

/// Summed nutrition columns for one user-day.
#[derive(Debug, Clone, Copy, Default)]
pub struct NutritionTotals {
    pub calories: f64,
    pub carbs_g: f64,
    pub protein_g: f64,
    pub fat_g: f64,
    pub foods_logged: i64,
    pub meals_logged: i64,
}

/// Summed exercise columns for one user-day.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExerciseTotals {
    pub duration_minutes: f64,
    pub calories_burned: f64,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:nutrack.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                created_ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS food_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                calories REAL NOT NULL,
                carbs_g REAL NOT NULL,
                protein_g REAL NOT NULL,
                fat_g REAL NOT NULL,
                from_macros INTEGER NOT NULL,
                log_date TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS meal_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                items TEXT NOT NULL,
                calories REAL NOT NULL,
                carbs_g REAL NOT NULL,
                protein_g REAL NOT NULL,
                fat_g REAL NOT NULL,
                from_macros INTEGER NOT NULL,
                log_date TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS exercise_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                duration_minutes REAL NOT NULL,
                calories_burned REAL NOT NULL,
                log_date TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS water_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount_ml INTEGER NOT NULL,
                log_date TEXT NOT NULL,
                ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS habits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                created_ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS goals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                metric TEXT NOT NULL,
                target_value REAL NOT NULL,
                created_ts INTEGER NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS streaks (
                owner_kind TEXT NOT NULL,
                owner_id INTEGER NOT NULL,
                current_streak INTEGER NOT NULL,
                longest_streak INTEGER NOT NULL,
                last_log_date TEXT,
                streak_start_date TEXT,
                PRIMARY KEY (owner_kind, owner_id)
            )
            "#,
            // Indexes for per-user/per-day filtering and aggregation
            "CREATE INDEX IF NOT EXISTS idx_food_logs_user_date ON food_logs(user_id, log_date)",
            "CREATE INDEX IF NOT EXISTS idx_meal_logs_user_date ON meal_logs(user_id, log_date)",
            "CREATE INDEX IF NOT EXISTS idx_exercise_logs_user_date ON exercise_logs(user_id, log_date)",
            "CREATE INDEX IF NOT EXISTS idx_water_logs_user_date ON water_logs(user_id, log_date)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Insert a new user and return it with its assigned id.
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<User> {
        let ts = created_at.timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, created_ts)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            created_at: datetime_from_ts(ts),
        })
    }

    /// Fetch a user by id, or None if unknown.
    pub async fn get_user(&self, id: i64) -> anyhow::Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, created_ts
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            created_at: datetime_from_ts(row.get("created_ts")),
        }))
    }

    // ------------------------------------------------------------------
    // Food logs
    // ------------------------------------------------------------------

    /// Insert a reconciled food entry.
    pub async fn insert_food_log(&self, log: &FoodLog) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO food_logs
                (user_id, name, meal_type, calories, carbs_g, protein_g, fat_g, from_macros, log_date, ts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(&log.name)
        .bind(log.meal_type.as_str())
        .bind(log.calories)
        .bind(log.carbs_g)
        .bind(log.protein_g)
        .bind(log.fat_g)
        .bind(log.from_macros)
        .bind(log.log_date.to_string())
        .bind(log.logged_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List a user's food entries, optionally restricted to one day.
    pub async fn list_food_logs(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<FoodLog>> {
        let rows = match date {
            Some(date) => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, meal_type, calories, carbs_g, protein_g, fat_g,
                           from_macros, log_date, ts
                    FROM food_logs
                    WHERE user_id = ? AND log_date = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .bind(date.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, meal_type, calories, carbs_g, protein_g, fat_g,
                           from_macros, log_date, ts
                    FROM food_logs
                    WHERE user_id = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(food_log_from_row).collect()
    }

    // ------------------------------------------------------------------
    // Meal logs
    // ------------------------------------------------------------------

    /// Insert a reconciled meal entry. Items are stored as JSON.
    pub async fn insert_meal_log(&self, log: &MealLog) -> anyhow::Result<()> {
        let items = serde_json::to_string(&log.items)?;

        sqlx::query(
            r#"
            INSERT INTO meal_logs
                (user_id, name, meal_type, items, calories, carbs_g, protein_g, fat_g, from_macros, log_date, ts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(&log.name)
        .bind(log.meal_type.as_str())
        .bind(items)
        .bind(log.calories)
        .bind(log.carbs_g)
        .bind(log.protein_g)
        .bind(log.fat_g)
        .bind(log.from_macros)
        .bind(log.log_date.to_string())
        .bind(log.logged_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List a user's meals, optionally restricted to one day.
    pub async fn list_meal_logs(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<MealLog>> {
        let rows = match date {
            Some(date) => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, meal_type, items, calories, carbs_g, protein_g, fat_g,
                           from_macros, log_date, ts
                    FROM meal_logs
                    WHERE user_id = ? AND log_date = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .bind(date.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, meal_type, items, calories, carbs_g, protein_g, fat_g,
                           from_macros, log_date, ts
                    FROM meal_logs
                    WHERE user_id = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(meal_log_from_row).collect()
    }

    // ------------------------------------------------------------------
    // Exercise logs
    // ------------------------------------------------------------------

    /// Insert an exercise session.
    pub async fn insert_exercise_log(&self, log: &ExerciseLog) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO exercise_logs (user_id, name, duration_minutes, calories_burned, log_date, ts)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(&log.name)
        .bind(log.duration_minutes)
        .bind(log.calories_burned)
        .bind(log.log_date.to_string())
        .bind(log.logged_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List a user's exercise sessions, optionally restricted to one day.
    pub async fn list_exercise_logs(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<ExerciseLog>> {
        let rows = match date {
            Some(date) => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, duration_minutes, calories_burned, log_date, ts
                    FROM exercise_logs
                    WHERE user_id = ? AND log_date = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .bind(date.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT user_id, name, duration_minutes, calories_burned, log_date, ts
                    FROM exercise_logs
                    WHERE user_id = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| -> anyhow::Result<ExerciseLog> {
                Ok(ExerciseLog {
                    user_id: row.get("user_id"),
                    name: row.get("name"),
                    duration_minutes: row.get("duration_minutes"),
                    calories_burned: row.get("calories_burned"),
                    log_date: date_from_text(&row.get::<String, _>("log_date"))?,
                    logged_at: datetime_from_ts(row.get("ts")),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    // ------------------------------------------------------------------
    // Water logs
    // ------------------------------------------------------------------

    /// Insert a water intake entry.
    pub async fn insert_water_log(&self, log: &WaterLog) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO water_logs (user_id, amount_ml, log_date, ts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(log.user_id)
        .bind(log.amount_ml)
        .bind(log.log_date.to_string())
        .bind(log.logged_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// List a user's water entries, optionally restricted to one day.
    pub async fn list_water_logs(
        &self,
        user_id: i64,
        date: Option<NaiveDate>,
    ) -> anyhow::Result<Vec<WaterLog>> {
        let rows = match date {
            Some(date) => {
                sqlx::query(
                    r#"
                    SELECT user_id, amount_ml, log_date, ts
                    FROM water_logs
                    WHERE user_id = ? AND log_date = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .bind(date.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT user_id, amount_ml, log_date, ts
                    FROM water_logs
                    WHERE user_id = ?
                    ORDER BY ts
                    "#,
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| -> anyhow::Result<WaterLog> {
                Ok(WaterLog {
                    user_id: row.get("user_id"),
                    amount_ml: row.get("amount_ml"),
                    log_date: date_from_text(&row.get::<String, _>("log_date"))?,
                    logged_at: datetime_from_ts(row.get("ts")),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?)
    }

    /// Total water intake for a user-day, or 0 with no entries.
    pub async fn water_total_for_day(&self, user_id: i64, date: NaiveDate) -> anyhow::Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount_ml), 0) as total
            FROM water_logs
            WHERE user_id = ? AND log_date = ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("total"))
    }

    // ------------------------------------------------------------------
    // Aggregation queries
    // ------------------------------------------------------------------

    /// Summed calories and macros across food and meal entries for one
    /// user-day, with entry counts.
    pub async fn nutrition_totals_for_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> anyhow::Result<NutritionTotals> {
        let mut totals = NutritionTotals::default();

        let food_row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(calories), 0.0) as calories,
                   COALESCE(SUM(carbs_g), 0.0) as carbs_g,
                   COALESCE(SUM(protein_g), 0.0) as protein_g,
                   COALESCE(SUM(fat_g), 0.0) as fat_g,
                   COUNT(*) as entries
            FROM food_logs
            WHERE user_id = ? AND log_date = ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        totals.calories += food_row.get::<f64, _>("calories");
        totals.carbs_g += food_row.get::<f64, _>("carbs_g");
        totals.protein_g += food_row.get::<f64, _>("protein_g");
        totals.fat_g += food_row.get::<f64, _>("fat_g");
        totals.foods_logged = food_row.get("entries");

        let meal_row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(calories), 0.0) as calories,
                   COALESCE(SUM(carbs_g), 0.0) as carbs_g,
                   COALESCE(SUM(protein_g), 0.0) as protein_g,
                   COALESCE(SUM(fat_g), 0.0) as fat_g,
                   COUNT(*) as entries
            FROM meal_logs
            WHERE user_id = ? AND log_date = ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        totals.calories += meal_row.get::<f64, _>("calories");
        totals.carbs_g += meal_row.get::<f64, _>("carbs_g");
        totals.protein_g += meal_row.get::<f64, _>("protein_g");
        totals.fat_g += meal_row.get::<f64, _>("fat_g");
        totals.meals_logged = meal_row.get("entries");

        Ok(totals)
    }

    /// Summed exercise duration and burned calories for one user-day.
    pub async fn exercise_totals_for_day(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> anyhow::Result<ExerciseTotals> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(duration_minutes), 0.0) as duration_minutes,
                   COALESCE(SUM(calories_burned), 0.0) as calories_burned
            FROM exercise_logs
            WHERE user_id = ? AND log_date = ?
            "#,
        )
        .bind(user_id)
        .bind(date.to_string())
        .fetch_one(&self.pool)
        .await?;

        Ok(ExerciseTotals {
            duration_minutes: row.get("duration_minutes"),
            calories_burned: row.get("calories_burned"),
        })
    }

    // ------------------------------------------------------------------
    // Habits
    // ------------------------------------------------------------------

    /// Insert a new habit and return it with its assigned id.
    pub async fn create_habit(
        &self,
        user_id: i64,
        name: &str,
        description: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<Habit> {
        let ts = created_at.timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO habits (user_id, name, description, created_ts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(Habit {
            id: result.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: datetime_from_ts(ts),
        })
    }

    /// Fetch a habit by id, or None if unknown.
    pub async fn get_habit(&self, id: i64) -> anyhow::Result<Option<Habit>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, name, description, created_ts
            FROM habits
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Habit {
            id: row.get("id"),
            user_id: row.get("user_id"),
            name: row.get("name"),
            description: row.get("description"),
            created_at: datetime_from_ts(row.get("created_ts")),
        }))
    }

    /// List a user's habits in creation order.
    pub async fn list_habits(&self, user_id: i64) -> anyhow::Result<Vec<Habit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, name, description, created_ts
            FROM habits
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| Habit {
                id: row.get("id"),
                user_id: row.get("user_id"),
                name: row.get("name"),
                description: row.get("description"),
                created_at: datetime_from_ts(row.get("created_ts")),
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Goals
    // ------------------------------------------------------------------

    /// Insert a new goal and return it with its assigned id.
    pub async fn create_goal(
        &self,
        user_id: i64,
        metric: GoalMetric,
        target_value: f64,
        created_at: DateTime<Utc>,
    ) -> anyhow::Result<Goal> {
        let ts = created_at.timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO goals (user_id, metric, target_value, created_ts)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(metric.as_str())
        .bind(target_value)
        .bind(ts)
        .execute(&self.pool)
        .await?;

        Ok(Goal {
            id: result.last_insert_rowid(),
            user_id,
            metric,
            target_value,
            created_at: datetime_from_ts(ts),
        })
    }

    /// List a user's goals in creation order.
    pub async fn list_goals(&self, user_id: i64) -> anyhow::Result<Vec<Goal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, metric, target_value, created_ts
            FROM goals
            WHERE user_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let raw: String = row.get("metric");
                let metric = GoalMetric::parse(&raw)
                    .ok_or_else(|| anyhow::anyhow!("unknown goal metric in database: {}", raw))?;

                Ok(Goal {
                    id: row.get("id"),
                    user_id: row.get("user_id"),
                    metric,
                    target_value: row.get("target_value"),
                    created_at: datetime_from_ts(row.get("created_ts")),
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Streaks
    // ------------------------------------------------------------------

    /// Fetch the streak state for an owner.
    ///
    /// An owner with no recorded events yet gets the zeroed default state.
    pub async fn get_streak(&self, owner: StreakOwner) -> anyhow::Result<StreakState> {
        let row = sqlx::query(
            r#"
            SELECT current_streak, longest_streak, last_log_date, streak_start_date
            FROM streaks
            WHERE owner_kind = ? AND owner_id = ?
            "#,
        )
        .bind(owner.kind())
        .bind(owner.id())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => streak_from_row(&row),
            None => Ok(StreakState::default()),
        }
    }

    /// Apply one qualifying event to an owner's streak and persist the result.
    ///
    /// The fetch-evaluate-upsert cycle runs in a transaction so the
    /// read-modify-write cannot interleave with another event for the
    /// same owner.
    pub async fn record_qualifying_event(
        &self,
        owner: StreakOwner,
        event_date: NaiveDate,
    ) -> anyhow::Result<StreakState> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT current_streak, longest_streak, last_log_date, streak_start_date
            FROM streaks
            WHERE owner_kind = ? AND owner_id = ?
            "#,
        )
        .bind(owner.kind())
        .bind(owner.id())
        .fetch_optional(&mut *tx)
        .await?;

        let state = match row {
            Some(row) => streak_from_row(&row)?,
            None => StreakState::default(),
        };

        let updated = apply_log_event(&state, event_date);

        sqlx::query(
            r#"
            INSERT INTO streaks
                (owner_kind, owner_id, current_streak, longest_streak, last_log_date, streak_start_date)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(owner_kind, owner_id) DO UPDATE SET
                current_streak = excluded.current_streak,
                longest_streak = excluded.longest_streak,
                last_log_date = excluded.last_log_date,
                streak_start_date = excluded.streak_start_date
            "#,
        )
        .bind(owner.kind())
        .bind(owner.id())
        .bind(updated.current_streak as i64)
        .bind(updated.longest_streak as i64)
        .bind(updated.last_log_date.map(|d| d.to_string()))
        .bind(updated.streak_start_date.map(|d| d.to_string()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }
}

fn datetime_from_ts(ts: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(ts, 0).unwrap()
}

fn date_from_text(s: &str) -> anyhow::Result<NaiveDate> {
    Ok(s.parse()?)
}

fn food_log_from_row(row: &SqliteRow) -> anyhow::Result<FoodLog> {
    Ok(FoodLog {
        user_id: row.get("user_id"),
        name: row.get("name"),
        meal_type: MealType::from_str_lossy(&row.get::<String, _>("meal_type")),
        calories: row.get("calories"),
        carbs_g: row.get("carbs_g"),
        protein_g: row.get("protein_g"),
        fat_g: row.get("fat_g"),
        from_macros: row.get("from_macros"),
        log_date: date_from_text(&row.get::<String, _>("log_date"))?,
        logged_at: datetime_from_ts(row.get("ts")),
    })
}

fn meal_log_from_row(row: &SqliteRow) -> anyhow::Result<MealLog> {
    let items: Vec<MealItem> = serde_json::from_str(&row.get::<String, _>("items"))?;

    Ok(MealLog {
        user_id: row.get("user_id"),
        name: row.get("name"),
        meal_type: MealType::from_str_lossy(&row.get::<String, _>("meal_type")),
        items,
        calories: row.get("calories"),
        carbs_g: row.get("carbs_g"),
        protein_g: row.get("protein_g"),
        fat_g: row.get("fat_g"),
        from_macros: row.get("from_macros"),
        log_date: date_from_text(&row.get::<String, _>("log_date"))?,
        logged_at: datetime_from_ts(row.get("ts")),
    })
}

fn streak_from_row(row: &SqliteRow) -> anyhow::Result<StreakState> {
    let last_log_date: Option<String> = row.get("last_log_date");
    let streak_start_date: Option<String> = row.get("streak_start_date");

    Ok(StreakState {
        current_streak: row.get::<i64, _>("current_streak") as u32,
        longest_streak: row.get::<i64, _>("longest_streak") as u32,
        last_log_date: last_log_date.as_deref().map(date_from_text).transpose()?,
        streak_start_date: streak_start_date.as_deref().map(date_from_text).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        let created = storage
            .create_user("ada", "ada@example.com", Utc::now())
            .await
            .unwrap();

        let fetched = storage.get_user(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.username, "ada");
        assert_eq!(fetched.email, "ada@example.com");

        assert!(storage.get_user(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_list_food_logs_by_day() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();

        for (name, date) in [("oatmeal", day(2024, 3, 1)), ("salad", day(2024, 3, 2))] {
            let log = FoodLog {
                user_id: 1,
                name: name.to_string(),
                meal_type: MealType::Lunch,
                calories: 300.0,
                carbs_g: 40.0,
                protein_g: 10.0,
                fat_g: 8.0,
                from_macros: true,
                log_date: date,
                logged_at: now,
            };
            storage.insert_food_log(&log).await.unwrap();
        }

        let all = storage.list_food_logs(1, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let first_day = storage
            .list_food_logs(1, Some(day(2024, 3, 1)))
            .await
            .unwrap();
        assert_eq!(first_day.len(), 1);
        assert_eq!(first_day[0].name, "oatmeal");
        assert_eq!(first_day[0].meal_type, MealType::Lunch);
        assert!(first_day[0].from_macros);
    }

    #[tokio::test]
    async fn test_nutrition_totals_span_foods_and_meals() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let date = day(2024, 3, 1);

        let food = FoodLog {
            user_id: 1,
            name: "toast".to_string(),
            meal_type: MealType::Breakfast,
            calories: 200.0,
            carbs_g: 30.0,
            protein_g: 5.0,
            fat_g: 6.0,
            from_macros: false,
            log_date: date,
            logged_at: now,
        };
        storage.insert_food_log(&food).await.unwrap();

        let meal = MealLog {
            user_id: 1,
            name: "dinner".to_string(),
            meal_type: MealType::Dinner,
            items: vec![],
            calories: 500.0,
            carbs_g: 50.0,
            protein_g: 30.0,
            fat_g: 20.0,
            from_macros: true,
            log_date: date,
            logged_at: now,
        };
        storage.insert_meal_log(&meal).await.unwrap();

        let totals = storage.nutrition_totals_for_day(1, date).await.unwrap();
        assert_eq!(totals.calories, 700.0);
        assert_eq!(totals.carbs_g, 80.0);
        assert_eq!(totals.protein_g, 35.0);
        assert_eq!(totals.fat_g, 26.0);
        assert_eq!(totals.foods_logged, 1);
        assert_eq!(totals.meals_logged, 1);

        // A day with no entries sums to zero
        let empty = storage
            .nutrition_totals_for_day(1, day(2024, 3, 2))
            .await
            .unwrap();
        assert_eq!(empty.calories, 0.0);
        assert_eq!(empty.foods_logged, 0);
    }

    #[tokio::test]
    async fn test_meal_items_roundtrip() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        let meal = MealLog {
            user_id: 1,
            name: "lunch".to_string(),
            meal_type: MealType::Lunch,
            items: vec![MealItem {
                name: "rice".to_string(),
                carbs_g: Some(45.0),
                protein_g: None,
                fat_g: None,
            }],
            calories: 180.0,
            carbs_g: 45.0,
            protein_g: 0.0,
            fat_g: 0.0,
            from_macros: true,
            log_date: day(2024, 3, 1),
            logged_at: Utc::now(),
        };
        storage.insert_meal_log(&meal).await.unwrap();

        let meals = storage.list_meal_logs(1, None).await.unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].items.len(), 1);
        assert_eq!(meals[0].items[0].name, "rice");
        assert_eq!(meals[0].items[0].carbs_g, Some(45.0));
    }

    #[tokio::test]
    async fn test_water_total_for_day() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let now = Utc::now();
        let date = day(2024, 3, 1);

        for amount in [250, 500, 330] {
            let log = WaterLog {
                user_id: 1,
                amount_ml: amount,
                log_date: date,
                logged_at: now,
            };
            storage.insert_water_log(&log).await.unwrap();
        }

        let total = storage.water_total_for_day(1, date).await.unwrap();
        assert_eq!(total, 1080);

        let other_day = storage.water_total_for_day(1, day(2024, 3, 2)).await.unwrap();
        assert_eq!(other_day, 0);
    }

    #[tokio::test]
    async fn test_streak_record_and_fetch() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let owner = StreakOwner::User(1);

        // No events yet: default state
        let initial = storage.get_streak(owner).await.unwrap();
        assert_eq!(initial, StreakState::default());

        let first = storage
            .record_qualifying_event(owner, day(2024, 3, 1))
            .await
            .unwrap();
        assert_eq!(first.current_streak, 1);

        let second = storage
            .record_qualifying_event(owner, day(2024, 3, 2))
            .await
            .unwrap();
        assert_eq!(second.current_streak, 2);
        assert_eq!(second.longest_streak, 2);

        // Same-day repeat leaves the persisted state unchanged
        let repeat = storage
            .record_qualifying_event(owner, day(2024, 3, 2))
            .await
            .unwrap();
        assert_eq!(repeat, second);

        let fetched = storage.get_streak(owner).await.unwrap();
        assert_eq!(fetched, second);
    }

    #[tokio::test]
    async fn test_user_and_habit_streaks_are_independent() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .record_qualifying_event(StreakOwner::User(1), day(2024, 3, 1))
            .await
            .unwrap();
        storage
            .record_qualifying_event(StreakOwner::Habit(1), day(2024, 3, 1))
            .await
            .unwrap();
        storage
            .record_qualifying_event(StreakOwner::Habit(1), day(2024, 3, 2))
            .await
            .unwrap();

        let user_streak = storage.get_streak(StreakOwner::User(1)).await.unwrap();
        let habit_streak = storage.get_streak(StreakOwner::Habit(1)).await.unwrap();

        assert_eq!(user_streak.current_streak, 1);
        assert_eq!(habit_streak.current_streak, 2);
    }

    #[tokio::test]
    async fn test_goal_metric_roundtrip_through_db() {
        let storage = Storage::new("sqlite::memory:").await.unwrap();

        storage
            .create_goal(1, GoalMetric::Protein, 120.0, Utc::now())
            .await
            .unwrap();
        storage
            .create_goal(1, GoalMetric::Water, 2000.0, Utc::now())
            .await
            .unwrap();

        let goals = storage.list_goals(1).await.unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[0].metric, GoalMetric::Protein);
        assert_eq!(goals[1].metric, GoalMetric::Water);
        assert_eq!(goals[1].target_value, 2000.0);
    }
}
