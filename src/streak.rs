//! Daily streak evaluation.
//!
//! # Overview
//!
//! A user keeps a streak alive by logging at least one qualifying event
//! (a food or meal entry, or a habit completion) every calendar day.
//! This module decides, from two dates alone, whether a new event continues
//! the streak, is a same-day repeat, or forces the streak to start over.
//!
//! All functions here are pure: they take dates in, return plain data out,
//! and perform no I/O. Persisting the resulting [`StreakState`] is the
//! storage layer's job, and concurrent updates for the same owner must be
//! serialized there (see `Storage::record_qualifying_event`).
//!
//! # Calendar-day policy
//!
//! "Day" means a UTC calendar day. Event timestamps are reduced to a
//! [`NaiveDate`] with `DateTime::<Utc>::date_naive()` before they reach this
//! module, so time-of-day never influences streak outcomes. Using a single
//! fixed zone keeps day-boundary comparisons stable regardless of where a
//! request was sent from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-owner streak counters.
///
/// An owner is either a user (the daily logging streak) or a single habit.
/// The state starts at [`StreakState::default`] before the first qualifying
/// event: both counters at zero and no dates recorded.
///
/// # Invariants
///
/// - `longest_streak >= current_streak` after every transition.
/// - `current_streak == 0` implies `streak_start_date` is `None`.
/// - `last_log_date`, when present, is the day of the most recent event
///   that was counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    /// Consecutive qualifying days up to and including the last counted day.
    pub current_streak: u32,

    /// Highest value `current_streak` has ever reached.
    pub longest_streak: u32,

    /// Day of the most recent counted event, if any.
    pub last_log_date: Option<NaiveDate>,

    /// Day the current streak began, if a streak is running.
    pub streak_start_date: Option<NaiveDate>,
}

/// True iff both dates fall on the same UTC calendar day.
///
/// Same-day repeats are a no-op for streak purposes: a second meal logged
/// on an already-counted day must not double-increment the counter.
pub fn is_same_calendar_day(a: NaiveDate, b: NaiveDate) -> bool {
    a == b
}

/// True iff `current` is exactly one calendar day after `last`.
///
/// `last` absent means there is nothing to be consecutive to, so the
/// answer is `false`. Direction matters: yesterday-relative-to-`last`
/// is not consecutive.
pub fn is_consecutive_day(last: Option<NaiveDate>, current: NaiveDate) -> bool {
    match last {
        Some(last) => last.succ_opt() == Some(current),
        None => false,
    }
}

/// True iff the streak cannot be continued and must restart at 1.
///
/// This is the case when no prior day exists, or when the gap between
/// `last` and `current` is anything other than zero or one day forward.
/// Note that [`apply_log_event`] screens out backdated events before
/// consulting this classification.
pub fn is_new_streak_required(last: Option<NaiveDate>, current: NaiveDate) -> bool {
    match last {
        Some(last) => !is_same_calendar_day(last, current) && !is_consecutive_day(Some(last), current),
        None => true,
    }
}

/// Read-only check: is the streak still alive as of `reference`?
///
/// A streak is alive while the owner logged today or yesterday relative to
/// `reference`; one missed day is still within grace until the day ends.
/// No prior log means no streak.
pub fn is_streak_active(last: Option<NaiveDate>, reference: NaiveDate) -> bool {
    match last {
        Some(last) => {
            let gap = reference.signed_duration_since(last).num_days();
            (0..=1).contains(&gap)
        }
        None => false,
    }
}

/// Apply one qualifying event to a streak and return the updated state.
///
/// # Transition rules
///
/// - Same day as the last counted event: state is returned unchanged
///   (idempotent within a day).
/// - Event dated before the last counted event: state is returned
///   unchanged. A backdated entry arriving late must not tear down a
///   streak that is otherwise alive.
/// - Exactly one day after the last event: `current_streak` increments
///   and `longest_streak` rises with it if surpassed.
/// - Anything else (first-ever event, or a gap of two or more days):
///   the streak restarts at 1 with `streak_start_date` set to the event day.
pub fn apply_log_event(state: &StreakState, event_date: NaiveDate) -> StreakState {
    if let Some(last) = state.last_log_date {
        // Same-day repeats and backdated arrivals leave the state alone
        if is_same_calendar_day(last, event_date) || event_date < last {
            return state.clone();
        }
    }

    if !is_new_streak_required(state.last_log_date, event_date) {
        // Only the consecutive case remains after the same-day screen
        let current = state.current_streak + 1;
        return StreakState {
            current_streak: current,
            longest_streak: state.longest_streak.max(current),
            last_log_date: Some(event_date),
            streak_start_date: state.streak_start_date,
        };
    }

    StreakState {
        current_streak: 1,
        longest_streak: state.longest_streak.max(1),
        last_log_date: Some(event_date),
        streak_start_date: Some(event_date),
    }
}
