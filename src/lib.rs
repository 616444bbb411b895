//! Nutrack - a self-hosted nutrition and fitness tracking API.
//!
//! # Overview
//!
//! Nutrack is a REST service for logging what you eat, drink, and do:
//! food and meal entries, exercise sessions, water intake, daily habits,
//! and numeric goals. Logged days feed two small cores:
//!
//! - calorie reconciliation: macronutrient grams are converted to calories
//!   with fixed energy densities and cross-checked against caller-supplied
//!   totals within a small tolerance, and
//! - streak evaluation: consecutive logging days maintain per-user and
//!   per-habit streak counters.
//!
//! Everything else is storage and presentation: entries live in SQLite,
//! and dashboards aggregate one user-day at a time.
//!
//! # Modules
//!
//! - [`model`]: Domain entities, request/response types, lenient parsing
//! - [`calories`]: Energy constants, derivation, and reconciliation
//! - [`streak`]: Calendar-day streak evaluation
//! - [`storage`]: SQLite storage layer
//! - [`aggregation`]: Daily summaries and goal progress
//! - [`dashboard`]: Composite per-user/per-day dashboard
//! - [`api`]: HTTP API handlers and router

pub mod aggregation;
pub mod api;
pub mod calories;
pub mod dashboard;
pub mod model;
pub mod storage;
pub mod streak;
