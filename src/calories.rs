//! Calorie derivation and reconciliation.
//!
//! # Overview
//!
//! Food and meal entries may arrive with macronutrient grams, a
//! caller-supplied calorie total, or both. This module derives calories
//! from macros using fixed energy densities and cross-checks a supplied
//! total against the derived one within a small tolerance.
//!
//! Everything here is a pure function over numbers. Malformed numeric
//! input (negative, NaN, infinite, absent) degrades to zero rather than
//! failing; the only "failure" a caller ever sees is a [`CalorieResult`]
//! with `is_valid == false`, which is a normal data outcome to branch on.

use serde::{Deserialize, Serialize};

/// Energy density of carbohydrate, in kcal per gram.
pub const CARBS_KCAL_PER_GRAM: f64 = 4.0;

/// Energy density of protein, in kcal per gram.
pub const PROTEIN_KCAL_PER_GRAM: f64 = 4.0;

/// Energy density of fat, in kcal per gram.
pub const FAT_KCAL_PER_GRAM: f64 = 9.0;

/// Accepted absolute difference between a supplied calorie total and the
/// macro-derived total, in kcal. Inclusive on both ends.
pub const CALORIE_TOLERANCE_KCAL: f64 = 5.0;

/// Collapse a raw quantity to a usable non-negative number.
///
/// Absent, negative, NaN, and infinite values all become `0.0`. This is
/// the single place the "bad numeric input degrades to zero" policy lives.
pub fn clamp_non_negative(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}

/// Calories contributed by `grams` of carbohydrate.
pub fn calories_from_carbs(grams: Option<f64>) -> f64 {
    clamp_non_negative(grams) * CARBS_KCAL_PER_GRAM
}

/// Calories contributed by `grams` of protein.
pub fn calories_from_protein(grams: Option<f64>) -> f64 {
    clamp_non_negative(grams) * PROTEIN_KCAL_PER_GRAM
}

/// Calories contributed by `grams` of fat.
pub fn calories_from_fat(grams: Option<f64>) -> f64 {
    clamp_non_negative(grams) * FAT_KCAL_PER_GRAM
}

/// Raw numeric inputs for one reconciliation.
///
/// Fields mirror what a request body carries after lenient parsing:
/// anything that was not a usable number is already `None` here.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalorieInput {
    /// Caller-supplied calorie total, if any.
    pub calories: Option<f64>,

    /// Carbohydrate grams.
    pub carbs_g: Option<f64>,

    /// Protein grams.
    pub protein_g: Option<f64>,

    /// Fat grams.
    pub fat_g: Option<f64>,
}

/// Per-macronutrient grams and the calories each contributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroBreakdown {
    pub carbs_g: f64,
    pub carbs_kcal: f64,
    pub protein_g: f64,
    pub protein_kcal: f64,
    pub fat_g: f64,
    pub fat_kcal: f64,
}

/// Outcome of one reconciliation.
///
/// `is_valid == false` is not an error: it means the caller must decide how
/// to present the inconsistency (reject the entry, warn, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalorieResult {
    /// The total to record for the entry. See [`reconcile`] for which
    /// source (supplied vs derived) wins in each branch.
    pub total_calories: f64,

    /// Per-macro grams and calories that went into the derived total.
    pub breakdown: MacroBreakdown,

    /// Whether `total_calories` was derived from macronutrients rather
    /// than taken from the caller-supplied value.
    pub from_macros: bool,

    /// Whether the supplied and derived values reconcile.
    pub is_valid: bool,

    /// Human-readable classification of the outcome.
    pub message: String,
}

/// Sum the calories derived from all three macronutrients.
///
/// Missing macros count as zero, not as "unknown": the total reflects
/// only what was supplied.
pub fn total_from_macros(
    carbs_g: Option<f64>,
    protein_g: Option<f64>,
    fat_g: Option<f64>,
) -> (f64, MacroBreakdown) {
    let breakdown = MacroBreakdown {
        carbs_g: clamp_non_negative(carbs_g),
        carbs_kcal: calories_from_carbs(carbs_g),
        protein_g: clamp_non_negative(protein_g),
        protein_kcal: calories_from_protein(protein_g),
        fat_g: clamp_non_negative(fat_g),
        fat_kcal: calories_from_fat(fat_g),
    };

    let total = breakdown.carbs_kcal + breakdown.protein_kcal + breakdown.fat_kcal;
    (total, breakdown)
}

/// Reconcile supplied calories with macro-derived calories.
///
/// # Branches
///
/// Evaluated in this precedence:
///
/// 1. Nothing supplied: invalid, nothing to record.
/// 2. Calories only: the supplied value is used as-is.
/// 3. Macros only: the derived total is used.
/// 4. Both: the supplied value wins when within
///    [`CALORIE_TOLERANCE_KCAL`] of the derived total; otherwise the
///    result is flagged invalid and the message carries both numbers.
pub fn reconcile(input: &CalorieInput) -> CalorieResult {
    let supplied = match input.calories {
        Some(c) if c.is_finite() && c > 0.0 => Some(c),
        _ => None,
    };

    let (derived, breakdown) = total_from_macros(input.carbs_g, input.protein_g, input.fat_g);
    let has_macros = derived > 0.0;

    match (supplied, has_macros) {
        (None, false) => CalorieResult {
            total_calories: 0.0,
            breakdown,
            from_macros: false,
            is_valid: false,
            message: "Either calories or macronutrients must be provided".to_string(),
        },
        (Some(calories), false) => CalorieResult {
            total_calories: calories,
            breakdown,
            from_macros: false,
            is_valid: true,
            message: "Using provided calorie value".to_string(),
        },
        (None, true) => CalorieResult {
            total_calories: derived,
            breakdown,
            from_macros: true,
            is_valid: true,
            message: "Calories calculated from macronutrients".to_string(),
        },
        (Some(calories), true) => {
            if (calories - derived).abs() <= CALORIE_TOLERANCE_KCAL {
                CalorieResult {
                    total_calories: calories,
                    breakdown,
                    from_macros: false,
                    is_valid: true,
                    message: "Provided calories are consistent with macronutrients".to_string(),
                }
            } else {
                CalorieResult {
                    total_calories: derived,
                    breakdown,
                    from_macros: true,
                    is_valid: false,
                    message: format!(
                        "Calorie mismatch: provided {:.1} kcal but macronutrients derive {:.1} kcal",
                        calories, derived
                    ),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_rejects_garbage() {
        assert_eq!(clamp_non_negative(Some(-10.0)), 0.0);
        assert_eq!(clamp_non_negative(Some(f64::NAN)), 0.0);
        assert_eq!(clamp_non_negative(Some(f64::INFINITY)), 0.0);
        assert_eq!(clamp_non_negative(None), 0.0);
        assert_eq!(clamp_non_negative(Some(12.5)), 12.5);
    }

    #[test]
    fn test_per_macro_derivation() {
        assert_eq!(calories_from_carbs(Some(50.0)), 200.0);
        assert_eq!(calories_from_protein(Some(30.0)), 120.0);
        assert_eq!(calories_from_fat(Some(20.0)), 180.0);
        // Bad input never throws and never goes negative
        assert_eq!(calories_from_carbs(Some(-10.0)), 0.0);
        assert_eq!(calories_from_carbs(None), 0.0);
    }

    #[test]
    fn test_total_from_macros() {
        let (total, breakdown) = total_from_macros(Some(50.0), Some(30.0), Some(20.0));

        assert_eq!(total, 500.0);
        assert_eq!(breakdown.carbs_kcal, 200.0);
        assert_eq!(breakdown.protein_kcal, 120.0);
        assert_eq!(breakdown.fat_kcal, 180.0);
    }

    #[test]
    fn test_missing_macros_count_as_zero() {
        let (total, breakdown) = total_from_macros(Some(100.0), None, None);

        assert_eq!(total, 400.0);
        assert_eq!(breakdown.protein_g, 0.0);
        assert_eq!(breakdown.fat_g, 0.0);
    }

    #[test]
    fn test_reconcile_no_data() {
        let result = reconcile(&CalorieInput::default());

        assert!(!result.is_valid);
        assert_eq!(result.total_calories, 0.0);
        assert_eq!(
            result.message,
            "Either calories or macronutrients must be provided"
        );
    }

    #[test]
    fn test_reconcile_calories_only() {
        let result = reconcile(&CalorieInput {
            calories: Some(250.0),
            ..Default::default()
        });

        assert!(result.is_valid);
        assert!(!result.from_macros);
        assert_eq!(result.total_calories, 250.0);
        assert_eq!(result.message, "Using provided calorie value");
    }

    #[test]
    fn test_reconcile_macros_only() {
        let result = reconcile(&CalorieInput {
            calories: None,
            carbs_g: Some(50.0),
            protein_g: Some(30.0),
            fat_g: Some(20.0),
        });

        assert!(result.is_valid);
        assert!(result.from_macros);
        assert_eq!(result.total_calories, 500.0);
        assert_eq!(result.message, "Calories calculated from macronutrients");
    }

    #[test]
    fn test_reconcile_within_tolerance() {
        // Derived total is 500; 503 is inside the ±5 kcal band
        let result = reconcile(&CalorieInput {
            calories: Some(503.0),
            carbs_g: Some(50.0),
            protein_g: Some(30.0),
            fat_g: Some(20.0),
        });

        assert!(result.is_valid);
        // The supplied value is trusted when within tolerance
        assert_eq!(result.total_calories, 503.0);
        assert!(!result.from_macros);
    }

    #[test]
    fn test_reconcile_tolerance_is_inclusive() {
        let result = reconcile(&CalorieInput {
            calories: Some(505.0),
            carbs_g: Some(50.0),
            protein_g: Some(30.0),
            fat_g: Some(20.0),
        });

        assert!(result.is_valid);

        let result = reconcile(&CalorieInput {
            calories: Some(506.0),
            carbs_g: Some(50.0),
            protein_g: Some(30.0),
            fat_g: Some(20.0),
        });

        assert!(!result.is_valid);
    }

    #[test]
    fn test_reconcile_mismatch() {
        let result = reconcile(&CalorieInput {
            calories: Some(300.0),
            carbs_g: Some(50.0),
            protein_g: Some(30.0),
            fat_g: Some(20.0),
        });

        assert!(!result.is_valid);
        assert!(result.message.contains("Calorie mismatch"));
        assert!(result.message.contains("300"));
        assert!(result.message.contains("500"));
        // The derived total is reported on mismatch
        assert_eq!(result.total_calories, 500.0);
    }

    #[test]
    fn test_reconcile_zero_calories_treated_as_absent() {
        // calories: 0 with no macros is the "no data" branch, not "calories only"
        let result = reconcile(&CalorieInput {
            calories: Some(0.0),
            ..Default::default()
        });

        assert!(!result.is_valid);
        assert_eq!(
            result.message,
            "Either calories or macronutrients must be provided"
        );
    }

    #[test]
    fn test_reconcile_negative_macros_degrade_to_zero() {
        let result = reconcile(&CalorieInput {
            calories: Some(100.0),
            carbs_g: Some(-50.0),
            protein_g: None,
            fat_g: None,
        });

        // Negative carbs collapse to zero, leaving a calories-only input
        assert!(result.is_valid);
        assert!(!result.from_macros);
        assert_eq!(result.total_calories, 100.0);
    }
}
