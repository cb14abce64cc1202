// ABOUTME: Catalog record quality checks: structural macro validation and energy plausibility
// ABOUTME: Produces a score cap that stored quality scores are clamped to
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Quality scoring
//!
//! A record stating calories with no protein, carbohydrate, or fat is structurally invalid
//! and capped at [`STRUCTURALLY_INVALID_SCORE`]. A record whose stated calories disagree with
//! the 4/4/9 Atwater estimate by more than [`ENERGY_TOLERANCE`] loses
//! [`ENERGY_MISMATCH_PENALTY`] from its cap. Applying the cap twice changes nothing.

use serde::{Deserialize, Serialize};

use crate::constants::quality::{
    ENERGY_MISMATCH_PENALTY, ENERGY_TOLERANCE, KCAL_PER_G_CARBS, KCAL_PER_G_FAT,
    KCAL_PER_G_PROTEIN, STRUCTURALLY_INVALID_SCORE,
};
use crate::models::{CatalogRecord, Nutrient, NutrientSet};

/// Outcome of checking a nutrient profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Calories > 0 implies at least one macro > 0
    pub structurally_valid: bool,
    /// Stated calories lie within tolerance of the macro-derived estimate
    pub energy_plausible: bool,
    /// Highest quality score the record may carry
    pub score_cap: f64,
}

/// Structural macro validation: non-zero calories require at least one non-zero macro
#[must_use]
pub fn validate_macros(nutrients: &NutrientSet) -> bool {
    nutrients.get_scaled(Nutrient::Calories) <= 0
        || Nutrient::MACROS
            .iter()
            .any(|m| nutrients.get_scaled(*m) > 0)
}

/// Energy estimate from macros using Atwater factors
#[must_use]
pub fn atwater_calories(nutrients: &NutrientSet) -> f64 {
    nutrients.protein_g().mul_add(
        KCAL_PER_G_PROTEIN,
        nutrients
            .carbs_g()
            .mul_add(KCAL_PER_G_CARBS, nutrients.fat_g() * KCAL_PER_G_FAT),
    )
}

fn energy_plausible(nutrients: &NutrientSet) -> bool {
    let stated = nutrients.calories();
    if stated <= 0.0 {
        return true;
    }
    let estimated = atwater_calories(nutrients);
    ((stated - estimated).abs() / stated) <= ENERGY_TOLERANCE
}

/// Assess a nutrient profile
#[must_use]
pub fn assess(nutrients: &NutrientSet) -> QualityAssessment {
    let structurally_valid = validate_macros(nutrients);
    let energy_plausible = energy_plausible(nutrients);
    let score_cap = if !structurally_valid {
        STRUCTURALLY_INVALID_SCORE
    } else if energy_plausible {
        1.0
    } else {
        1.0 - ENERGY_MISMATCH_PENALTY
    };
    QualityAssessment {
        structurally_valid,
        energy_plausible,
        score_cap,
    }
}

/// Score a record would carry after clamping its current score to its cap
#[must_use]
pub fn capped_score(record: &CatalogRecord) -> f64 {
    record.quality_score.min(assess(&record.nutrients).score_cap)
}
