// ABOUTME: Line-item nutrient calculation: reference nutrients scaled by a quantity multiplier
// ABOUTME: Pure function over a validated catalog record, rounded to the configured precision
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use crate::errors::{AppError, AppResult};
use crate::models::{CatalogRecord, NutrientSet};

/// Nutrients for `multiplier` reference quantities of `record`
///
/// Every tracked nutrient is `round(reference_value × multiplier, decimals)`, including at
/// a multiplier of 1.0. Reference values finer than `decimals` are rounded on every line.
///
/// # Errors
///
/// - `InvalidCatalogRecord` if the reference quantity is not positive or any reference
///   nutrient is negative
/// - `InvalidInput` if the multiplier is negative or not finite
pub fn calculate_line_nutrients(
    record: &CatalogRecord,
    multiplier: f64,
    decimals: u32,
) -> AppResult<NutrientSet> {
    record.reference_grams()?;
    let negative = record.nutrients.negative_nutrients();
    if !negative.is_empty() {
        return Err(AppError::invalid_catalog_record(format!(
            "record '{}' has negative nutrients: {negative:?}",
            record.name
        ))
        .with_resource_id(record.id.to_string()));
    }
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(AppError::invalid_input(format!(
            "multiplier must be a finite non-negative number, got {multiplier}"
        )));
    }
    Ok(record.nutrients.scaled_by(multiplier, decimals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::models::Nutrient;

    #[test]
    fn test_rounds_to_one_decimal() {
        let record = CatalogRecord::new("chicken", 100.0, NutrientSet::from_macros(165.0, 31.0, 0.0, 3.6));
        let nutrients = calculate_line_nutrients(&record, 1.134, 1).unwrap();
        assert!((nutrients.calories() - 187.1).abs() < 1e-9);
        assert!((nutrients.protein_g() - 35.2).abs() < 1e-9);
    }

    #[test]
    fn test_zero_multiplier_gives_zero_nutrients() {
        let record = CatalogRecord::new("rice", 100.0, NutrientSet::from_macros(130.0, 2.7, 28.0, 0.3));
        assert!(calculate_line_nutrients(&record, 0.0, 1).unwrap().is_zero());
    }

    #[test]
    fn test_identity_multiplier_keeps_every_nutrient() {
        let record = CatalogRecord::new(
            "oats",
            40.0,
            NutrientSet::from_macros(150.0, 5.0, 27.0, 2.5).with(Nutrient::Sodium, 2.34),
        );
        let nutrients = calculate_line_nutrients(&record, 1.0, 2).unwrap();
        assert_eq!(nutrients, record.nutrients);
        assert!((nutrients.get(Nutrient::Sodium) - 2.34).abs() < 1e-9);
    }

    #[test]
    fn test_identity_multiplier_rounds_to_configured_precision() {
        let record = CatalogRecord::new(
            "oats",
            40.0,
            NutrientSet::from_macros(150.0, 5.0, 27.0, 2.5).with(Nutrient::Sodium, 2.34),
        );
        let nutrients = calculate_line_nutrients(&record, 1.0, 1).unwrap();
        assert!((nutrients.get(Nutrient::Sodium) - 2.3).abs() < 1e-9);
        assert_eq!(nutrients, calculate_line_nutrients(&record, 1.000_000_1, 1).unwrap());
    }

    #[test]
    fn test_invalid_records_and_multipliers() {
        let broken = CatalogRecord::new("broken", 0.0, NutrientSet::from_macros(10.0, 1.0, 1.0, 0.0));
        assert_eq!(
            calculate_line_nutrients(&broken, 1.0, 1).unwrap_err().code,
            ErrorCode::InvalidCatalogRecord
        );
        let negative = CatalogRecord::new("negative", 100.0, NutrientSet::from_macros(10.0, -1.0, 1.0, 0.0));
        assert_eq!(
            calculate_line_nutrients(&negative, 1.0, 1).unwrap_err().code,
            ErrorCode::InvalidCatalogRecord
        );
        let ok = CatalogRecord::new("ok", 100.0, NutrientSet::from_macros(10.0, 1.0, 1.0, 0.0));
        assert_eq!(
            calculate_line_nutrients(&ok, f64::INFINITY, 1).unwrap_err().code,
            ErrorCode::InvalidInput
        );
    }
}
