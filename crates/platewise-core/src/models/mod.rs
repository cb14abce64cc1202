// ABOUTME: Nutrition data models shared across the Platewise workspace
// ABOUTME: Re-exports nutrient sets, catalog records, meals, lines, and day summaries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

/// Catalog record model
pub mod catalog;
/// Meal, line, and day summary models
pub mod meal;
/// Fixed-point nutrient sets
pub mod nutrients;

pub use catalog::{CatalogRecord, HouseholdUnit, Provenance};
pub use meal::{DaySummary, EditedField, LoggedLine, Meal, MealDetails, MealType, ServingView};
pub use nutrients::{Nutrient, NutrientSet, NutrientValues, NUTRIENT_COUNT};
