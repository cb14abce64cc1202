// ABOUTME: Nutrition domain: quantity resolution, line nutrients, aggregation, and food resolution
// ABOUTME: The engine module ties these together behind one transactional facade
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

/// Meal totals deltas and day summary refresh
pub mod aggregate;
/// Per-line nutrient scaling
pub mod calculator;
/// Catalog search, parser, and estimator contracts
pub mod collaborators;
/// Transactional engine facade
pub mod engine;
/// Typical-portion fallback estimates
pub mod estimates;
/// Macro validation and quality score caps
pub mod quality;
/// Quantity and unit resolution against a catalog record
pub mod quantity;
/// Matched / Created / Estimated resolution gate
pub mod resolution;
/// Local catalog search
pub mod search;

pub use aggregate::LineEvent;
pub use collaborators::{
    CatalogCandidate, CatalogSearch, FoodParser, NutritionEstimate, NutritionEstimator,
    ParsedFood, SimpleFoodParser,
};
pub use engine::{LoggedFood, MealAudit, NutritionEngine, RescoreReport};
pub use quantity::{reference_serving, resolve_quantity, ResolvedQuantity};
pub use resolution::{Resolution, ResolutionGate, ResolutionOutcome};
pub use search::DatabaseCatalogSearch;
