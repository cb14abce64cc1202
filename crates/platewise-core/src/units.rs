// ABOUTME: Static unit conversion table mapping named units to grams or discrete counts
// ABOUTME: Pure conversion functions with explicit UnsupportedUnit / IncompatibleUnit failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! # Unit Conversion Table
//!
//! Every unit maps onto one of two canonical bases:
//!
//! - **grams** for mass and volume units
//! - **count** for discrete units (serving, piece, slice, item, portion)
//!
//! Volume units are converted to grams at 1 ml ≈ 1 g. This is an approximation that holds
//! for water-like liquids only; it is a known precision limitation of the table and callers
//! that need density-aware conversion must go through a record's household unit instead.
//!
//! Discrete units convert 1:1 with themselves and cannot be converted to grams or to each
//! other: a "slice" of one food has nothing in common with a "slice" of another.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::constants::precision::QUANTITY_EPSILON;
use crate::errors::{AppError, AppResult};

/// Mass conversion constants (to grams)
const GRAMS_PER_MG: f64 = 0.001;
const GRAMS_PER_KG: f64 = 1000.0;
const GRAMS_PER_OZ: f64 = 28.3495;
const GRAMS_PER_LB: f64 = 453.592;

/// Volume conversion constants (to milliliters, then 1 ml ≈ 1 g)
const ML_PER_L: f64 = 1000.0;
const ML_PER_TSP: f64 = 5.0;
const ML_PER_TBSP: f64 = 15.0;
const ML_PER_CUP: f64 = 240.0;
const ML_PER_FL_OZ: f64 = 29.5735;
const GRAMS_PER_ML: f64 = 1.0;

/// Physical dimension of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Mass units convert exactly to grams
    Mass,
    /// Volume units convert to grams through the 1 ml ≈ 1 g approximation
    Volume,
    /// Countable units with no gram equivalent
    Discrete,
}

/// Canonical base a unit converts into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseUnit {
    /// Grams (mass and volume-as-mass)
    Grams,
    /// Discrete count
    Count,
}

/// A quantity expressed in its canonical base unit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseQuantity {
    /// Amount in the base unit
    pub amount: f64,
    /// The base unit
    pub base: BaseUnit,
}

/// Measurement unit understood by the conversion table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// Milligrams
    Milligrams,
    /// Grams (mass base unit)
    Grams,
    /// Kilograms
    Kilograms,
    /// Avoirdupois ounces (28.3495 g)
    Ounces,
    /// Pounds (453.592 g)
    Pounds,
    /// Milliliters
    Milliliters,
    /// Liters (1000 ml)
    Liters,
    /// Teaspoons (5 ml)
    Teaspoons,
    /// Tablespoons (15 ml)
    Tablespoons,
    /// US cups (240 ml)
    Cups,
    /// US fluid ounces (29.5735 ml)
    FluidOunces,
    /// Generic serving
    Serving,
    /// Generic piece
    Piece,
    /// Slice
    Slice,
    /// Item
    Item,
    /// Portion
    Portion,
}

impl Unit {
    /// All units in the table
    pub const ALL: [Self; 16] = [
        Self::Milligrams,
        Self::Grams,
        Self::Kilograms,
        Self::Ounces,
        Self::Pounds,
        Self::Milliliters,
        Self::Liters,
        Self::Teaspoons,
        Self::Tablespoons,
        Self::Cups,
        Self::FluidOunces,
        Self::Serving,
        Self::Piece,
        Self::Slice,
        Self::Item,
        Self::Portion,
    ];

    /// Physical dimension of this unit
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        match self {
            Self::Milligrams | Self::Grams | Self::Kilograms | Self::Ounces | Self::Pounds => {
                UnitKind::Mass
            }
            Self::Milliliters
            | Self::Liters
            | Self::Teaspoons
            | Self::Tablespoons
            | Self::Cups
            | Self::FluidOunces => UnitKind::Volume,
            Self::Serving | Self::Piece | Self::Slice | Self::Item | Self::Portion => {
                UnitKind::Discrete
            }
        }
    }

    /// Check if this unit is a discrete count
    #[must_use]
    pub const fn is_discrete(&self) -> bool {
        matches!(self.kind(), UnitKind::Discrete)
    }

    /// Check if this unit can be converted to grams
    #[must_use]
    pub const fn is_gram_convertible(&self) -> bool {
        !self.is_discrete()
    }

    /// Canonical base for this unit
    #[must_use]
    pub const fn base(&self) -> BaseUnit {
        if self.is_discrete() {
            BaseUnit::Count
        } else {
            BaseUnit::Grams
        }
    }

    /// Grams represented by one of this unit, or `None` for discrete units
    #[must_use]
    pub fn grams_per_unit(&self) -> Option<f64> {
        match self {
            Self::Milligrams => Some(GRAMS_PER_MG),
            Self::Grams => Some(1.0),
            Self::Kilograms => Some(GRAMS_PER_KG),
            Self::Ounces => Some(GRAMS_PER_OZ),
            Self::Pounds => Some(GRAMS_PER_LB),
            Self::Milliliters => Some(GRAMS_PER_ML),
            Self::Liters => Some(ML_PER_L * GRAMS_PER_ML),
            Self::Teaspoons => Some(ML_PER_TSP * GRAMS_PER_ML),
            Self::Tablespoons => Some(ML_PER_TBSP * GRAMS_PER_ML),
            Self::Cups => Some(ML_PER_CUP * GRAMS_PER_ML),
            Self::FluidOunces => Some(ML_PER_FL_OZ * GRAMS_PER_ML),
            Self::Serving | Self::Piece | Self::Slice | Self::Item | Self::Portion => None,
        }
    }

    /// Get the abbreviation for display and storage
    #[must_use]
    pub const fn abbreviation(&self) -> &'static str {
        match self {
            Self::Milligrams => "mg",
            Self::Grams => "g",
            Self::Kilograms => "kg",
            Self::Ounces => "oz",
            Self::Pounds => "lb",
            Self::Milliliters => "ml",
            Self::Liters => "l",
            Self::Teaspoons => "tsp",
            Self::Tablespoons => "tbsp",
            Self::Cups => "cup",
            Self::FluidOunces => "fl oz",
            Self::Serving => "serving",
            Self::Piece => "piece",
            Self::Slice => "slice",
            Self::Item => "item",
            Self::Portion => "portion",
        }
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.abbreviation())
    }
}

impl FromStr for Unit {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_unit(s)
    }
}

/// Unit names and spellings, keyed by their normalized (lowercase, singular) form
static UNIT_ALIASES: LazyLock<HashMap<&'static str, Unit>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // === Mass ===
    for alias in ["mg", "milligram", "milligramme"] {
        m.insert(alias, Unit::Milligrams);
    }
    for alias in ["g", "gr", "gram", "gramme"] {
        m.insert(alias, Unit::Grams);
    }
    for alias in ["kg", "kilo", "kilogram", "kilogramme"] {
        m.insert(alias, Unit::Kilograms);
    }
    for alias in ["oz", "ounce"] {
        m.insert(alias, Unit::Ounces);
    }
    for alias in ["lb", "pound"] {
        m.insert(alias, Unit::Pounds);
    }

    // === Volume ===
    for alias in ["ml", "milliliter", "millilitre"] {
        m.insert(alias, Unit::Milliliters);
    }
    for alias in ["l", "liter", "litre"] {
        m.insert(alias, Unit::Liters);
    }
    for alias in ["tsp", "teaspoon"] {
        m.insert(alias, Unit::Teaspoons);
    }
    for alias in ["tbsp", "tb", "tbl", "tablespoon"] {
        m.insert(alias, Unit::Tablespoons);
    }
    m.insert("cup", Unit::Cups);
    for alias in ["fl oz", "floz", "fl. oz", "fluid ounce"] {
        m.insert(alias, Unit::FluidOunces);
    }

    // === Discrete ===
    m.insert("serving", Unit::Serving);
    for alias in ["piece", "pc"] {
        m.insert(alias, Unit::Piece);
    }
    m.insert("slice", Unit::Slice);
    for alias in ["item", "each", "ea"] {
        m.insert(alias, Unit::Item);
    }
    m.insert("portion", Unit::Portion);

    m
});

/// Normalize a unit or household-unit name for comparison
///
/// Lowercases, trims, collapses inner whitespace, drops a trailing period, and reduces
/// common English plurals to their singular form ("slices" → "slice", "patties" → "patty").
#[must_use]
pub fn normalize_unit_name(name: &str) -> String {
    let lowered = name.trim().trim_end_matches('.').to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    singularize(&collapsed)
}

fn singularize(word: &str) -> String {
    if word.len() <= 2 {
        return word.to_owned();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    for suffix in ["sses", "ches", "shes", "xes", "oes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_owned();
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_owned();
    }
    word.to_owned()
}

/// Check whether two unit names refer to the same unit after normalization
#[must_use]
pub fn unit_names_match(a: &str, b: &str) -> bool {
    normalize_unit_name(a) == normalize_unit_name(b)
}

/// Parse a unit name
///
/// # Errors
///
/// Returns `UnsupportedUnit` if the name is not in the conversion table. Unknown units are
/// never silently defaulted to grams or servings.
pub fn parse_unit(name: &str) -> AppResult<Unit> {
    let normalized = normalize_unit_name(name);
    if let Some(unit) = UNIT_ALIASES.get(normalized.as_str()) {
        return Ok(*unit);
    }
    Err(AppError::unsupported_unit(name.trim()))
}

fn validate_quantity(quantity: f64) -> AppResult<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(AppError::invalid_input(format!(
            "quantity must be a finite non-negative number, got {quantity}"
        )));
    }
    Ok(())
}

/// Convert a quantity in a mass or volume unit to grams
///
/// # Errors
///
/// Returns `InvalidInput` if the quantity is negative or not finite.
/// Returns `IncompatibleUnit` if the unit is discrete.
pub fn to_grams(quantity: f64, unit: Unit) -> AppResult<f64> {
    validate_quantity(quantity)?;
    let factor = unit.grams_per_unit().ok_or_else(|| {
        AppError::incompatible_unit(format!("'{unit}' is a discrete unit with no gram weight"))
    })?;
    Ok(quantity * factor)
}

/// Convert grams to a quantity in a mass or volume unit
///
/// # Errors
///
/// Returns `InvalidInput` if the gram amount is negative or not finite.
/// Returns `IncompatibleUnit` if the unit is discrete.
pub fn from_grams(grams: f64, unit: Unit) -> AppResult<f64> {
    validate_quantity(grams)?;
    let factor = unit.grams_per_unit().ok_or_else(|| {
        AppError::incompatible_unit(format!("'{unit}' is a discrete unit with no gram weight"))
    })?;
    Ok(grams / factor)
}

/// Convert a quantity into its canonical base (grams or count)
///
/// # Errors
///
/// Returns `InvalidInput` if the quantity is negative or not finite.
pub fn to_base(quantity: f64, unit: Unit) -> AppResult<BaseQuantity> {
    validate_quantity(quantity)?;
    match unit.grams_per_unit() {
        Some(factor) => Ok(BaseQuantity {
            amount: quantity * factor,
            base: BaseUnit::Grams,
        }),
        None => Ok(BaseQuantity {
            amount: quantity,
            base: BaseUnit::Count,
        }),
    }
}

/// Convert a quantity between two units
///
/// Mass and volume units convert freely through grams. A discrete unit converts only to
/// itself.
///
/// # Errors
///
/// Returns `IncompatibleUnit` when either side is discrete and the units differ.
pub fn convert(quantity: f64, from: Unit, to: Unit) -> AppResult<f64> {
    validate_quantity(quantity)?;
    if from == to {
        return Ok(quantity);
    }
    if from.is_discrete() || to.is_discrete() {
        return Err(AppError::incompatible_unit(format!(
            "cannot convert '{from}' to '{to}'"
        )));
    }
    from_grams(to_grams(quantity, from)?, to)
}

/// Compare two quantities with the shared floating-point tolerance
#[must_use]
pub fn quantities_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= QUANTITY_EPSILON * a.abs().max(b.abs()).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_parse_unit_spellings() {
        assert_eq!(parse_unit("g").unwrap(), Unit::Grams);
        assert_eq!(parse_unit("Grams").unwrap(), Unit::Grams);
        assert_eq!(parse_unit(" Tablespoons ").unwrap(), Unit::Tablespoons);
        assert_eq!(parse_unit("lbs").unwrap(), Unit::Pounds);
        assert_eq!(parse_unit("fl oz").unwrap(), Unit::FluidOunces);
        assert_eq!(parse_unit("slices").unwrap(), Unit::Slice);
        assert_eq!(parse_unit("servings").unwrap(), Unit::Serving);
        assert_eq!("cups".parse::<Unit>().unwrap(), Unit::Cups);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let err = parse_unit("handful").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedUnit);
    }

    #[test]
    fn test_mass_and_volume_factors() {
        assert!((to_grams(1.0, Unit::Ounces).unwrap() - 28.3495).abs() < 1e-9);
        assert!((to_grams(1.0, Unit::Pounds).unwrap() - 453.592).abs() < 1e-9);
        assert!((to_grams(1.0, Unit::Tablespoons).unwrap() - 15.0).abs() < 1e-9);
        assert!((to_grams(1.0, Unit::Cups).unwrap() - 240.0).abs() < 1e-9);
        assert!((to_grams(1.0, Unit::Liters).unwrap() - 1000.0).abs() < 1e-9);
        assert!((to_grams(250.0, Unit::Milligrams).unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_discrete_units_have_no_gram_weight() {
        let err = to_grams(2.0, Unit::Slice).unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompatibleUnit);
        let err = from_grams(20.0, Unit::Serving).unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompatibleUnit);
    }

    #[test]
    fn test_discrete_converts_only_to_itself() {
        assert!((convert(3.0, Unit::Piece, Unit::Piece).unwrap() - 3.0).abs() < f64::EPSILON);
        assert_eq!(
            convert(3.0, Unit::Piece, Unit::Slice).unwrap_err().code,
            ErrorCode::IncompatibleUnit
        );
        assert_eq!(
            convert(3.0, Unit::Piece, Unit::Grams).unwrap_err().code,
            ErrorCode::IncompatibleUnit
        );
    }

    #[test]
    fn test_to_base() {
        let base = to_base(2.0, Unit::Cups).unwrap();
        assert_eq!(base.base, BaseUnit::Grams);
        assert!((base.amount - 480.0).abs() < 1e-9);

        let base = to_base(2.0, Unit::Item).unwrap();
        assert_eq!(base.base, BaseUnit::Count);
        assert!((base.amount - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_round_trip_through_grams() {
        for unit in Unit::ALL.into_iter().filter(Unit::is_gram_convertible) {
            for grams in [0.5, 1.0, 28.35, 113.4, 999.99, 12_345.6] {
                let back = to_grams(from_grams(grams, unit).unwrap(), unit).unwrap();
                assert!(quantities_equal(back, grams), "{unit}: {grams} -> {back}");
            }
        }
    }

    #[test]
    fn test_negative_quantity_rejected() {
        assert_eq!(
            to_grams(-1.0, Unit::Grams).unwrap_err().code,
            ErrorCode::InvalidInput
        );
        assert_eq!(
            to_grams(f64::NAN, Unit::Grams).unwrap_err().code,
            ErrorCode::InvalidInput
        );
    }

    #[test]
    fn test_normalize_unit_name() {
        assert_eq!(normalize_unit_name("Slices"), "slice");
        assert_eq!(normalize_unit_name("patties"), "patty");
        assert_eq!(normalize_unit_name("glasses"), "glass");
        assert_eq!(normalize_unit_name("glass"), "glass");
        assert_eq!(normalize_unit_name("oz."), "oz");
        assert!(unit_names_match("Scoops", "scoop"));
        assert!(!unit_names_match("scoop", "slice"));
    }
}
