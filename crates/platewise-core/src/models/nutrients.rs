// ABOUTME: Fixed-point nutrient value set used by catalog records, lines, and aggregates
// ABOUTME: Exact elementwise arithmetic so meal totals always equal the sum of their lines
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Nutrient values are stored as integer hundredths of their display unit. Floating-point
//! accumulation of `+=`/`-=` deltas drifts (`186.8 + 100.0 - 186.8 != 100.0`); integer
//! hundredths do not, which keeps the aggregate invariant exact rather than approximate.

use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use serde::{Deserialize, Serialize};

use crate::constants::precision::{MAX_DECIMALS, NUTRIENT_SCALE};

/// Number of tracked nutrients
pub const NUTRIENT_COUNT: usize = 8;

/// A tracked nutrient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nutrient {
    /// Energy in kilocalories
    Calories,
    /// Protein in grams
    Protein,
    /// Carbohydrate in grams
    Carbohydrate,
    /// Total fat in grams
    Fat,
    /// Dietary fiber in grams
    Fiber,
    /// Total sugars in grams
    Sugar,
    /// Saturated fat in grams
    SaturatedFat,
    /// Sodium in milligrams
    Sodium,
}

impl Nutrient {
    /// All tracked nutrients, in storage order
    pub const ALL: [Self; NUTRIENT_COUNT] = [
        Self::Calories,
        Self::Protein,
        Self::Carbohydrate,
        Self::Fat,
        Self::Fiber,
        Self::Sugar,
        Self::SaturatedFat,
        Self::Sodium,
    ];

    /// The three energy-bearing macronutrients
    pub const MACROS: [Self; 3] = [Self::Protein, Self::Carbohydrate, Self::Fat];

    /// Position in [`Nutrient::ALL`]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Storage column suffix
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Calories => "calories_kcal",
            Self::Protein => "protein_g",
            Self::Carbohydrate => "carbs_g",
            Self::Fat => "fat_g",
            Self::Fiber => "fiber_g",
            Self::Sugar => "sugar_g",
            Self::SaturatedFat => "saturated_fat_g",
            Self::Sodium => "sodium_mg",
        }
    }

    /// Display unit
    #[must_use]
    pub const fn unit_label(self) -> &'static str {
        match self {
            Self::Calories => "kcal",
            Self::Sodium => "mg",
            _ => "g",
        }
    }
}

/// Per-nutrient amounts in fixed-point hundredths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "NutrientValues", into = "NutrientValues")]
pub struct NutrientSet {
    scaled: [i64; NUTRIENT_COUNT],
}

/// Convert a display value to fixed-point hundredths
#[must_use]
pub fn to_scaled(value: f64) -> i64 {
    (value * NUTRIENT_SCALE as f64).round() as i64
}

/// Convert fixed-point hundredths to a display value
#[must_use]
pub fn from_scaled(scaled: i64) -> f64 {
    scaled as f64 / NUTRIENT_SCALE as f64
}

impl NutrientSet {
    /// All-zero set
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            scaled: [0; NUTRIENT_COUNT],
        }
    }

    /// Build a set from the four headline values; the rest start at zero
    #[must_use]
    pub fn from_macros(calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self::zero()
            .with(Nutrient::Calories, calories)
            .with(Nutrient::Protein, protein_g)
            .with(Nutrient::Carbohydrate, carbs_g)
            .with(Nutrient::Fat, fat_g)
    }

    /// Build a set from raw fixed-point storage values
    #[must_use]
    pub const fn from_scaled_array(scaled: [i64; NUTRIENT_COUNT]) -> Self {
        Self { scaled }
    }

    /// Raw fixed-point storage values
    #[must_use]
    pub const fn scaled_array(&self) -> [i64; NUTRIENT_COUNT] {
        self.scaled
    }

    /// Return a copy with one nutrient set to `value`
    #[must_use]
    pub fn with(mut self, nutrient: Nutrient, value: f64) -> Self {
        self.set(nutrient, value);
        self
    }

    /// Set one nutrient
    pub fn set(&mut self, nutrient: Nutrient, value: f64) {
        self.scaled[nutrient.index()] = to_scaled(value);
    }

    /// Get one nutrient as a display value
    #[must_use]
    pub fn get(&self, nutrient: Nutrient) -> f64 {
        from_scaled(self.scaled[nutrient.index()])
    }

    /// Get one nutrient as raw fixed-point hundredths
    #[must_use]
    pub const fn get_scaled(&self, nutrient: Nutrient) -> i64 {
        self.scaled[nutrient.index()]
    }

    /// Energy in kcal
    #[must_use]
    pub fn calories(&self) -> f64 {
        self.get(Nutrient::Calories)
    }

    /// Protein in grams
    #[must_use]
    pub fn protein_g(&self) -> f64 {
        self.get(Nutrient::Protein)
    }

    /// Carbohydrate in grams
    #[must_use]
    pub fn carbs_g(&self) -> f64 {
        self.get(Nutrient::Carbohydrate)
    }

    /// Fat in grams
    #[must_use]
    pub fn fat_g(&self) -> f64 {
        self.get(Nutrient::Fat)
    }

    /// True when every nutrient is zero
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.scaled.iter().all(|v| *v == 0)
    }

    /// Nutrients holding a negative amount
    #[must_use]
    pub fn negative_nutrients(&self) -> Vec<Nutrient> {
        Nutrient::ALL
            .into_iter()
            .filter(|n| self.scaled[n.index()] < 0)
            .collect()
    }

    /// Scale every nutrient by `multiplier`, rounding each to `decimals` places
    ///
    /// `decimals` is clamped to the fixed-point resolution, so at full precision a
    /// multiplier of 1.0 reproduces the set exactly. Coarser precision rounds reference
    /// values like any other quantity.
    #[must_use]
    pub fn scaled_by(&self, multiplier: f64, decimals: u32) -> Self {
        let decimals = decimals.min(MAX_DECIMALS);
        let step = 10_i64.pow(MAX_DECIMALS - decimals);
        let mut out = Self::zero();
        for (slot, value) in out.scaled.iter_mut().zip(self.scaled) {
            let exact = from_scaled(value) * multiplier;
            let rounded = (exact * 10_f64.powi(decimals as i32)).round() as i64;
            *slot = rounded * step;
        }
        out
    }

    /// Iterate `(nutrient, display value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (Nutrient, f64)> + '_ {
        Nutrient::ALL.into_iter().map(|n| (n, self.get(n)))
    }
}

impl Add for NutrientSet {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += rhs;
        self
    }
}

impl AddAssign for NutrientSet {
    fn add_assign(&mut self, rhs: Self) {
        for (a, b) in self.scaled.iter_mut().zip(rhs.scaled) {
            *a += b;
        }
    }
}

impl Sub for NutrientSet {
    type Output = Self;

    fn sub(mut self, rhs: Self) -> Self::Output {
        self -= rhs;
        self
    }
}

impl SubAssign for NutrientSet {
    fn sub_assign(&mut self, rhs: Self) {
        for (a, b) in self.scaled.iter_mut().zip(rhs.scaled) {
            *a -= b;
        }
    }
}

impl Neg for NutrientSet {
    type Output = Self;

    fn neg(mut self) -> Self::Output {
        for v in &mut self.scaled {
            *v = -*v;
        }
        self
    }
}

impl Sum for NutrientSet {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for NutrientSet {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, n| acc + *n)
    }
}

/// Serialized shape of a nutrient set (display units)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct NutrientValues {
    /// Energy in kcal
    #[serde(default)]
    pub calories_kcal: f64,
    /// Protein in grams
    #[serde(default)]
    pub protein_g: f64,
    /// Carbohydrate in grams
    #[serde(default)]
    pub carbs_g: f64,
    /// Fat in grams
    #[serde(default)]
    pub fat_g: f64,
    /// Fiber in grams
    #[serde(default)]
    pub fiber_g: f64,
    /// Sugar in grams
    #[serde(default)]
    pub sugar_g: f64,
    /// Saturated fat in grams
    #[serde(default)]
    pub saturated_fat_g: f64,
    /// Sodium in milligrams
    #[serde(default)]
    pub sodium_mg: f64,
}

impl From<NutrientValues> for NutrientSet {
    fn from(v: NutrientValues) -> Self {
        Self::zero()
            .with(Nutrient::Calories, v.calories_kcal)
            .with(Nutrient::Protein, v.protein_g)
            .with(Nutrient::Carbohydrate, v.carbs_g)
            .with(Nutrient::Fat, v.fat_g)
            .with(Nutrient::Fiber, v.fiber_g)
            .with(Nutrient::Sugar, v.sugar_g)
            .with(Nutrient::SaturatedFat, v.saturated_fat_g)
            .with(Nutrient::Sodium, v.sodium_mg)
    }
}

impl From<NutrientSet> for NutrientValues {
    fn from(s: NutrientSet) -> Self {
        Self {
            calories_kcal: s.get(Nutrient::Calories),
            protein_g: s.get(Nutrient::Protein),
            carbs_g: s.get(Nutrient::Carbohydrate),
            fat_g: s.get(Nutrient::Fat),
            fiber_g: s.get(Nutrient::Fiber),
            sugar_g: s.get(Nutrient::Sugar),
            saturated_fat_g: s.get(Nutrient::SaturatedFat),
            sodium_mg: s.get(Nutrient::Sodium),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_subtract_is_exact() {
        let first = NutrientSet::from_macros(186.8, 35.1, 0.0, 4.0);
        let second = NutrientSet::from_macros(100.0, 2.0, 20.0, 1.5);

        let mut totals = NutrientSet::zero();
        totals += first;
        totals += second;
        assert!((totals.calories() - 286.8).abs() < f64::EPSILON);

        totals -= first;
        assert_eq!(totals, second);
        assert!((totals.calories() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scaled_by_rounds_to_precision() {
        let per_100g = NutrientSet::from_macros(165.0, 31.0, 0.0, 3.6);
        let line = per_100g.scaled_by(1.134, 1);
        assert_eq!(line.get_scaled(Nutrient::Calories), 18_710);
        assert_eq!(line.get_scaled(Nutrient::Protein), 3_520);
        assert_eq!(line.get_scaled(Nutrient::Fat), 410);
    }

    #[test]
    fn test_scaled_by_identity() {
        let set = NutrientSet::from_macros(123.45, 6.78, 9.1, 2.35);
        assert_eq!(set.scaled_by(1.0, MAX_DECIMALS), set);
    }

    #[test]
    fn test_scaled_by_one_still_rounds_to_precision() {
        let set = NutrientSet::from_macros(123.45, 6.78, 9.1, 2.35);
        let whole = set.scaled_by(1.0, 0);
        assert_eq!(whole.get_scaled(Nutrient::Calories), 12_300);
        assert_eq!(whole.get_scaled(Nutrient::Protein), 700);
        assert_eq!(whole.get_scaled(Nutrient::Carbohydrate), 900);
        assert_eq!(whole.get_scaled(Nutrient::Fat), 200);
        assert_eq!(whole, set.scaled_by(1.000_000_1, 0));
    }

    #[test]
    fn test_sum_and_negation() {
        let a = NutrientSet::from_macros(10.0, 1.0, 1.0, 1.0);
        let b = NutrientSet::from_macros(20.0, 2.0, 2.0, 2.0);
        let total: NutrientSet = [a, b].iter().sum();
        assert_eq!(total, a + b);
        assert!((a + -a).is_zero());
    }

    #[test]
    fn test_serde_uses_display_units() {
        let set = NutrientSet::from_macros(52.0, 0.26, 13.81, 0.17).with(Nutrient::Sodium, 1.0);
        let json = serde_json::to_value(set).unwrap();
        assert!((json["carbs_g"].as_f64().unwrap() - 13.81).abs() < 1e-9);
        assert!((json["sodium_mg"].as_f64().unwrap() - 1.0).abs() < 1e-9);

        let back: NutrientSet = serde_json::from_value(json).unwrap();
        assert_eq!(back, set);
    }
}
