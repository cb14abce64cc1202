// ABOUTME: Meal, logged line, and day summary models for nutrition logging
// ABOUTME: Lines hold grams as the single authoritative quantity with a derived serving view
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::nutrients::NutrientSet;
use crate::errors::{AppError, AppResult};

/// Type of meal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    /// Breakfast meal
    Breakfast,
    /// Lunch meal
    Lunch,
    /// Dinner meal
    Dinner,
    /// Snack between meals
    Snack,
    /// Unspecified or other meal type
    Other,
}

impl MealType {
    /// Parse meal type from string
    #[must_use]
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "breakfast" => Self::Breakfast,
            "lunch" => Self::Lunch,
            "dinner" => Self::Dinner,
            "snack" => Self::Snack,
            _ => Self::Other,
        }
    }

    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
            Self::Other => "other",
        }
    }
}

/// Which representation of a line's quantity the user typed last
///
/// Input metadata only. Grams are always the authoritative quantity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EditedField {
    /// User typed a serving count ("2 slices", "1.5 cups")
    Serving,
    /// User typed grams directly
    Grams,
}

impl EditedField {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Serving => "serving",
            Self::Grams => "grams",
        }
    }

    /// Parse the storage representation
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown values
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "serving" => Ok(Self::Serving),
            "grams" => Ok(Self::Grams),
            other => Err(AppError::invalid_input(format!("unknown edited field '{other}'"))),
        }
    }
}

/// Serving-form view of a line's quantity, derived from grams
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingView {
    /// Quantity in `unit`
    pub quantity: f64,
    /// Serving unit name
    pub unit: String,
}

impl ServingView {
    /// Serving quantity derived from grams and a serving unit's gram weight
    ///
    /// Returns `None` when there is no serving unit or its weight is not positive.
    #[must_use]
    pub fn from_grams(gram_quantity: f64, unit: Option<&str>, unit_grams: Option<f64>) -> Option<Self> {
        match (unit, unit_grams) {
            (Some(unit), Some(grams)) if grams > 0.0 => Some(Self {
                quantity: gram_quantity / grams,
                unit: unit.to_owned(),
            }),
            _ => None,
        }
    }
}

/// One food within one meal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedLine {
    /// Line identifier
    pub id: Uuid,
    /// Parent meal
    pub meal_id: Uuid,
    /// Referenced catalog record
    pub catalog_id: Uuid,
    /// Insertion position within the meal
    pub position: i64,
    /// Authoritative quantity in grams
    pub gram_quantity: f64,
    /// Serving unit the user entered, when it was not grams
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_unit: Option<String>,
    /// Grams per one `serving_unit`, captured at resolution time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serving_unit_grams: Option<f64>,
    /// Which representation was typed last
    pub last_edited: EditedField,
    /// False when the quantity can only be expressed in servings
    pub gram_editable: bool,
    /// Cached nutrients for `gram_quantity`
    pub nutrients: NutrientSet,
    /// Logged from a best-effort estimate that the user should confirm
    pub needs_clarification: bool,
    /// Estimate confidence, for lines logged from an estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl LoggedLine {
    /// Serving view derived from grams, if the line has a serving unit
    #[must_use]
    pub fn serving(&self) -> Option<ServingView> {
        ServingView::from_grams(self.gram_quantity, self.serving_unit.as_deref(), self.serving_unit_grams)
    }
}

/// A logged meal with its incrementally maintained totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    /// Meal identifier
    pub id: Uuid,
    /// Owning user
    pub user_id: Uuid,
    /// Meal type
    pub meal_type: MealType,
    /// When the meal was eaten
    pub logged_at: DateTime<Utc>,
    /// Calendar date the meal counts towards
    pub logged_on: NaiveDate,
    /// Sum of current lines' cached nutrients
    pub totals: NutrientSet,
    /// Bumped on every mutation; used as the meal-row write lock
    pub revision: i64,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

/// Meal with its lines in insertion order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealDetails {
    /// The meal
    pub meal: Meal,
    /// Lines in insertion order
    pub lines: Vec<LoggedLine>,
}

/// Per-user, per-date sum of meal totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    /// Owning user
    pub user_id: Uuid,
    /// Calendar date
    pub date: NaiveDate,
    /// Sum of the day's meal totals
    pub totals: NutrientSet,
    /// Number of meals on that date
    pub meal_count: i64,
    /// Last recomputation
    pub updated_at: DateTime<Utc>,
}

impl DaySummary {
    /// Summary for a date with no meals
    #[must_use]
    pub fn empty(user_id: Uuid, date: NaiveDate) -> Self {
        Self {
            user_id,
            date,
            totals: NutrientSet::zero(),
            meal_count: 0,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(grams: f64, unit: Option<(&str, f64)>) -> LoggedLine {
        let now = Utc::now();
        LoggedLine {
            id: Uuid::new_v4(),
            meal_id: Uuid::new_v4(),
            catalog_id: Uuid::new_v4(),
            position: 0,
            gram_quantity: grams,
            serving_unit: unit.map(|(name, _)| name.to_owned()),
            serving_unit_grams: unit.map(|(_, g)| g),
            last_edited: EditedField::Serving,
            gram_editable: true,
            nutrients: NutrientSet::zero(),
            needs_clarification: false,
            confidence: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_serving_view_is_derived_from_grams() {
        let view = line(214.0, Some(("slice", 107.0))).serving().unwrap();
        assert!((view.quantity - 2.0).abs() < 1e-12);
        assert_eq!(view.unit, "slice");
        assert!(line(50.0, None).serving().is_none());
    }

    #[test]
    fn test_serving_view_requires_positive_unit_weight() {
        assert!(ServingView::from_grams(30.0, Some("scoop"), Some(0.0)).is_none());
        assert!(ServingView::from_grams(30.0, None, Some(30.0)).is_none());
        let view = ServingView::from_grams(45.0, Some("scoop"), Some(30.0)).unwrap();
        assert!((view.quantity - 1.5).abs() < 1e-12);
        assert_eq!(line(45.0, Some(("scoop", 30.0))).serving(), Some(view));
    }

    #[test]
    fn test_meal_type_parsing() {
        assert_eq!(MealType::from_str_lossy("Dinner"), MealType::Dinner);
        assert_eq!(MealType::from_str_lossy("brunch"), MealType::Other);
        assert_eq!(EditedField::parse("grams").unwrap(), EditedField::Grams);
    }
}
