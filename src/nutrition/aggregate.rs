// ABOUTME: Aggregate maintainer folding line events into meal totals as exact deltas
// ABOUTME: Runs inside the caller's transaction so totals and lines always commit together
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::database::{meals, summaries};
use crate::errors::AppResult;
use crate::logging::EngineLogger;
use crate::models::{DaySummary, NutrientSet};

/// A change to one line of a meal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LineEvent {
    /// A line was added
    Created {
        /// Nutrients of the new line
        nutrients: NutrientSet,
    },
    /// A line's quantity or food changed
    Updated {
        /// Nutrients before the change
        old: NutrientSet,
        /// Nutrients after the change
        new: NutrientSet,
    },
    /// A line was removed
    Deleted {
        /// Nutrients of the removed line
        nutrients: NutrientSet,
    },
}

impl LineEvent {
    /// Amount to add to the meal totals
    #[must_use]
    pub fn delta(&self) -> NutrientSet {
        match *self {
            Self::Created { nutrients } => nutrients,
            Self::Updated { old, new } => new - old,
            Self::Deleted { nutrients } => -nutrients,
        }
    }

    /// Label for logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created { .. } => "created",
            Self::Updated { .. } => "updated",
            Self::Deleted { .. } => "deleted",
        }
    }
}

/// Fold a line event into its meal's stored totals
///
/// Must run in the same transaction as the line write. A zero delta skips the write.
///
/// # Errors
///
/// Returns `ResourceNotFound` if the meal does not exist, `DatabaseError` on write failure
pub async fn apply_line_event(
    conn: &mut SqliteConnection,
    meal_id: Uuid,
    line_id: Uuid,
    event: LineEvent,
) -> AppResult<NutrientSet> {
    let delta = event.delta();
    if !delta.is_zero() {
        meals::apply_totals_delta(conn, meal_id, &delta).await?;
    }
    EngineLogger::log_line_event(meal_id, line_id, event.as_str(), delta.calories());
    Ok(delta)
}

/// Recompute a user's day summary from scratch
///
/// # Errors
///
/// Returns `DatabaseError` on query or write failure
pub async fn refresh_day(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    date: NaiveDate,
) -> AppResult<DaySummary> {
    let summary = summaries::recompute_day(conn, user_id, date).await?;
    EngineLogger::log_day_refresh(
        user_id,
        &date.to_string(),
        summary.meal_count,
        summary.totals.calories(),
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_delta_is_new_minus_old() {
        let old = NutrientSet::from_macros(114.5, 4.0, 20.0, 1.5);
        let new = NutrientSet::from_macros(229.0, 8.0, 40.0, 3.0);
        let delta = LineEvent::Updated { old, new }.delta();
        assert_eq!(old + delta, new);
    }

    #[test]
    fn test_create_then_delete_cancels() {
        let nutrients = NutrientSet::from_macros(187.1, 35.2, 0.0, 4.1);
        let total = LineEvent::Created { nutrients }.delta() + LineEvent::Deleted { nutrients }.delta();
        assert!(total.is_zero());
    }
}
