// ABOUTME: Day summary persistence: full re-sum of a user's meals for one calendar date
// ABOUTME: Recomputation upserts one row per (user, date) and is safe to repeat
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{bind_nutrients, read_nutrients, Database, NUTRIENT_COLUMNS, NUTRIENT_PLACEHOLDERS};
use crate::errors::AppResult;
use crate::models::{DaySummary, Nutrient};

static SUM_MEALS_SQL: LazyLock<String> = LazyLock::new(|| {
    let sums = Nutrient::ALL
        .iter()
        .map(|n| format!("COALESCE(SUM({col}), 0) AS {col}", col = n.column()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {sums}, COUNT(*) AS meal_count FROM meals WHERE user_id = ? AND logged_on = ?")
});

static UPSERT_SUMMARY_SQL: LazyLock<String> = LazyLock::new(|| {
    let updates = Nutrient::ALL
        .iter()
        .map(|n| format!("{col} = excluded.{col}", col = n.column()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO day_summaries (user_id, date, {}, meal_count, updated_at) \
         VALUES (?, ?, {}, ?, ?) \
         ON CONFLICT(user_id, date) DO UPDATE SET {updates}, \
         meal_count = excluded.meal_count, updated_at = excluded.updated_at",
        *NUTRIENT_COLUMNS, *NUTRIENT_PLACEHOLDERS
    )
});

/// Re-sum every meal the user logged on `date` and store the result
///
/// # Errors
///
/// Returns `DatabaseError` on query or write failure
pub async fn recompute_day(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    date: NaiveDate,
) -> AppResult<DaySummary> {
    let row = sqlx::query(SUM_MEALS_SQL.as_str())
        .bind(user_id.to_string())
        .bind(date)
        .fetch_one(&mut *conn)
        .await?;
    let summary = DaySummary {
        user_id,
        date,
        totals: read_nutrients(&row)?,
        meal_count: row.try_get("meal_count")?,
        updated_at: Utc::now(),
    };

    let query = sqlx::query(UPSERT_SUMMARY_SQL.as_str())
        .bind(user_id.to_string())
        .bind(date);
    bind_nutrients(query, &summary.totals)
        .bind(summary.meal_count)
        .bind(summary.updated_at)
        .execute(&mut *conn)
        .await?;

    Ok(summary)
}

/// Stored summary for a user and date; an empty summary when nothing was logged
///
/// # Errors
///
/// Returns `DatabaseError` on query failure
pub async fn get_day_summary(
    conn: &mut SqliteConnection,
    user_id: Uuid,
    date: NaiveDate,
) -> AppResult<DaySummary> {
    let sql = format!(
        "SELECT {}, meal_count, updated_at FROM day_summaries WHERE user_id = ? AND date = ?",
        *NUTRIENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(DaySummary {
            user_id,
            date,
            totals: read_nutrients(&row)?,
            meal_count: row.try_get("meal_count")?,
            updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
        }),
        None => Ok(DaySummary::empty(user_id, date)),
    }
}

impl Database {
    /// Stored day summary for a user and date
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query failure
    pub async fn get_day_summary(&self, user_id: Uuid, date: NaiveDate) -> AppResult<DaySummary> {
        let mut conn = self.pool().acquire().await?;
        get_day_summary(&mut conn, user_id, date).await
    }

    /// Recompute a day summary outside any mutation transaction
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query or write failure
    pub async fn recompute_day(&self, user_id: Uuid, date: NaiveDate) -> AppResult<DaySummary> {
        let mut conn = self.pool().acquire().await?;
        recompute_day(&mut conn, user_id, date).await
    }
}
