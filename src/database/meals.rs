// ABOUTME: Meal persistence: insert, fetch, delete, reschedule, and atomic totals deltas
// ABOUTME: The revision bump doubles as the meal-row write lock taken first in every mutation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{bind_nutrients, read_nutrients, read_uuid, NUTRIENT_COLUMNS, NUTRIENT_PLACEHOLDERS};
use crate::errors::{AppError, AppResult};
use crate::models::{Meal, MealType, Nutrient, NutrientSet};

const MEAL_COLUMNS: &str =
    "id, user_id, meal_type, logged_at, logged_on, revision, created_at, updated_at";

/// `UPDATE meals SET calories_kcal = calories_kcal + ?, ... WHERE id = ?`
static TOTALS_DELTA_SQL: LazyLock<String> = LazyLock::new(|| {
    let assignments = Nutrient::ALL
        .iter()
        .map(|n| format!("{col} = {col} + ?", col = n.column()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("UPDATE meals SET {assignments}, updated_at = ? WHERE id = ?")
});

fn meal_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Meal {id}")).with_resource_id(id.to_string())
}

fn row_to_meal(row: &SqliteRow) -> AppResult<Meal> {
    let meal_type: String = row.try_get("meal_type")?;
    Ok(Meal {
        id: read_uuid(row, "id")?,
        user_id: read_uuid(row, "user_id")?,
        meal_type: MealType::from_str_lossy(&meal_type),
        logged_at: row.try_get::<DateTime<Utc>, _>("logged_at")?,
        logged_on: row.try_get::<NaiveDate, _>("logged_on")?,
        totals: read_nutrients(row)?,
        revision: row.try_get("revision")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Insert a new meal with its initial totals
///
/// # Errors
///
/// Returns `DatabaseError` on write failure
pub async fn insert_meal(conn: &mut SqliteConnection, meal: &Meal) -> AppResult<()> {
    let sql = format!(
        "INSERT INTO meals ({MEAL_COLUMNS}, {}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, {})",
        *NUTRIENT_COLUMNS, *NUTRIENT_PLACEHOLDERS
    );
    let query = sqlx::query(&sql)
        .bind(meal.id.to_string())
        .bind(meal.user_id.to_string())
        .bind(meal.meal_type.as_str())
        .bind(meal.logged_at)
        .bind(meal.logged_on)
        .bind(meal.revision)
        .bind(meal.created_at)
        .bind(meal.updated_at);
    bind_nutrients(query, &meal.totals).execute(&mut *conn).await?;
    Ok(())
}

/// Fetch a meal by id
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn find_meal(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<Meal>> {
    let sql = format!("SELECT {MEAL_COLUMNS}, {} FROM meals WHERE id = ?", *NUTRIENT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_meal).transpose()
}

/// Fetch a meal by id, failing if it does not exist
///
/// # Errors
///
/// Returns `ResourceNotFound` if no meal has this id
pub async fn get_meal(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Meal> {
    find_meal(conn, id).await?.ok_or_else(|| meal_not_found(id))
}

/// Take the meal-row write lock by bumping its revision
///
/// Must be the first statement of a mutation transaction: it upgrades the transaction to
/// a writer before anything is read, so concurrent edits to one meal serialize here.
///
/// # Errors
///
/// Returns `ResourceNotFound` if the meal does not exist
pub async fn lock_meal(conn: &mut SqliteConnection, meal_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("UPDATE meals SET revision = revision + 1 WHERE id = ?")
        .bind(meal_id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(meal_not_found(meal_id));
    }
    Ok(())
}

/// Take the write lock on the meal owning a line
///
/// # Errors
///
/// Returns `ResourceNotFound` if the line does not exist
pub async fn lock_meal_of_line(conn: &mut SqliteConnection, line_id: Uuid) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE meals SET revision = revision + 1 \
         WHERE id = (SELECT meal_id FROM logged_lines WHERE id = ?)",
    )
    .bind(line_id.to_string())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Logged line {line_id}"))
            .with_resource_id(line_id.to_string()));
    }
    Ok(())
}

/// Fold a nutrient delta into a meal's stored totals
///
/// # Errors
///
/// Returns `ResourceNotFound` if the meal does not exist
pub async fn apply_totals_delta(
    conn: &mut SqliteConnection,
    meal_id: Uuid,
    delta: &NutrientSet,
) -> AppResult<()> {
    let query = bind_nutrients(sqlx::query(TOTALS_DELTA_SQL.as_str()), delta)
        .bind(Utc::now())
        .bind(meal_id.to_string());
    let result = query.execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(meal_not_found(meal_id));
    }
    Ok(())
}

/// Move a meal to a new timestamp and calendar date
///
/// # Errors
///
/// Returns `ResourceNotFound` if the meal does not exist
pub async fn update_logged_at(
    conn: &mut SqliteConnection,
    meal_id: Uuid,
    logged_at: DateTime<Utc>,
    logged_on: NaiveDate,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE meals SET logged_at = ?, logged_on = ?, updated_at = ? WHERE id = ?",
    )
    .bind(logged_at)
    .bind(logged_on)
    .bind(Utc::now())
    .bind(meal_id.to_string())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(meal_not_found(meal_id));
    }
    Ok(())
}

/// Delete a meal; its lines go with it through `ON DELETE CASCADE`
///
/// # Errors
///
/// Returns `ResourceNotFound` if the meal does not exist
pub async fn delete_meal(conn: &mut SqliteConnection, meal_id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM meals WHERE id = ?")
        .bind(meal_id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(meal_not_found(meal_id));
    }
    Ok(())
}
