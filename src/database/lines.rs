// ABOUTME: Logged line persistence: insert, fetch, update, delete, and per-meal listing
// ABOUTME: Lines store grams plus the serving unit weight; serving quantities are derived
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{bind_nutrients, read_nutrients, read_uuid, NUTRIENT_COLUMNS, NUTRIENT_PLACEHOLDERS};
use crate::errors::{AppError, AppResult};
use crate::models::{EditedField, LoggedLine, Nutrient, NutrientSet};

const LINE_COLUMNS: &str = "id, meal_id, catalog_id, position, gram_quantity, serving_unit, \
     serving_unit_grams, last_edited, gram_editable, needs_clarification, confidence, \
     created_at, updated_at";

static UPDATE_LINE_SQL: LazyLock<String> = LazyLock::new(|| {
    let assignments = Nutrient::ALL
        .iter()
        .map(|n| format!("{} = ?", n.column()))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "UPDATE logged_lines SET catalog_id = ?, gram_quantity = ?, serving_unit = ?, \
         serving_unit_grams = ?, last_edited = ?, gram_editable = ?, needs_clarification = ?, \
         confidence = ?, updated_at = ?, {assignments} WHERE id = ?"
    )
});

static SUM_LINES_SQL: LazyLock<String> = LazyLock::new(|| {
    let sums = Nutrient::ALL
        .iter()
        .map(|n| format!("COALESCE(SUM({col}), 0) AS {col}", col = n.column()))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT {sums} FROM logged_lines WHERE meal_id = ?")
});

fn line_not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("Logged line {id}")).with_resource_id(id.to_string())
}

fn row_to_line(row: &SqliteRow) -> AppResult<LoggedLine> {
    let last_edited: String = row.try_get("last_edited")?;
    Ok(LoggedLine {
        id: read_uuid(row, "id")?,
        meal_id: read_uuid(row, "meal_id")?,
        catalog_id: read_uuid(row, "catalog_id")?,
        position: row.try_get("position")?,
        gram_quantity: row.try_get("gram_quantity")?,
        serving_unit: row.try_get("serving_unit")?,
        serving_unit_grams: row.try_get("serving_unit_grams")?,
        last_edited: EditedField::parse(&last_edited)?,
        gram_editable: row.try_get("gram_editable")?,
        nutrients: read_nutrients(row)?,
        needs_clarification: row.try_get("needs_clarification")?,
        confidence: row.try_get("confidence")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Next insertion position within a meal
///
/// # Errors
///
/// Returns `DatabaseError` on query failure
pub async fn next_position(conn: &mut SqliteConnection, meal_id: Uuid) -> AppResult<i64> {
    let row = sqlx::query(
        "SELECT COALESCE(MAX(position), -1) + 1 AS next FROM logged_lines WHERE meal_id = ?",
    )
    .bind(meal_id.to_string())
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.try_get("next")?)
}

/// Insert a line
///
/// # Errors
///
/// Returns `DatabaseError` on write failure (including a missing meal or catalog record)
pub async fn insert_line(conn: &mut SqliteConnection, line: &LoggedLine) -> AppResult<()> {
    let sql = format!(
        "INSERT INTO logged_lines ({LINE_COLUMNS}, {}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {})",
        *NUTRIENT_COLUMNS, *NUTRIENT_PLACEHOLDERS
    );
    let query = sqlx::query(&sql)
        .bind(line.id.to_string())
        .bind(line.meal_id.to_string())
        .bind(line.catalog_id.to_string())
        .bind(line.position)
        .bind(line.gram_quantity)
        .bind(&line.serving_unit)
        .bind(line.serving_unit_grams)
        .bind(line.last_edited.as_str())
        .bind(line.gram_editable)
        .bind(line.needs_clarification)
        .bind(line.confidence)
        .bind(line.created_at)
        .bind(line.updated_at);
    bind_nutrients(query, &line.nutrients)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Fetch a line by id, failing if it does not exist
///
/// # Errors
///
/// Returns `ResourceNotFound` if no line has this id
pub async fn get_line(conn: &mut SqliteConnection, id: Uuid) -> AppResult<LoggedLine> {
    let sql = format!(
        "SELECT {LINE_COLUMNS}, {} FROM logged_lines WHERE id = ?",
        *NUTRIENT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| line_not_found(id))?;
    row_to_line(&row)
}

/// Lines of a meal in insertion order
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn lines_for_meal(conn: &mut SqliteConnection, meal_id: Uuid) -> AppResult<Vec<LoggedLine>> {
    let sql = format!(
        "SELECT {LINE_COLUMNS}, {} FROM logged_lines WHERE meal_id = ? ORDER BY position, created_at",
        *NUTRIENT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(meal_id.to_string())
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_line).collect()
}

/// Overwrite a line's mutable fields
///
/// # Errors
///
/// Returns `ResourceNotFound` if the line does not exist
pub async fn update_line(conn: &mut SqliteConnection, line: &LoggedLine) -> AppResult<()> {
    let mut query = sqlx::query(UPDATE_LINE_SQL.as_str())
        .bind(line.catalog_id.to_string())
        .bind(line.gram_quantity)
        .bind(&line.serving_unit)
        .bind(line.serving_unit_grams)
        .bind(line.last_edited.as_str())
        .bind(line.gram_editable)
        .bind(line.needs_clarification)
        .bind(line.confidence)
        .bind(line.updated_at);
    query = bind_nutrients(query, &line.nutrients);
    let result = query.bind(line.id.to_string()).execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Err(line_not_found(line.id));
    }
    Ok(())
}

/// Delete a line
///
/// # Errors
///
/// Returns `ResourceNotFound` if the line does not exist
pub async fn delete_line(conn: &mut SqliteConnection, id: Uuid) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM logged_lines WHERE id = ?")
        .bind(id.to_string())
        .execute(&mut *conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(line_not_found(id));
    }
    Ok(())
}

/// Sum of the cached nutrients of a meal's current lines
///
/// # Errors
///
/// Returns `DatabaseError` on query failure
pub async fn sum_line_nutrients(conn: &mut SqliteConnection, meal_id: Uuid) -> AppResult<NutrientSet> {
    let row = sqlx::query(SUM_LINES_SQL.as_str())
        .bind(meal_id.to_string())
        .fetch_one(&mut *conn)
        .await?;
    read_nutrients(&row)
}
