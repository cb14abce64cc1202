// ABOUTME: Catalog record persistence: insert, fetch, name search candidates, and rescoring
// ABOUTME: Nutrient values are written once; only quality score and provenance change later
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use uuid::Uuid;

use super::{bind_nutrients, read_nutrients, read_uuid, Database, NUTRIENT_COLUMNS, NUTRIENT_PLACEHOLDERS};
use crate::errors::{AppError, AppResult};
use crate::models::{CatalogRecord, HouseholdUnit, Provenance};
use crate::units::parse_unit;

const RECORD_COLUMNS: &str = "id, name, brand, reference_quantity, reference_unit, \
     household_unit_name, household_unit_grams, quality_score, allows_gram_editing, \
     provenance, created_at, updated_at";

fn select_records_sql(filter: &str) -> String {
    format!("SELECT {RECORD_COLUMNS}, {} FROM catalog_records {filter}", *NUTRIENT_COLUMNS)
}

fn row_to_record(row: &SqliteRow) -> AppResult<CatalogRecord> {
    let household_name: Option<String> = row.try_get("household_unit_name")?;
    let household_grams: Option<f64> = row.try_get("household_unit_grams")?;
    let household_unit = match (household_name, household_grams) {
        (Some(name), Some(grams)) => Some(HouseholdUnit { name, grams }),
        _ => None,
    };
    let reference_unit: String = row.try_get("reference_unit")?;
    let provenance: String = row.try_get("provenance")?;

    Ok(CatalogRecord {
        id: read_uuid(row, "id")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        reference_quantity: row.try_get("reference_quantity")?,
        reference_unit: parse_unit(&reference_unit)?,
        household_unit,
        nutrients: read_nutrients(row)?,
        quality_score: row.try_get("quality_score")?,
        allows_gram_editing: row.try_get("allows_gram_editing")?,
        provenance: Provenance::parse(&provenance)?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}

/// Insert a validated catalog record
///
/// # Errors
///
/// Returns `InvalidCatalogRecord` if validation fails, `DatabaseError` on write failure
pub async fn insert_record(conn: &mut SqliteConnection, record: &CatalogRecord) -> AppResult<()> {
    record.validate()?;
    let sql = format!(
        "INSERT INTO catalog_records ({RECORD_COLUMNS}, {}) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, {})",
        *NUTRIENT_COLUMNS, *NUTRIENT_PLACEHOLDERS
    );
    let query = sqlx::query(&sql)
        .bind(record.id.to_string())
        .bind(&record.name)
        .bind(&record.brand)
        .bind(record.reference_quantity)
        .bind(record.reference_unit.abbreviation())
        .bind(record.household_unit.as_ref().map(|u| u.name.clone()))
        .bind(record.household_unit.as_ref().map(|u| u.grams))
        .bind(record.quality_score)
        .bind(record.allows_gram_editing)
        .bind(record.provenance.as_str())
        .bind(record.created_at)
        .bind(record.updated_at);
    bind_nutrients(query, &record.nutrients)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert a record unless one with the same id already exists
///
/// Used to cache externally sourced matches locally before a line references them.
///
/// # Errors
///
/// Returns `InvalidCatalogRecord` if validation fails, `DatabaseError` on write failure
pub async fn insert_record_if_absent(
    conn: &mut SqliteConnection,
    record: &CatalogRecord,
) -> AppResult<bool> {
    if find_record(conn, record.id).await?.is_some() {
        return Ok(false);
    }
    insert_record(conn, record).await?;
    Ok(true)
}

/// Fetch a record by id
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn find_record(conn: &mut SqliteConnection, id: Uuid) -> AppResult<Option<CatalogRecord>> {
    let row = sqlx::query(&select_records_sql("WHERE id = ?"))
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Fetch a record by id, failing if it does not exist
///
/// # Errors
///
/// Returns `ResourceNotFound` if no record has this id
pub async fn get_record(conn: &mut SqliteConnection, id: Uuid) -> AppResult<CatalogRecord> {
    find_record(conn, id).await?.ok_or_else(|| {
        AppError::not_found(format!("Catalog record {id}")).with_resource_id(id.to_string())
    })
}

/// Records whose name contains any of the given lowercase tokens
///
/// Estimated records are never candidates. Ranking is left to the caller; this only
/// narrows the candidate set.
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn records_matching_tokens(
    conn: &mut SqliteConnection,
    tokens: &[String],
    limit: u32,
) -> AppResult<Vec<CatalogRecord>> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let filter = tokens
        .iter()
        .map(|_| "lower(name) LIKE ?")
        .collect::<Vec<_>>()
        .join(" OR ");
    let sql = select_records_sql(&format!(
        "WHERE ({filter}) AND provenance <> ? ORDER BY quality_score DESC LIMIT ?"
    ));
    let mut query = sqlx::query(&sql);
    for token in tokens {
        query = query.bind(format!("%{token}%"));
    }
    let rows = query
        .bind(Provenance::Estimated.as_str())
        .bind(i64::from(limit))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_record).collect()
}

/// Earliest estimated record stored for this name and household unit
///
/// Names compare case-insensitively.
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn find_estimate(
    conn: &mut SqliteConnection,
    name: &str,
    household_unit_name: Option<&str>,
) -> AppResult<Option<CatalogRecord>> {
    let sql = select_records_sql(
        "WHERE lower(name) = lower(?) AND provenance = ? AND household_unit_name IS ? \
         ORDER BY created_at, id LIMIT 1",
    );
    let row = sqlx::query(&sql)
        .bind(name)
        .bind(Provenance::Estimated.as_str())
        .bind(household_unit_name)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_record).transpose()
}

/// Every record in the catalog, oldest first
///
/// # Errors
///
/// Returns `DatabaseError` on query or decode failure
pub async fn all_records(conn: &mut SqliteConnection) -> AppResult<Vec<CatalogRecord>> {
    let rows = sqlx::query(&select_records_sql("ORDER BY created_at, id"))
        .fetch_all(&mut *conn)
        .await?;
    rows.iter().map(row_to_record).collect()
}

/// Update a record's quality score
///
/// # Errors
///
/// Returns `ResourceNotFound` if the record does not exist
pub async fn update_quality_score(
    conn: &mut SqliteConnection,
    id: Uuid,
    quality_score: f64,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE catalog_records SET quality_score = ?, updated_at = ? WHERE id = ?",
    )
    .bind(quality_score)
    .bind(Utc::now())
    .bind(id.to_string())
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::not_found(format!("Catalog record {id}")).with_resource_id(id.to_string()));
    }
    Ok(())
}

impl Database {
    /// Insert a validated catalog record
    ///
    /// # Errors
    ///
    /// Returns `InvalidCatalogRecord` if validation fails, `DatabaseError` on write failure
    pub async fn insert_record(&self, record: &CatalogRecord) -> AppResult<()> {
        let mut conn = self.pool().acquire().await?;
        insert_record(&mut conn, record).await
    }

    /// Fetch a catalog record by id
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record has this id
    pub async fn get_record(&self, id: Uuid) -> AppResult<CatalogRecord> {
        let mut conn = self.pool().acquire().await?;
        get_record(&mut conn, id).await
    }

    /// Every catalog record
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query failure
    pub async fn all_records(&self) -> AppResult<Vec<CatalogRecord>> {
        let mut conn = self.pool().acquire().await?;
        all_records(&mut conn).await
    }
}
