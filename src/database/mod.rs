// ABOUTME: SQLite persistence for catalog records, meals, logged lines, and day summaries
// ABOUTME: Pool setup, idempotent schema migrations, and fixed-point nutrient column helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! # Database Management
//!
//! Nutrients are stored as INTEGER hundredths in one column per tracked nutrient, so SQL
//! `col = col + ?` deltas are exact. Identifiers are stored as TEXT UUIDs.
//!
//! Query helpers take `&mut SqliteConnection` so the same statement runs either inside a
//! [`transactions::TransactionGuard`] or on a pooled connection.

/// Catalog record storage
pub mod catalog;
/// Logged line storage
pub mod lines;
/// Meal storage and totals deltas
pub mod meals;
/// Day summary recomputation
pub mod summaries;
/// Transaction guard and retry helpers
pub mod transactions;

use std::fs;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use sqlx::query::Query;
use sqlx::sqlite::{
    SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Row, Sqlite, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{DatabaseConfig, DatabaseUrl};
use crate::errors::{AppError, AppResult};
use crate::models::{Nutrient, NutrientSet, NUTRIENT_COUNT};
use transactions::SqliteTransactionGuard;

/// Comma-separated nutrient column list in storage order
pub(crate) static NUTRIENT_COLUMNS: LazyLock<String> = LazyLock::new(|| {
    Nutrient::ALL
        .iter()
        .map(|n| n.column())
        .collect::<Vec<_>>()
        .join(", ")
});

/// One `?` placeholder per nutrient column
pub(crate) static NUTRIENT_PLACEHOLDERS: LazyLock<String> =
    LazyLock::new(|| vec!["?"; NUTRIENT_COUNT].join(", "));

fn nutrient_column_defs() -> String {
    Nutrient::ALL
        .iter()
        .map(|n| format!("{} INTEGER NOT NULL DEFAULT 0", n.column()))
        .collect::<Vec<_>>()
        .join(",\n                ")
}

/// Read a fixed-point nutrient set from a row
pub(crate) fn read_nutrients(row: &SqliteRow) -> AppResult<NutrientSet> {
    let mut scaled = [0_i64; NUTRIENT_COUNT];
    for nutrient in Nutrient::ALL {
        scaled[nutrient.index()] = row.try_get::<i64, _>(nutrient.column())?;
    }
    Ok(NutrientSet::from_scaled_array(scaled))
}

/// Bind a nutrient set's fixed-point values in storage order
pub(crate) fn bind_nutrients<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    nutrients: &NutrientSet,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in nutrients.scaled_array() {
        query = query.bind(value);
    }
    query
}

/// Read a TEXT UUID column
pub(crate) fn read_uuid(row: &SqliteRow, column: &str) -> AppResult<Uuid> {
    let raw: String = row.try_get(column)?;
    Uuid::parse_str(&raw)
        .map_err(|e| AppError::database(format!("Invalid UUID in column {column}: {e}")))
}

/// Database manager for the nutrition engine
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the database and run migrations
    ///
    /// File-backed databases use WAL journaling so readers never block the single writer.
    /// In-memory databases are pinned to one connection that is never recycled.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the connection or migrations fail
    pub async fn new(config: &DatabaseConfig) -> AppResult<Self> {
        let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
        let options = SqliteConnectOptions::from_str(&config.url.to_connection_string())?
            .foreign_keys(true)
            .busy_timeout(busy_timeout);

        let pool_options =
            SqlitePoolOptions::new().max_connections(config.effective_max_connections());

        let pool = match &config.url {
            DatabaseUrl::Memory => {
                pool_options
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await?
            }
            DatabaseUrl::SQLite { path } => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| {
                        AppError::database(format!(
                            "Failed to create database directory {}: {e}",
                            parent.display()
                        ))
                    })?;
                }
                pool_options
                    .connect_with(
                        options
                            .create_if_missing(true)
                            .journal_mode(SqliteJournalMode::Wal),
                    )
                    .await?
            }
        };

        let db = Self { pool };
        db.migrate().await?;
        info!(database.url = %config.url, "Database ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a transaction wrapped in a rollback-on-drop guard
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a connection cannot be acquired
    pub async fn begin(&self) -> AppResult<SqliteTransactionGuard<'static>> {
        let tx = self.pool.begin().await?;
        Ok(SqliteTransactionGuard::new(tx))
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_catalog().await?;
        self.migrate_meals().await?;
        self.migrate_lines().await?;
        self.migrate_day_summaries().await?;
        debug!("Database migrations applied");
        Ok(())
    }

    async fn migrate_catalog(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS catalog_records (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                brand TEXT,
                reference_quantity REAL NOT NULL,
                reference_unit TEXT NOT NULL,
                household_unit_name TEXT,
                household_unit_grams REAL,
                {},
                quality_score REAL NOT NULL,
                allows_gram_editing INTEGER NOT NULL DEFAULT 1,
                provenance TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            nutrient_column_defs()
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_catalog_records_name ON catalog_records(name COLLATE NOCASE)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_meals(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS meals (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                meal_type TEXT NOT NULL,
                logged_at TEXT NOT NULL,
                logged_on TEXT NOT NULL,
                {},
                revision INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            nutrient_column_defs()
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_meals_user_day ON meals(user_id, logged_on)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn migrate_lines(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS logged_lines (
                id TEXT PRIMARY KEY,
                meal_id TEXT NOT NULL REFERENCES meals(id) ON DELETE CASCADE,
                catalog_id TEXT NOT NULL REFERENCES catalog_records(id),
                position INTEGER NOT NULL,
                gram_quantity REAL NOT NULL,
                serving_unit TEXT,
                serving_unit_grams REAL,
                last_edited TEXT NOT NULL,
                gram_editable INTEGER NOT NULL DEFAULT 1,
                {},
                needs_clarification INTEGER NOT NULL DEFAULT 0,
                confidence REAL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            ",
            nutrient_column_defs()
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_logged_lines_meal ON logged_lines(meal_id, position)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn migrate_day_summaries(&self) -> AppResult<()> {
        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS day_summaries (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                {},
                meal_count INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, date)
            )
            ",
            nutrient_column_defs()
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
