// ABOUTME: Nutrition engine facade: meals, logged lines, resolution, and incremental totals
// ABOUTME: Every mutation locks its meal row, writes the line, and folds the delta in one transaction
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! # Nutrition Engine
//!
//! [`NutritionEngine`] is the entry point a presentation layer calls. Each mutation runs as
//! one retried transaction:
//!
//! 1. bump the meal's revision (takes the `SQLite` write lock before anything is read)
//! 2. read the current line and catalog record
//! 3. resolve the quantity and compute the line's nutrients
//! 4. write the line and apply its [`LineEvent`] delta to the meal totals
//! 5. recompute the day summary (inline mode) and commit
//!
//! Resolution of free-text foods calls out to search and estimation collaborators, so it
//! happens before the transaction starts. Storing the resolved record, or reusing a stored
//! estimate for the same food, happens inside it.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uuid::Uuid;

use super::aggregate::{self, LineEvent};
use super::calculator::calculate_line_nutrients;
use super::collaborators::{CatalogSearch, FoodParser, NutritionEstimator, SimpleFoodParser};
use super::quality::capped_score;
use super::quantity::{reference_serving, resolve_quantity, validate_quantity, ResolvedQuantity};
use super::resolution::{Resolution, ResolutionGate, ResolutionOutcome};
use super::search::DatabaseCatalogSearch;
use crate::config::{DaySummaryMode, EngineConfig, ResolutionConfig};
use crate::database::transactions::retry_transaction;
use crate::database::{catalog, lines, meals, Database};
use crate::errors::{AppError, AppResult};
use crate::logging::EngineLogger;
use crate::models::{
    CatalogRecord, DaySummary, LoggedLine, Meal, MealDetails, MealType, NutrientSet,
};
use crate::units::Unit;

/// A food logged from a free-text name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedFood {
    /// The stored line
    pub line: LoggedLine,
    /// How the food name was resolved
    pub resolution: Resolution,
}

/// Stored meal totals compared against a fresh sum of its lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MealAudit {
    /// Audited meal
    pub meal_id: Uuid,
    /// Totals stored on the meal row
    pub stored: NutrientSet,
    /// Sum of the meal's current lines
    pub computed: NutrientSet,
    /// Number of lines summed
    pub line_count: usize,
    /// `stored == computed`
    pub consistent: bool,
}

/// Outcome of recomputing catalog quality scores
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescoreReport {
    /// Records examined
    pub examined: usize,
    /// Records whose score was lowered
    pub lowered: usize,
}

type DayKey = (Uuid, NaiveDate);

/// Background day-summary recomputation for deferred mode
///
/// Finished tasks are reaped each time a new one is scheduled, so only in-flight
/// recomputations are held between flushes.
#[derive(Clone, Default)]
pub struct DaySummaryRefresher {
    pending: Arc<Mutex<JoinSet<AppResult<DaySummary>>>>,
}

impl DaySummaryRefresher {
    /// Recompute a day summary in a spawned task
    pub async fn schedule(&self, database: Database, day: DayKey, max_retries: u32) {
        let (user_id, date) = day;
        let mut pending = self.pending.lock().await;
        while let Some(finished) = pending.try_join_next() {
            match finished {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => EngineLogger::log_day_refresh_failed(&e),
                Err(e) => EngineLogger::log_day_refresh_failed(&e),
            }
        }
        pending.spawn(async move {
            let db = &database;
            retry_transaction(
                || async {
                    let mut guard = db.begin().await?;
                    let summary = aggregate::refresh_day(guard.executor()?, user_id, date).await?;
                    guard.commit().await?;
                    Ok(summary)
                },
                max_retries,
            )
            .await
        });
    }

    /// Wait for every in-flight recomputation
    ///
    /// Returns the summaries of tasks not already reaped by [`Self::schedule`]. Every task
    /// is awaited even when one fails.
    ///
    /// # Errors
    ///
    /// Returns the first recomputation failure, or `InternalError` if a task panicked
    pub async fn flush(&self) -> AppResult<Vec<DaySummary>> {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        let mut summaries = Vec::with_capacity(pending.len());
        let mut first_error = None;
        while let Some(joined) = pending.join_next().await {
            let result = joined
                .map_err(|e| AppError::internal(format!("Day summary task failed: {e}")))
                .and_then(|summary| summary);
            match result {
                Ok(summary) => summaries.push(summary),
                Err(e) => {
                    EngineLogger::log_day_refresh_failed(&e);
                    first_error.get_or_insert(e);
                }
            }
        }
        first_error.map_or(Ok(summaries), Err)
    }
}

/// Nutrition quantity and aggregation engine
#[derive(Clone)]
pub struct NutritionEngine {
    database: Database,
    search: Arc<dyn CatalogSearch>,
    gate: ResolutionGate,
    parser: Arc<dyn FoodParser>,
    rounding_decimals: u32,
    day_summary_mode: DaySummaryMode,
    tx_max_retries: u32,
    refresher: DaySummaryRefresher,
}

impl NutritionEngine {
    /// Create an engine resolving foods through `search`
    #[must_use]
    pub fn new(database: Database, search: Arc<dyn CatalogSearch>, config: &EngineConfig) -> Self {
        Self {
            gate: ResolutionGate::new(Arc::clone(&search), None, config.resolution),
            database,
            search,
            parser: Arc::new(SimpleFoodParser),
            rounding_decimals: config.rounding_decimals,
            day_summary_mode: config.day_summary_mode,
            tx_max_retries: config.tx_max_retries,
            refresher: DaySummaryRefresher::default(),
        }
    }

    /// Create an engine resolving foods against the local catalog table
    #[must_use]
    pub fn with_local_catalog(database: Database, config: &EngineConfig) -> Self {
        let search = Arc::new(DatabaseCatalogSearch::new(database.clone()));
        Self::new(database, search, config)
    }

    /// Use `estimator` for foods the catalog cannot match
    #[must_use]
    pub fn with_estimator(mut self, estimator: Arc<dyn NutritionEstimator>) -> Self {
        self.gate = ResolutionGate::new(
            Arc::clone(&self.search),
            Some(estimator),
            *self.gate.config(),
        );
        self
    }

    /// Use `parser` for free-text descriptions
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn FoodParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Underlying database
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.database
    }

    /// Resolution thresholds in effect
    #[must_use]
    pub const fn resolution_config(&self) -> &ResolutionConfig {
        self.gate.config()
    }

    // ================================
    // Meals
    // ================================

    /// Create an empty meal
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on write failure
    pub async fn create_meal(
        &self,
        user_id: Uuid,
        meal_type: MealType,
        logged_at: DateTime<Utc>,
    ) -> AppResult<Meal> {
        let now = Utc::now();
        let meal = Meal {
            id: Uuid::new_v4(),
            user_id,
            meal_type,
            logged_at,
            logged_on: logged_at.date_naive(),
            totals: NutrientSet::zero(),
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::insert_meal(conn, &meal).await?;
                self.refresh_days_in_tx(conn, &[(meal.user_id, meal.logged_on)])
                    .await?;
                guard.commit().await
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[(meal.user_id, meal.logged_on)])
            .await;

        info!(meal.id = %meal.id, user.id = %user_id, meal.kind = meal_type.as_str(), "Meal created");
        Ok(meal)
    }

    /// Delete a meal and all of its lines
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the meal does not exist
    pub async fn delete_meal(&self, meal_id: Uuid) -> AppResult<()> {
        let day = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal(conn, meal_id).await?;
                let meal = meals::get_meal(conn, meal_id).await?;
                meals::delete_meal(conn, meal_id).await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok(day)
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;

        info!(meal.id = %meal_id, "Meal deleted");
        Ok(())
    }

    /// Move a meal to a new time; both the old and new day summaries are recomputed
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the meal does not exist
    pub async fn reschedule_meal(&self, meal_id: Uuid, logged_at: DateTime<Utc>) -> AppResult<Meal> {
        let logged_on = logged_at.date_naive();
        let (meal, days) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal(conn, meal_id).await?;
                let before = meals::get_meal(conn, meal_id).await?;
                meals::update_logged_at(conn, meal_id, logged_at, logged_on).await?;
                let days: Vec<DayKey> = [before.logged_on, logged_on]
                    .into_iter()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .map(|date| (before.user_id, date))
                    .collect();
                self.refresh_days_in_tx(conn, &days).await?;
                let meal = meals::get_meal(conn, meal_id).await?;
                guard.commit().await?;
                Ok((meal, days))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&days).await;
        Ok(meal)
    }

    /// A meal with its lines in insertion order
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the meal does not exist
    pub async fn get_meal(&self, meal_id: Uuid) -> AppResult<MealDetails> {
        let mut guard = self.database.begin().await?;
        let conn = guard.executor()?;
        let meal = meals::get_meal(conn, meal_id).await?;
        let lines = lines::lines_for_meal(conn, meal_id).await?;
        guard.commit().await?;
        Ok(MealDetails { meal, lines })
    }

    /// Stored totals of a meal
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the meal does not exist
    pub async fn get_meal_totals(&self, meal_id: Uuid) -> AppResult<NutrientSet> {
        let mut conn = self.database.pool().acquire().await?;
        Ok(meals::get_meal(&mut conn, meal_id).await?.totals)
    }

    /// Day summary for a user and date
    ///
    /// In deferred mode call [`Self::flush_day_summaries`] first for strict freshness.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query failure
    pub async fn get_day_summary(&self, user_id: Uuid, date: NaiveDate) -> AppResult<DaySummary> {
        self.database.get_day_summary(user_id, date).await
    }

    /// Wait for deferred day-summary recomputations to finish
    ///
    /// # Errors
    ///
    /// Returns the first failed recomputation
    pub async fn flush_day_summaries(&self) -> AppResult<Vec<DaySummary>> {
        self.refresher.flush().await
    }

    // ================================
    // Lines
    // ================================

    /// Resolve a food name and log it to a meal
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a negative or non-finite quantity or an empty name
    /// - `UnsupportedUnit` / `IncompatibleUnit` if the unit does not apply to the resolved food
    /// - `ResolutionFailed` if the estimator fails
    /// - `ResourceNotFound` if the meal does not exist
    pub async fn log_food(
        &self,
        meal_id: Uuid,
        food_name: &str,
        quantity: f64,
        unit: &str,
    ) -> AppResult<LoggedFood> {
        self.log_resolved_food(meal_id, food_name, quantity, Some(unit))
            .await
    }

    /// Parse a free-text description and log every food found
    ///
    /// Each food succeeds or fails on its own; one bad entry never blocks the others.
    /// Entries without a portion default to one household unit or one serving.
    ///
    /// # Errors
    ///
    /// Returns an error only if the parser itself fails
    pub async fn log_description(
        &self,
        meal_id: Uuid,
        description: &str,
    ) -> AppResult<Vec<AppResult<LoggedFood>>> {
        let parsed = self.parser.parse(description).await?;
        debug!(meal.id = %meal_id, foods = parsed.len(), "Description parsed");

        let mut results = Vec::with_capacity(parsed.len());
        for food in parsed {
            let result = self
                .log_resolved_food(
                    meal_id,
                    &food.name,
                    food.quantity.unwrap_or(1.0),
                    food.unit.as_deref(),
                )
                .await;
            if let Err(e) = &result {
                debug!(meal.id = %meal_id, food.name = %food.name, error = %e, "Food not logged");
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn log_resolved_food(
        &self,
        meal_id: Uuid,
        food_name: &str,
        quantity: f64,
        unit: Option<&str>,
    ) -> AppResult<LoggedFood> {
        validate_quantity(quantity)?;
        let default_unit = Unit::Serving.abbreviation();
        let mut resolution = self
            .gate
            .resolve(food_name, unit.unwrap_or(default_unit))
            .await?;
        resolution.record.quality_score = capped_score(&resolution.record);

        let unit_name = match (unit, &resolution.record.household_unit) {
            (Some(unit), _) => unit.to_owned(),
            (None, Some(household)) => household.name.clone(),
            (None, None) => default_unit.to_owned(),
        };

        let resolution_ref = &resolution;
        let unit_name = &unit_name;
        let (line, day, record) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal(conn, meal_id).await?;
                let meal = meals::get_meal(conn, meal_id).await?;
                let record = store_resolved_record(conn, resolution_ref).await?;
                let resolved = resolve_quantity(quantity, unit_name, &record)?;
                let nutrients =
                    calculate_line_nutrients(&record, resolved.multiplier, self.rounding_decimals)?;
                let mut line = self.new_line(conn, meal_id, record.id, &resolved, nutrients).await?;
                if resolution_ref.needs_clarification {
                    line.needs_clarification = true;
                    line.confidence = resolution_ref.confidence;
                }
                lines::insert_line(conn, &line).await?;
                aggregate::apply_line_event(conn, meal_id, line.id, LineEvent::Created { nutrients })
                    .await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok((line, day, record))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;
        resolution.record = record;

        Ok(LoggedFood { line, resolution })
    }

    /// Log a known catalog record to a meal
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the meal or record does not exist
    /// - `InvalidInput`, `UnsupportedUnit`, `IncompatibleUnit`, or `InvalidCatalogRecord` if
    ///   the quantity cannot be resolved against the record
    pub async fn add_line(
        &self,
        meal_id: Uuid,
        catalog_id: Uuid,
        quantity: f64,
        unit: &str,
    ) -> AppResult<LoggedLine> {
        validate_quantity(quantity)?;
        let (line, day) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal(conn, meal_id).await?;
                let meal = meals::get_meal(conn, meal_id).await?;
                let record = catalog::get_record(conn, catalog_id).await?;
                let resolved = resolve_quantity(quantity, unit, &record)?;
                let nutrients =
                    calculate_line_nutrients(&record, resolved.multiplier, self.rounding_decimals)?;
                let line = self.new_line(conn, meal_id, record.id, &resolved, nutrients).await?;
                lines::insert_line(conn, &line).await?;
                aggregate::apply_line_event(conn, meal_id, line.id, LineEvent::Created { nutrients })
                    .await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok((line, day))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;
        Ok(line)
    }

    /// Change a line's quantity and unit
    ///
    /// Editing to the quantity a line already has leaves totals unchanged.
    ///
    /// # Errors
    ///
    /// - `ResourceNotFound` if the line does not exist
    /// - `IncompatibleUnit` for a gram amount on a line that is only editable as servings
    /// - `InvalidInput` or `UnsupportedUnit` for an unusable quantity or unit
    pub async fn edit_quantity(&self, line_id: Uuid, quantity: f64, unit: &str) -> AppResult<LoggedLine> {
        validate_quantity(quantity)?;
        let (line, day) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal_of_line(conn, line_id).await?;
                let mut line = lines::get_line(conn, line_id).await?;
                let meal = meals::get_meal(conn, line.meal_id).await?;
                let record = catalog::get_record(conn, line.catalog_id).await?;

                let resolved = resolve_quantity(quantity, unit, &record)?;
                if !line.gram_editable && resolved.gram_editable {
                    return Err(AppError::incompatible_unit(format!(
                        "line for '{}' can only be edited as a serving count",
                        record.name
                    ))
                    .with_resource_id(line_id.to_string()));
                }
                let nutrients =
                    calculate_line_nutrients(&record, resolved.multiplier, self.rounding_decimals)?;
                let old = line.nutrients;
                apply_resolved(&mut line, &resolved, nutrients);
                lines::update_line(conn, &line).await?;
                aggregate::apply_line_event(
                    conn,
                    line.meal_id,
                    line.id,
                    LineEvent::Updated { old, new: nutrients },
                )
                .await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok((line, day))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;
        Ok(line)
    }

    /// Point a line at a different catalog record
    ///
    /// Keeps the gram amount when both the line and the new record allow gram editing,
    /// otherwise logs one reference serving of the new record.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the line or record does not exist
    pub async fn swap_food(&self, line_id: Uuid, catalog_id: Uuid) -> AppResult<LoggedLine> {
        let (line, day) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal_of_line(conn, line_id).await?;
                let mut line = lines::get_line(conn, line_id).await?;
                let meal = meals::get_meal(conn, line.meal_id).await?;
                let record = catalog::get_record(conn, catalog_id).await?;

                let resolved = if line.gram_editable && record.allows_gram_editing {
                    resolve_quantity(line.gram_quantity, Unit::Grams.abbreviation(), &record)?
                } else {
                    reference_serving(&record)?
                };
                let nutrients =
                    calculate_line_nutrients(&record, resolved.multiplier, self.rounding_decimals)?;
                let old = line.nutrients;
                line.catalog_id = record.id;
                line.needs_clarification = false;
                line.confidence = None;
                apply_resolved(&mut line, &resolved, nutrients);
                lines::update_line(conn, &line).await?;
                aggregate::apply_line_event(
                    conn,
                    line.meal_id,
                    line.id,
                    LineEvent::Updated { old, new: nutrients },
                )
                .await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok((line, day))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;
        Ok(line)
    }

    /// Remove a line from its meal
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the line does not exist
    pub async fn remove_line(&self, line_id: Uuid) -> AppResult<LoggedLine> {
        let (line, day) = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                meals::lock_meal_of_line(conn, line_id).await?;
                let line = lines::get_line(conn, line_id).await?;
                let meal = meals::get_meal(conn, line.meal_id).await?;
                lines::delete_line(conn, line_id).await?;
                aggregate::apply_line_event(
                    conn,
                    line.meal_id,
                    line.id,
                    LineEvent::Deleted {
                        nutrients: line.nutrients,
                    },
                )
                .await?;
                let day = (meal.user_id, meal.logged_on);
                self.refresh_days_in_tx(conn, &[day]).await?;
                guard.commit().await?;
                Ok((line, day))
            },
            self.tx_max_retries,
        )
        .await?;
        self.refresh_days_after_commit(&[day]).await;
        Ok(line)
    }

    /// Compare a meal's stored totals against a fresh sum of its lines
    ///
    /// Read-only; a mismatch is logged and reported, never repaired.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if the meal does not exist
    pub async fn audit_meal(&self, meal_id: Uuid) -> AppResult<MealAudit> {
        let mut guard = self.database.begin().await?;
        let conn = guard.executor()?;
        let meal = meals::get_meal(conn, meal_id).await?;
        let line_count = lines::lines_for_meal(conn, meal_id).await?.len();
        let computed = lines::sum_line_nutrients(conn, meal_id).await?;
        guard.commit().await?;

        let consistent = meal.totals == computed;
        if !consistent {
            EngineLogger::log_audit_mismatch(meal_id, meal.totals.calories(), computed.calories());
        }
        Ok(MealAudit {
            meal_id,
            stored: meal.totals,
            computed,
            line_count,
            consistent,
        })
    }

    // ================================
    // Catalog
    // ================================

    /// Store a catalog record, clamping its quality score to what its nutrients support
    ///
    /// # Errors
    ///
    /// Returns `InvalidCatalogRecord` if the record fails validation
    pub async fn insert_record(&self, mut record: CatalogRecord) -> AppResult<CatalogRecord> {
        record.quality_score = capped_score(&record);
        self.database.insert_record(&record).await?;
        debug!(catalog.id = %record.id, catalog.name = %record.name, catalog.quality = record.quality_score, "Catalog record inserted");
        Ok(record)
    }

    /// Fetch a catalog record
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` if no record has this id
    pub async fn get_record(&self, id: Uuid) -> AppResult<CatalogRecord> {
        self.database.get_record(id).await
    }

    /// Recompute every record's quality score under the current validation rules
    ///
    /// Scores only ever go down; running this twice changes nothing the second time.
    /// Logged lines keep the nutrients they were computed with.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` on query or write failure
    pub async fn rescore_catalog(&self) -> AppResult<RescoreReport> {
        let report = retry_transaction(
            || async {
                let mut guard = self.database.begin().await?;
                let conn = guard.executor()?;
                let records = catalog::all_records(conn).await?;
                let mut report = RescoreReport {
                    examined: records.len(),
                    lowered: 0,
                };
                for record in &records {
                    let capped = capped_score(record);
                    if capped < record.quality_score {
                        catalog::update_quality_score(conn, record.id, capped).await?;
                        report.lowered += 1;
                    }
                }
                guard.commit().await?;
                Ok(report)
            },
            self.tx_max_retries,
        )
        .await?;
        info!(
            catalog.examined = report.examined,
            catalog.lowered = report.lowered,
            "Catalog rescored"
        );
        Ok(report)
    }

    // ================================
    // Internals
    // ================================

    async fn new_line(
        &self,
        conn: &mut SqliteConnection,
        meal_id: Uuid,
        catalog_id: Uuid,
        resolved: &ResolvedQuantity,
        nutrients: NutrientSet,
    ) -> AppResult<LoggedLine> {
        let now = Utc::now();
        Ok(LoggedLine {
            id: Uuid::new_v4(),
            meal_id,
            catalog_id,
            position: lines::next_position(conn, meal_id).await?,
            gram_quantity: resolved.gram_quantity,
            serving_unit: resolved.serving_unit.clone(),
            serving_unit_grams: resolved.serving_unit_grams,
            last_edited: resolved.last_edited,
            gram_editable: resolved.gram_editable,
            nutrients,
            needs_clarification: false,
            confidence: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn refresh_days_in_tx(&self, conn: &mut SqliteConnection, days: &[DayKey]) -> AppResult<()> {
        if self.day_summary_mode == DaySummaryMode::Inline {
            for (user_id, date) in days {
                aggregate::refresh_day(conn, *user_id, *date).await?;
            }
        }
        Ok(())
    }

    async fn refresh_days_after_commit(&self, days: &[DayKey]) {
        if self.day_summary_mode == DaySummaryMode::Deferred {
            for day in days {
                self.refresher
                    .schedule(self.database.clone(), *day, self.tx_max_retries)
                    .await;
            }
        }
    }
}

fn apply_resolved(line: &mut LoggedLine, resolved: &ResolvedQuantity, nutrients: NutrientSet) {
    line.gram_quantity = resolved.gram_quantity;
    line.serving_unit.clone_from(&resolved.serving_unit);
    line.serving_unit_grams = resolved.serving_unit_grams;
    line.last_edited = resolved.last_edited;
    line.gram_editable = resolved.gram_editable;
    line.nutrients = nutrients;
    line.updated_at = Utc::now();
}

/// Persist the record a resolution points at, returning the record lines should use
///
/// An estimate reuses the stored estimate for the same name and household unit, so
/// repeated logs of an unknown food share one record.
async fn store_resolved_record(
    conn: &mut SqliteConnection,
    resolution: &Resolution,
) -> AppResult<CatalogRecord> {
    let candidate = &resolution.record;
    if resolution.outcome == ResolutionOutcome::Estimated {
        let household = candidate.household_unit.as_ref().map(|u| u.name.as_str());
        if let Some(existing) = catalog::find_estimate(conn, &candidate.name, household).await? {
            debug!(catalog.id = %existing.id, food.name = %candidate.name, "Reusing stored estimate");
            return Ok(existing);
        }
    }
    if catalog::insert_record_if_absent(conn, candidate).await? {
        debug!(
            catalog.id = %candidate.id,
            catalog.provenance = candidate.provenance.as_str(),
            "Catalog record stored"
        );
    }
    Ok(candidate.clone())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_finished_day_refreshes_are_reaped() {
        let config = EngineConfig {
            day_summary_mode: DaySummaryMode::Deferred,
            ..EngineConfig::in_memory()
        };
        let database = Database::new(&config.database).await.unwrap();
        let engine = NutritionEngine::with_local_catalog(database, &config);
        let rice = engine
            .insert_record(CatalogRecord::new("white rice", 100.0, NutrientSet::from_macros(130.0, 2.7, 28.0, 0.3)))
            .await
            .unwrap();
        let meal = engine
            .create_meal(Uuid::new_v4(), MealType::Dinner, Utc::now())
            .await
            .unwrap();

        for _ in 0..25 {
            engine.add_line(meal.id, rice.id, 150.0, "g").await.unwrap();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.refresher.pending.lock().await.len() <= 2);

        engine.flush_day_summaries().await.unwrap();
        assert!(engine.refresher.pending.lock().await.is_empty());
        let summary = engine
            .get_day_summary(meal.user_id, meal.logged_on)
            .await
            .unwrap();
        assert_eq!(summary.totals, engine.get_meal_totals(meal.id).await.unwrap());
    }
}
