// ABOUTME: Main library entry point for the Platewise nutrition engine
// ABOUTME: Quantity resolution, line-item nutrients, incremental meal totals, and food resolution
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

#![deny(unsafe_code)]

//! # Platewise
//!
//! A nutrition quantity and aggregation engine for meal-logging applications.
//!
//! ## Features
//!
//! - **Dual quantities**: household servings ("2 slices") and grams stay consistent, with
//!   grams as the single source of truth
//! - **Incremental totals**: meal totals are maintained by exact fixed-point deltas in the
//!   same transaction as every line write, never recomputed on read
//! - **Resolution gate**: food descriptions resolve to a trusted catalog match, a newly
//!   created record, or a flagged typical-portion estimate
//!
//! ## Architecture
//!
//! - **`platewise-core`**: errors, units, nutrient sets, catalog and meal models
//! - **`nutrition`**: quantity resolver, line calculator, aggregate maintainer, resolution
//!   gate, and the [`nutrition::engine::NutritionEngine`] facade
//! - **`database`**: `SQLite` persistence with transaction guards and retry
//! - **`external`**: USDA `FoodData` Central catalog search adapter
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use platewise::config::EngineConfig;
//! use platewise::database::Database;
//! use platewise::errors::AppResult;
//! use platewise::nutrition::engine::NutritionEngine;
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = EngineConfig::from_env()?;
//!     let database = Database::new(&config.database).await?;
//!     let engine = NutritionEngine::with_local_catalog(database, &config);
//!     let meal = engine
//!         .create_meal(uuid::Uuid::new_v4(), platewise::models::MealType::Lunch, chrono::Utc::now())
//!         .await?;
//!     let logged = engine.log_food(meal.id, "chicken breast", 4.0, "oz").await?;
//!     println!("{} kcal", logged.line.nutrients.calories());
//!     Ok(())
//! }
//! ```

/// Engine configuration loaded from the environment
pub mod config;

/// `SQLite` persistence for catalog records, meals, lines, and day summaries
pub mod database;

/// Unified error handling (re-exported from `platewise-core`)
pub mod errors;

/// External catalog sources
pub mod external;

/// Structured logging setup
pub mod logging;

/// Quantity resolution, nutrient calculation, aggregation, and food resolution
pub mod nutrition;

/// Shared constants (re-exported from `platewise-core`)
pub use platewise_core::constants;

/// Nutrient, catalog, and meal models (re-exported from `platewise-core`)
pub use platewise_core::models;

/// Unit conversion table (re-exported from `platewise-core`)
pub use platewise_core::units;
