// ABOUTME: Shared test utilities for engine integration tests
// ABOUTME: Quiet logging, in-memory engines, seed catalog records, and stub collaborators
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate,
    clippy::unwrap_used,
    clippy::expect_used
)]
//! Shared test utilities for `platewise`

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use platewise::config::EngineConfig;
use platewise::database::Database;
use platewise::errors::{AppError, AppResult};
use platewise::models::{CatalogRecord, MealType, NutrientSet};
use platewise::nutrition::{
    CatalogCandidate, CatalogSearch, NutritionEngine, NutritionEstimate, NutritionEstimator,
};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Fresh in-memory database
pub async fn create_test_database() -> Database {
    init_test_logging();
    Database::new(&EngineConfig::in_memory().database)
        .await
        .expect("Failed to create in-memory database")
}

/// Engine over a fresh in-memory database searching the local catalog
pub async fn create_test_engine() -> NutritionEngine {
    create_test_engine_with(&EngineConfig::in_memory()).await
}

/// Engine over a fresh in-memory database with custom settings
pub async fn create_test_engine_with(config: &EngineConfig) -> NutritionEngine {
    init_test_logging();
    let database = Database::new(&config.database)
        .await
        .expect("Failed to create database");
    NutritionEngine::with_local_catalog(database, config)
}

/// Create a lunch meal for a new user
pub async fn create_test_meal(engine: &NutritionEngine) -> Uuid {
    engine
        .create_meal(Uuid::new_v4(), MealType::Lunch, chrono::Utc::now())
        .await
        .expect("Failed to create meal")
        .id
}

// ================================
// Seed records
// ================================

/// 165 kcal per 100 g, household unit "oz" = 28.35 g
pub fn chicken_breast() -> CatalogRecord {
    CatalogRecord::new(
        "chicken breast",
        100.0,
        NutrientSet::from_macros(165.0, 31.0, 0.0, 3.6),
    )
    .with_household_unit("oz", 28.35)
}

/// 100 kcal per 100 g, no household unit
pub fn apple() -> CatalogRecord {
    CatalogRecord::new("apple", 100.0, NutrientSet::from_macros(100.0, 0.5, 25.0, 0.3))
}

/// One 107 g slice per reference amount
pub fn whole_wheat_bread() -> CatalogRecord {
    CatalogRecord::new(
        "whole wheat bread",
        107.0,
        NutrientSet::from_macros(264.3, 13.9, 44.0, 3.7),
    )
    .with_household_unit("slice", 107.0)
}

/// Opaque branded product measured in scoops
pub fn protein_powder() -> CatalogRecord {
    CatalogRecord::new(
        "vanilla protein powder",
        30.0,
        NutrientSet::from_macros(120.0, 24.0, 3.0, 1.5),
    )
    .with_household_unit("scoop", 30.0)
    .with_brand("Acme Nutrition")
    .opaque()
}

/// Restaurant dish with no household unit
pub fn pad_thai() -> CatalogRecord {
    CatalogRecord::new(
        "pad thai",
        350.0,
        NutrientSet::from_macros(630.0, 25.0, 80.0, 22.0),
    )
}

/// 200 kcal with all-zero macros and a full stored score
pub fn broken_record(name: &str) -> CatalogRecord {
    CatalogRecord::new(name, 100.0, NutrientSet::from_macros(200.0, 0.0, 0.0, 0.0))
}

/// Insert records bypassing quality capping
pub async fn seed(database: &Database, records: &[CatalogRecord]) {
    for record in records {
        database
            .insert_record(record)
            .await
            .expect("Failed to seed record");
    }
}

// ================================
// Stub collaborators
// ================================

/// Search returning fixed candidates regardless of the query
pub struct StaticSearch {
    pub candidates: Vec<CatalogCandidate>,
}

impl StaticSearch {
    pub fn top(record: CatalogRecord, similarity: f64) -> Arc<Self> {
        Arc::new(Self {
            candidates: vec![CatalogCandidate { record, similarity }],
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            candidates: Vec::new(),
        })
    }
}

#[async_trait]
impl CatalogSearch for StaticSearch {
    async fn search(&self, _text: &str, limit: u32) -> AppResult<Vec<CatalogCandidate>> {
        Ok(self
            .candidates
            .iter()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Search that always fails
pub struct FailingSearch;

#[async_trait]
impl CatalogSearch for FailingSearch {
    async fn search(&self, _text: &str, _limit: u32) -> AppResult<Vec<CatalogCandidate>> {
        Err(AppError::external_service("stub search", "connection reset"))
    }

    fn source_name(&self) -> &'static str {
        "failing"
    }
}

/// Estimator returning a fixed answer and counting calls
pub struct FixedEstimator {
    pub estimate: Option<NutritionEstimate>,
    pub calls: AtomicU32,
}

impl FixedEstimator {
    pub fn new(estimate: Option<NutritionEstimate>) -> Arc<Self> {
        Arc::new(Self {
            estimate,
            calls: AtomicU32::new(0),
        })
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NutritionEstimator for FixedEstimator {
    async fn estimate(&self, food_name: &str) -> AppResult<Option<NutritionEstimate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.estimate.clone().map(|mut e| {
            e.name = food_name.to_owned();
            e
        }))
    }
}

/// Estimator that always errors
pub struct FailingEstimator;

#[async_trait]
impl NutritionEstimator for FailingEstimator {
    async fn estimate(&self, _food_name: &str) -> AppResult<Option<NutritionEstimate>> {
        Err(AppError::external_service("stub estimator", "model timeout"))
    }
}

/// Complete estimate with the given confidence
pub fn estimate(calories: f64, protein: f64, carbs: f64, fat: f64, confidence: f64) -> NutritionEstimate {
    NutritionEstimate {
        name: String::new(),
        reference_grams: 100.0,
        household_unit: None,
        calories: Some(calories),
        protein_g: Some(protein),
        carbs_g: Some(carbs),
        fat_g: Some(fat),
        confidence,
    }
}

/// Assert two floats agree to within 1e-9
pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
