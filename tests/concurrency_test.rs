// ABOUTME: Concurrent edits against a file-backed database
// ABOUTME: Parallel writers to one meal must never lose an update to its totals
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::Utc;
use common::{apple, chicken_breast, init_test_logging, seed, whole_wheat_bread};
use platewise::config::{DatabaseConfig, EngineConfig};
use platewise::database::Database;
use platewise::models::MealType;
use platewise::nutrition::NutritionEngine;
use tempfile::TempDir;
use uuid::Uuid;

async fn file_engine(dir: &TempDir) -> NutritionEngine {
    init_test_logging();
    let config = EngineConfig {
        database: DatabaseConfig::file(dir.path().join("platewise.db")),
        tx_max_retries: 20,
        ..EngineConfig::default()
    };
    let database = Database::new(&config.database).await.unwrap();
    NutritionEngine::with_local_catalog(database, &config)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_adds_to_one_meal_are_all_counted() {
    let dir = TempDir::new().unwrap();
    let engine = file_engine(&dir).await;
    let (chicken, apple) = (chicken_breast(), apple());
    seed(engine.database(), &[chicken.clone(), apple.clone()]).await;
    let meal = engine
        .create_meal(Uuid::new_v4(), MealType::Lunch, Utc::now())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        let catalog_id = if i % 2 == 0 { chicken.id } else { apple.id };
        handles.push(tokio::spawn(async move {
            engine.add_line(meal.id, catalog_id, 100.0, "g").await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let audit = engine.audit_meal(meal.id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.line_count, 16);
    // 8 × 165 + 8 × 100
    assert!((audit.stored.calories() - 2120.0).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_edits_to_different_lines_keep_totals_exact() {
    let dir = TempDir::new().unwrap();
    let engine = file_engine(&dir).await;
    let (chicken, bread) = (chicken_breast(), whole_wheat_bread());
    seed(engine.database(), &[chicken.clone(), bread.clone()]).await;
    let meal = engine
        .create_meal(Uuid::new_v4(), MealType::Dinner, Utc::now())
        .await
        .unwrap();

    let mut line_ids = Vec::new();
    for _ in 0..4 {
        line_ids.push(
            engine
                .add_line(meal.id, chicken.id, 4.0, "oz")
                .await
                .unwrap()
                .id,
        );
        line_ids.push(
            engine
                .add_line(meal.id, bread.id, 1.0, "slice")
                .await
                .unwrap()
                .id,
        );
    }

    let mut handles = Vec::new();
    for (i, line_id) in line_ids.iter().copied().enumerate() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for round in 1..=5 {
                let grams = 50.0 + f64::from(u32::try_from(i * 10 + round).unwrap());
                engine.edit_quantity(line_id, grams, "g").await?;
            }
            Ok::<_, platewise::errors::AppError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let details = engine.get_meal(meal.id).await.unwrap();
    assert_eq!(details.lines.len(), 8);
    let audit = engine.audit_meal(meal.id).await.unwrap();
    assert!(
        audit.consistent,
        "stored {:?} != computed {:?}",
        audit.stored, audit.computed
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_meals_keep_day_summary_exact() {
    let dir = TempDir::new().unwrap();
    let engine = file_engine(&dir).await;
    let apple = apple();
    seed(engine.database(), &[apple.clone()]).await;

    let user_id = Uuid::new_v4();
    let logged_at = Utc::now();
    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = engine.clone();
        let apple_id = apple.id;
        handles.push(tokio::spawn(async move {
            let meal = engine.create_meal(user_id, MealType::Snack, logged_at).await?;
            engine.add_line(meal.id, apple_id, 150.0, "g").await?;
            Ok::<_, platewise::errors::AppError>(())
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let summary = engine
        .get_day_summary(user_id, logged_at.date_naive())
        .await
        .unwrap();
    assert_eq!(summary.meal_count, 6);
    assert!((summary.totals.calories() - 900.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_data_survives_reopening_the_file() {
    let dir = TempDir::new().unwrap();
    let meal_id = {
        let engine = file_engine(&dir).await;
        let chicken = chicken_breast();
        seed(engine.database(), &[chicken.clone()]).await;
        let meal = engine
            .create_meal(Uuid::new_v4(), MealType::Lunch, Utc::now())
            .await
            .unwrap();
        engine
            .add_line(meal.id, chicken.id, 4.0, "oz")
            .await
            .unwrap();
        meal.id
    };

    let engine = file_engine(&dir).await;
    let totals = engine.get_meal_totals(meal_id).await.unwrap();
    assert!((totals.calories() - 187.1).abs() < 1e-9);
}
