// ABOUTME: Integration tests for the resolution gate's Matched / Created / Estimated decisions
// ABOUTME: Uses stub search and estimator collaborators to drive every branch
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use common::{
    broken_record, chicken_breast, create_test_database, create_test_meal, estimate,
    FailingEstimator, FailingSearch, FixedEstimator, StaticSearch,
};
use platewise::config::{EngineConfig, ResolutionConfig};
use platewise::errors::ErrorCode;
use platewise::models::Provenance;
use platewise::nutrition::{
    CatalogCandidate, NutritionEngine, NutritionEstimate, ResolutionGate, ResolutionOutcome,
};

fn gate(search: Arc<StaticSearch>, estimator: Option<Arc<FixedEstimator>>) -> ResolutionGate {
    ResolutionGate::new(
        search,
        estimator.map(|e| e as Arc<dyn platewise::nutrition::NutritionEstimator>),
        ResolutionConfig::default(),
    )
}

#[tokio::test]
async fn test_trusted_similar_candidate_is_matched() {
    let record = chicken_breast();
    let resolution = gate(StaticSearch::top(record.clone(), 0.9), None)
        .resolve("chicken breast", "oz")
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolutionOutcome::Matched);
    assert_eq!(resolution.record.id, record.id);
    assert_eq!(resolution.similarity, Some(0.9));
    assert!(!resolution.needs_clarification);
}

#[tokio::test]
async fn test_low_quality_candidate_is_not_matched() {
    let record = chicken_breast().with_quality_score(0.3);
    let resolution = gate(StaticSearch::top(record, 1.0), None)
        .resolve("chicken breast", "g")
        .await
        .unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
}

#[tokio::test]
async fn test_dissimilar_candidate_is_not_matched() {
    let resolution = gate(StaticSearch::top(chicken_breast(), 0.2), None)
        .resolve("chicken tikka masala", "g")
        .await
        .unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
}

#[tokio::test]
async fn test_invalid_macros_rejected_regardless_of_score() {
    let record = broken_record("mystery bar").with_quality_score(1.0);
    let gate = gate(StaticSearch::top(record.clone(), 1.0), None);
    assert!(!gate.accepts(&CatalogCandidate {
        record,
        similarity: 1.0
    }));

    let resolution = gate.resolve("mystery bar", "serving").await.unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
}

#[tokio::test]
async fn test_only_top_candidate_is_considered() {
    let search = Arc::new(StaticSearch {
        candidates: vec![
            CatalogCandidate {
                record: broken_record("chicken bar"),
                similarity: 0.95,
            },
            CatalogCandidate {
                record: chicken_breast(),
                similarity: 0.9,
            },
        ],
    });
    let resolution = gate(search, None).resolve("chicken", "g").await.unwrap();
    assert_ne!(resolution.outcome, ResolutionOutcome::Matched);
}

#[tokio::test]
async fn test_raising_threshold_never_turns_reject_into_match() {
    let record = chicken_breast().with_quality_score(0.6);
    let candidate = CatalogCandidate {
        record,
        similarity: 0.8,
    };

    let mut previously_accepted = true;
    for step in 0..=10 {
        let threshold = f64::from(step) / 10.0;
        let gate = ResolutionGate::new(
            StaticSearch::empty(),
            None,
            ResolutionConfig {
                quality_threshold: threshold,
                ..ResolutionConfig::default()
            },
        );
        let accepted = gate.accepts(&candidate);
        assert!(
            previously_accepted || !accepted,
            "threshold {threshold} accepted after a lower threshold rejected"
        );
        previously_accepted = accepted;
    }
    assert!(!previously_accepted);
}

#[tokio::test]
async fn test_confident_complete_estimate_is_created() {
    let estimator = FixedEstimator::new(Some(estimate(250.0, 10.0, 30.0, 10.0, 0.85)));
    let resolution = gate(StaticSearch::empty(), Some(Arc::clone(&estimator)))
        .resolve("lentil soup", "g")
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolutionOutcome::Created);
    assert_eq!(resolution.record.provenance, Provenance::MachineGenerated);
    assert!((resolution.record.quality_score - 0.5).abs() < f64::EPSILON);
    assert!(!resolution.needs_clarification);
    assert_eq!(estimator.call_count(), 1);
}

#[tokio::test]
async fn test_unconfident_estimate_falls_back_to_estimated() {
    let estimator = FixedEstimator::new(Some(estimate(250.0, 10.0, 30.0, 10.0, 0.9)));
    let low = FixedEstimator::new(Some(estimate(250.0, 10.0, 30.0, 10.0, 0.4)));

    let created = gate(StaticSearch::empty(), Some(estimator))
        .resolve("lentil soup", "g")
        .await
        .unwrap();
    assert_eq!(created.outcome, ResolutionOutcome::Created);

    let estimated = gate(StaticSearch::empty(), Some(low))
        .resolve("lentil soup", "g")
        .await
        .unwrap();
    assert_eq!(estimated.outcome, ResolutionOutcome::Estimated);
    assert!(estimated.confidence.unwrap() <= 0.4);
    assert!(estimated.needs_clarification);
}

#[tokio::test]
async fn test_structurally_invalid_estimate_is_not_created() {
    let estimator = FixedEstimator::new(Some(estimate(300.0, 0.0, 0.0, 0.0, 0.99)));
    let resolution = gate(StaticSearch::empty(), Some(estimator))
        .resolve("energy drink", "ml")
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
    let nutrients = resolution.record.nutrients;
    assert!(nutrients.calories() > 0.0);
    assert!(nutrients.protein_g() > 0.0 && nutrients.carbs_g() > 0.0 && nutrients.fat_g() > 0.0);
}

#[tokio::test]
async fn test_incomplete_estimate_uses_typical_portion() {
    let estimator = FixedEstimator::new(Some(NutritionEstimate {
        calories: None,
        ..estimate(250.0, 10.0, 30.0, 10.0, 0.95)
    }));
    let resolution = gate(StaticSearch::empty(), Some(estimator))
        .resolve("pasta", "serving")
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
    assert!(resolution.confidence.unwrap() <= 0.6);
    assert_eq!(resolution.record.provenance, Provenance::Estimated);
    assert_eq!(
        resolution.record.household_unit.as_ref().map(|h| h.name.as_str()),
        Some("serving")
    );
}

#[tokio::test]
async fn test_estimated_confidence_is_clamped() {
    let estimator = FixedEstimator::new(Some(estimate(250.0, 10.0, 30.0, 10.0, 0.65)));
    let config = ResolutionConfig {
        min_creation_confidence: 0.9,
        ..ResolutionConfig::default()
    };
    let resolution = ResolutionGate::new(StaticSearch::empty(), Some(estimator), config)
        .resolve("lentil soup", "g")
        .await
        .unwrap();

    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
    assert!(resolution.confidence.unwrap() <= config.estimate_max_confidence);
    assert!((resolution.record.nutrients.calories() - 250.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_estimator_error_is_resolution_failed() {
    let gate = ResolutionGate::new(
        StaticSearch::empty(),
        Some(Arc::new(FailingEstimator)),
        ResolutionConfig::default(),
    );
    let err = gate.resolve("unknown dish", "g").await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ResolutionFailed);
}

#[tokio::test]
async fn test_search_failure_degrades_to_estimate() {
    let gate = ResolutionGate::new(Arc::new(FailingSearch), None, ResolutionConfig::default());
    let resolution = gate.resolve("chicken and rice", "serving").await.unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Estimated);
}

#[tokio::test]
async fn test_estimated_candidates_are_never_matched() {
    let stored_estimate = chicken_breast()
        .with_quality_score(1.0)
        .with_provenance(Provenance::Estimated);
    let trusted = chicken_breast();
    let search = Arc::new(StaticSearch {
        candidates: vec![
            CatalogCandidate {
                record: stored_estimate,
                similarity: 1.0,
            },
            CatalogCandidate {
                record: trusted.clone(),
                similarity: 0.8,
            },
        ],
    });

    let resolution = gate(search, None).resolve("chicken breast", "oz").await.unwrap();
    assert_eq!(resolution.outcome, ResolutionOutcome::Matched);
    assert_eq!(resolution.record.id, trusted.id);
}

#[tokio::test]
async fn test_empty_food_name_is_invalid() {
    let err = gate(StaticSearch::empty(), None)
        .resolve("   ", "g")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn test_created_record_is_persisted_and_then_matched() {
    let database = create_test_database().await;
    let config = EngineConfig::in_memory();
    let estimator = FixedEstimator::new(Some(estimate(116.0, 9.0, 20.0, 0.4, 0.9)));
    let engine = NutritionEngine::with_local_catalog(database, &config)
        .with_estimator(Arc::clone(&estimator) as Arc<dyn platewise::nutrition::NutritionEstimator>);
    let meal_id = create_test_meal(&engine).await;

    let first = engine
        .log_food(meal_id, "lentil soup", 250.0, "g")
        .await
        .unwrap();
    assert_eq!(first.resolution.outcome, ResolutionOutcome::Created);
    assert!((first.line.nutrients.calories() - 290.0).abs() < 1e-9);

    let stored = engine.get_record(first.line.catalog_id).await.unwrap();
    assert_eq!(stored.provenance, Provenance::MachineGenerated);

    let second = engine
        .log_food(meal_id, "lentil soup", 100.0, "g")
        .await
        .unwrap();
    assert_eq!(second.resolution.outcome, ResolutionOutcome::Matched);
    assert_eq!(second.line.catalog_id, first.line.catalog_id);
    assert_eq!(estimator.call_count(), 1);
}

#[tokio::test]
async fn test_estimator_failure_leaves_meal_untouched() {
    let database = create_test_database().await;
    let engine = NutritionEngine::with_local_catalog(database, &EngineConfig::in_memory())
        .with_estimator(Arc::new(FailingEstimator));
    let meal_id = create_test_meal(&engine).await;

    let err = engine
        .log_food(meal_id, "unknown dish", 1.0, "serving")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ResolutionFailed);
    assert!(engine.get_meal(meal_id).await.unwrap().lines.is_empty());
}
