// ABOUTME: Resolution gate deciding whether a food description is Matched, Created, or Estimated
// ABOUTME: Only a trusted, structurally valid, similar-enough top candidate is reused
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Resolution gate
//!
//! ```text
//! Unresolved ──top candidate trusted──────────────────────────▶ Matched
//!      │
//!      ├──estimator: complete, valid, confident────────────────▶ Created
//!      │
//!      └──otherwise: estimator values or typical portion───────▶ Estimated
//! ```
//!
//! The gate only decides. Persisting created or estimated records is left to the engine
//! so it happens inside the engine's transaction.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::collaborators::{CatalogCandidate, CatalogSearch, NutritionEstimate, NutritionEstimator};
use super::estimates::estimate_typical_portion;
use super::quality::validate_macros;
use crate::config::ResolutionConfig;
use crate::constants::resolution::ESTIMATED_RECORD_QUALITY_SCORE;
use crate::errors::{AppError, AppResult};
use crate::logging::EngineLogger;
use crate::models::{CatalogRecord, NutrientSet, Provenance};
use crate::units::{normalize_unit_name, parse_unit};

/// Household unit name for an estimate logged in a mass or volume unit
const DEFAULT_PORTION_UNIT: &str = "portion";

/// How a food description was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// An existing catalog record was reused
    Matched,
    /// A new record was created from a confident estimate
    Created,
    /// A flagged best-effort estimate was used
    Estimated,
}

impl ResolutionOutcome {
    /// Label for logs and storage
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Created => "created",
            Self::Estimated => "estimated",
        }
    }
}

/// Result of resolving one food description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Which branch the gate took
    pub outcome: ResolutionOutcome,
    /// Record to log the food against
    pub record: CatalogRecord,
    /// Search similarity of a matched record
    pub similarity: Option<f64>,
    /// Confidence of an estimate
    pub confidence: Option<f64>,
    /// The user should confirm or correct the logged food
    pub needs_clarification: bool,
}

/// Decides between reusing, creating, and estimating catalog records
#[derive(Clone)]
pub struct ResolutionGate {
    search: Arc<dyn CatalogSearch>,
    estimator: Option<Arc<dyn NutritionEstimator>>,
    config: ResolutionConfig,
}

impl ResolutionGate {
    /// Create a gate over a catalog search and an optional estimator
    #[must_use]
    pub fn new(
        search: Arc<dyn CatalogSearch>,
        estimator: Option<Arc<dyn NutritionEstimator>>,
        config: ResolutionConfig,
    ) -> Self {
        Self {
            search,
            estimator,
            config,
        }
    }

    /// Thresholds in effect
    #[must_use]
    pub const fn config(&self) -> &ResolutionConfig {
        &self.config
    }

    /// Whether a candidate is trustworthy enough to reuse
    #[must_use]
    pub fn accepts(&self, candidate: &CatalogCandidate) -> bool {
        let record = &candidate.record;
        record.quality_score >= self.config.quality_threshold
            && candidate.similarity >= self.config.min_similarity
            && validate_macros(&record.nutrients)
            && record.validate().is_ok()
    }

    /// Resolve a food description entered with `unit`
    ///
    /// # Errors
    ///
    /// Returns `ResolutionFailed` if the estimator fails. Search failures degrade to
    /// estimation.
    pub async fn resolve(&self, food_name: &str, unit: &str) -> AppResult<Resolution> {
        let name = food_name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("food name cannot be empty"));
        }

        let candidates = match self.search.search(name, self.config.search_limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(
                    food.name = %name,
                    search.source = self.search.source_name(),
                    error = %e,
                    "Catalog search failed, falling back to estimation"
                );
                Vec::new()
            }
        };

        let top = candidates
            .into_iter()
            .find(|c| c.record.provenance != Provenance::Estimated);
        if let Some(top) = top {
            if self.accepts(&top) {
                let resolution = Resolution {
                    outcome: ResolutionOutcome::Matched,
                    similarity: Some(top.similarity),
                    record: top.record,
                    confidence: None,
                    needs_clarification: false,
                };
                log(name, &resolution);
                return Ok(resolution);
            }
            debug!(
                food.name = %name,
                catalog.id = %top.record.id,
                catalog.quality = top.record.quality_score,
                search.similarity = top.similarity,
                "Top candidate rejected by resolution gate"
            );
        }

        let estimate = match &self.estimator {
            Some(estimator) => estimator.estimate(name).await.map_err(|e| {
                AppError::resolution_failed(format!("estimator failed for '{name}': {}", e.message))
                    .with_source(e)
            })?,
            None => None,
        };

        let resolution = match estimate {
            Some(estimate) if self.can_create(&estimate) => self.created(name, &estimate),
            other => self.estimated(name, unit, other.as_ref()),
        };
        log(name, &resolution);
        Ok(resolution)
    }

    fn can_create(&self, estimate: &NutritionEstimate) -> bool {
        estimate.is_complete()
            && estimate.confidence >= self.config.min_creation_confidence
            && estimate
                .macros()
                .is_some_and(|(kcal, p, c, f)| validate_macros(&NutrientSet::from_macros(kcal, p, c, f)))
    }

    fn created(&self, name: &str, estimate: &NutritionEstimate) -> Resolution {
        let (kcal, p, c, f) = estimate.macros().unwrap_or_default();
        let mut record = CatalogRecord::new(
            name,
            estimate.reference_grams,
            NutrientSet::from_macros(kcal, p, c, f),
        )
        .with_quality_score(self.config.created_quality_score)
        .with_provenance(Provenance::MachineGenerated);
        if let Some((unit_name, grams)) = &estimate.household_unit {
            if !unit_name.trim().is_empty() && grams.is_finite() && *grams > 0.0 {
                record = record.with_household_unit(normalize_unit_name(unit_name), *grams);
            }
        }
        Resolution {
            outcome: ResolutionOutcome::Created,
            record,
            similarity: None,
            confidence: Some(estimate.confidence),
            needs_clarification: false,
        }
    }

    fn estimated(&self, name: &str, unit: &str, estimate: Option<&NutritionEstimate>) -> Resolution {
        let max_confidence = self.config.estimate_max_confidence;
        let usable = estimate.filter(|e| e.is_complete()).and_then(|e| {
            let (kcal, p, c, f) = e.macros()?;
            (kcal > 0.0 && p > 0.0 && c > 0.0 && f > 0.0).then(|| {
                (
                    e.reference_grams,
                    NutrientSet::from_macros(kcal, p, c, f),
                    e.confidence.clamp(0.0, max_confidence),
                )
            })
        });
        let (grams, nutrients, confidence) = usable.unwrap_or_else(|| {
            let portion = estimate_typical_portion(name, max_confidence);
            (portion.grams, portion.nutrients, portion.confidence)
        });

        let record = CatalogRecord::new(name, grams, nutrients)
            .with_household_unit(estimate_unit_name(unit), grams)
            .with_quality_score(ESTIMATED_RECORD_QUALITY_SCORE)
            .with_provenance(Provenance::Estimated);
        Resolution {
            outcome: ResolutionOutcome::Estimated,
            record,
            similarity: None,
            confidence: Some(confidence),
            needs_clarification: true,
        }
    }
}

/// Household unit an estimated record is measured in
///
/// Mass and volume units keep working through the conversion table, so the estimate is
/// a plain "portion". Any other unit becomes the estimate's own household unit.
fn estimate_unit_name(unit: &str) -> String {
    match parse_unit(unit) {
        Ok(parsed) if parsed.is_gram_convertible() => DEFAULT_PORTION_UNIT.to_owned(),
        _ => {
            let normalized = normalize_unit_name(unit);
            if normalized.is_empty() {
                DEFAULT_PORTION_UNIT.to_owned()
            } else {
                normalized
            }
        }
    }
}

fn log(name: &str, resolution: &Resolution) {
    EngineLogger::log_resolution(
        name,
        resolution.outcome.as_str(),
        resolution.record.id,
        resolution.similarity,
        resolution.confidence,
    );
}
