// ABOUTME: Local catalog search ranking stored records by token similarity to the query
// ABOUTME: SQL narrows candidates by substring; ranking happens in memory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use std::cmp::Ordering;
use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use super::collaborators::{CatalogCandidate, CatalogSearch};
use crate::database::{catalog, Database};
use crate::errors::AppResult;
use crate::units::normalize_unit_name;

const STOPWORDS: &[&str] = &["a", "an", "and", "of", "the", "with", "in", "on"];

/// SQL candidates fetched per requested result before ranking
const CANDIDATE_OVERFETCH: u32 = 4;

/// Lowercase, singularized word tokens without stopwords
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(normalize_unit_name)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Dice coefficient over word tokens; 1.0 for identical token sets
#[must_use]
pub fn name_similarity(query: &str, name: &str) -> f64 {
    let a = tokenize(query);
    let b = tokenize(name);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(&b).count();
    (2.0 * shared as f64) / (a.len() + b.len()) as f64
}

/// Sort candidates by similarity, then quality score, best first
pub fn rank_candidates(candidates: &mut [CatalogCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                b.record
                    .quality_score
                    .partial_cmp(&a.record.quality_score)
                    .unwrap_or(Ordering::Equal)
            })
    });
}

/// Catalog search over the local `catalog_records` table
#[derive(Clone)]
pub struct DatabaseCatalogSearch {
    database: Database,
}

impl DatabaseCatalogSearch {
    /// Search the given database
    #[must_use]
    pub const fn new(database: Database) -> Self {
        Self { database }
    }
}

#[async_trait]
impl CatalogSearch for DatabaseCatalogSearch {
    async fn search(&self, text: &str, limit: u32) -> AppResult<Vec<CatalogCandidate>> {
        let mut tokens = tokenize(text);
        tokens.extend(
            text.split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .filter(|t| t.len() > 2 && !STOPWORDS.contains(&t.as_str())),
        );
        let tokens: Vec<String> = tokens.into_iter().collect();
        let mut conn = self.database.pool().acquire().await?;
        let records = catalog::records_matching_tokens(
            &mut conn,
            &tokens,
            limit.saturating_mul(CANDIDATE_OVERFETCH),
        )
        .await?;

        let mut candidates: Vec<CatalogCandidate> = records
            .into_iter()
            .map(|record| CatalogCandidate {
                similarity: name_similarity(text, &record.name),
                record,
            })
            .filter(|c| c.similarity > 0.0)
            .collect();
        rank_candidates(&mut candidates);
        candidates.truncate(limit as usize);

        debug!(
            query = text,
            candidates = candidates.len(),
            "Local catalog search complete"
        );
        Ok(candidates)
    }

    fn source_name(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_ignores_case_plurals_and_stopwords() {
        assert!((name_similarity("Chicken Breasts", "chicken breast") - 1.0).abs() < f64::EPSILON);
        assert!((name_similarity("slice of bread", "bread slice") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_overlap() {
        let sim = name_similarity("chicken", "chicken breast, roasted");
        assert!(sim > 0.4 && sim < 1.0);
        assert!(name_similarity("tofu", "chicken").abs() < f64::EPSILON);
    }
}
