// ABOUTME: Contracts for external collaborators: catalog search, food parsing, nutrition estimation
// ABOUTME: Includes a rule-based parser for simple "2 slices toast, 100 g rice" descriptions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;
use crate::models::CatalogRecord;
use crate::units::parse_unit;

/// A catalog record returned by search, with its name similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    /// The candidate record
    pub record: CatalogRecord,
    /// Similarity to the query in [0, 1]
    pub similarity: f64,
}

/// Ranked catalog lookup by free-text food name
#[async_trait]
pub trait CatalogSearch: Send + Sync {
    /// Best candidates first, at most `limit`
    async fn search(&self, text: &str, limit: u32) -> AppResult<Vec<CatalogCandidate>>;

    /// Source name for logs
    fn source_name(&self) -> &'static str;
}

/// One food mention extracted from free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedFood {
    /// Food name as written
    pub name: String,
    /// Quantity, when the text gave one
    pub quantity: Option<f64>,
    /// Unit, when the text gave one
    pub unit: Option<String>,
    /// Parser confidence in [0, 1]
    pub confidence: f64,
}

/// Natural-language food parsing
#[async_trait]
pub trait FoodParser: Send + Sync {
    /// Split a description into food mentions
    async fn parse(&self, text: &str) -> AppResult<Vec<ParsedFood>>;
}

/// Nutrition estimate for a food the catalog does not know
///
/// Values are per `reference_grams`. Missing values make the estimate incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionEstimate {
    /// Food name the estimate is for
    pub name: String,
    /// Grams the values refer to
    pub reference_grams: f64,
    /// Optional household unit with its gram weight
    pub household_unit: Option<(String, f64)>,
    /// Energy in kcal
    pub calories: Option<f64>,
    /// Protein in grams
    pub protein_g: Option<f64>,
    /// Carbohydrate in grams
    pub carbs_g: Option<f64>,
    /// Fat in grams
    pub fat_g: Option<f64>,
    /// Estimator confidence in [0, 1]
    pub confidence: f64,
}

impl NutritionEstimate {
    /// The four headline values when all are present, finite, and non-negative
    #[must_use]
    pub fn macros(&self) -> Option<(f64, f64, f64, f64)> {
        let values = (self.calories?, self.protein_g?, self.carbs_g?, self.fat_g?);
        let all = [values.0, values.1, values.2, values.3];
        all.iter()
            .all(|v| v.is_finite() && *v >= 0.0)
            .then_some(values)
    }

    /// All headline values present and the reference weight positive
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.macros().is_some() && self.reference_grams.is_finite() && self.reference_grams > 0.0
    }
}

/// Nutrition estimation for unknown foods (typically model-backed)
#[async_trait]
pub trait NutritionEstimator: Send + Sync {
    /// Estimate a food's nutrition; `Ok(None)` when the estimator has no answer
    async fn estimate(&self, food_name: &str) -> AppResult<Option<NutritionEstimate>>;
}

/// Rule-based parser for comma- or line-separated entries like "2 slices toast"
///
/// Each entry may start with a number (`2`, `1.5`, `1/2`, `100g`) and a unit from the
/// conversion table, optionally followed by "of".
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFoodParser;

const PORTIONED_CONFIDENCE: f64 = 0.8;
const UNPORTIONED_CONFIDENCE: f64 = 0.5;

fn parse_number(token: &str) -> Option<f64> {
    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        return (den > 0.0 && num >= 0.0).then_some(num / den);
    }
    token.parse().ok().filter(|v: &f64| v.is_finite() && *v >= 0.0)
}

/// Split a leading "100g" style token into its number and unit parts
fn split_attached_unit(token: &str) -> Option<(f64, String)> {
    let idx = token.find(|c: char| c.is_ascii_alphabetic())?;
    if idx == 0 {
        return None;
    }
    let (number, unit) = token.split_at(idx);
    let quantity = parse_number(number)?;
    parse_unit(unit).ok()?;
    Some((quantity, unit.to_owned()))
}

fn parse_entry(entry: &str) -> Option<ParsedFood> {
    let tokens: Vec<&str> = entry.split_whitespace().collect();
    let first = *tokens.first()?;

    let (quantity, mut unit, mut rest) = if let Some(q) = parse_number(first) {
        (Some(q), None, &tokens[1..])
    } else if let Some((q, u)) = split_attached_unit(first) {
        (Some(q), Some(u), &tokens[1..])
    } else {
        (None, None, &tokens[..])
    };

    if quantity.is_some() && unit.is_none() {
        if rest.len() > 2 && parse_unit(&rest[..2].join(" ")).is_ok() {
            unit = Some(rest[..2].join(" "));
            rest = &rest[2..];
        } else if rest.len() > 1 && parse_unit(rest[0]).is_ok() {
            unit = Some(rest[0].to_owned());
            rest = &rest[1..];
        }
    }
    if unit.is_some() && rest.first().is_some_and(|t| t.eq_ignore_ascii_case("of")) {
        rest = &rest[1..];
    }

    let name = rest.join(" ");
    if name.is_empty() {
        return None;
    }
    Some(ParsedFood {
        name,
        quantity,
        unit,
        confidence: if quantity.is_some() {
            PORTIONED_CONFIDENCE
        } else {
            UNPORTIONED_CONFIDENCE
        },
    })
}

#[async_trait]
impl FoodParser for SimpleFoodParser {
    async fn parse(&self, text: &str) -> AppResult<Vec<ParsedFood>> {
        Ok(text
            .split(|c| matches!(c, ',' | ';' | '\n'))
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .filter_map(parse_entry)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parses_quantities_and_units() {
        let parsed = SimpleFoodParser
            .parse("2 slices toast, 100g rice; 1.5 cups of milk\nchicken and rice")
            .await
            .unwrap();
        assert_eq!(parsed.len(), 4);

        assert_eq!(parsed[0].name, "toast");
        assert_eq!(parsed[0].quantity, Some(2.0));
        assert_eq!(parsed[0].unit.as_deref(), Some("slices"));

        assert_eq!(parsed[1].name, "rice");
        assert_eq!(parsed[1].unit.as_deref(), Some("g"));

        assert_eq!(parsed[2].name, "milk");
        assert_eq!(parsed[2].quantity, Some(1.5));

        assert_eq!(parsed[3].name, "chicken and rice");
        assert_eq!(parsed[3].quantity, None);
        assert!(parsed[3].confidence < parsed[0].confidence);
    }

    #[tokio::test]
    async fn test_count_without_unit() {
        let parsed = SimpleFoodParser.parse("1/2 avocado").await.unwrap();
        assert_eq!(parsed[0].quantity, Some(0.5));
        assert_eq!(parsed[0].unit, None);
        assert_eq!(parsed[0].name, "avocado");
    }

    #[test]
    fn test_incomplete_estimate() {
        let estimate = NutritionEstimate {
            name: "mystery".to_owned(),
            reference_grams: 100.0,
            household_unit: None,
            calories: Some(100.0),
            protein_g: None,
            carbs_g: Some(10.0),
            fat_g: Some(1.0),
            confidence: 0.9,
        };
        assert!(!estimate.is_complete());
    }
}
