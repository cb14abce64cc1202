// ABOUTME: Built-in typical-portion table backing best-effort estimates for unknown foods
// ABOUTME: Keyword matching over composite descriptions with a generic mixed-meal fallback
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Typical portions
//!
//! Values are for one typical portion as served, not per 100 g. Composite descriptions
//! ("chicken and rice", "salmon with potatoes, salad") are split into components and
//! summed. An estimate never has zero calories, protein, carbohydrate, or fat.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::models::{Nutrient, NutrientSet};

/// Confidence when every component matched a table entry
const FULL_MATCH_CONFIDENCE: f64 = 0.5;
/// Confidence when only some components matched
const PARTIAL_MATCH_CONFIDENCE: f64 = 0.35;
/// Confidence of the generic mixed-meal fallback
const FALLBACK_CONFIDENCE: f64 = 0.2;
/// Smallest value reported for a headline nutrient
const HEADLINE_FLOOR: f64 = 0.1;

/// One typical portion of a food
#[derive(Debug, Clone)]
pub struct TypicalPortion {
    /// Portion weight in grams
    pub grams: f64,
    /// Energy in kcal
    pub calories: f64,
    /// Protein in grams
    pub protein_g: f64,
    /// Carbohydrate in grams
    pub carbs_g: f64,
    /// Fat in grams
    pub fat_g: f64,
    /// Other names matching this entry
    pub aliases: &'static [&'static str],
}

impl TypicalPortion {
    const fn new(grams: f64, calories: f64, protein_g: f64, carbs_g: f64, fat_g: f64) -> Self {
        Self {
            grams,
            calories,
            protein_g,
            carbs_g,
            fat_g,
            aliases: &[],
        }
    }

    const fn with_aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn nutrients(&self) -> NutrientSet {
        NutrientSet::from_macros(self.calories, self.protein_g, self.carbs_g, self.fat_g)
    }
}

/// Stand-in for a component the table does not know
const GENERIC_COMPONENT: TypicalPortion = TypicalPortion::new(150.0, 200.0, 8.0, 25.0, 8.0);

/// Stand-in for a description with no recognizable component
const MIXED_MEAL: TypicalPortion = TypicalPortion::new(300.0, 450.0, 20.0, 50.0, 18.0);

static TYPICAL_PORTIONS: LazyLock<HashMap<&'static str, TypicalPortion>> = LazyLock::new(|| {
    let mut m = HashMap::new();

    // === Proteins ===
    m.insert(
        "chicken",
        TypicalPortion::new(120.0, 198.0, 37.0, 0.0, 4.3)
            .with_aliases(&["chicken breast", "grilled chicken", "roast chicken"]),
    );
    m.insert(
        "beef",
        TypicalPortion::new(113.0, 250.0, 26.0, 0.0, 17.0)
            .with_aliases(&["steak", "ground beef", "mince"]),
    );
    m.insert(
        "pork",
        TypicalPortion::new(113.0, 240.0, 27.0, 0.0, 14.0).with_aliases(&["ham", "bacon", "pork chop"]),
    );
    m.insert(
        "fish",
        TypicalPortion::new(120.0, 210.0, 25.0, 0.0, 12.0).with_aliases(&["salmon", "tuna", "cod"]),
    );
    m.insert(
        "egg",
        TypicalPortion::new(50.0, 72.0, 6.3, 0.4, 4.8).with_aliases(&["omelette", "omelet", "scrambled egg"]),
    );
    m.insert("tofu", TypicalPortion::new(126.0, 94.0, 10.0, 2.3, 5.9));
    m.insert(
        "beans",
        TypicalPortion::new(130.0, 150.0, 9.0, 27.0, 0.6).with_aliases(&["lentils", "chickpeas"]),
    );

    // === Starches ===
    m.insert(
        "rice",
        TypicalPortion::new(158.0, 205.0, 4.3, 44.5, 0.4)
            .with_aliases(&["white rice", "brown rice", "fried rice"]),
    );
    m.insert(
        "pasta",
        TypicalPortion::new(140.0, 220.0, 8.1, 43.2, 1.3).with_aliases(&["spaghetti", "noodles", "macaroni"]),
    );
    m.insert(
        "bread",
        TypicalPortion::new(30.0, 80.0, 2.7, 14.0, 1.0).with_aliases(&["toast", "roll", "bagel"]),
    );
    m.insert(
        "potato",
        TypicalPortion::new(150.0, 130.0, 3.0, 30.0, 0.2).with_aliases(&["fries", "mashed potato", "chips"]),
    );
    m.insert(
        "oatmeal",
        TypicalPortion::new(234.0, 158.0, 6.0, 27.0, 3.2).with_aliases(&["oats", "porridge"]),
    );
    m.insert(
        "cereal",
        TypicalPortion::new(40.0, 150.0, 3.0, 33.0, 1.5).with_aliases(&["granola", "muesli"]),
    );

    // === Dishes ===
    m.insert(
        "pizza",
        TypicalPortion::new(107.0, 285.0, 12.0, 36.0, 10.0),
    );
    m.insert(
        "sandwich",
        TypicalPortion::new(200.0, 400.0, 20.0, 45.0, 15.0).with_aliases(&["sub", "wrap"]),
    );
    m.insert(
        "burger",
        TypicalPortion::new(220.0, 540.0, 28.0, 40.0, 28.0).with_aliases(&["hamburger", "cheeseburger"]),
    );
    m.insert("soup", TypicalPortion::new(250.0, 120.0, 6.0, 15.0, 4.0));
    m.insert(
        "curry",
        TypicalPortion::new(250.0, 300.0, 15.0, 20.0, 18.0),
    );
    m.insert(
        "salad",
        TypicalPortion::new(150.0, 50.0, 2.0, 7.0, 2.0).with_aliases(&["green salad", "side salad"]),
    );

    // === Dairy, fruit, vegetables ===
    m.insert(
        "yogurt",
        TypicalPortion::new(170.0, 150.0, 15.0, 8.0, 5.0).with_aliases(&["yoghurt", "greek yogurt"]),
    );
    m.insert("cheese", TypicalPortion::new(28.0, 113.0, 7.0, 0.4, 9.3));
    m.insert("milk", TypicalPortion::new(244.0, 122.0, 8.1, 11.7, 4.8));
    m.insert(
        "fruit",
        TypicalPortion::new(150.0, 80.0, 1.0, 20.0, 0.3)
            .with_aliases(&["apple", "banana", "orange", "berries"]),
    );
    m.insert(
        "vegetables",
        TypicalPortion::new(100.0, 40.0, 2.5, 7.0, 0.4)
            .with_aliases(&["veggies", "broccoli", "carrots", "green beans"]),
    );

    m
});

/// Best-effort estimate for a free-text description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortionEstimate {
    /// Description the estimate is for
    pub description: String,
    /// Estimated portion weight in grams
    pub grams: f64,
    /// Estimated nutrients for `grams`
    pub nutrients: NutrientSet,
    /// Confidence in [0, `max_confidence`]
    pub confidence: f64,
    /// Table entries that matched
    pub matched: Vec<String>,
}

fn contains_phrase(haystack: &str, phrase: &str) -> bool {
    let padded = format!(" {haystack} ");
    padded.contains(&format!(" {phrase} ")) || padded.contains(&format!(" {phrase}s "))
}

/// Longest table key or alias appearing in the component
fn lookup_portion(component: &str) -> Option<(&'static str, &'static TypicalPortion)> {
    TYPICAL_PORTIONS
        .iter()
        .flat_map(move |(key, portion)| {
            std::iter::once(*key)
                .chain(portion.aliases.iter().copied())
                .filter(move |phrase| contains_phrase(component, phrase))
                .map(move |phrase| (phrase.len(), *key, portion))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| b.1.cmp(a.1)))
        .map(|(_, key, portion)| (key, portion))
}

/// Split a description into lowercase components
fn split_components(description: &str) -> Vec<String> {
    let lowered = description.to_lowercase();
    let mut normalized = lowered.replace(['&', '+', ',', ';'], " | ");
    for joiner in [" and ", " with ", " plus "] {
        normalized = normalized.replace(joiner, " | ");
    }
    normalized
        .split('|')
        .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|c| !c.is_empty())
        .collect()
}

fn floor_headline(mut nutrients: NutrientSet) -> NutrientSet {
    for nutrient in [
        Nutrient::Calories,
        Nutrient::Protein,
        Nutrient::Carbohydrate,
        Nutrient::Fat,
    ] {
        if nutrients.get(nutrient) < HEADLINE_FLOOR {
            nutrients.set(nutrient, HEADLINE_FLOOR);
        }
    }
    nutrients
}

/// Estimate a typical portion for a description
///
/// Confidence is capped at `max_confidence`.
#[must_use]
pub fn estimate_typical_portion(description: &str, max_confidence: f64) -> PortionEstimate {
    let components = split_components(description);
    let mut matched = Vec::new();
    let mut grams = 0.0;
    let mut nutrients = NutrientSet::zero();

    for component in &components {
        let portion = match lookup_portion(component) {
            Some((key, portion)) => {
                matched.push(key.to_owned());
                portion
            }
            None => &GENERIC_COMPONENT,
        };
        grams += portion.grams;
        nutrients += portion.nutrients();
    }

    let confidence = if matched.is_empty() {
        grams = MIXED_MEAL.grams;
        nutrients = MIXED_MEAL.nutrients();
        FALLBACK_CONFIDENCE
    } else if matched.len() == components.len() {
        FULL_MATCH_CONFIDENCE
    } else {
        PARTIAL_MATCH_CONFIDENCE
    };

    PortionEstimate {
        description: description.trim().to_owned(),
        grams,
        nutrients: floor_headline(nutrients),
        confidence: confidence.min(max_confidence),
        matched,
    }
}
