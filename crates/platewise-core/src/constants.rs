// ABOUTME: Engine-wide default values for resolution thresholds and numeric precision
// ABOUTME: Shared by configuration loading and by the pure calculation modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Default values. Every threshold here can be overridden through the environment-based
//! configuration in the main crate.

/// Resolution gate defaults
pub mod resolution {
    /// Minimum quality score for a catalog record to be reused automatically
    pub const DEFAULT_QUALITY_THRESHOLD: f64 = 0.5;

    /// Minimum search similarity for the top candidate to be considered at all
    pub const DEFAULT_MIN_SIMILARITY: f64 = 0.5;

    /// Minimum estimator confidence required to persist a new catalog record
    pub const DEFAULT_MIN_CREATION_CONFIDENCE: f64 = 0.7;

    /// Quality score given to machine-generated records pending human review
    pub const DEFAULT_CREATED_QUALITY_SCORE: f64 = 0.5;

    /// Upper bound on the confidence reported for a best-effort estimate
    pub const DEFAULT_ESTIMATE_MAX_CONFIDENCE: f64 = 0.6;

    /// Quality score stored on records persisted from a best-effort estimate
    pub const ESTIMATED_RECORD_QUALITY_SCORE: f64 = 0.1;

    /// Number of ranked candidates requested from catalog search
    pub const DEFAULT_SEARCH_LIMIT: u32 = 5;
}

/// Quality scoring
pub mod quality {
    /// Score assigned to records failing structural macro validation
    pub const STRUCTURALLY_INVALID_SCORE: f64 = 0.1;

    /// Relative tolerance between stated calories and the 4/4/9 Atwater estimate
    pub const ENERGY_TOLERANCE: f64 = 0.35;

    /// Penalty applied when stated calories disagree with the Atwater estimate
    pub const ENERGY_MISMATCH_PENALTY: f64 = 0.3;

    /// Kilocalories per gram of protein
    pub const KCAL_PER_G_PROTEIN: f64 = 4.0;

    /// Kilocalories per gram of carbohydrate
    pub const KCAL_PER_G_CARBS: f64 = 4.0;

    /// Kilocalories per gram of fat
    pub const KCAL_PER_G_FAT: f64 = 9.0;
}

/// Numeric precision
pub mod precision {
    /// Fixed-point scale for stored nutrient amounts (hundredths)
    pub const NUTRIENT_SCALE: i64 = 100;

    /// Maximum rounding precision supported by the fixed-point scale
    pub const MAX_DECIMALS: u32 = 2;

    /// Default rounding precision for cached line nutrients
    pub const DEFAULT_DECIMALS: u32 = 1;

    /// Tolerance used when comparing floating-point quantities
    pub const QUANTITY_EPSILON: f64 = 1e-9;
}
