// ABOUTME: Configuration management for the nutrition engine
// ABOUTME: Environment-only configuration for database, resolution thresholds, rounding, and USDA
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Environment-based configuration
//!
//! Every setting has a default; variables that are set but unparsable fail loudly with
//! `ConfigInvalid` instead of silently falling back.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::precision::{DEFAULT_DECIMALS, MAX_DECIMALS};
use crate::constants::resolution::{
    DEFAULT_CREATED_QUALITY_SCORE, DEFAULT_ESTIMATE_MAX_CONFIDENCE,
    DEFAULT_MIN_CREATION_CONFIDENCE, DEFAULT_MIN_SIMILARITY, DEFAULT_QUALITY_THRESHOLD,
    DEFAULT_SEARCH_LIMIT,
};
use crate::errors::{AppError, AppResult};
use crate::external::usda_client::UsdaClientConfig;

/// Database connection configuration
pub mod database;

pub use database::{DatabaseConfig, DatabaseUrl};

/// Default number of attempts for a mutation transaction
pub const DEFAULT_TX_MAX_RETRIES: u32 = 5;

/// Read an environment variable, falling back to `default` when unset
pub(crate) fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an environment variable, falling back to `default` when unset
pub(crate) fn env_parse<T>(key: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::config(format!("Invalid {key} value '{raw}': {e}"))),
        Err(_) => Ok(default),
    }
}

/// When day summaries are recomputed after a meal changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaySummaryMode {
    /// In the same transaction as the meal change
    #[default]
    Inline,
    /// In a spawned task after the meal change commits
    Deferred,
}

impl DaySummaryMode {
    /// Parse a `PLATEWISE_DAY_SUMMARY_MODE` value
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for unknown modes
    pub fn parse(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "inline" => Ok(Self::Inline),
            "deferred" => Ok(Self::Deferred),
            other => Err(AppError::config(format!(
                "Invalid PLATEWISE_DAY_SUMMARY_MODE '{other}': expected inline or deferred"
            ))),
        }
    }
}

/// Thresholds used by the resolution gate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Minimum quality score for reusing a catalog match
    pub quality_threshold: f64,
    /// Minimum name similarity for reusing a catalog match
    pub min_similarity: f64,
    /// Minimum estimator confidence for creating a catalog record
    pub min_creation_confidence: f64,
    /// Quality score assigned to records created from estimates
    pub created_quality_score: f64,
    /// Upper bound on the confidence reported for typical-portion estimates
    pub estimate_max_confidence: f64,
    /// Number of candidates requested from catalog search
    pub search_limit: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            min_similarity: DEFAULT_MIN_SIMILARITY,
            min_creation_confidence: DEFAULT_MIN_CREATION_CONFIDENCE,
            created_quality_score: DEFAULT_CREATED_QUALITY_SCORE,
            estimate_max_confidence: DEFAULT_ESTIMATE_MAX_CONFIDENCE,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl ResolutionConfig {
    /// Load resolution thresholds from environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if a variable is present but unparsable
    pub fn from_env() -> AppResult<Self> {
        Ok(Self {
            quality_threshold: env_parse("PLATEWISE_QUALITY_THRESHOLD", DEFAULT_QUALITY_THRESHOLD)?,
            min_similarity: env_parse("PLATEWISE_MIN_SIMILARITY", DEFAULT_MIN_SIMILARITY)?,
            min_creation_confidence: env_parse(
                "PLATEWISE_MIN_CREATION_CONFIDENCE",
                DEFAULT_MIN_CREATION_CONFIDENCE,
            )?,
            created_quality_score: env_parse(
                "PLATEWISE_CREATED_QUALITY_SCORE",
                DEFAULT_CREATED_QUALITY_SCORE,
            )?,
            estimate_max_confidence: env_parse(
                "PLATEWISE_ESTIMATE_MAX_CONFIDENCE",
                DEFAULT_ESTIMATE_MAX_CONFIDENCE,
            )?,
            search_limit: env_parse("PLATEWISE_SEARCH_LIMIT", DEFAULT_SEARCH_LIMIT)?,
        })
    }

    /// Check every threshold lies in its valid range
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first out-of-range setting
    pub fn validate(&self) -> AppResult<()> {
        let unit_interval = [
            ("PLATEWISE_QUALITY_THRESHOLD", self.quality_threshold),
            ("PLATEWISE_MIN_SIMILARITY", self.min_similarity),
            ("PLATEWISE_MIN_CREATION_CONFIDENCE", self.min_creation_confidence),
            ("PLATEWISE_CREATED_QUALITY_SCORE", self.created_quality_score),
            ("PLATEWISE_ESTIMATE_MAX_CONFIDENCE", self.estimate_max_confidence),
        ];
        for (name, value) in unit_interval {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::config(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.search_limit == 0 || self.search_limit > 200 {
            return Err(AppError::config(format!(
                "PLATEWISE_SEARCH_LIMIT must be between 1 and 200, got {}",
                self.search_limit
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Database connection settings
    pub database: DatabaseConfig,
    /// Resolution gate thresholds
    pub resolution: ResolutionConfig,
    /// Decimal places kept on line nutrients (0 to 2)
    pub rounding_decimals: u32,
    /// When day summaries are recomputed
    pub day_summary_mode: DaySummaryMode,
    /// Attempts per mutation transaction before giving up on lock contention
    pub tx_max_retries: u32,
    /// USDA `FoodData` Central client settings, present when `USDA_API_KEY` is set
    pub usda: Option<UsdaClientConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            resolution: ResolutionConfig::default(),
            rounding_decimals: DEFAULT_DECIMALS,
            day_summary_mode: DaySummaryMode::Inline,
            tx_max_retries: DEFAULT_TX_MAX_RETRIES,
            usda: None,
        }
    }
}

impl EngineConfig {
    /// In-memory configuration with default thresholds
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            database: DatabaseConfig::memory(),
            ..Self::default()
        }
    }

    /// Load and validate configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if any variable is unparsable or out of range
    pub fn from_env() -> AppResult<Self> {
        let usda = match env::var("USDA_API_KEY") {
            Ok(api_key) if !api_key.trim().is_empty() => {
                let defaults = UsdaClientConfig::default();
                Some(UsdaClientConfig {
                    api_key,
                    base_url: env_var_or("USDA_BASE_URL", &defaults.base_url),
                    cache_ttl_secs: env_parse("USDA_CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
                    rate_limit_per_minute: env_parse(
                        "USDA_RATE_LIMIT_PER_MINUTE",
                        defaults.rate_limit_per_minute,
                    )?,
                })
            }
            _ => None,
        };

        let config = Self {
            database: DatabaseConfig::from_env()?,
            resolution: ResolutionConfig::from_env()?,
            rounding_decimals: env_parse("PLATEWISE_ROUNDING_DECIMALS", DEFAULT_DECIMALS)?,
            day_summary_mode: DaySummaryMode::parse(&env_var_or(
                "PLATEWISE_DAY_SUMMARY_MODE",
                "inline",
            ))?,
            tx_max_retries: env_parse("PLATEWISE_TX_MAX_RETRIES", DEFAULT_TX_MAX_RETRIES)?,
            usda,
        };
        config.validate()?;

        info!(
            database.url = %config.database.url,
            day_summary.mode = ?config.day_summary_mode,
            rounding.decimals = config.rounding_decimals,
            usda.enabled = config.usda.is_some(),
            "Engine configuration loaded"
        );
        Ok(config)
    }

    /// Check every setting lies in its valid range
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` naming the first out-of-range setting
    pub fn validate(&self) -> AppResult<()> {
        self.resolution.validate()?;
        if self.rounding_decimals > MAX_DECIMALS {
            return Err(AppError::config(format!(
                "PLATEWISE_ROUNDING_DECIMALS must be at most {MAX_DECIMALS}, got {}",
                self.rounding_decimals
            )));
        }
        if self.tx_max_retries == 0 {
            return Err(AppError::config("PLATEWISE_TX_MAX_RETRIES must be at least 1"));
        }
        if self.database.max_connections == 0 {
            return Err(AppError::config("DATABASE_MAX_CONNECTIONS must be at least 1"));
        }
        if let Some(usda) = &self.usda {
            if usda.rate_limit_per_minute == 0 {
                return Err(AppError::config("USDA_RATE_LIMIT_PER_MINUTE must be at least 1"));
            }
        }
        Ok(())
    }
}
