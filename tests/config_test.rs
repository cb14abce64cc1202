// ABOUTME: Tests for environment-driven engine configuration
// ABOUTME: Env-mutating tests run serially so variables never leak between them
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

use std::env;
use std::path::PathBuf;

use platewise::config::{
    DatabaseConfig, DatabaseUrl, DaySummaryMode, EngineConfig, ResolutionConfig,
};
use platewise::errors::ErrorCode;
use serial_test::serial;

const ENGINE_VARS: &[&str] = &[
    "DATABASE_URL",
    "DATABASE_MAX_CONNECTIONS",
    "DATABASE_BUSY_TIMEOUT_MS",
    "PLATEWISE_QUALITY_THRESHOLD",
    "PLATEWISE_MIN_SIMILARITY",
    "PLATEWISE_MIN_CREATION_CONFIDENCE",
    "PLATEWISE_CREATED_QUALITY_SCORE",
    "PLATEWISE_ESTIMATE_MAX_CONFIDENCE",
    "PLATEWISE_SEARCH_LIMIT",
    "PLATEWISE_ROUNDING_DECIMALS",
    "PLATEWISE_DAY_SUMMARY_MODE",
    "PLATEWISE_TX_MAX_RETRIES",
    "USDA_API_KEY",
    "USDA_BASE_URL",
    "USDA_CACHE_TTL_SECS",
    "USDA_RATE_LIMIT_PER_MINUTE",
];

fn clear_engine_vars() {
    for var in ENGINE_VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_database_url_parsing() {
    assert_eq!(DatabaseUrl::parse_url("sqlite::memory:").unwrap(), DatabaseUrl::Memory);
    assert_eq!(
        DatabaseUrl::parse_url("sqlite:./data/meals.db").unwrap(),
        DatabaseUrl::SQLite {
            path: PathBuf::from("./data/meals.db")
        }
    );
    assert_eq!(
        DatabaseUrl::parse_url("/var/lib/platewise.db").unwrap(),
        DatabaseUrl::SQLite {
            path: PathBuf::from("/var/lib/platewise.db")
        }
    );

    let err = DatabaseUrl::parse_url("postgresql://user@localhost/db").unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
}

#[test]
fn test_memory_database_uses_one_connection() {
    let config = DatabaseConfig::memory();
    assert!(config.url.is_memory());
    assert_eq!(config.effective_max_connections(), 1);
}

#[test]
fn test_day_summary_mode_parsing() {
    assert_eq!(DaySummaryMode::parse("inline").unwrap(), DaySummaryMode::Inline);
    assert_eq!(DaySummaryMode::parse(" Deferred ").unwrap(), DaySummaryMode::Deferred);
    assert_eq!(
        DaySummaryMode::parse("eventually").unwrap_err().code,
        ErrorCode::ConfigInvalid
    );
}

#[test]
fn test_default_resolution_thresholds_are_valid() {
    let config = ResolutionConfig::default();
    config.validate().unwrap();
    assert!((config.quality_threshold - 0.5).abs() < f64::EPSILON);
    assert!(config.created_quality_score >= config.quality_threshold);
}

#[test]
fn test_out_of_range_threshold_rejected() {
    let config = ResolutionConfig {
        quality_threshold: 1.5,
        ..ResolutionConfig::default()
    };
    let err = config.validate().unwrap_err();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
    assert!(err.message.contains("PLATEWISE_QUALITY_THRESHOLD"));

    let config = ResolutionConfig {
        search_limit: 0,
        ..ResolutionConfig::default()
    };
    assert_eq!(config.validate().unwrap_err().code, ErrorCode::ConfigInvalid);
}

#[test]
fn test_engine_validation_rejects_bad_settings() {
    let config = EngineConfig {
        rounding_decimals: 5,
        ..EngineConfig::in_memory()
    };
    assert_eq!(config.validate().unwrap_err().code, ErrorCode::ConfigInvalid);

    let config = EngineConfig {
        tx_max_retries: 0,
        ..EngineConfig::in_memory()
    };
    assert_eq!(config.validate().unwrap_err().code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_engine_vars();
    let config = EngineConfig::from_env().unwrap();

    assert_eq!(config.day_summary_mode, DaySummaryMode::Inline);
    assert_eq!(config.resolution, ResolutionConfig::default());
    assert!(config.usda.is_none());
    assert!(!config.database.url.is_memory());
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clear_engine_vars();
    env::set_var("DATABASE_URL", "sqlite::memory:");
    env::set_var("PLATEWISE_QUALITY_THRESHOLD", "0.8");
    env::set_var("PLATEWISE_DAY_SUMMARY_MODE", "deferred");
    env::set_var("PLATEWISE_ROUNDING_DECIMALS", "0");
    env::set_var("USDA_API_KEY", "test-key");
    env::set_var("USDA_RATE_LIMIT_PER_MINUTE", "30");

    let config = EngineConfig::from_env().unwrap();
    clear_engine_vars();

    assert!(config.database.url.is_memory());
    assert!((config.resolution.quality_threshold - 0.8).abs() < f64::EPSILON);
    assert_eq!(config.day_summary_mode, DaySummaryMode::Deferred);
    assert_eq!(config.rounding_decimals, 0);
    let usda = config.usda.unwrap();
    assert_eq!(usda.api_key, "test-key");
    assert_eq!(usda.rate_limit_per_minute, 30);
}

#[test]
#[serial]
fn test_from_env_blank_usda_key_disables_client() {
    clear_engine_vars();
    env::set_var("USDA_API_KEY", "   ");
    let config = EngineConfig::from_env().unwrap();
    clear_engine_vars();
    assert!(config.usda.is_none());
}

#[test]
#[serial]
fn test_from_env_unparsable_value_fails_loudly() {
    clear_engine_vars();
    env::set_var("PLATEWISE_MIN_SIMILARITY", "very similar");
    let err = EngineConfig::from_env().unwrap_err();
    clear_engine_vars();

    assert_eq!(err.code, ErrorCode::ConfigInvalid);
    assert!(err.message.contains("PLATEWISE_MIN_SIMILARITY"));
}

#[test]
#[serial]
fn test_from_env_out_of_range_value_fails() {
    clear_engine_vars();
    env::set_var("PLATEWISE_ESTIMATE_MAX_CONFIDENCE", "-0.1");
    let err = EngineConfig::from_env().unwrap_err();
    clear_engine_vars();
    assert_eq!(err.code, ErrorCode::ConfigInvalid);
}

#[test]
#[serial]
fn test_logging_config_from_env() {
    use platewise::logging::{LogFormat, LoggingConfig};

    env::set_var("LOG_FORMAT", "JSON");
    env::set_var("ENVIRONMENT", "production");
    let config = LoggingConfig::from_env();
    env::remove_var("LOG_FORMAT");
    env::remove_var("ENVIRONMENT");

    assert_eq!(config.format, LogFormat::Json);
    assert!(config.include_location);
    assert!(config.include_thread);
    assert_eq!(LogFormat::from_str_or_default("whatever"), LogFormat::Pretty);
}
