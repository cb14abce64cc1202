// ABOUTME: Operator CLI for catalog seeding, USDA import, rescoring, and meal consistency audits
// ABOUTME: Reads engine configuration from the environment like the library does
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Operator commands for a Platewise database.
//!
//! Usage:
//! ```bash
//! # Load catalog records from a JSON array
//! cargo run --bin platewise-admin -- seed ./data/catalog.json
//!
//! # Import one USDA FoodData Central food (needs USDA_API_KEY)
//! cargo run --bin platewise-admin -- import-usda 171477
//!
//! # Re-apply quality rules to every record
//! cargo run --bin platewise-admin -- rescore
//!
//! # Compare a meal's stored totals against its lines
//! cargo run --bin platewise-admin -- audit 6f1c...
//!
//! # Show (or recompute) a day summary
//! cargo run --bin platewise-admin -- day <user-id> 2025-03-14 --recompute
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use platewise::config::EngineConfig;
use platewise::database::Database;
use platewise::external::UsdaClient;
use platewise::logging;
use platewise::models::{CatalogRecord, NutrientValues, Provenance};
use platewise::nutrition::NutritionEngine;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "platewise-admin",
    about = "Platewise catalog and aggregate maintenance",
    long_about = "Operator commands for a Platewise database: seed and import catalog records, rescore quality, and audit meal totals."
)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCommand,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Insert catalog records from a JSON file
    Seed {
        /// Path to a JSON array of records
        file: PathBuf,
    },

    /// Import one food from USDA FoodData Central by FDC id
    ImportUsda {
        /// FoodData Central id
        fdc_id: u64,
    },

    /// Recompute every catalog record's quality score
    Rescore,

    /// Check a meal's stored totals against the sum of its lines
    Audit {
        /// Meal id
        meal_id: Uuid,
    },

    /// Show a user's day summary
    Day {
        /// User id
        user_id: Uuid,

        /// Date (YYYY-MM-DD)
        date: NaiveDate,

        /// Recompute from meal totals before printing
        #[arg(long)]
        recompute: bool,
    },
}

/// One record in a seed file
#[derive(Debug, Deserialize)]
struct SeedRecord {
    name: String,
    #[serde(default)]
    brand: Option<String>,
    reference_grams: f64,
    #[serde(default)]
    household_unit: Option<SeedHouseholdUnit>,
    nutrients: NutrientValues,
    #[serde(default = "default_quality")]
    quality_score: f64,
    #[serde(default = "default_gram_editing")]
    allows_gram_editing: bool,
}

#[derive(Debug, Deserialize)]
struct SeedHouseholdUnit {
    name: String,
    grams: f64,
}

const fn default_quality() -> f64 {
    1.0
}

const fn default_gram_editing() -> bool {
    true
}

impl From<SeedRecord> for CatalogRecord {
    fn from(seed: SeedRecord) -> Self {
        let mut record = Self::new(seed.name, seed.reference_grams, seed.nutrients.into())
            .with_quality_score(seed.quality_score)
            .with_provenance(Provenance::Seed);
        if let Some(brand) = seed.brand {
            record = record.with_brand(brand);
        }
        if let Some(unit) = seed.household_unit {
            record = record.with_household_unit(unit.name, unit.grams);
        }
        if !seed.allows_gram_editing {
            record = record.opaque();
        }
        record
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_from_env() {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }
    match run(AdminArgs::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: AdminArgs) -> Result<()> {
    let mut config = EngineConfig::from_env()?;
    if let Some(url) = &args.database_url {
        config.database.url = platewise::config::DatabaseUrl::parse_url(url)?;
    }

    let database = Database::new(&config.database).await?;
    let engine = NutritionEngine::with_local_catalog(database.clone(), &config);

    match args.command {
        AdminCommand::Seed { file } => seed_command(&engine, &file).await,
        AdminCommand::ImportUsda { fdc_id } => import_usda_command(&engine, &config, fdc_id).await,
        AdminCommand::Rescore => {
            let report = engine.rescore_catalog().await?;
            println!(
                "Examined {} records, lowered {} scores",
                report.examined, report.lowered
            );
            Ok(())
        }
        AdminCommand::Audit { meal_id } => audit_command(&engine, meal_id).await,
        AdminCommand::Day {
            user_id,
            date,
            recompute,
        } => {
            let summary = if recompute {
                database.recompute_day(user_id, date).await?
            } else {
                database.get_day_summary(user_id, date).await?
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

async fn seed_command(engine: &NutritionEngine, file: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read seed file {}", file.display()))?;
    let seeds: Vec<SeedRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Invalid seed file {}", file.display()))?;

    let total = seeds.len();
    let mut inserted = 0_usize;
    for seed in seeds {
        let name = seed.name.clone();
        match engine.insert_record(seed.into()).await {
            Ok(record) => {
                inserted += 1;
                info!(catalog.id = %record.id, catalog.name = %record.name, "Seeded record");
            }
            Err(e) => warn!(catalog.name = %name, error = %e, "Seed record rejected"),
        }
    }
    println!("Inserted {inserted} of {total} records");
    Ok(())
}

async fn import_usda_command(engine: &NutritionEngine, config: &EngineConfig, fdc_id: u64) -> Result<()> {
    let usda = config
        .usda
        .clone()
        .ok_or_else(|| anyhow!("USDA_API_KEY is not set"))?;
    let record = UsdaClient::new(usda).fetch_record(fdc_id).await?;
    let record = engine.insert_record(record).await?;
    println!(
        "Imported '{}' as {} (quality {:.2})",
        record.name, record.id, record.quality_score
    );
    Ok(())
}

async fn audit_command(engine: &NutritionEngine, meal_id: Uuid) -> Result<()> {
    let audit = engine.audit_meal(meal_id).await?;
    println!("{}", serde_json::to_string_pretty(&audit)?);
    if audit.consistent {
        Ok(())
    } else {
        Err(anyhow!("meal {meal_id} totals do not match its lines"))
    }
}
