// ABOUTME: Catalog record model: one food's nutrient profile per reference quantity
// ABOUTME: Household unit ratio, quality score, provenance, and gram-editing policy
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::nutrients::NutrientSet;
use crate::errors::{AppError, AppResult};
use crate::units::Unit;

/// Where a catalog record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Curated seed data loaded by catalog ingestion
    Seed,
    /// Imported from an external food database (e.g. USDA `FoodData` Central)
    External,
    /// Created by the resolution gate from an estimation service, pending review
    MachineGenerated,
    /// Best-effort typical-portion estimate; never trusted for automatic reuse
    Estimated,
}

impl Provenance {
    /// Storage representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Seed => "seed",
            Self::External => "external",
            Self::MachineGenerated => "machine_generated",
            Self::Estimated => "estimated",
        }
    }

    /// Parse the storage representation
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for unknown values
    pub fn parse(s: &str) -> AppResult<Self> {
        match s {
            "seed" => Ok(Self::Seed),
            "external" => Ok(Self::External),
            "machine_generated" => Ok(Self::MachineGenerated),
            "estimated" => Ok(Self::Estimated),
            other => Err(AppError::invalid_input(format!("unknown provenance '{other}'"))),
        }
    }

    /// Machine-created records that still need a human look
    #[must_use]
    pub const fn needs_review(&self) -> bool {
        matches!(self, Self::MachineGenerated | Self::Estimated)
    }
}

/// Intuitive non-gram unit with a fixed gram weight ("1 slice = 28 g")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseholdUnit {
    /// Unit name as shown to the user ("slice", "scoop", "medium")
    pub name: String,
    /// Grams represented by one unit
    pub grams: f64,
}

impl HouseholdUnit {
    /// Create a household unit
    pub fn new(name: impl Into<String>, grams: f64) -> Self {
        Self {
            name: name.into(),
            grams,
        }
    }

    /// Grams for `quantity` household units
    #[must_use]
    pub fn to_grams(&self, quantity: f64) -> f64 {
        quantity * self.grams
    }

    /// Household units represented by `grams`
    #[must_use]
    pub fn from_grams(&self, grams: f64) -> f64 {
        grams / self.grams
    }
}

/// One food's nutrient profile per reference serving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Record identifier
    pub id: Uuid,
    /// Food name
    pub name: String,
    /// Brand or restaurant, for branded records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Amount the nutrients are expressed per
    pub reference_quantity: f64,
    /// Unit of `reference_quantity`; always grams for stored records
    pub reference_unit: Unit,
    /// Household unit, absent for gram-only records
    #[serde(skip_serializing_if = "Option::is_none")]
    pub household_unit: Option<HouseholdUnit>,
    /// Nutrients per reference quantity
    pub nutrients: NutrientSet,
    /// Trust level in [0, 1]
    pub quality_score: f64,
    /// False for opaque records only valid at their reference quantity
    pub allows_gram_editing: bool,
    /// Origin of the record
    pub provenance: Provenance,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last score/provenance update
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Create a gram-editable seed record with no household unit and a full quality score
    pub fn new(name: impl Into<String>, reference_grams: f64, nutrients: NutrientSet) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            brand: None,
            reference_quantity: reference_grams,
            reference_unit: Unit::Grams,
            household_unit: None,
            nutrients,
            quality_score: 1.0,
            allows_gram_editing: true,
            provenance: Provenance::Seed,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attach a household unit
    #[must_use]
    pub fn with_household_unit(mut self, name: impl Into<String>, grams: f64) -> Self {
        self.household_unit = Some(HouseholdUnit::new(name, grams));
        self
    }

    /// Set the brand
    #[must_use]
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    /// Set the quality score
    #[must_use]
    pub const fn with_quality_score(mut self, score: f64) -> Self {
        self.quality_score = score;
        self
    }

    /// Set the provenance
    #[must_use]
    pub const fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Mark as opaque: nutrition only valid at the fixed reference quantity
    #[must_use]
    pub const fn opaque(mut self) -> Self {
        self.allows_gram_editing = false;
        self
    }

    /// Grams per reference quantity
    ///
    /// # Errors
    ///
    /// Returns `InvalidCatalogRecord` if the reference quantity is not positive or the
    /// reference unit is discrete.
    pub fn reference_grams(&self) -> AppResult<f64> {
        if !self.reference_quantity.is_finite() || self.reference_quantity <= 0.0 {
            return Err(AppError::invalid_catalog_record(format!(
                "record '{}' has non-positive reference quantity {}",
                self.name, self.reference_quantity
            ))
            .with_resource_id(self.id.to_string()));
        }
        let factor = self.reference_unit.grams_per_unit().ok_or_else(|| {
            AppError::invalid_catalog_record(format!(
                "record '{}' uses discrete reference unit '{}'",
                self.name, self.reference_unit
            ))
            .with_resource_id(self.id.to_string())
        })?;
        Ok(self.reference_quantity * factor)
    }

    /// Structural validation of the stored fields
    ///
    /// # Errors
    ///
    /// Returns `InvalidCatalogRecord` for a non-positive reference quantity, a non-positive
    /// household gram weight, negative nutrients, or a score outside [0, 1].
    pub fn validate(&self) -> AppResult<()> {
        self.reference_grams()?;
        if let Some(unit) = &self.household_unit {
            if unit.name.trim().is_empty() || !unit.grams.is_finite() || unit.grams <= 0.0 {
                return Err(AppError::invalid_catalog_record(format!(
                    "record '{}' has an invalid household unit '{}' = {} g",
                    self.name, unit.name, unit.grams
                ))
                .with_resource_id(self.id.to_string()));
            }
        }
        let negative = self.nutrients.negative_nutrients();
        if !negative.is_empty() {
            return Err(AppError::invalid_catalog_record(format!(
                "record '{}' has negative nutrients: {negative:?}",
                self.name
            ))
            .with_resource_id(self.id.to_string()));
        }
        if !(0.0..=1.0).contains(&self.quality_score) {
            return Err(AppError::invalid_catalog_record(format!(
                "record '{}' has quality score {} outside [0, 1]",
                self.name, self.quality_score
            ))
            .with_resource_id(self.id.to_string()));
        }
        Ok(())
    }
}
