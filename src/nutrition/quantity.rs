// ABOUTME: Quantity resolver turning a (quantity, unit) pair into grams and a multiplier
// ABOUTME: Household units first, then the conversion table, then generic serving counts
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! Quantity resolution against a catalog record
//!
//! Resolution order:
//!
//! 1. the unit names the record's household unit ("slice", "scoop") → household grams
//! 2. a mass or volume unit → the static conversion table
//! 3. a generic discrete unit and the record has no household unit → one reference
//!    serving per count; the line cannot be edited in grams afterwards
//! 4. anything else is `IncompatibleUnit`
//!
//! Grams are authoritative. The serving unit and its gram weight are captured so the
//! serving view can always be derived back from grams.

use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};
use crate::models::{CatalogRecord, EditedField, ServingView};
use crate::units::{parse_unit, quantities_equal, to_grams, unit_names_match, Unit};

/// Result of resolving a quantity against a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedQuantity {
    /// Authoritative amount in grams
    pub gram_quantity: f64,
    /// `gram_quantity / reference grams`; exactly 1.0 at the reference amount
    pub multiplier: f64,
    /// Serving unit the quantity was entered in, `None` for plain grams
    pub serving_unit: Option<String>,
    /// Grams per one `serving_unit`
    pub serving_unit_grams: Option<f64>,
    /// Which representation the user typed
    pub last_edited: EditedField,
    /// False when the line can only be edited as a serving count
    pub gram_editable: bool,
}

impl ResolvedQuantity {
    /// Serving view implied by this resolution
    #[must_use]
    pub fn serving(&self) -> Option<ServingView> {
        ServingView::from_grams(
            self.gram_quantity,
            self.serving_unit.as_deref(),
            self.serving_unit_grams,
        )
    }
}

pub(crate) fn validate_quantity(quantity: f64) -> AppResult<()> {
    if !quantity.is_finite() || quantity < 0.0 {
        return Err(AppError::invalid_input(format!(
            "quantity must be a finite non-negative number, got {quantity}"
        )));
    }
    Ok(())
}

fn multiplier_for(gram_quantity: f64, reference_grams: f64) -> f64 {
    if quantities_equal(gram_quantity, reference_grams) {
        1.0
    } else {
        gram_quantity / reference_grams
    }
}

/// Multiplier for a record that can only be logged as whole reference servings
fn whole_servings(record: &CatalogRecord, gram_quantity: f64, reference_grams: f64) -> AppResult<f64> {
    let servings = gram_quantity / reference_grams;
    let whole = servings.round();
    if quantities_equal(servings, whole) {
        return Ok(whole);
    }
    Err(AppError::incompatible_unit(format!(
        "'{}' can only be logged as whole servings of {reference_grams} g, got {servings} servings",
        record.name
    ))
    .with_resource_id(record.id.to_string()))
}

/// Multiplier for `gram_quantity`, enforcing whole servings on opaque records
fn checked_multiplier(record: &CatalogRecord, gram_quantity: f64, reference_grams: f64) -> AppResult<f64> {
    if record.allows_gram_editing {
        Ok(multiplier_for(gram_quantity, reference_grams))
    } else {
        whole_servings(record, gram_quantity, reference_grams)
    }
}

/// Resolve a user-entered quantity and unit against a catalog record
///
/// # Errors
///
/// - `InvalidInput` if the quantity is negative or not finite
/// - `InvalidCatalogRecord` if the record's reference quantity is not positive
/// - `UnsupportedUnit` if the unit is neither the household unit nor in the conversion table
/// - `IncompatibleUnit` if the unit cannot apply to this record (a discrete unit that is not
///   the record's household unit), or if an opaque record is asked for anything other than
///   a whole number of reference servings
pub fn resolve_quantity(
    quantity: f64,
    unit: &str,
    record: &CatalogRecord,
) -> AppResult<ResolvedQuantity> {
    validate_quantity(quantity)?;
    let reference_grams = record.reference_grams()?;

    if let Some(household) = record
        .household_unit
        .as_ref()
        .filter(|h| unit_names_match(unit, &h.name))
    {
        let gram_quantity = household.to_grams(quantity);
        return Ok(ResolvedQuantity {
            gram_quantity,
            multiplier: checked_multiplier(record, gram_quantity, reference_grams)?,
            serving_unit: Some(household.name.clone()),
            serving_unit_grams: Some(household.grams),
            last_edited: EditedField::Serving,
            gram_editable: record.allows_gram_editing,
        });
    }

    let parsed = parse_unit(unit)?;

    if parsed.is_gram_convertible() {
        let gram_quantity = to_grams(quantity, parsed)?;
        let multiplier = checked_multiplier(record, gram_quantity, reference_grams)?;
        let (serving_unit, serving_unit_grams, last_edited) = if parsed == Unit::Grams {
            (None, None, EditedField::Grams)
        } else {
            (
                Some(parsed.abbreviation().to_owned()),
                parsed.grams_per_unit(),
                EditedField::Serving,
            )
        };
        return Ok(ResolvedQuantity {
            gram_quantity,
            multiplier,
            serving_unit,
            serving_unit_grams,
            last_edited,
            gram_editable: record.allows_gram_editing,
        });
    }

    if let Some(household) = &record.household_unit {
        return Err(AppError::incompatible_unit(format!(
            "'{unit}' does not apply to '{}', which is measured in {}",
            record.name, household.name
        ))
        .with_resource_id(record.id.to_string()));
    }

    let multiplier = if record.allows_gram_editing {
        quantity
    } else {
        whole_servings(record, quantity * reference_grams, reference_grams)?
    };
    Ok(ResolvedQuantity {
        gram_quantity: quantity * reference_grams,
        multiplier,
        serving_unit: Some(parsed.abbreviation().to_owned()),
        serving_unit_grams: Some(reference_grams),
        last_edited: EditedField::Serving,
        gram_editable: false,
    })
}

/// One reference serving of a record, with multiplier exactly 1.0
///
/// Expressed in the household unit when the record has one, otherwise as one generic
/// serving that cannot be edited in grams.
///
/// # Errors
///
/// Returns `InvalidCatalogRecord` if the record's reference quantity is not positive
pub fn reference_serving(record: &CatalogRecord) -> AppResult<ResolvedQuantity> {
    let reference_grams = record.reference_grams()?;
    let (serving_unit, serving_unit_grams, gram_editable) = match &record.household_unit {
        Some(household) => (household.name.clone(), household.grams, record.allows_gram_editing),
        None => (Unit::Serving.abbreviation().to_owned(), reference_grams, false),
    };
    Ok(ResolvedQuantity {
        gram_quantity: reference_grams,
        multiplier: 1.0,
        serving_unit: Some(serving_unit),
        serving_unit_grams: Some(serving_unit_grams),
        last_edited: EditedField::Serving,
        gram_editable,
    })
}
