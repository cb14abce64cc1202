// ABOUTME: Core types for the Platewise nutrition quantity and aggregation engine
// ABOUTME: Foundation crate with error handling, unit conversion, and nutrition models
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

#![deny(unsafe_code)]

//! # Platewise Core
//!
//! Foundation crate providing shared types for the Platewise nutrition engine. Everything
//! here is pure and storage-agnostic so it can be reused by the persistence layer, the
//! engine, and any presentation layer sitting on top.
//!
//! ## Modules
//!
//! - **errors**: Unified error handling with `AppError` and `ErrorCode`
//! - **units**: Static unit conversion table (mass, volume, discrete counts)
//! - **models**: Nutrient sets, catalog records, meals, and logged lines
//! - **constants**: Engine-wide defaults

/// Unified error handling system with standard error codes
pub mod errors;

/// Engine-wide default values
pub mod constants;

/// Static unit conversion table
pub mod units;

/// Nutrition data models (nutrients, catalog records, meals, lines)
pub mod models;
