// ABOUTME: External catalog sources plugged into the resolution gate
// ABOUTME: Currently the USDA FoodData Central client
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

/// USDA `FoodData` Central search and record mapping
pub mod usda_client;

pub use usda_client::{FdcFood, FdcNutrientValue, UsdaClient, UsdaClientConfig};
