// ABOUTME: Re-exports the unified error types from platewise-core
// ABOUTME: Keeps `crate::errors::AppError` paths stable across the root crate
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

pub use platewise_core::errors::*;
