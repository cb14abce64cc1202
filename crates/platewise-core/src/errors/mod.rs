// ABOUTME: Unified error types for the Platewise nutrition engine
// ABOUTME: ErrorCode taxonomy with HTTP mapping, AppError with context and source chaining
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

//! # Unified Error Handling System
//!
//! Every fallible engine operation returns [`AppResult`]. Errors are local to the operation
//! that raised them: a failed line save never leaves a meal aggregate half-updated because
//! all mutations run inside a transaction that rolls back on drop.
//!
//! The four domain codes are:
//!
//! - [`ErrorCode::UnsupportedUnit`]: the unit name is not in the conversion table
//! - [`ErrorCode::IncompatibleUnit`]: the unit exists but cannot be applied to this record
//! - [`ErrorCode::InvalidCatalogRecord`]: the catalog record itself is malformed
//! - [`ErrorCode::ResolutionFailed`]: the estimation collaborator is unavailable

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Validation (3000-3999)
    /// Input failed validation
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Quantity & unit handling (3100-3199)
    /// Unit name is not part of the conversion table
    #[serde(rename = "UNSUPPORTED_UNIT")]
    UnsupportedUnit = 3100,
    /// Unit is known but cannot be used for this record or conversion
    #[serde(rename = "INCOMPATIBLE_UNIT")]
    IncompatibleUnit = 3101,

    // Catalog & resolution (3200-3299)
    /// Catalog record is structurally invalid (e.g. non-positive reference quantity)
    #[serde(rename = "INVALID_CATALOG_RECORD")]
    InvalidCatalogRecord = 3200,
    /// Resolution could not degrade gracefully (estimator unavailable)
    #[serde(rename = "RESOLUTION_FAILED")]
    ResolutionFailed = 3201,

    // Resource Management (4000-4999)
    /// Requested entity does not exist
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound = 4000,

    // External Services (5000-5999)
    /// External collaborator returned an error
    #[serde(rename = "EXTERNAL_SERVICE_ERROR")]
    ExternalServiceError = 5000,

    // Configuration (6000-6999)
    /// Configuration value is invalid
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid = 6002,

    // Internal Errors (9000-9999)
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    /// Database operation failed
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError = 9001,
    /// Serialization or deserialization failed
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Get the HTTP status code a presentation layer should use for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput
            | Self::UnsupportedUnit
            | Self::IncompatibleUnit => 400,

            Self::ResourceNotFound => 404,

            Self::InvalidCatalogRecord => 422,

            Self::ExternalServiceError | Self::ResolutionFailed => 502,

            Self::InternalError
            | Self::DatabaseError
            | Self::SerializationError
            | Self::ConfigInvalid => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidInput => "The provided input is invalid",
            Self::UnsupportedUnit => "The unit is not supported",
            Self::IncompatibleUnit => "The unit cannot be used for this food",
            Self::InvalidCatalogRecord => "The food catalog record is malformed",
            Self::ResolutionFailed => "The food could not be resolved",
            Self::ResourceNotFound => "The requested resource was not found",
            Self::ExternalServiceError => "An external service encountered an error",
            Self::ConfigInvalid => "Configuration is invalid",
            Self::InternalError => "An internal error occurred",
            Self::DatabaseError => "Database operation failed",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }

    /// Whether the error is scoped to a single logged line (blocks only that line's save)
    #[must_use]
    pub const fn is_line_scoped(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput
                | Self::UnsupportedUnit
                | Self::IncompatibleUnit
                | Self::InvalidCatalogRecord
        )
    }
}

/// Unified error type for the engine
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Identifier of the entity involved, when known
    pub resource_id: Option<String>,
    /// Additional structured details
    pub details: serde_json::Value,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new `AppError` with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource_id: None,
            details: serde_json::Value::Null,
            source: None,
        }
    }

    /// Attach the identifier of the entity involved
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Attach structured details
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Error response body for presentation layers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Entity identifier, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
    /// Structured details
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        Self {
            code: error.code,
            message: error.message,
            resource_id: error.resource_id,
            details: error.details,
        }
    }
}

/// Convenience constructors for common errors
impl AppError {
    /// Unit name not present in the conversion table
    pub fn unsupported_unit(unit: impl Into<String>) -> Self {
        let unit = unit.into();
        Self::new(ErrorCode::UnsupportedUnit, format!("unknown unit '{unit}'"))
            .with_details(serde_json::json!({ "unit": unit }))
    }

    /// Unit known but not applicable
    pub fn incompatible_unit(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::IncompatibleUnit, message)
    }

    /// Malformed catalog record
    pub fn invalid_catalog_record(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidCatalogRecord, message)
    }

    /// Resolution could not produce any result
    pub fn resolution_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResolutionFailed, message)
    }

    /// Resource not found
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ResourceNotFound,
            format!("{} not found", resource.into()),
        )
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// External service error
    pub fn external_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExternalServiceError,
            format!("{}: {}", service.into(), message.into()),
        )
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::new(ErrorCode::SerializationError, error.to_string()).with_source(error)
    }
}

#[cfg(feature = "database-errors")]
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::not_found("row"),
            other => Self::database(other.to_string()).with_source(other),
        }
    }
}
