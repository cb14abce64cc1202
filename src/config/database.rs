// ABOUTME: Database configuration types for SQLite connections
// ABOUTME: Handles database URL parsing, pool sizing, and busy timeout settings
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Platewise

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::env_parse;
use crate::errors::{AppError, AppResult};

/// Default database location
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./data/platewise.db";

/// Default pool size for file-backed databases
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Default `SQLite` busy timeout
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Type-safe database location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatabaseUrl {
    /// `SQLite` database with file path
    SQLite {
        /// Path to `SQLite` database file
        path: PathBuf,
    },
    /// In-memory `SQLite` (for testing)
    Memory,
}

impl DatabaseUrl {
    /// Parse from string
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` for non-`SQLite` URLs
    pub fn parse_url(s: &str) -> AppResult<Self> {
        if let Some(path_str) = s.strip_prefix("sqlite:") {
            let path_str = path_str.strip_prefix("//").unwrap_or(path_str);
            if path_str == ":memory:" || path_str.is_empty() {
                return Ok(Self::Memory);
            }
            return Ok(Self::SQLite {
                path: PathBuf::from(path_str),
            });
        }
        if s.contains("://") {
            return Err(AppError::config(format!(
                "unsupported database URL '{s}': only sqlite is supported"
            )));
        }
        // Bare path: treat as SQLite file
        Ok(Self::SQLite {
            path: PathBuf::from(s),
        })
    }

    /// Convert to connection string
    #[must_use]
    pub fn to_connection_string(&self) -> String {
        match self {
            Self::SQLite { path } => format!("sqlite:{}", path.display()),
            Self::Memory => "sqlite::memory:".into(),
        }
    }

    /// Check if this is an in-memory database
    #[must_use]
    pub const fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Default for DatabaseUrl {
    fn default() -> Self {
        Self::SQLite {
            path: PathBuf::from("./data/platewise.db"),
        }
    }
}

impl Display for DatabaseUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.to_connection_string())
    }
}

/// Database connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database location
    pub url: DatabaseUrl,
    /// Maximum pooled connections (forced to 1 for in-memory databases)
    pub max_connections: u32,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DatabaseUrl::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl DatabaseConfig {
    /// In-memory database configuration for tests and tooling
    #[must_use]
    pub fn memory() -> Self {
        Self {
            url: DatabaseUrl::Memory,
            max_connections: 1,
            ..Self::default()
        }
    }

    /// File-backed database configuration
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            url: DatabaseUrl::SQLite { path: path.into() },
            ..Self::default()
        }
    }

    /// Load database configuration from environment
    ///
    /// # Errors
    ///
    /// Returns `ConfigInvalid` if a variable is present but unparsable
    pub fn from_env() -> AppResult<Self> {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.into());
        Ok(Self {
            url: DatabaseUrl::parse_url(&url)?,
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            busy_timeout_ms: env_parse("DATABASE_BUSY_TIMEOUT_MS", DEFAULT_BUSY_TIMEOUT_MS)?,
        })
    }

    /// Pool size actually used: in-memory databases are per-connection in `SQLite`
    #[must_use]
    pub const fn effective_max_connections(&self) -> u32 {
        if self.url.is_memory() {
            1
        } else {
            self.max_connections
        }
    }
}
