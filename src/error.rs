// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types.
//!
//! Upstream failures are split into two classes the refresh scheduler acts on:
//! credential rejection (`Unauthorized`) and everything else, which is retried.

use crate::config::ConfigError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Upstream answered 401: the credential was rejected.
    #[error("Duo API rejected credentials (HTTP 401)")]
    Unauthorized,

    #[error("Duo API error: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Network failure, timeout or undecodable response.
    #[error("Duo API request failed: {0}")]
    Request(String),

    #[error("Token storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Whether the upstream rejected the credential.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, AppError::Unauthorized)
    }

    /// Whether the failure is expected to go away on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Upstream { .. } | AppError::Request(_))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AppError::Request(format!("timed out: {}", err))
        } else if err.is_decode() {
            AppError::Request(format!("JSON parse error: {}", err))
        } else {
            AppError::Request(err.to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
