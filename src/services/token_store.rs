// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable storage for the Duo API token pair.
//!
//! Tokens live in a small JSON file next to the service. On first deployment
//! there is no file yet and the pair is taken from `DUO_ACCESS_TOKEN` and
//! `DUO_REFRESH_TOKEN`; the first successful refresh then creates the file.

use crate::config::ConfigError;
use crate::error::{AppError, Result};
use crate::models::ApiTokens;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const ACCESS_TOKEN_ENV: &str = "DUO_ACCESS_TOKEN";
pub const REFRESH_TOKEN_ENV: &str = "DUO_REFRESH_TOKEN";

/// File-backed token store with environment fallback.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load tokens from the file, falling back to the process environment.
    pub fn load(&self) -> Result<ApiTokens> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Load tokens from the file, falling back to `env` when the file is absent.
    pub fn load_with_env<F>(&self, env: F) -> Result<ApiTokens>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tokens) = self.load_file()? {
            return Ok(tokens);
        }

        let access_token = env(ACCESS_TOKEN_ENV).filter(|v| !v.trim().is_empty());
        let refresh_token = env(REFRESH_TOKEN_ENV).filter(|v| !v.trim().is_empty());

        match (access_token, refresh_token) {
            (Some(access), Some(refresh)) => {
                tracing::info!(
                    path = %self.path.display(),
                    "Token file not found, using tokens from environment"
                );
                Ok(ApiTokens::new(access.trim(), refresh.trim()))
            }
            _ => Err(ConfigError::MissingCredentials(self.path.display().to_string()).into()),
        }
    }

    /// Load tokens from the file only; `None` if it does not exist.
    pub fn load_file(&self) -> Result<Option<ApiTokens>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map(Some).map_err(|e| {
                AppError::Storage(format!("Invalid token file {}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Storage(format!(
                "Failed to read token file {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    /// Replace the stored pair.
    ///
    /// Writes a sibling temporary file and renames it over the target, so a
    /// crash never leaves a truncated token file behind.
    pub fn save(&self, tokens: &ApiTokens) -> Result<()> {
        let json = serde_json::to_vec(tokens)?;

        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);

        fs::write(&tmp_path, json).map_err(|e| {
            AppError::Storage(format!("Failed to write {}: {}", tmp_path.display(), e))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            AppError::Storage(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(path = %self.path.display(), "API tokens saved");
        Ok(())
    }
}
