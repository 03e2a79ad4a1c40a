// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Duo-Highscore: republish På Spåret highscores from the Duo API
//!
//! This crate keeps a Duo credential pair alive, periodically fetches the
//! highscores of the authenticated user and their friends, and serves the
//! latest snapshot over HTTP with ETag-based conditional GET.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::SnapshotCache;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub cache: SnapshotCache,
}
