// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod highscore;
pub mod tokens;
pub mod user;

pub use highscore::{EpisodeScores, HighscoreData, UserScore};
pub use tokens::ApiTokens;
pub use user::{Profile, User};
