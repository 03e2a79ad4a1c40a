// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Highscore models for the published snapshot.

use super::User;
use serde::{Deserialize, Serialize};

/// Score of a single user in one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    pub user_id: String,
    pub score: i64,
}

/// All known scores for one episode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeScores {
    pub episode: u32,
    /// Ordered as returned by the highscore service; empty when nobody has submitted yet
    pub scores: Vec<UserScore>,
}

impl EpisodeScores {
    /// Episode with no submissions.
    pub fn empty(episode: u32) -> Self {
        Self {
            episode,
            scores: Vec::new(),
        }
    }
}

/// Complete dataset served at `GET /`.
///
/// Field order defines the serialized byte form, and therefore the fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HighscoreData {
    pub episode_scores: Vec<EpisodeScores>,
    /// The authenticated user first, followed by their friends
    pub users: Vec<User>,
}
