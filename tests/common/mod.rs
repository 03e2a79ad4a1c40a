// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use async_trait::async_trait;
use duo_highscore::config::Config;
use duo_highscore::error::{AppError, Result};
use duo_highscore::models::{ApiTokens, EpisodeScores, HighscoreData, Profile, User, UserScore};
use duo_highscore::routes::create_router;
use duo_highscore::services::{DuoApi, SnapshotCache};
use duo_highscore::AppState;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Create a test app around a fresh, empty snapshot cache.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState {
        config: Config::default(),
        cache: SnapshotCache::new(),
    });

    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn test_user(id: &str, username: &str) -> User {
    User {
        user_id: id.to_string(),
        username: username.to_string(),
        first_name: username.to_uppercase(),
        last_name: "Testsson".to_string(),
        profile: Profile {
            color: "#9579DA".to_string(),
            image_url: format!("https://img.example.com/{}.png", id),
        },
    }
}

#[allow(dead_code)]
pub fn sample_data(score: i64) -> HighscoreData {
    HighscoreData {
        episode_scores: vec![
            EpisodeScores {
                episode: 1,
                scores: vec![UserScore {
                    user_id: "me".to_string(),
                    score,
                }],
            },
            EpisodeScores::empty(2),
        ],
        users: vec![test_user("me", "anna"), test_user("f1", "bert")],
    }
}

/// Failure injected into [`MockDuoApi`] calls.
#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Auth,
    Transient,
}

#[allow(dead_code)]
impl Failure {
    fn into_error(self) -> AppError {
        match self {
            Failure::Auth => AppError::Unauthorized,
            Failure::Transient => AppError::Upstream {
                status: 502,
                body: "bad gateway".to_string(),
            },
        }
    }
}

/// Scripted state behind [`MockDuoApi`].
#[allow(dead_code)]
#[derive(Default)]
pub struct MockState {
    /// Outcomes for upcoming refresh calls; success once exhausted
    pub refresh_failures: VecDeque<Failure>,
    pub highscores_failure: Option<Failure>,
    pub friends_failure: Option<Failure>,
    /// Score reported for the authenticated user in episode 1
    pub score: i64,

    pub refresh_calls: usize,
    pub highscores_calls: usize,
    pub profile_calls: usize,
    pub friends_calls: usize,
    pub refresh_tokens_seen: Vec<String>,
    pub access_tokens_seen: Vec<String>,
}

/// In-memory [`DuoApi`] double.
#[allow(dead_code)]
#[derive(Clone, Default)]
pub struct MockDuoApi {
    pub state: Arc<Mutex<MockState>>,
}

#[allow(dead_code)]
impl MockDuoApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn data_calls(&self) -> usize {
        let state = self.state.lock();
        state.highscores_calls + state.profile_calls + state.friends_calls
    }
}

#[async_trait]
impl DuoApi for MockDuoApi {
    async fn refresh_token(&self, refresh_token: &str) -> Result<ApiTokens> {
        let mut state = self.state.lock();
        state.refresh_calls += 1;
        state.refresh_tokens_seen.push(refresh_token.to_string());

        if let Some(failure) = state.refresh_failures.pop_front() {
            return Err(failure.into_error());
        }
        let n = state.refresh_calls;
        Ok(ApiTokens::new(
            format!("access-{}", n),
            format!("refresh-{}", n),
        ))
    }

    async fn fetch_highscores(&self, access_token: &str) -> Result<Vec<EpisodeScores>> {
        let mut state = self.state.lock();
        state.highscores_calls += 1;
        state.access_tokens_seen.push(access_token.to_string());

        if let Some(failure) = state.highscores_failure {
            return Err(failure.into_error());
        }
        Ok(sample_data(state.score).episode_scores)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<User> {
        let mut state = self.state.lock();
        state.profile_calls += 1;
        state.access_tokens_seen.push(access_token.to_string());
        Ok(test_user("me", "anna"))
    }

    async fn fetch_friends(&self, access_token: &str) -> Result<Vec<User>> {
        let mut state = self.state.lock();
        state.friends_calls += 1;
        state.access_tokens_seen.push(access_token.to_string());

        if let Some(failure) = state.friends_failure {
            return Err(failure.into_error());
        }
        Ok(vec![test_user("f1", "bert")])
    }
}
