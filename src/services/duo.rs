// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Duo API client for token refresh, highscores and the friend list.
//!
//! Handles:
//! - Token refresh against the auth service
//! - Highscore lookup for a fixed season and episode set
//! - Profile and friends lookup against the amigo service
//! - Normalization of the loosely-typed responses into [`crate::models`]
//!
//! No retries happen here; the refresh scheduler owns retry policy.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ApiTokens, EpisodeScores, Profile, User, UserScore};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

const USER_AGENT: &str =
    "Duo 8.6.1 (342) Dalvik/1.4.0 (Linux; U; Android 2.3.5; HTC Desire HD A9191 Build/GRJ90)";
const UNO_CLIENT: &str = "duo-android";

/// Relationship state of accepted friends.
const FRIENDS_STATE: &str = "FRIENDS";

/// Operations the refresh scheduler needs from the Duo services.
#[async_trait]
pub trait DuoApi: Send + Sync {
    /// Exchange a refresh token for a new token pair.
    async fn refresh_token(&self, refresh_token: &str) -> Result<ApiTokens>;

    /// Scores for every configured episode, in configured order.
    async fn fetch_highscores(&self, access_token: &str) -> Result<Vec<EpisodeScores>>;

    /// Profile of the authenticated user.
    async fn fetch_profile(&self, access_token: &str) -> Result<User>;

    /// Accepted friends of the authenticated user.
    async fn fetch_friends(&self, access_token: &str) -> Result<Vec<User>>;
}

/// Duo API client.
#[derive(Clone)]
pub struct DuoClient {
    http: reqwest::Client,
    auth_base_url: String,
    amigo_base_url: String,
    highscore_base_url: String,
    app_key: String,
    season: u32,
    episodes: Vec<u32>,
}

impl DuoClient {
    /// Create a client for the endpoints and highscore query in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            auth_base_url: config.auth_base_url.clone(),
            amigo_base_url: config.amigo_base_url.clone(),
            highscore_base_url: config.highscore_base_url.clone(),
            app_key: config.app_key.clone(),
            season: config.season,
            episodes: config.episodes.clone(),
        })
    }

    /// Generic GET request with bearer auth and JSON response.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await?;

        self.check_response_json(response).await
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();

            // Credential rejected - the scheduler suspends data fetches
            if status.as_u16() == 401 {
                tracing::warn!(body = %body, "Duo API rejected credentials (401)");
                return Err(AppError::Unauthorized);
            }

            return Err(AppError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl DuoApi for DuoClient {
    async fn refresh_token(&self, refresh_token: &str) -> Result<ApiTokens> {
        let url = format!("{}/token/refresh", self.auth_base_url);

        let response = self
            .http
            .post(&url)
            .header("X-Uno-Client", UNO_CLIENT)
            .json(&TokenRefreshRequest { refresh_token })
            .send()
            .await?;

        let tokens: TokenRefreshResponse = self.check_response_json(response).await?;
        Ok(ApiTokens::new(tokens.access_token, tokens.refresh_token))
    }

    async fn fetch_highscores(&self, access_token: &str) -> Result<Vec<EpisodeScores>> {
        let url = format!("{}/high-scores", self.highscore_base_url);

        let mut query = vec![
            ("key", self.app_key.clone()),
            ("season", self.season.to_string()),
        ];
        query.extend(self.episodes.iter().map(|e| ("episode", e.to_string())));

        let response: HighscoresResponse = self.get_json(&url, access_token, &query).await?;
        Ok(normalize_highscores(response, &self.episodes))
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<User> {
        let url = format!("{}/users/me/profile", self.amigo_base_url);
        let user: DuoUser = self.get_json(&url, access_token, &[]).await?;
        Ok(user.into())
    }

    async fn fetch_friends(&self, access_token: &str) -> Result<Vec<User>> {
        let url = format!("{}/users/me/friends", self.amigo_base_url);
        let query = [
            ("state", FRIENDS_STATE.to_string()),
            ("cacheBusting", chrono::Utc::now().timestamp().to_string()),
        ];

        let response: FriendsResponse = self.get_json(&url, access_token, &query).await?;
        Ok(normalize_friends(response))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire format
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DuoProfile {
    #[serde(deserialize_with = "null_as_default")]
    color: String,
    #[serde(deserialize_with = "null_as_default")]
    image_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DuoUser {
    #[serde(deserialize_with = "lenient_id")]
    user_id: String,
    #[serde(deserialize_with = "null_as_default")]
    username: String,
    #[serde(deserialize_with = "null_as_default")]
    first_name: String,
    #[serde(deserialize_with = "null_as_default")]
    last_name: String,
    #[serde(deserialize_with = "null_as_default")]
    profile: DuoProfile,
}

impl From<DuoUser> for User {
    fn from(user: DuoUser) -> Self {
        User {
            user_id: user.user_id,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            profile: Profile {
                color: user.profile.color,
                image_url: user.profile.image_url,
            },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DuoFriend {
    #[serde(flatten)]
    user: DuoUser,
    state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FriendsResponse {
    #[serde(deserialize_with = "null_as_default")]
    friends: Vec<DuoFriend>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HighscoresResponse {
    #[serde(deserialize_with = "null_as_default")]
    episodes: Vec<DuoEpisode>,
}

#[derive(Debug, Deserialize)]
struct DuoEpisode {
    episode: EpisodeNumber,
    #[serde(default)]
    friends: Option<DuoFriendScores>,
}

/// Episode numbers arrive either as JSON numbers or as strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EpisodeNumber {
    Number(u32),
    Text(String),
}

impl EpisodeNumber {
    fn value(&self) -> Option<u32> {
        match self {
            EpisodeNumber::Number(n) => Some(*n),
            EpisodeNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DuoFriendScores {
    #[serde(deserialize_with = "null_as_default")]
    first_submit: Vec<DuoScore>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DuoScore {
    #[serde(deserialize_with = "lenient_id")]
    user_id: String,
    #[serde(deserialize_with = "null_as_default")]
    score: i64,
}

/// `null` decodes like an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// User ids arrive as strings or integers.
#[derive(Deserialize)]
#[serde(untagged)]
enum DuoId {
    Text(String),
    Integer(i64),
}

fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<DuoId>::deserialize(deserializer)? {
        Some(DuoId::Text(id)) => id,
        Some(DuoId::Integer(id)) => id.to_string(),
        None => String::new(),
    })
}

/// One entry per requested episode, in request order.
fn normalize_highscores(response: HighscoresResponse, episodes: &[u32]) -> Vec<EpisodeScores> {
    let mut result: Vec<EpisodeScores> =
        episodes.iter().copied().map(EpisodeScores::empty).collect();

    for raw in response.episodes {
        let Some(number) = raw.episode.value() else {
            tracing::warn!(episode = ?raw.episode, "Skipping episode with unparseable number");
            continue;
        };
        let Some(entry) = result.iter_mut().find(|e| e.episode == number) else {
            tracing::debug!(episode = number, "Skipping unrequested episode");
            continue;
        };

        entry.scores = raw
            .friends
            .map(|f| f.first_submit)
            .unwrap_or_default()
            .into_iter()
            .map(|s| UserScore {
                user_id: s.user_id,
                score: s.score,
            })
            .collect();
    }

    result
}

fn normalize_friends(response: FriendsResponse) -> Vec<User> {
    response
        .friends
        .into_iter()
        .filter(|f| f.state.as_deref() == Some(FRIENDS_STATE))
        .map(|f| f.user.into())
        .collect()
}
