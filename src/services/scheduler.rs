// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Background refresh of API tokens and highscore data.
//!
//! Two periodic tasks share one loop:
//! - the token task refreshes the credential pair (hourly by default)
//! - the data task fetches highscores, profile and friends (every minute)
//!
//! The data task only runs while the tokens are known to be valid. After a
//! 401 it stays suspended until a token refresh succeeds again. A data
//! refresh publishes all-or-nothing: if any of the three calls fails the
//! previous snapshot stays in place.

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{ApiTokens, HighscoreData};
use crate::services::duo::DuoApi;
use crate::services::snapshot::SnapshotCache;
use crate::services::token_store::TokenStore;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Timing settings for [`RefreshScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub token_refresh_interval: Duration,
    pub highscore_refresh_interval: Duration,
    pub tick: Duration,
    pub retry_delay: Duration,
}

impl From<&Config> for SchedulerConfig {
    fn from(config: &Config) -> Self {
        Self {
            token_refresh_interval: config.token_refresh_interval,
            highscore_refresh_interval: config.highscore_refresh_interval,
            tick: config.scheduler_tick,
            retry_delay: config.retry_delay,
        }
    }
}

/// A fixed-interval task with its own success clock.
#[derive(Debug, Clone)]
pub struct PeriodicTask {
    interval: Duration,
    last_success: Option<Instant>,
    retry_at: Option<Instant>,
}

impl PeriodicTask {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_success: None,
            retry_at: None,
        }
    }

    /// Due when it never succeeded or its interval has elapsed, and any
    /// post-failure delay is over.
    pub fn is_due(&self, now: Instant) -> bool {
        if self.retry_at.is_some_and(|at| now < at) {
            return false;
        }
        match self.last_success {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    fn succeeded(&mut self, now: Instant) {
        self.last_success = Some(now);
        self.retry_at = None;
    }

    fn failed(&mut self, now: Instant, retry_delay: Duration) {
        self.retry_at = Some(now + retry_delay);
    }

    /// Make the task due at the next tick.
    fn expire(&mut self) {
        self.last_success = None;
        self.retry_at = None;
    }
}

/// Drives [`DuoApi`] on a fixed tick and publishes into [`SnapshotCache`].
pub struct RefreshScheduler<A> {
    api: A,
    store: TokenStore,
    cache: SnapshotCache,
    tokens: ApiTokens,
    tokens_valid: bool,
    /// Set when the refresh token itself was rejected
    refresh_rejected: bool,
    token_task: PeriodicTask,
    data_task: PeriodicTask,
    tick: Duration,
    retry_delay: Duration,
}

impl<A: DuoApi> RefreshScheduler<A> {
    pub fn new(
        api: A,
        store: TokenStore,
        cache: SnapshotCache,
        tokens: ApiTokens,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            api,
            store,
            cache,
            tokens,
            tokens_valid: true,
            refresh_rejected: false,
            token_task: PeriodicTask::new(config.token_refresh_interval),
            data_task: PeriodicTask::new(config.highscore_refresh_interval),
            tick: config.tick,
            retry_delay: config.retry_delay,
        }
    }

    pub fn tokens(&self) -> &ApiTokens {
        &self.tokens
    }

    pub fn tokens_valid(&self) -> bool {
        self.tokens_valid
    }

    pub fn token_task(&self) -> &PeriodicTask {
        &self.token_task
    }

    pub fn data_task(&self) -> &PeriodicTask {
        &self.data_task
    }

    /// Run forever. Failures are logged and retried on a later tick.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            token_interval_secs = self.token_task.interval.as_secs(),
            data_interval_secs = self.data_task.interval.as_secs(),
            "Refresh scheduler started"
        );

        loop {
            let now = interval.tick().await;
            self.tick(now).await;
        }
    }

    /// One scheduler iteration at time `now`.
    pub async fn tick(&mut self, now: Instant) {
        if self.token_task.is_due(now) && !self.refresh_tokens(now).await {
            // Known-bad credential: don't spend authenticated calls this tick
            return;
        }

        if self.tokens_valid && self.data_task.is_due(now) {
            self.refresh_data(now).await;
        }
    }

    /// Token task. Returns false if the credential was rejected.
    async fn refresh_tokens(&mut self, now: Instant) -> bool {
        if self.refresh_rejected {
            self.reload_stored_tokens();
        }

        tracing::info!("Refreshing API tokens");
        match self.api.refresh_token(&self.tokens.refresh_token).await {
            Ok(tokens) => {
                if let Err(e) = self.store.save(&tokens) {
                    // The old refresh token is already spent; keep going in memory
                    tracing::error!(error = %e, "Failed to persist refreshed tokens");
                }
                self.tokens = tokens;
                self.tokens_valid = true;
                self.refresh_rejected = false;
                self.token_task.succeeded(now);
                tracing::info!("API tokens refreshed");
                true
            }
            Err(e) if e.is_auth_error() => {
                tracing::error!(error = %e, "Token refresh rejected, suspending highscore refresh");
                self.tokens_valid = false;
                self.refresh_rejected = true;
                self.token_task.failed(now, self.retry_delay);
                false
            }
            Err(e) => {
                log_failed_request("Failed refreshing tokens", &e);
                self.token_task.failed(now, self.retry_delay);
                true
            }
        }
    }

    /// Pick up tokens re-provisioned on disk after our refresh token was rejected.
    ///
    /// Only the file is consulted: the environment pair is the startup
    /// credential and has been rotated away once any refresh succeeded.
    fn reload_stored_tokens(&mut self) {
        match self.store.load_file() {
            Ok(Some(tokens)) if tokens != self.tokens => {
                tracing::info!("Using re-provisioned tokens from token store");
                self.tokens = tokens;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Token store reload failed"),
        }
    }

    /// Data task: fetch everything, publish only if all calls succeed.
    async fn refresh_data(&mut self, now: Instant) {
        tracing::info!("Refreshing highscores");
        match self.fetch_data().await {
            Ok(data) => match self.cache.set(&data) {
                Ok(snapshot) => {
                    self.data_task.succeeded(now);
                    tracing::info!(
                        episodes = data.episode_scores.len(),
                        users = data.users.len(),
                        fingerprint = %snapshot.fingerprint(),
                        "Highscores refreshed"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to publish highscores");
                    self.data_task.failed(now, self.retry_delay);
                }
            },
            Err(e) if e.is_auth_error() => {
                tracing::error!(error = %e, "Access token rejected, forcing token refresh");
                self.tokens_valid = false;
                self.token_task.expire();
                self.data_task.failed(now, self.retry_delay);
            }
            Err(e) => {
                log_failed_request("Failed refreshing highscores", &e);
                self.data_task.failed(now, self.retry_delay);
            }
        }
    }

    async fn fetch_data(&self) -> Result<HighscoreData> {
        let access_token = &self.tokens.access_token;

        let episode_scores = self.api.fetch_highscores(access_token).await?;
        let me = self.api.fetch_profile(access_token).await?;
        let friends = self.api.fetch_friends(access_token).await?;

        let mut users = Vec::with_capacity(friends.len() + 1);
        users.push(me);
        users.extend(friends);

        Ok(HighscoreData {
            episode_scores,
            users,
        })
    }
}

fn log_failed_request(msg: &str, err: &AppError) {
    match err {
        AppError::Upstream { status, body } => {
            tracing::error!(status = *status, body = %body, "{}", msg);
        }
        other => tracing::error!(error = %other, "{}", msg),
    }
}
