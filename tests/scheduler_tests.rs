// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh scheduler state machine: token validity gate and all-or-nothing publication.

use duo_highscore::models::ApiTokens;
use duo_highscore::services::{RefreshScheduler, SchedulerConfig, SnapshotCache, TokenStore};
use std::time::Duration;
use tokio::time::Instant;

mod common;
use common::{Failure, MockDuoApi};

const SECOND: Duration = Duration::from_secs(1);

struct Harness {
    api: MockDuoApi,
    cache: SnapshotCache,
    store: TokenStore,
    scheduler: RefreshScheduler<MockDuoApi>,
    _dir: tempfile::TempDir,
}

fn harness(retry_delay: Duration) -> Harness {
    harness_with_store(retry_delay, "tokens.json")
}

/// `token_file` is relative to a fresh temp dir.
fn harness_with_store(retry_delay: Duration, token_file: &str) -> Harness {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = TokenStore::new(dir.path().join(token_file));
    let api = MockDuoApi::new();
    let cache = SnapshotCache::new();

    let scheduler = RefreshScheduler::new(
        api.clone(),
        store.clone(),
        cache.clone(),
        ApiTokens::new("access-0", "refresh-0"),
        SchedulerConfig {
            token_refresh_interval: Duration::from_secs(3600),
            highscore_refresh_interval: Duration::from_secs(60),
            tick: SECOND,
            retry_delay,
        },
    );

    Harness {
        api,
        cache,
        store,
        scheduler,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_first_tick_refreshes_tokens_and_publishes() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;

    {
        let state = h.api.state.lock();
        assert_eq!(state.refresh_calls, 1);
        assert_eq!(state.refresh_tokens_seen, vec!["refresh-0"]);
        assert_eq!(state.highscores_calls, 1);
        assert_eq!(state.profile_calls, 1);
        assert_eq!(state.friends_calls, 1);
        // Data calls use the freshly refreshed access token
        assert!(state.access_tokens_seen.iter().all(|t| t == "access-1"));
    }

    assert!(h.scheduler.tokens_valid());
    assert_eq!(h.scheduler.tokens(), &ApiTokens::new("access-1", "refresh-1"));
    assert_eq!(
        h.store.load().unwrap(),
        ApiTokens::new("access-1", "refresh-1"),
        "Refreshed tokens should be persisted"
    );

    let snapshot = h.cache.get();
    assert!(!snapshot.is_empty());
    let json: serde_json::Value = serde_json::from_slice(snapshot.payload()).unwrap();
    assert_eq!(json["users"][0]["user_id"], "me");
    assert_eq!(json["users"][1]["user_id"], "f1");
    assert_eq!(json["users"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_intervals_are_independent() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    h.scheduler.tick(start + 30 * SECOND).await;
    assert_eq!(h.api.state.lock().highscores_calls, 1);

    h.scheduler.tick(start + 60 * SECOND).await;
    {
        let state = h.api.state.lock();
        assert_eq!(state.highscores_calls, 2);
        assert_eq!(state.refresh_calls, 1, "Token task runs hourly");
    }

    h.scheduler.tick(start + 3600 * SECOND).await;
    assert_eq!(h.api.state.lock().refresh_calls, 2);
}

#[tokio::test]
async fn test_auth_error_suspends_data_until_refresh_succeeds() {
    let mut h = harness(Duration::ZERO);
    h.api
        .state
        .lock()
        .refresh_failures
        .extend([Failure::Auth, Failure::Auth]);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    assert!(!h.scheduler.tokens_valid());
    assert_eq!(h.api.data_calls(), 0);

    h.scheduler.tick(start + SECOND).await;
    assert!(!h.scheduler.tokens_valid());
    assert_eq!(h.api.data_calls(), 0);
    assert!(h.cache.get().is_empty());

    // Third attempt succeeds; data resumes in the same tick
    h.scheduler.tick(start + 2 * SECOND).await;
    assert!(h.scheduler.tokens_valid());
    assert_eq!(h.api.state.lock().refresh_calls, 3);
    assert_eq!(h.api.state.lock().highscores_calls, 1);
    assert!(!h.cache.get().is_empty());
}

#[tokio::test]
async fn test_auth_error_retry_waits_for_retry_delay() {
    let mut h = harness(10 * SECOND);
    h.api.state.lock().refresh_failures.push_back(Failure::Auth);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    h.scheduler.tick(start + 5 * SECOND).await;
    assert_eq!(h.api.state.lock().refresh_calls, 1);
    assert_eq!(h.api.data_calls(), 0);

    h.scheduler.tick(start + 10 * SECOND).await;
    assert_eq!(h.api.state.lock().refresh_calls, 2);
    assert_eq!(h.api.state.lock().highscores_calls, 1);
}

#[tokio::test]
async fn test_transient_token_error_keeps_old_tokens() {
    let mut h = harness(Duration::ZERO);
    h.api
        .state
        .lock()
        .refresh_failures
        .push_back(Failure::Transient);
    let start = Instant::now();

    h.scheduler.tick(start).await;

    assert!(h.scheduler.tokens_valid());
    assert_eq!(h.scheduler.tokens(), &ApiTokens::new("access-0", "refresh-0"));
    {
        let state = h.api.state.lock();
        assert_eq!(state.highscores_calls, 1);
        assert!(state.access_tokens_seen.iter().all(|t| t == "access-0"));
    }
    assert!(h.store.load_with_env(|_| None).is_err(), "Nothing persisted");

    // Retried on the next tick
    h.scheduler.tick(start + SECOND).await;
    assert_eq!(h.api.state.lock().refresh_calls, 2);
    assert_eq!(h.scheduler.tokens(), &ApiTokens::new("access-2", "refresh-2"));
}

#[tokio::test]
async fn test_transient_data_error_keeps_previous_snapshot() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    let published = h.cache.get();
    assert!(!published.is_empty());

    // Highscores and profile succeed, friends fail: nothing may be published
    {
        let mut state = h.api.state.lock();
        state.score = 99;
        state.friends_failure = Some(Failure::Transient);
    }
    h.scheduler.tick(start + 60 * SECOND).await;
    assert_eq!(h.api.state.lock().highscores_calls, 2);
    assert_eq!(h.cache.get().fingerprint(), published.fingerprint());

    // Retried on the next tick once upstream recovers
    h.api.state.lock().friends_failure = None;
    h.scheduler.tick(start + 61 * SECOND).await;
    assert_eq!(h.api.state.lock().highscores_calls, 3);
    let refreshed = h.cache.get();
    assert_ne!(refreshed.fingerprint(), published.fingerprint());
    let json: serde_json::Value = serde_json::from_slice(refreshed.payload()).unwrap();
    assert_eq!(json["episode_scores"][0]["scores"][0]["score"], 99);
}

#[tokio::test]
async fn test_data_auth_error_forces_token_refresh() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    let published = h.cache.get();

    h.api.state.lock().highscores_failure = Some(Failure::Auth);
    h.scheduler.tick(start + 60 * SECOND).await;
    assert!(!h.scheduler.tokens_valid());
    assert_eq!(h.cache.get().fingerprint(), published.fingerprint());

    // Token task is due again long before its hourly interval
    h.api.state.lock().highscores_failure = None;
    h.scheduler.tick(start + 61 * SECOND).await;
    assert!(h.scheduler.tokens_valid());
    let state = h.api.state.lock();
    assert_eq!(state.refresh_calls, 2);
    assert_eq!(state.highscores_calls, 3);
}

#[tokio::test]
async fn test_reprovisioned_tokens_picked_up_after_auth_error() {
    let mut h = harness(Duration::ZERO);
    h.api.state.lock().refresh_failures.push_back(Failure::Auth);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    assert!(!h.scheduler.tokens_valid());

    // Operator logs in again and writes a fresh pair
    h.store
        .save(&ApiTokens::new("manual-access", "manual-refresh"))
        .unwrap();

    h.scheduler.tick(start + SECOND).await;
    assert!(h.scheduler.tokens_valid());
    assert_eq!(
        h.api.state.lock().refresh_tokens_seen,
        vec!["refresh-0", "manual-refresh"]
    );
}

#[tokio::test]
async fn test_unsaved_rotated_tokens_survive_data_auth_error() {
    // Parent directory missing: every save fails
    let mut h = harness_with_store(Duration::ZERO, "missing-dir/tokens.json");
    let start = Instant::now();

    h.scheduler.tick(start).await;
    assert_eq!(h.scheduler.tokens(), &ApiTokens::new("access-1", "refresh-1"));
    assert!(h.store.load_file().unwrap().is_none());

    h.api.state.lock().highscores_failure = Some(Failure::Auth);
    h.scheduler.tick(start + 60 * SECOND).await;
    assert!(!h.scheduler.tokens_valid());

    // The in-memory rotated refresh token is used, not the spent startup pair
    h.api.state.lock().highscores_failure = None;
    h.scheduler.tick(start + 61 * SECOND).await;
    assert!(h.scheduler.tokens_valid());
    assert_eq!(
        h.api.state.lock().refresh_tokens_seen,
        vec!["refresh-0", "refresh-1"]
    );
    assert_eq!(h.scheduler.tokens(), &ApiTokens::new("access-2", "refresh-2"));
}

#[tokio::test]
async fn test_data_auth_error_ignores_stale_token_file() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    // Someone leaves an older pair on disk
    h.store
        .save(&ApiTokens::new("access-0", "refresh-0"))
        .unwrap();

    h.api.state.lock().highscores_failure = Some(Failure::Auth);
    h.scheduler.tick(start + 60 * SECOND).await;
    h.api.state.lock().highscores_failure = None;
    h.scheduler.tick(start + 61 * SECOND).await;

    assert_eq!(
        h.api.state.lock().refresh_tokens_seen,
        vec!["refresh-0", "refresh-1"]
    );
}

#[tokio::test]
async fn test_identical_refresh_keeps_fingerprint() {
    let mut h = harness(Duration::ZERO);
    let start = Instant::now();

    h.scheduler.tick(start).await;
    let first = h.cache.get();
    h.scheduler.tick(start + 60 * SECOND).await;
    let second = h.cache.get();

    assert_eq!(h.api.state.lock().highscores_calls, 2);
    assert_eq!(first.fingerprint(), second.fingerprint());
}
