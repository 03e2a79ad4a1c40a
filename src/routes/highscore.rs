// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public highscore endpoint with conditional GET.

use crate::services::Snapshot;
use crate::time_utils::format_http_date;
use crate::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;

/// Highscore routes (public, read-only).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_highscores))
}

/// Serve the current snapshot.
///
/// - 503 until the first snapshot is published
/// - 304 when `If-None-Match` matches the current ETag
/// - 200 with the full JSON body otherwise
async fn get_highscores(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let snapshot = state.cache.get();
    if snapshot.is_empty() {
        return with_cors(StatusCode::SERVICE_UNAVAILABLE.into_response());
    }

    let etag = snapshot.etag();
    if if_none_match_matches(&headers, &etag) {
        let mut response = StatusCode::NOT_MODIFIED.into_response();
        if let Ok(value) = HeaderValue::from_str(&etag) {
            response.headers_mut().insert(header::ETAG, value);
        }
        return with_cors(response);
    }

    let cache_control = format!(
        "must-revalidate, max-age={}",
        state.config.cache_max_age.as_secs()
    );
    with_cors(full_response(&snapshot, &etag, &cache_control))
}

fn full_response(snapshot: &Snapshot, etag: &str, cache_control: &str) -> Response {
    let payload = snapshot.payload().clone();
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::ETAG, etag)
        .header(header::CONTENT_LENGTH, payload.len());
    if let Some(published_at) = snapshot.published_at() {
        builder = builder.header(header::LAST_MODIFIED, format_http_date(published_at));
    }

    builder.body(Body::from(payload)).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build highscore response");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

fn with_cors(mut response: Response) -> Response {
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    response
}

/// Whether any validator in `If-None-Match` matches `etag`.
///
/// Accepts comma-separated lists, weak validators and `*`.
fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
}
