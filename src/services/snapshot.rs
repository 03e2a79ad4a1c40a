// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Published highscore snapshot shared between the refresher and the server.
//!
//! A snapshot is immutable once built. Publishing swaps the whole
//! `Arc<Snapshot>` under one lock, so a reader always sees bytes and
//! fingerprint from the same publication.

use crate::error::Result;
use crate::models::HighscoreData;
use axum::body::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Serialized dataset plus its content fingerprint.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    payload: Bytes,
    fingerprint: String,
    published_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Serialize `data` and fingerprint the resulting bytes.
    pub fn build(data: &HighscoreData) -> Result<Self> {
        let payload = Bytes::from(serde_json::to_vec(data)?);
        let fingerprint = fingerprint(&payload);
        Ok(Self {
            payload,
            fingerprint,
            published_at: Some(Utc::now()),
        })
    }

    /// True until the first successful publication.
    pub fn is_empty(&self) -> bool {
        self.fingerprint.is_empty()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Hex SHA-256 of [`Self::payload`]; empty for the initial snapshot.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Quoted fingerprint, as used in `ETag` / `If-None-Match`.
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.fingerprint)
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }
}

/// Content fingerprint of serialized snapshot bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Single-writer, many-reader holder of the current [`Snapshot`].
#[derive(Clone, Default)]
pub struct SnapshotCache {
    current: Arc<RwLock<Arc<Snapshot>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a snapshot from `data` and make it current.
    pub fn set(&self, data: &HighscoreData) -> Result<Arc<Snapshot>> {
        // Serialize and hash outside the lock
        let snapshot = Arc::new(Snapshot::build(data)?);
        *self.current.write() = snapshot.clone();

        tracing::debug!(
            fingerprint = %snapshot.fingerprint(),
            bytes = snapshot.payload().len(),
            "Snapshot published"
        );
        Ok(snapshot)
    }

    /// Current snapshot (empty until the first `set`).
    pub fn get(&self) -> Arc<Snapshot> {
        self.current.read().clone()
    }
}
