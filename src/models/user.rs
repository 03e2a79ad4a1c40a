// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Duo user model, as published in the highscore snapshot.

use serde::{Deserialize, Serialize};

/// Public profile decoration of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile color, e.g. `#9579DA`
    pub color: String,
    /// Avatar URL
    pub image_url: String,
}

/// A Duo user: the authenticated account or one of its friends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub profile: Profile,
}
