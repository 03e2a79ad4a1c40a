// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Duo API credential pair.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credential pair. Always replaced as a unit.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl ApiTokens {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for ApiTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiTokens")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}
