// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod duo;
pub mod scheduler;
pub mod snapshot;
pub mod token_store;

pub use duo::{DuoApi, DuoClient};
pub use scheduler::{PeriodicTask, RefreshScheduler, SchedulerConfig};
pub use snapshot::{Snapshot, SnapshotCache};
pub use token_store::TokenStore;
