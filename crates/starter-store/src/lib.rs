//! Fuzzer launch record persistence: a [`LaunchStore`] trait plus an
//! in-memory implementation used in tests and as the reference for a real
//! database-backed store.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::debug;

use starter_pod::LaunchRecord;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("launch store backend error: {0}")]
    Backend(String),
}

/// Persists fuzzer launch records and sweeps the ones past their
/// `exp_date`, matching `ILaunches.save`/`remove_expired`.
#[async_trait]
pub trait LaunchStore: Send + Sync {
    async fn save(&self, launch: LaunchRecord) -> Result<(), StoreError>;

    /// Deletes every record whose `exp_date` is at or before `now`,
    /// returning how many were removed.
    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryLaunchStore {
    launches: Mutex<Vec<LaunchRecord>>,
}

impl InMemoryLaunchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<LaunchRecord> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl LaunchStore for InMemoryLaunchStore {
    async fn save(&self, launch: LaunchRecord) -> Result<(), StoreError> {
        debug!(fuzzer_id = %launch.fuzzer_id, exp_date = %launch.exp_date, "launch record saved");
        self.launches.lock().unwrap().push(launch);
        Ok(())
    }

    async fn remove_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut launches = self.launches.lock().unwrap();
        let before = launches.len();
        launches.retain(|l| l.exp_date > now);
        let removed = before - launches.len();
        if removed > 0 {
            debug!(removed, "expired launch records swept");
        }
        Ok(removed)
    }
}
