// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Dirty registry
//!
//! A sorted set of signed scores keyed by path, plus one "refresh in
//! progress" marker. Scores are counters, not flags: overlapping refreshes
//! each add their own registration and each completion removes exactly
//! one, so a path reads as clean only once every registration is matched.
//! Scores may go transiently negative under interleaving; nothing clamps
//! them.

use crate::error::Result;
use async_trait::async_trait;
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[async_trait]
pub trait DirtyRegistry: Send + Sync {
    /// Add `amount` (possibly negative) to the score of `path`, returning
    /// the new score
    async fn increment(&self, path: &str, amount: i64) -> Result<i64>;

    async fn get_score(&self, path: &str) -> Result<Option<i64>>;

    async fn get_marker(&self) -> Result<Option<String>>;

    async fn set_marker(&self, path: &str) -> Result<()>;

    async fn delete_marker(&self) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct MemoryDirtyRegistry {
    scores: Arc<Mutex<BTreeMap<String, i64>>>,
    marker: Arc<Mutex<Option<String>>>,
}

impl MemoryDirtyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every score that has ever been touched
    pub async fn scores(&self) -> BTreeMap<String, i64> {
        self.scores.lock().await.clone()
    }

    /// Paths with a positive score
    pub async fn dirty_paths(&self) -> Vec<String> {
        self.scores
            .lock()
            .await
            .iter()
            .filter(|(_, score)| **score > 0)
            .map(|(path, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl DirtyRegistry for MemoryDirtyRegistry {
    async fn increment(&self, path: &str, amount: i64) -> Result<i64> {
        let mut scores = self.scores.lock().await;
        let score = scores.entry(path.to_string()).or_insert(0);
        *score += amount;
        debug!("dirty score {} {:+} -> {}", path, amount, *score);
        Ok(*score)
    }

    async fn get_score(&self, path: &str) -> Result<Option<i64>> {
        Ok(self.scores.lock().await.get(path).copied())
    }

    async fn get_marker(&self) -> Result<Option<String>> {
        Ok(self.marker.lock().await.clone())
    }

    async fn set_marker(&self, path: &str) -> Result<()> {
        *self.marker.lock().await = Some(path.to_string());
        Ok(())
    }

    async fn delete_marker(&self) -> Result<()> {
        *self.marker.lock().await = None;
        Ok(())
    }
}
