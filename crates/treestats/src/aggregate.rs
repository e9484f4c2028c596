// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Aggregation engine
//!
//! Two ways to obtain a node's aggregate for a statistic:
//!
//! - [`Aggregator::compute_uncached`] folds the node's own value with a
//!   recursive recomputation of every child. It touches no cache and is
//!   only used by refresh passes.
//! - [`Aggregator::compute_cached`] reads the cache. A miss yields the
//!   statistic's identity value; readers never trigger a recomputation.

use crate::cache::{CacheStore, stat_key};
use crate::config::StatsConfig;
use crate::dirty::DirtyTracker;
use crate::error::Result;
use crate::node::TreeItem;
use crate::stat::{CheckStats, LastAction, LastUpdated, StatName, StatValue};
use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Whether a cached read happens inside a refresh pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadContext {
    /// Request path: a miss is an anomaly
    Interactive,
    /// Inside a refresh job: misses are expected while the tree fills in
    FromUpdate,
}

/// Public statistics summary for one node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsReport {
    pub total: u64,
    pub translated: u64,
    pub fuzzy: u64,
    pub suggestions: u64,
    pub critical: u64,
    pub last_action: LastAction,
    pub last_updated: LastUpdated,
    pub is_dirty: bool,
    /// Shallow reports of immediate children, keyed by code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, StatsReport>,
}

pub struct Aggregator {
    cache: Arc<dyn CacheStore>,
    config: StatsConfig,
}

impl Aggregator {
    pub fn new(cache: Arc<dyn CacheStore>, config: StatsConfig) -> Self {
        Self { cache, config }
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    /// Recompute `name` over the whole subtree of `item`
    pub fn compute_uncached<'a>(
        &'a self,
        item: &'a TreeItem,
        name: StatName,
    ) -> BoxFuture<'a, Result<StatValue>> {
        async move {
            let own = item.own_value(name).await?;
            let children = item.children().await?;
            let mut values = Vec::with_capacity(children.len());
            for child in &children {
                values.push(self.compute_uncached(child, name).await?);
            }
            Ok(name.combine(own, values))
        }
        .boxed()
    }

    /// Cached aggregate, or the identity value when nothing usable is cached
    pub async fn compute_cached(
        &self,
        item: &TreeItem,
        name: StatName,
        context: ReadContext,
    ) -> StatValue {
        let key = stat_key(&item.cache_key(), name);
        match self.cache.get(&key).await {
            Ok(Some(bytes)) => match StatValue::from_bytes(&bytes) {
                Ok(value) if name.accepts(&value) => return value,
                Ok(value) => warn!("cached {} has wrong shape: {:?}", key, value),
                Err(e) => warn!("cached {} is unreadable: {}", key, e),
            },
            Ok(None) => self.log_miss(&key, context),
            Err(e) => warn!("cache read for {} failed: {}", key, e),
        }
        name.identity()
    }

    fn log_miss(&self, key: &str, context: ReadContext) {
        if context == ReadContext::Interactive || self.config.strict {
            warn!("cache miss for {}", key);
        } else {
            debug!("cache miss for {} during update", key);
        }
    }

    /// Recompute `name` at `item` and store it
    pub async fn update_cached(&self, item: &TreeItem, name: StatName) -> Result<StatValue> {
        let value = self.compute_uncached(item, name).await?;
        self.store(item, name, &value).await?;
        Ok(value)
    }

    pub async fn store(&self, item: &TreeItem, name: StatName, value: &StatValue) -> Result<()> {
        let key = stat_key(&item.cache_key(), name);
        self.cache.set(&key, value.to_bytes()?).await
    }

    pub async fn get_checks(&self, item: &TreeItem) -> CheckStats {
        self.compute_cached(item, StatName::Checks, ReadContext::Interactive)
            .await
            .into_checks()
    }

    /// Number of units with at least one critical check failure
    pub async fn get_error_unit_count(&self, item: &TreeItem) -> u64 {
        self.get_checks(item).await.critical
    }

    /// Summary of `item`, optionally with one shallow report per child.
    /// Never fails: unreadable values degrade to identities.
    pub async fn get_stats(
        &self,
        item: &TreeItem,
        include_children: bool,
        tracker: &DirtyTracker,
    ) -> StatsReport {
        let mut report = self.report(item, tracker).await;
        if include_children {
            match item.children().await {
                Ok(children) => {
                    for child in &children {
                        let child_report = self.report(child, tracker).await;
                        _ = report.children.insert(child.code(), child_report);
                    }
                }
                Err(e) => warn!("children of {} unavailable: {}", item.cache_key(), e),
            }
        }
        report
    }

    async fn report(&self, item: &TreeItem, tracker: &DirtyTracker) -> StatsReport {
        let ctx = ReadContext::Interactive;
        StatsReport {
            total: self.compute_cached(item, StatName::Total, ctx).await.count(),
            translated: self.compute_cached(item, StatName::Translated, ctx).await.count(),
            fuzzy: self.compute_cached(item, StatName::Fuzzy, ctx).await.count(),
            suggestions: self.compute_cached(item, StatName::Suggestions, ctx).await.count(),
            critical: self.get_error_unit_count(item).await,
            last_action: self
                .compute_cached(item, StatName::LastAction, ctx)
                .await
                .into_last_action(),
            last_updated: self
                .compute_cached(item, StatName::LastUpdated, ctx)
                .await
                .into_last_updated(),
            is_dirty: tracker.is_dirty(item).await,
            children: BTreeMap::new(),
        }
    }

    /// Compare what is cached at `item` with its own value combined with
    /// the children's cached aggregates; returns the names that disagree
    pub async fn check_consistency(&self, item: &TreeItem, names: &[StatName]) -> Vec<StatName> {
        let children = match item.children().await {
            Ok(children) => children,
            Err(e) => {
                warn!("consistency check of {} skipped: {}", item.cache_key(), e);
                return Vec::new();
            }
        };

        let mut mismatched = Vec::new();
        for &name in names {
            let own = match item.own_value(name).await {
                Ok(own) => own,
                Err(e) => {
                    warn!("consistency check of {}:{} skipped: {}", item.cache_key(), name, e);
                    continue;
                }
            };
            let mut values = Vec::with_capacity(children.len());
            for child in &children {
                values.push(self.compute_cached(child, name, ReadContext::FromUpdate).await);
            }
            let expected = name.combine(own, values);
            let stored = self.compute_cached(item, name, ReadContext::FromUpdate).await;
            if stored != expected {
                warn!(
                    "inconsistent {} at {}: cached {:?}, children give {:?}",
                    name,
                    item.cache_key(),
                    stored,
                    expected
                );
                mismatched.push(name);
            }
        }
        mismatched
    }
}
