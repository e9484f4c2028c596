// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Composed statistics service
//!
//! [`Stats`] wires the aggregator, dirty tracker and refresh coordinator
//! over one cache store and one dirty registry, and exposes the read and
//! write-trigger API consumed by callers.

use crate::aggregate::{Aggregator, ReadContext, StatsReport};
use crate::cache::{CacheStore, MemoryCacheStore};
use crate::config::StatsConfig;
use crate::dirty::DirtyTracker;
use crate::error::Result;
use crate::jobs::{JobRunner, LocalJobRunner};
use crate::node::TreeItem;
use crate::refresh::{Dispatch, RefreshCoordinator, RefreshMarker};
use crate::registry::{DirtyRegistry, MemoryDirtyRegistry};
use crate::stat::{CheckStats, StatName, StatValue};
use std::sync::Arc;

#[derive(Clone)]
pub struct Stats {
    config: StatsConfig,
    aggregator: Arc<Aggregator>,
    tracker: Arc<DirtyTracker>,
    coordinator: Arc<RefreshCoordinator>,
}

/// In-process stats service with direct access to its backends
pub struct MemoryStats {
    pub stats: Stats,
    pub cache: MemoryCacheStore,
    pub registry: MemoryDirtyRegistry,
    /// `None` when jobs run inline
    pub runner: Option<Arc<LocalJobRunner>>,
}

impl Stats {
    /// Build over injected backends. Without a runner, or with
    /// `sync_jobs` set, jobs run inline.
    pub fn new(
        config: StatsConfig,
        cache: Arc<dyn CacheStore>,
        registry: Arc<dyn DirtyRegistry>,
        runner: Option<Arc<dyn JobRunner>>,
    ) -> Self {
        let dispatch = match runner {
            Some(runner) if !config.sync_jobs => Dispatch::Queue(runner),
            _ => Dispatch::Inline,
        };
        let aggregator = Arc::new(Aggregator::new(cache.clone(), config.clone()));
        let tracker = Arc::new(DirtyTracker::new(cache, registry));
        let coordinator = Arc::new(RefreshCoordinator::new(
            aggregator.clone(),
            tracker.clone(),
            dispatch,
            config.strict,
        ));
        Self {
            config,
            aggregator,
            tracker,
            coordinator,
        }
    }

    /// Memory-backed service. Unless `sync_jobs` is set, a
    /// [`LocalJobRunner`] with `config.workers` workers is started, which
    /// requires a tokio runtime.
    pub fn in_memory(config: StatsConfig) -> MemoryStats {
        let cache = MemoryCacheStore::new();
        let registry = MemoryDirtyRegistry::new();

        if config.sync_jobs {
            let stats = Stats::new(
                config,
                Arc::new(cache.clone()),
                Arc::new(registry.clone()),
                None,
            );
            return MemoryStats {
                stats,
                cache,
                registry,
                runner: None,
            };
        }

        let runner = Arc::new(LocalJobRunner::new());
        let workers = config.workers;
        let queue: Arc<dyn JobRunner> = runner.clone();
        let stats = Stats::new(
            config,
            Arc::new(cache.clone()),
            Arc::new(registry.clone()),
            Some(queue),
        );
        runner.start(stats.coordinator.clone(), workers);
        MemoryStats {
            stats,
            cache,
            registry,
            runner: Some(runner),
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn tracker(&self) -> &Arc<DirtyTracker> {
        &self.tracker
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    // Read API

    pub async fn get_stats(&self, item: &TreeItem, include_children: bool) -> StatsReport {
        self.aggregator
            .get_stats(item, include_children, &self.tracker)
            .await
    }

    pub async fn get_checks(&self, item: &TreeItem) -> CheckStats {
        self.aggregator.get_checks(item).await
    }

    pub async fn get_error_unit_count(&self, item: &TreeItem) -> u64 {
        self.aggregator.get_error_unit_count(item).await
    }

    pub async fn is_dirty(&self, item: &TreeItem) -> bool {
        self.tracker.is_dirty(item).await
    }

    pub async fn get_cached(&self, item: &TreeItem, name: StatName) -> StatValue {
        self.aggregator
            .compute_cached(item, name, ReadContext::Interactive)
            .await
    }

    // Write-trigger API

    pub async fn mark_dirty<I>(&self, item: &TreeItem, names: I)
    where
        I: IntoIterator<Item = StatName> + Send,
        I::IntoIter: Send,
    {
        self.tracker.mark_dirty(item, names).await
    }

    pub async fn mark_all_dirty(&self, item: &TreeItem) {
        self.tracker.mark_all_dirty(item).await
    }

    pub async fn update_dirty_cache(&self, item: &TreeItem) -> Result<()> {
        self.coordinator.update_dirty_cache(item).await
    }

    pub async fn update_all_cache(&self, item: &TreeItem) -> Result<()> {
        self.coordinator.update_all_cache(item).await
    }

    /// Invalidate every statistic at `item`, optionally at its ancestors
    /// and descendants too
    pub async fn clear_all_cache(&self, item: &TreeItem, parents: bool, children: bool) -> Result<()> {
        self.tracker.clear_all_cache(item, parents, children).await
    }

    pub async fn clear_dirty_cache(&self, item: &TreeItem, parents: bool, children: bool) -> Result<()> {
        self.tracker.clear_dirty_cache(item, parents, children).await
    }

    /// Synchronous recompute; `names` defaults to every statistic
    pub async fn refresh_stats(
        &self,
        item: &TreeItem,
        include_children: bool,
        names: Option<&[StatName]>,
    ) -> Result<()> {
        let names = names.unwrap_or(&StatName::ALL);
        self.coordinator
            .refresh_stats(item, include_children, names)
            .await
    }

    pub async fn update_parent_cache(&self, item: &TreeItem) -> Result<()> {
        self.coordinator.update_parent_cache(item).await
    }

    pub async fn begin_refresh(&self, path: &str) -> Result<RefreshMarker> {
        self.coordinator.begin_refresh(path).await
    }
}

impl MemoryStats {
    /// Wait for queued jobs; returns at once when jobs run inline
    pub async fn wait_idle(&self) {
        if let Some(runner) = &self.runner {
            runner.wait_idle().await;
        }
    }

    pub async fn shutdown(&self) {
        if let Some(runner) = &self.runner {
            runner.shutdown().await;
        }
    }
}
