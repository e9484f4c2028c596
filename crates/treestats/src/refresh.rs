// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Refresh coordination
//!
//! Reactive refresh of one node runs through these states:
//!
//! ```text
//! IDLE -> REGISTERED -> JOB_SUBMITTED -> RUNNING -> COMMITTED
//!                                                \-> FAILED
//! ```
//!
//! Registration raises the dirty score of the node and of every path it
//! feeds before the job is handed off. The job recomputes the node, queues
//! a full recompute of each parent, and finally lowers the node's own
//! score. Each parent job lowers its own score in turn, so the chain of
//! jobs retires the registration one level at a time.
//!
//! A job whose node can no longer be updated retracts the whole
//! registration and leaves the cache as it was. There is no retry.

use crate::aggregate::Aggregator;
use crate::dirty::DirtyTracker;
use crate::error::Result;
use crate::jobs::{Job, JobHandler, JobRunner};
use crate::node::TreeItem;
use crate::registry::DirtyRegistry;
use crate::stat::StatName;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, error, warn};
use std::sync::Arc;

/// Where jobs run
#[derive(Clone)]
pub enum Dispatch {
    /// On the submitting task, parents included
    Inline,
    /// On a job runner; parent jobs are submitted from inside the worker
    Queue(Arc<dyn JobRunner>),
}

pub struct RefreshCoordinator {
    aggregator: Arc<Aggregator>,
    tracker: Arc<DirtyTracker>,
    dispatch: Dispatch,
    strict: bool,
}

impl RefreshCoordinator {
    pub fn new(
        aggregator: Arc<Aggregator>,
        tracker: Arc<DirtyTracker>,
        dispatch: Dispatch,
        strict: bool,
    ) -> Self {
        Self {
            aggregator,
            tracker,
            dispatch,
            strict,
        }
    }

    /// Register and queue a refresh of whatever is in `item`'s dirty set
    pub async fn update_dirty_cache(&self, item: &TreeItem) -> Result<()> {
        let names = item.take_dirty().await;
        if names.is_empty() {
            return Ok(());
        }
        if !item.can_be_updated().await {
            debug!("{} cannot be updated, skipping refresh", item.cache_key());
            return Ok(());
        }

        self.tracker.register_all_dirty(item).await?;
        let job = Job::new(item.clone(), names);
        match &self.dispatch {
            // The job body retracts the registration itself on failure.
            Dispatch::Inline => self.update_cache(&job.item, &job.names).await,
            Dispatch::Queue(runner) => {
                if let Err(e) = runner.submit(job).await {
                    self.tracker.unregister_all_dirty(item).await?;
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    pub async fn update_all_cache(&self, item: &TreeItem) -> Result<()> {
        self.tracker.mark_all_dirty(item).await;
        self.update_dirty_cache(item).await
    }

    /// Refresh every parent of `item` in full
    pub async fn update_parent_cache(&self, item: &TreeItem) -> Result<()> {
        for parent in item.parents().await? {
            self.update_all_cache(&parent).await?;
        }
        Ok(())
    }

    /// Job body: recompute `names` at `item`, push a full recompute to each
    /// parent, then retire `item`'s own registration
    pub fn update_cache<'a>(
        &'a self,
        item: &'a TreeItem,
        names: &'a [StatName],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let key = item.cache_key();
            if !item.can_be_updated().await {
                warn!("cannot update stats for {}, dropping refresh", key);
                return self.tracker.unregister_all_dirty(item).await;
            }

            if let Err(e) = self.recompute(item, names).await {
                warn!("refresh of {} failed: {}", key, e);
                self.tracker.unregister_all_dirty(item).await?;
                return Err(e);
            }

            let parents = match item.parents().await {
                Ok(parents) => parents,
                Err(e) => {
                    warn!("parents of {} unavailable: {}", key, e);
                    self.tracker.unregister_all_dirty(item).await?;
                    return Err(e);
                }
            };
            for parent in parents {
                self.propagate(parent).await?;
            }

            self.tracker.unregister_dirty(item).await
        }
        .boxed()
    }

    async fn recompute(&self, item: &TreeItem, names: &[StatName]) -> Result<()> {
        _ = item.initialize_children().await?;
        for &name in names {
            _ = self.aggregator.update_cached(item, name).await?;
        }
        debug!("committed {} stats for {}", names.len(), item.cache_key());

        if self.strict {
            let mismatched = self.aggregator.check_consistency(item, names).await;
            if !mismatched.is_empty() {
                warn!(
                    "{} committed with {} inconsistent stats",
                    item.cache_key(),
                    mismatched.len()
                );
            }
        }
        Ok(())
    }

    async fn propagate(&self, parent: TreeItem) -> Result<()> {
        match &self.dispatch {
            Dispatch::Inline => {
                // The parent retracts its own registration on failure.
                if let Err(e) = self.update_cache(&parent, &StatName::ALL).await {
                    error!("parent refresh of {} failed: {}", parent.cache_key(), e);
                }
                Ok(())
            }
            Dispatch::Queue(runner) => {
                if let Err(e) = runner.submit(Job::new(parent.clone(), StatName::ALL)).await {
                    error!("cannot queue refresh of {}: {}", parent.cache_key(), e);
                    self.tracker.unregister_all_dirty(&parent).await?;
                }
                Ok(())
            }
        }
    }

    /// Synchronously recompute and store `names` at `item`, after its
    /// whole subtree when `include_children` is set
    pub fn refresh_stats<'a>(
        &'a self,
        item: &'a TreeItem,
        include_children: bool,
        names: &'a [StatName],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if include_children {
                for child in item.children().await? {
                    self.refresh_stats(&child, true, names).await?;
                }
            }
            for &name in names {
                _ = self.aggregator.update_cached(item, name).await?;
            }
            debug!("refreshed {}", item.cache_key());
            Ok(())
        }
        .boxed()
    }

    /// Set the global in-progress marker for a batch refresh of `path`
    pub async fn begin_refresh(&self, path: &str) -> Result<RefreshMarker> {
        RefreshMarker::begin(self.tracker.registry().clone(), path).await
    }
}

#[async_trait]
impl JobHandler for RefreshCoordinator {
    async fn run(&self, job: Job) -> Result<()> {
        self.update_cache(&job.item, &job.names).await
    }
}

/// Holds the global "refresh in progress" marker.
///
/// Call [`RefreshMarker::finish`] on every exit path. A marker dropped
/// without `finish` is cleared by a spawned task when a runtime is
/// available.
pub struct RefreshMarker {
    registry: Arc<dyn DirtyRegistry>,
    path: String,
    finished: bool,
}

impl RefreshMarker {
    pub async fn begin(registry: Arc<dyn DirtyRegistry>, path: &str) -> Result<Self> {
        registry.set_marker(path).await?;
        debug!("refresh marker set to {}", path);
        Ok(Self {
            registry,
            path: path.to_string(),
            finished: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Move the marker to another path without clearing it in between
    pub async fn advance(&mut self, path: &str) -> Result<()> {
        self.registry.set_marker(path).await?;
        self.path = path.to_string();
        Ok(())
    }

    pub async fn finish(mut self) -> Result<()> {
        self.finished = true;
        self.registry.delete_marker().await?;
        debug!("refresh marker {} cleared", self.path);
        Ok(())
    }
}

impl Drop for RefreshMarker {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("refresh marker {} dropped without finish", self.path);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let registry = self.registry.clone();
            _ = handle.spawn(async move {
                if let Err(e) = registry.delete_marker().await {
                    error!("failed to clear refresh marker: {}", e);
                }
            });
        }
    }
}
