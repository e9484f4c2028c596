// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Dirty tracking
//!
//! Staleness is tracked at two levels. Each [`TreeItem`] carries the set of
//! statistic names known stale in this operation; the shared
//! [`DirtyRegistry`] counts outstanding background refreshes per path so
//! readers in other operations can tell their numbers are in flux.

use crate::cache::{CacheStore, stat_key};
use crate::error::Result;
use crate::node::TreeItem;
use crate::path;
use crate::registry::DirtyRegistry;
use crate::stat::StatName;
use futures::future::{BoxFuture, FutureExt};
use log::{debug, warn};
use std::sync::Arc;

pub struct DirtyTracker {
    cache: Arc<dyn CacheStore>,
    registry: Arc<dyn DirtyRegistry>,
}

impl DirtyTracker {
    pub fn new(cache: Arc<dyn CacheStore>, registry: Arc<dyn DirtyRegistry>) -> Self {
        Self { cache, registry }
    }

    pub fn registry(&self) -> &Arc<dyn DirtyRegistry> {
        &self.registry
    }

    pub async fn mark_dirty<I>(&self, item: &TreeItem, names: I)
    where
        I: IntoIterator<Item = StatName> + Send,
        I::IntoIter: Send,
    {
        item.add_dirty(names).await;
    }

    pub async fn mark_all_dirty(&self, item: &TreeItem) {
        item.add_dirty(StatName::ALL).await;
    }

    /// Delete the cache entries named in `item`'s dirty set, then empty it.
    ///
    /// With `parents` the same names are invalidated on every ancestor;
    /// with `children` on every descendant.
    pub fn clear_dirty_cache<'a>(
        &'a self,
        item: &'a TreeItem,
        parents: bool,
        children: bool,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let names = item.dirty_names().await;
            let key = item.cache_key();
            for name in &names {
                self.cache.delete(&stat_key(&key, *name)).await?;
            }

            if !names.is_empty() {
                if parents {
                    for parent in item.parents().await? {
                        parent.add_dirty(names.iter().copied()).await;
                        self.clear_dirty_cache(&parent, true, false).await?;
                    }
                }
                if children {
                    for child in item.children().await? {
                        child.add_dirty(names.iter().copied()).await;
                        self.clear_dirty_cache(&child, false, true).await?;
                    }
                }
            }

            _ = item.take_dirty().await;
            Ok(())
        }
        .boxed()
    }

    /// Invalidate every statistic at `item`, propagating as requested
    pub async fn clear_all_cache(&self, item: &TreeItem, parents: bool, children: bool) -> Result<()> {
        self.mark_all_dirty(item).await;
        self.clear_dirty_cache(item, parents, children).await
    }

    /// Count one outstanding refresh on `item` and every path it feeds
    pub async fn register_all_dirty(&self, item: &TreeItem) -> Result<()> {
        for path in item.all_pootle_paths() {
            _ = self.registry.increment(&path, 1).await?;
        }
        Ok(())
    }

    /// Retract a registration made by [`DirtyTracker::register_all_dirty`]
    pub async fn unregister_all_dirty(&self, item: &TreeItem) -> Result<()> {
        for path in item.all_pootle_paths() {
            _ = self.registry.increment(&path, -1).await?;
        }
        Ok(())
    }

    /// Mark one refresh of `item` itself as complete
    pub async fn unregister_dirty(&self, item: &TreeItem) -> Result<()> {
        _ = self.registry.increment(&item.cache_key(), -1).await?;
        Ok(())
    }

    pub async fn dirty_score(&self, item: &TreeItem) -> i64 {
        match self.registry.get_score(&item.cache_key()).await {
            Ok(score) => score.unwrap_or(0),
            Err(e) => {
                warn!("dirty score for {} unavailable: {}", item.cache_key(), e);
                0
            }
        }
    }

    /// Whether a refresh is outstanding for `item`, or a batch refresh
    /// covers it
    pub async fn is_dirty(&self, item: &TreeItem) -> bool {
        self.dirty_score(item).await > 0 || self.is_being_refreshed(item).await
    }

    pub async fn is_being_refreshed(&self, item: &TreeItem) -> bool {
        match self.registry.get_marker().await {
            Ok(Some(marker)) => {
                let overlaps = path::marker_overlaps(&marker, &item.cache_key());
                if overlaps {
                    debug!("{} covered by refresh of {}", item.cache_key(), marker);
                }
                overlaps
            }
            Ok(None) => false,
            Err(e) => {
                warn!("refresh marker unavailable: {}", e);
                false
            }
        }
    }
}
