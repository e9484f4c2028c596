// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Hierarchical cached statistics for translation resources.
//!
//! Languages, projects, translation projects, directories and stores form
//! a tree. Every node caches aggregates of a fixed set of statistics (word
//! counts, suggestion counts, quality-check failures, activity
//! timestamps). Reads are served from the cache and never recompute;
//! writes mark statistics dirty, register the affected paths in a shared
//! dirty registry, and hand the recomputation to background jobs that
//! walk up the tree.

pub mod aggregate;
pub mod batch;
pub mod cache;
pub mod config;
pub mod dirty;
pub mod error;
pub mod jobs;
pub mod memory;
pub mod node;
pub mod path;
pub mod refresh;
pub mod registry;
pub mod stat;
pub mod stats;

#[cfg(test)]
mod tests;

pub use aggregate::{Aggregator, ReadContext, StatsReport};
pub use batch::{BatchRefresh, BatchReport, ResourceIndex};
pub use cache::{CacheStats, CacheStore, MemoryCacheStore, stat_key};
pub use config::StatsConfig;
pub use dirty::DirtyTracker;
pub use error::{Error, Result};
pub use jobs::{Job, JobHandler, JobRunner, LocalJobRunner};
pub use memory::{MemoryTree, StoreData, TreeFixture};
pub use node::{NodeHandle, TreeItem, TreeNode};
pub use refresh::{Dispatch, RefreshCoordinator, RefreshMarker};
pub use registry::{DirtyRegistry, MemoryDirtyRegistry};
pub use stat::{CheckStats, CombineRule, LastAction, LastUpdated, StatName, StatValue};
pub use stats::{MemoryStats, Stats};
