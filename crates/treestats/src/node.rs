// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Tree nodes
//!
//! [`TreeNode`] is the capability set the engine needs from a resource:
//! identity, structure and own leaf values. Concrete resources (stores,
//! directories, translation projects, projects, languages) implement it
//! and the engine never inspects which kind it is holding.
//!
//! [`TreeItem`] is the per-operation handle wrapping a node. It carries
//! the memoized children list and the in-memory dirty set, and is cheap to
//! clone so it can be moved into background jobs.

use crate::error::Result;
use crate::path;
use crate::stat::{CheckStats, LastAction, LastUpdated, StatName, StatValue};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared reference to a tree node implementation
pub type NodeHandle = Arc<dyn TreeNode>;

#[async_trait]
pub trait TreeNode: Send + Sync {
    /// Stable identity, also the prefix of every cache entry for this node
    fn cache_key(&self) -> String;

    /// Short code used to key this node in its parent's report
    fn code(&self) -> String {
        path::node_code(&self.cache_key())
    }

    async fn get_children(&self) -> Result<Vec<NodeHandle>>;

    async fn get_parents(&self) -> Result<Vec<NodeHandle>>;

    async fn can_be_updated(&self) -> bool {
        true
    }

    /// Registry paths moved together when this node is queued for refresh
    fn all_pootle_paths(&self) -> Vec<String> {
        path::all_pootle_paths(&self.cache_key())
    }

    async fn total_words(&self) -> Result<u64> {
        Ok(0)
    }

    async fn translated_words(&self) -> Result<u64> {
        Ok(0)
    }

    async fn fuzzy_words(&self) -> Result<u64> {
        Ok(0)
    }

    async fn suggestion_count(&self) -> Result<u64> {
        Ok(0)
    }

    async fn checks(&self) -> Result<CheckStats> {
        Ok(CheckStats::default())
    }

    async fn mtime(&self) -> Result<DateTime<Utc>> {
        Ok(DateTime::<Utc>::UNIX_EPOCH)
    }

    async fn last_action(&self) -> Result<LastAction> {
        Ok(LastAction::default())
    }

    async fn last_updated(&self) -> Result<LastUpdated> {
        Ok(LastUpdated::default())
    }
}

/// Per-operation instance of a tree node
#[derive(Clone)]
pub struct TreeItem {
    state: Arc<ItemState>,
}

struct ItemState {
    node: NodeHandle,
    /// `None` until the children have been queried once
    children: Mutex<Option<Vec<TreeItem>>>,
    dirty: Mutex<BTreeSet<StatName>>,
}

impl TreeItem {
    pub fn new(node: NodeHandle) -> Self {
        Self {
            state: Arc::new(ItemState {
                node,
                children: Mutex::new(None),
                dirty: Mutex::new(BTreeSet::new()),
            }),
        }
    }

    pub fn node(&self) -> &NodeHandle {
        &self.state.node
    }

    pub fn cache_key(&self) -> String {
        self.state.node.cache_key()
    }

    pub fn code(&self) -> String {
        self.state.node.code()
    }

    pub fn all_pootle_paths(&self) -> Vec<String> {
        self.state.node.all_pootle_paths()
    }

    pub async fn can_be_updated(&self) -> bool {
        self.state.node.can_be_updated().await
    }

    /// Children, queried on first use and memoized for this item's lifetime
    pub async fn children(&self) -> Result<Vec<TreeItem>> {
        let mut children = self.state.children.lock().await;
        if let Some(items) = children.as_ref() {
            return Ok(items.clone());
        }
        let items = self.load_children().await?;
        *children = Some(items.clone());
        Ok(items)
    }

    /// Discard the memoized children and query them again
    pub async fn initialize_children(&self) -> Result<Vec<TreeItem>> {
        let mut children = self.state.children.lock().await;
        let items = self.load_children().await?;
        *children = Some(items.clone());
        Ok(items)
    }

    pub async fn children_initialized(&self) -> bool {
        self.state.children.lock().await.is_some()
    }

    async fn load_children(&self) -> Result<Vec<TreeItem>> {
        let nodes = self.state.node.get_children().await?;
        Ok(nodes.into_iter().map(TreeItem::new).collect())
    }

    /// Parents are not memoized; each call yields fresh items
    pub async fn parents(&self) -> Result<Vec<TreeItem>> {
        let nodes = self.state.node.get_parents().await?;
        Ok(nodes.into_iter().map(TreeItem::new).collect())
    }

    /// This node's own contribution to `name`, ignoring children
    pub async fn own_value(&self, name: StatName) -> Result<StatValue> {
        let node = &self.state.node;
        Ok(match name {
            StatName::Total => StatValue::Count(node.total_words().await?),
            StatName::Translated => StatValue::Count(node.translated_words().await?),
            StatName::Fuzzy => StatValue::Count(node.fuzzy_words().await?),
            StatName::Suggestions => StatValue::Count(node.suggestion_count().await?),
            StatName::Checks => StatValue::Checks(node.checks().await?),
            StatName::Mtime => StatValue::Mtime(node.mtime().await?),
            StatName::LastAction => StatValue::LastAction(node.last_action().await?),
            StatName::LastUpdated => StatValue::LastUpdated(node.last_updated().await?),
        })
    }

    pub async fn add_dirty<I>(&self, names: I)
    where
        I: IntoIterator<Item = StatName> + Send,
        I::IntoIter: Send,
    {
        self.state.dirty.lock().await.extend(names);
    }

    pub async fn dirty_names(&self) -> BTreeSet<StatName> {
        self.state.dirty.lock().await.clone()
    }

    /// Copy the dirty set and leave it empty
    pub async fn take_dirty(&self) -> BTreeSet<StatName> {
        std::mem::take(&mut *self.state.dirty.lock().await)
    }
}

impl fmt::Debug for TreeItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeItem")
            .field("cache_key", &self.cache_key())
            .finish()
    }
}

impl From<NodeHandle> for TreeItem {
    fn from(node: NodeHandle) -> Self {
        TreeItem::new(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted {
        key: String,
        queries: Arc<AtomicUsize>,
        children: Vec<NodeHandle>,
    }

    #[async_trait]
    impl TreeNode for Counted {
        fn cache_key(&self) -> String {
            self.key.clone()
        }

        async fn get_children(&self) -> Result<Vec<NodeHandle>> {
            _ = self.queries.fetch_add(1, Ordering::SeqCst);
            Ok(self.children.clone())
        }

        async fn get_parents(&self) -> Result<Vec<NodeHandle>> {
            Ok(Vec::new())
        }

        async fn total_words(&self) -> Result<u64> {
            Ok(7)
        }
    }

    fn leaf(key: &str) -> NodeHandle {
        Arc::new(Counted {
            key: key.to_string(),
            queries: Arc::new(AtomicUsize::new(0)),
            children: Vec::new(),
        })
    }

    #[tokio::test]
    async fn test_children_memoized_until_initialized() {
        let queries = Arc::new(AtomicUsize::new(0));
        let node: NodeHandle = Arc::new(Counted {
            key: "/af/tutorial/".into(),
            queries: queries.clone(),
            children: vec![leaf("/af/tutorial/a.po"), leaf("/af/tutorial/b.po")],
        });
        let item = TreeItem::new(node);

        assert!(!item.children_initialized().await);
        assert_eq!(item.children().await.unwrap().len(), 2);
        assert_eq!(item.children().await.unwrap().len(), 2);
        assert_eq!(queries.load(Ordering::SeqCst), 1);

        _ = item.initialize_children().await.unwrap();
        assert_eq!(queries.load(Ordering::SeqCst), 2);
        assert_eq!(item.children().await.unwrap()[1].code(), "b.po");
    }

    #[tokio::test]
    async fn test_own_value_defaults() {
        let item = TreeItem::new(leaf("/af/tutorial/a.po"));
        assert_eq!(item.own_value(StatName::Total).await.unwrap(), StatValue::Count(7));
        assert_eq!(item.own_value(StatName::Fuzzy).await.unwrap(), StatValue::Count(0));
        for name in StatName::ALL {
            if name != StatName::Total {
                assert_eq!(item.own_value(name).await.unwrap(), name.identity());
            }
        }
    }

    #[tokio::test]
    async fn test_take_dirty() {
        let item = TreeItem::new(leaf("/af/tutorial/a.po"));
        item.add_dirty([StatName::Total, StatName::Checks]).await;
        let clone = item.clone();
        clone.add_dirty([StatName::Total]).await;

        let taken = item.take_dirty().await;
        assert_eq!(taken.len(), 2);
        assert!(item.dirty_names().await.is_empty());
    }
}
