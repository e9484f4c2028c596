// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod aggregation;

use crate::error::{Error, Result};
use crate::memory::{MemoryTree, StoreData, TreeFixture};
use crate::node::{NodeHandle, TreeItem, TreeNode};
use crate::stat::CheckStats;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub(crate) fn init_logging() {
    _ = env_logger::builder().is_test(true).try_init();
}

/// Hand-built tree whose interior nodes may carry their own values
#[derive(Clone, Default)]
pub(crate) struct StaticTree {
    defs: Arc<Mutex<HashMap<String, NodeDef>>>,
}

#[derive(Clone)]
struct NodeDef {
    total: u64,
    mtime: DateTime<Utc>,
    checks: CheckStats,
    parent: Option<String>,
    children: Vec<String>,
    updatable: bool,
    broken: bool,
}

impl Default for NodeDef {
    fn default() -> Self {
        Self {
            total: 0,
            mtime: DateTime::<Utc>::UNIX_EPOCH,
            checks: CheckStats::default(),
            parent: None,
            children: Vec::new(),
            updatable: true,
            broken: false,
        }
    }
}

impl StaticTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, key: &str, parent: Option<&str>, total: u64) -> &Self {
        let mut defs = self.defs.lock().unwrap();
        _ = defs.insert(
            key.to_string(),
            NodeDef {
                total,
                parent: parent.map(str::to_string),
                ..NodeDef::default()
            },
        );
        if let Some(parent) = parent {
            defs
                .get_mut(parent)
                .unwrap()
                .children
                .push(key.to_string());
        }
        self
    }

    fn update<F: FnOnce(&mut NodeDef)>(&self, key: &str, f: F) {
        f(self.defs.lock().unwrap().get_mut(key).unwrap());
    }

    pub(crate) fn set_total(&self, key: &str, total: u64) {
        self.update(key, |def| def.total = total);
    }

    pub(crate) fn set_mtime(&self, key: &str, mtime: DateTime<Utc>) {
        self.update(key, |def| def.mtime = mtime);
    }

    pub(crate) fn set_checks(&self, key: &str, checks: CheckStats) {
        self.update(key, |def| def.checks = checks);
    }

    pub(crate) fn set_updatable(&self, key: &str, updatable: bool) {
        self.update(key, |def| def.updatable = updatable);
    }

    pub(crate) fn set_broken(&self, key: &str, broken: bool) {
        self.update(key, |def| def.broken = broken);
    }

    pub(crate) fn node(&self, key: &str) -> NodeHandle {
        Arc::new(StaticNode {
            tree: self.clone(),
            key: key.to_string(),
        })
    }

    pub(crate) fn item(&self, key: &str) -> TreeItem {
        TreeItem::new(self.node(key))
    }

    fn def(&self, key: &str) -> Result<NodeDef> {
        self.defs
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::not_found(key))
    }
}

struct StaticNode {
    tree: StaticTree,
    key: String,
}

impl StaticNode {
    fn live_def(&self) -> Result<NodeDef> {
        let def = self.tree.def(&self.key)?;
        if def.broken {
            return Err(Error::node(&self.key, "broken for test"));
        }
        Ok(def)
    }
}

#[async_trait]
impl TreeNode for StaticNode {
    fn cache_key(&self) -> String {
        self.key.clone()
    }

    async fn get_children(&self) -> Result<Vec<NodeHandle>> {
        let def = self.live_def()?;
        Ok(def.children.iter().map(|c| self.tree.node(c)).collect())
    }

    async fn get_parents(&self) -> Result<Vec<NodeHandle>> {
        let def = self.tree.def(&self.key)?;
        Ok(def.parent.iter().map(|p| self.tree.node(p)).collect())
    }

    async fn can_be_updated(&self) -> bool {
        self.tree.def(&self.key).map(|s| s.updatable).unwrap_or(false)
    }

    /// Registration follows the structural parent chain
    fn all_pootle_paths(&self) -> Vec<String> {
        let mut paths = vec![self.key.clone()];
        let mut current = self.key.clone();
        while let Ok(NodeDef {
            parent: Some(parent),
            ..
        }) = self.tree.def(&current)
        {
            paths.push(parent.clone());
            current = parent;
        }
        paths
    }

    async fn total_words(&self) -> Result<u64> {
        Ok(self.live_def()?.total)
    }

    async fn checks(&self) -> Result<CheckStats> {
        Ok(self.live_def()?.checks)
    }

    async fn mtime(&self) -> Result<DateTime<Utc>> {
        Ok(self.live_def()?.mtime)
    }
}

pub(crate) const SITE: &str = r#"
languages: [af, de, fr]
projects:
  - code: tutorial
  - code: docs
  - code: retired
    disabled: true
translation_projects:
  - language: af
    project: tutorial
    stores:
      - path: a.po
        total: 10
        translated: 6
        fuzzy: 1
        suggestions: 2
      - path: sub/b.po
        total: 5
        translated: 5
        checks:
          checks: { endpunc: 2 }
          critical: 1
  - language: de
    project: tutorial
    stores:
      - path: a.po
        total: 10
        translated: 2
  - language: fr
    project: docs
    stores:
      - path: guide/intro.po
        total: 7
  - language: af
    project: retired
    stores:
      - path: old.po
        total: 100
"#;

pub(crate) async fn site() -> MemoryTree {
    TreeFixture::from_yaml_str(SITE)
        .unwrap()
        .build()
        .await
        .unwrap()
}

pub(crate) fn store(total: u64, translated: u64) -> StoreData {
    StoreData {
        total,
        translated,
        ..StoreData::default()
    }
}
