// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::node::{NodeHandle, TreeItem, TreeNode};
use crate::path::{self, PathKind};
use crate::stat::{CheckStats, LastAction, LastUpdated};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Own statistics of one translation file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreData {
    pub total: u64,
    pub translated: u64,
    pub fuzzy: u64,
    pub suggestions: u64,
    pub checks: CheckStats,
    pub mtime: DateTime<Utc>,
    pub last_action: LastAction,
    pub last_updated: LastUpdated,
}

#[derive(Debug, Default)]
struct ProjectEntry {
    disabled: bool,
}

#[derive(Debug, Default)]
struct DirectoryEntry {
    obsolete: bool,
}

#[derive(Debug, Default)]
struct StoreEntry {
    obsolete: bool,
    data: StoreData,
}

/// One directory level of a virtual folder
#[derive(Debug)]
struct VirtualFolderEntry {
    /// Real directory mirrored by this item
    directory: String,
    location: String,
    parent: Option<String>,
    /// Member stores directly in `directory`
    stores: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct TreeState {
    languages: BTreeSet<String>,
    projects: BTreeMap<String, ProjectEntry>,
    /// Translation project and directory paths
    directories: BTreeMap<String, DirectoryEntry>,
    stores: BTreeMap<String, StoreEntry>,
    /// Virtual folder items by their own path
    virtual_folders: BTreeMap<String, VirtualFolderEntry>,
}

/// In-memory resource hierarchy of languages, projects, translation
/// projects, directories and stores
#[derive(Clone, Default)]
pub struct MemoryTree {
    state: Arc<Mutex<TreeState>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_language(&self, code: &str) -> Result<String> {
        validate_code(code)?;
        _ = self.state.lock().await.languages.insert(code.to_string());
        Ok(path::language_path(code))
    }

    pub async fn add_project(&self, code: &str) -> Result<String> {
        validate_code(code)?;
        _ = self
            .state
            .lock()
            .await
            .projects
            .entry(code.to_string())
            .or_default();
        Ok(path::project_path(code))
    }

    pub async fn add_translation_project(&self, language: &str, project: &str) -> Result<String> {
        let mut state = self.state.lock().await;
        if !state.languages.contains(language) {
            return Err(Error::not_found(path::language_path(language)));
        }
        if !state.projects.contains_key(project) {
            return Err(Error::not_found(path::project_path(project)));
        }
        let tp_path = path::translation_project_path(language, project);
        _ = state.directories.entry(tp_path.clone()).or_default();
        Ok(tp_path)
    }

    /// Add directory `name` below a translation project or directory
    pub async fn add_directory(&self, parent: &str, name: &str) -> Result<String> {
        validate_code(name)?;
        let mut state = self.state.lock().await;
        if !state.directories.contains_key(parent) {
            return Err(Error::not_found(parent));
        }
        let dir_path = format!("{}{}/", parent, name);
        if state.virtual_folders.contains_key(&dir_path) {
            return Err(Error::Config(format!("{} is a virtual folder", dir_path)));
        }
        _ = state.directories.entry(dir_path.clone()).or_default();
        Ok(dir_path)
    }

    pub async fn add_store(&self, parent: &str, name: &str, data: StoreData) -> Result<String> {
        validate_code(name)?;
        let mut state = self.state.lock().await;
        if !state.directories.contains_key(parent) {
            return Err(Error::not_found(parent));
        }
        let store_path = format!("{}{}", parent, name);
        _ = state.stores.insert(
            store_path.clone(),
            StoreEntry {
                obsolete: false,
                data,
            },
        );
        Ok(store_path)
    }

    /// Add virtual folder `name` at `location` (a translation project or
    /// directory) gathering `stores`, all of which must live below
    /// `location`. One item is created per directory level leading to a
    /// member store, under `<location><name>/`. Returns the new item paths.
    pub async fn add_virtual_folder<S: AsRef<str>>(
        &self,
        name: &str,
        location: &str,
        stores: &[S],
    ) -> Result<Vec<String>> {
        validate_code(name)?;
        let mut state = self.state.lock().await;
        if !state.directories.contains_key(location) {
            return Err(Error::not_found(location));
        }
        let root = format!("{}{}/", location, name);
        if state.contains(&root) {
            return Err(Error::Config(format!("{} already exists", root)));
        }
        for store in stores {
            let store = store.as_ref();
            if !state.stores.contains_key(store) {
                return Err(Error::not_found(store));
            }
            if !store.starts_with(location) {
                return Err(Error::Config(format!(
                    "{} is not below {}",
                    store, location
                )));
            }
        }

        let mut created = vec![root.clone()];
        _ = state.virtual_folders.insert(
            root.clone(),
            VirtualFolderEntry {
                directory: location.to_string(),
                location: location.to_string(),
                parent: None,
                stores: BTreeSet::new(),
            },
        );
        for store in stores {
            let store = store.as_ref();
            let relative = &store[location.len()..];
            let dirs = relative.rsplit_once('/').map(|(dirs, _)| dirs).unwrap_or("");

            let mut directory = location.to_string();
            let mut item = root.clone();
            for segment in dirs.split('/').filter(|s| !s.is_empty()) {
                let child_directory = format!("{}{}/", directory, segment);
                let child_item = format!("{}{}/", item, segment);
                if !state.virtual_folders.contains_key(&child_item) {
                    created.push(child_item.clone());
                    _ = state.virtual_folders.insert(
                        child_item.clone(),
                        VirtualFolderEntry {
                            directory: child_directory.clone(),
                            location: location.to_string(),
                            parent: Some(item.clone()),
                            stores: BTreeSet::new(),
                        },
                    );
                }
                directory = child_directory;
                item = child_item;
            }
            if let Some(entry) = state.virtual_folders.get_mut(&item) {
                _ = entry.stores.insert(store.to_string());
            }
        }
        debug!("virtual folder {} with {} items", root, created.len());
        Ok(created)
    }

    pub async fn set_store_data(&self, store: &str, data: StoreData) -> Result<()> {
        self.update_store_data(store, |current| *current = data).await
    }

    pub async fn update_store_data<F>(&self, store: &str, update: F) -> Result<()>
    where
        F: FnOnce(&mut StoreData) + Send,
    {
        let mut state = self.state.lock().await;
        let entry = state
            .stores
            .get_mut(store)
            .ok_or_else(|| Error::not_found(store))?;
        update(&mut entry.data);
        Ok(())
    }

    pub async fn store_data(&self, store: &str) -> Result<StoreData> {
        self.state
            .lock()
            .await
            .stores
            .get(store)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::not_found(store))
    }

    pub async fn set_project_disabled(&self, code: &str, disabled: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        let entry = state
            .projects
            .get_mut(code)
            .ok_or_else(|| Error::not_found(path::project_path(code)))?;
        entry.disabled = disabled;
        Ok(())
    }

    /// Mark a store, or a directory with everything below it, obsolete
    pub async fn make_obsolete(&self, target: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(store) = state.stores.get_mut(target) {
            store.obsolete = true;
            return Ok(());
        }
        if !state.directories.contains_key(target) || !target.ends_with('/') {
            return Err(Error::not_found(target));
        }
        for (dir_path, dir) in state.directories.range_mut(target.to_string()..) {
            if !dir_path.starts_with(target) {
                break;
            }
            dir.obsolete = true;
        }
        for (store_path, store) in state.stores.range_mut(target.to_string()..) {
            if !store_path.starts_with(target) {
                break;
            }
            store.obsolete = true;
        }
        debug!("{} made obsolete", target);
        Ok(())
    }

    pub async fn remove_store(&self, store: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .stores
            .remove(store)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(store))
    }

    pub async fn exists(&self, target: &str) -> bool {
        self.state.lock().await.contains(target)
    }

    /// Node for an existing path
    pub async fn node(&self, target: &str) -> Result<NodeHandle> {
        let state = self.state.lock().await;
        if let Some(entry) = state.virtual_folders.get(target) {
            return Ok(self.virtual_handle(target, &entry.location));
        }
        if !state.contains(target) {
            return Err(Error::not_found(target));
        }
        Ok(self.handle(target))
    }

    pub async fn item(&self, target: &str) -> Result<TreeItem> {
        Ok(TreeItem::new(self.node(target).await?))
    }

    fn handle(&self, target: &str) -> NodeHandle {
        Arc::new(MemoryNode {
            tree: self.clone(),
            path: target.to_string(),
            kind: path::path_kind(target),
        })
    }

    fn virtual_handle(&self, target: &str, location: &str) -> NodeHandle {
        Arc::new(VirtualFolderNode {
            tree: self.clone(),
            path: target.to_string(),
            location: location.to_string(),
        })
    }

    fn handles<I>(&self, paths: I) -> Vec<NodeHandle>
    where
        I: IntoIterator<Item = String>,
    {
        paths.into_iter().map(|p| self.handle(&p)).collect()
    }

    /// Item paths of every virtual folder, parents before children
    pub async fn virtual_folder_paths(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .virtual_folders
            .keys()
            .cloned()
            .collect()
    }

    pub async fn language_codes(&self) -> Vec<String> {
        self.state.lock().await.languages.iter().cloned().collect()
    }

    pub async fn project_codes(&self, include_disabled: bool) -> Vec<String> {
        self.state
            .lock()
            .await
            .projects
            .iter()
            .filter(|(_, project)| include_disabled || !project.disabled)
            .map(|(code, _)| code.clone())
            .collect()
    }

    /// Live translation projects of `project` as `(language, path)`,
    /// ordered by language code
    pub async fn translation_project_paths(&self, project: &str) -> Vec<(String, String)> {
        let state = self.state.lock().await;
        state
            .languages
            .iter()
            .map(|language| (language.clone(), path::translation_project_path(language, project)))
            .filter(|(_, tp)| state.live_directory(tp))
            .collect()
    }
}

impl TreeState {
    fn contains(&self, target: &str) -> bool {
        if self.virtual_folders.contains_key(target) {
            return true;
        }
        match path::path_kind(target) {
            PathKind::Root | PathKind::ProjectsRoot => true,
            PathKind::Language => self.languages.contains(&path::code(target)),
            PathKind::Project => self.projects.contains_key(&path::code(target)),
            PathKind::TranslationProject | PathKind::Directory => {
                self.directories.contains_key(target)
            }
            PathKind::Store => self.stores.contains_key(target),
        }
    }

    fn live_directory(&self, target: &str) -> bool {
        self.directories
            .get(target)
            .is_some_and(|dir| !dir.obsolete)
    }

    /// Live stores directly in `dir`, then live directories directly in it
    fn directory_children(&self, dir: &str) -> Vec<String> {
        let direct = |candidate: &str| {
            candidate
                .strip_prefix(dir)
                .is_some_and(|rest| !rest.is_empty() && !rest.trim_end_matches('/').contains('/'))
        };
        let stores = self
            .stores
            .range(dir.to_string()..)
            .take_while(|(p, _)| p.starts_with(dir))
            .filter(|(p, store)| !store.obsolete && direct(p))
            .map(|(p, _)| p.clone());
        let dirs = self
            .directories
            .range(dir.to_string()..)
            .take_while(|(p, _)| p.starts_with(dir))
            .filter(|(p, entry)| !entry.obsolete && direct(p))
            .map(|(p, _)| p.clone());
        stores.chain(dirs).collect()
    }
}

fn validate_code(code: &str) -> Result<()> {
    if code.is_empty() || code.contains('/') || code == "projects" {
        return Err(Error::Config(format!("invalid resource name '{}'", code)));
    }
    Ok(())
}

/// A resource of a [`MemoryTree`], addressed by path
struct MemoryNode {
    tree: MemoryTree,
    path: String,
    kind: PathKind,
}

impl MemoryNode {
    async fn store_data(&self) -> Result<StoreData> {
        self.tree.store_data(&self.path).await
    }
}

#[async_trait]
impl TreeNode for MemoryNode {
    fn cache_key(&self) -> String {
        self.path.clone()
    }

    async fn get_children(&self) -> Result<Vec<NodeHandle>> {
        let paths = {
            let state = self.tree.state.lock().await;
            match self.kind {
                PathKind::Root => state
                    .languages
                    .iter()
                    .map(|code| path::language_path(code))
                    .collect(),
                PathKind::ProjectsRoot => state
                    .projects
                    .iter()
                    .filter(|(_, project)| !project.disabled)
                    .map(|(code, _)| path::project_path(code))
                    .collect(),
                PathKind::Language => {
                    let language = path::code(&self.path);
                    state
                        .projects
                        .keys()
                        .map(|project| path::translation_project_path(&language, project))
                        .filter(|tp| state.live_directory(tp))
                        .collect()
                }
                PathKind::Project => {
                    let project = path::code(&self.path);
                    state
                        .languages
                        .iter()
                        .map(|language| path::translation_project_path(language, &project))
                        .filter(|tp| state.live_directory(tp))
                        .collect()
                }
                PathKind::TranslationProject | PathKind::Directory => {
                    state.directory_children(&self.path)
                }
                PathKind::Store => Vec::new(),
            }
        };
        Ok(self.tree.handles(paths))
    }

    async fn get_parents(&self) -> Result<Vec<NodeHandle>> {
        let parents = match self.kind {
            PathKind::Root | PathKind::ProjectsRoot | PathKind::Language | PathKind::Project => {
                Vec::new()
            }
            PathKind::TranslationProject => {
                let split = path::split_pootle_path(&self.path);
                split
                    .project
                    .map(|project| vec![path::project_path(&project)])
                    .unwrap_or_default()
            }
            PathKind::Directory | PathKind::Store => {
                path::parent_path(&self.path).into_iter().collect()
            }
        };
        Ok(self.tree.handles(parents))
    }

    async fn can_be_updated(&self) -> bool {
        let state = self.tree.state.lock().await;
        match self.kind {
            PathKind::Root | PathKind::ProjectsRoot => true,
            PathKind::Language => state.languages.contains(&path::code(&self.path)),
            PathKind::Project => state
                .projects
                .get(&path::code(&self.path))
                .is_some_and(|project| !project.disabled),
            PathKind::TranslationProject | PathKind::Directory => {
                state.live_directory(&self.path)
            }
            PathKind::Store => state
                .stores
                .get(&self.path)
                .is_some_and(|store| !store.obsolete),
        }
    }

    async fn total_words(&self) -> Result<u64> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.total),
            _ => Ok(0),
        }
    }

    async fn translated_words(&self) -> Result<u64> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.translated),
            _ => Ok(0),
        }
    }

    async fn fuzzy_words(&self) -> Result<u64> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.fuzzy),
            _ => Ok(0),
        }
    }

    async fn suggestion_count(&self) -> Result<u64> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.suggestions),
            _ => Ok(0),
        }
    }

    async fn checks(&self) -> Result<CheckStats> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.checks),
            _ => Ok(CheckStats::default()),
        }
    }

    async fn mtime(&self) -> Result<DateTime<Utc>> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.mtime),
            _ => Ok(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    async fn last_action(&self) -> Result<LastAction> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.last_action),
            _ => Ok(LastAction::default()),
        }
    }

    async fn last_updated(&self) -> Result<LastUpdated> {
        match self.kind {
            PathKind::Store => Ok(self.store_data().await?.last_updated),
            _ => Ok(LastUpdated::default()),
        }
    }
}

/// A virtual folder item. Aggregates its member stores and the items
/// below it, and never registers paths at or above its location.
struct VirtualFolderNode {
    tree: MemoryTree,
    path: String,
    location: String,
}

#[async_trait]
impl TreeNode for VirtualFolderNode {
    fn cache_key(&self) -> String {
        self.path.clone()
    }

    async fn get_children(&self) -> Result<Vec<NodeHandle>> {
        let (stores, items) = {
            let state = self.tree.state.lock().await;
            let Some(entry) = state.virtual_folders.get(&self.path) else {
                return Ok(Vec::new());
            };
            let stores: Vec<String> = entry
                .stores
                .iter()
                .filter(|store| state.stores.get(*store).is_some_and(|s| !s.obsolete))
                .cloned()
                .collect();
            let items: Vec<String> = state
                .virtual_folders
                .iter()
                .filter(|(_, child)| {
                    child.parent.as_deref() == Some(self.path.as_str())
                        && state.live_directory(&child.directory)
                })
                .map(|(item, _)| item.clone())
                .collect();
            (stores, items)
        };
        let mut children = self.tree.handles(stores);
        children.extend(
            items
                .iter()
                .map(|item| self.tree.virtual_handle(item, &self.location)),
        );
        Ok(children)
    }

    async fn get_parents(&self) -> Result<Vec<NodeHandle>> {
        let parent = self
            .tree
            .state
            .lock()
            .await
            .virtual_folders
            .get(&self.path)
            .and_then(|entry| entry.parent.clone());
        Ok(parent
            .iter()
            .map(|item| self.tree.virtual_handle(item, &self.location))
            .collect())
    }

    async fn can_be_updated(&self) -> bool {
        let state = self.tree.state.lock().await;
        state
            .virtual_folders
            .get(&self.path)
            .is_some_and(|entry| state.live_directory(&entry.directory))
    }

    fn all_pootle_paths(&self) -> Vec<String> {
        let depth = self.location.matches('/').count();
        path::all_pootle_paths(&self.path)
            .into_iter()
            .filter(|p| p.matches('/').count() > depth)
            .collect()
    }
}
