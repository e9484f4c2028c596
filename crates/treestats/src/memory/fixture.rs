// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! YAML description of a resource tree
//!
//! ```yaml
//! languages: [af, de]
//! projects:
//!   - code: tutorial
//!   - code: retired
//!     disabled: true
//! translation_projects:
//!   - language: af
//!     project: tutorial
//!     stores:
//!       - path: sub/foo.po
//!         total: 10
//!         translated: 4
//!         checks:
//!           checks: { endpunc: 2 }
//!           critical: 1
//!         mtime: 2024-05-01T00:00:00Z
//! virtual_folders:
//!   - name: priority
//!     location: /af/tutorial/
//!     stores: [/af/tutorial/sub/foo.po]
//! ```
//!
//! Store paths are relative to their translation project; intermediate
//! directories are created as needed. Virtual folder stores are full
//! paths.

use super::tree::{MemoryTree, StoreData};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeFixture {
    pub languages: Vec<String>,
    pub projects: Vec<ProjectFixture>,
    pub translation_projects: Vec<TranslationProjectFixture>,
    pub virtual_folders: Vec<VirtualFolderFixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectFixture {
    pub code: String,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationProjectFixture {
    pub language: String,
    pub project: String,
    #[serde(default)]
    pub stores: Vec<StoreFixture>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFixture {
    pub path: String,
    #[serde(flatten)]
    pub data: StoreData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VirtualFolderFixture {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub stores: Vec<String>,
}

impl TreeFixture {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Build a fresh tree
    pub async fn build(&self) -> Result<MemoryTree> {
        let tree = MemoryTree::new();
        self.load_into(&tree).await?;
        Ok(tree)
    }

    pub async fn load_into(&self, tree: &MemoryTree) -> Result<()> {
        for language in &self.languages {
            _ = tree.add_language(language).await?;
        }
        for project in &self.projects {
            _ = tree.add_project(&project.code).await?;
            if project.disabled {
                tree.set_project_disabled(&project.code, true).await?;
            }
        }
        for tp in &self.translation_projects {
            let tp_path = tree.add_translation_project(&tp.language, &tp.project).await?;
            for store in &tp.stores {
                let mut parent = tp_path.clone();
                let mut segments: Vec<&str> = store.path.split('/').collect();
                let name = segments.pop().unwrap_or_default();
                for dir in segments.into_iter().filter(|s| !s.is_empty()) {
                    parent = tree.add_directory(&parent, dir).await?;
                }
                _ = tree.add_store(&parent, name, store.data.clone()).await?;
            }
        }
        for vfolder in &self.virtual_folders {
            _ = tree
                .add_virtual_folder(
                    &vfolder.name,
                    &vfolder.location,
                    vfolder.stores.as_slice(),
                )
                .await?;
        }
        Ok(())
    }
}
