// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Administrative batch refresh
//!
//! Walks every selected translation project, recomputing its whole
//! subtree synchronously, then the project, language and root aggregates
//! above them. A translation project that fails to refresh, or a project
//! whose translation projects cannot be listed, is logged and the run moves
//! on to the next.

use crate::error::Result;
use crate::memory::MemoryTree;
use crate::node::{NodeHandle, TreeItem};
use crate::path::{self, PROJECTS_ROOT_PATH, ROOT_PATH};
use crate::refresh::RefreshMarker;
use crate::stat::StatName;
use crate::stats::Stats;
use async_trait::async_trait;
use log::{error, info, warn};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Enumerates the resources a batch refresh visits
#[async_trait]
pub trait ResourceIndex: Send + Sync {
    /// Project codes, sorted
    async fn projects(&self, include_disabled: bool) -> Result<Vec<String>>;

    /// Live translation projects of `project` as `(language code, node)`,
    /// ordered by language code
    async fn translation_projects(&self, project: &str) -> Result<Vec<(String, NodeHandle)>>;

    async fn languages(&self) -> Result<Vec<String>>;

    async fn node(&self, path: &str) -> Result<NodeHandle>;
}

#[async_trait]
impl ResourceIndex for MemoryTree {
    async fn projects(&self, include_disabled: bool) -> Result<Vec<String>> {
        Ok(self.project_codes(include_disabled).await)
    }

    async fn translation_projects(&self, project: &str) -> Result<Vec<(String, NodeHandle)>> {
        let mut result = Vec::new();
        for (language, tp_path) in self.translation_project_paths(project).await {
            result.push((language, MemoryTree::node(self, &tp_path).await?));
        }
        Ok(result)
    }

    async fn languages(&self) -> Result<Vec<String>> {
        Ok(self.language_codes().await)
    }

    async fn node(&self, path: &str) -> Result<NodeHandle> {
        MemoryTree::node(self, path).await
    }
}

/// Selection for a batch refresh. Empty filters select everything.
#[derive(Debug, Clone)]
pub struct BatchRefresh {
    pub projects: Vec<String>,
    pub languages: Vec<String>,
    pub include_disabled: bool,
    pub names: Vec<StatName>,
}

impl Default for BatchRefresh {
    fn default() -> Self {
        Self {
            projects: Vec::new(),
            languages: Vec::new(),
            include_disabled: false,
            names: StatName::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Paths refreshed, in order
    pub refreshed: Vec<String>,
    /// Paths that failed with their error
    pub failed: Vec<(String, String)>,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl BatchRefresh {
    fn unfiltered(&self) -> bool {
        self.projects.is_empty() && self.languages.is_empty()
    }

    fn wants_language(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    /// Run the refresh. The in-progress marker is cleared however the run
    /// ends.
    pub async fn run(&self, stats: &Stats, index: &dyn ResourceIndex) -> Result<BatchReport> {
        let start = Instant::now();
        info!(
            "stats refresh started (projects: {:?}, languages: {:?})",
            self.projects, self.languages
        );

        let initial = if self.unfiltered() { ROOT_PATH } else { PROJECTS_ROOT_PATH };
        let mut marker = stats.begin_refresh(initial).await?;
        let mut report = BatchReport::default();
        let outcome = self.refresh_all(stats, index, &mut marker, &mut report).await;
        let cleared = marker.finish().await;

        outcome?;
        cleared?;
        report.elapsed = start.elapsed();
        info!(
            "stats refresh finished in {:.3}s: {} refreshed, {} failed",
            report.elapsed.as_secs_f64(),
            report.refreshed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn refresh_all(
        &self,
        stats: &Stats,
        index: &dyn ResourceIndex,
        marker: &mut RefreshMarker,
        report: &mut BatchReport,
    ) -> Result<()> {
        let mut projects = match index.projects(self.include_disabled).await {
            Ok(projects) => projects,
            Err(e) => {
                error!("cannot enumerate projects: {}", e);
                report.failed.push((PROJECTS_ROOT_PATH.to_string(), e.to_string()));
                return Ok(());
            }
        };
        if !self.projects.is_empty() {
            for code in &self.projects {
                if !projects.contains(code) {
                    warn!("project {} not found or disabled", code);
                }
            }
            projects.retain(|code| self.projects.contains(code));
        }
        if !self.languages.is_empty() {
            match index.languages().await {
                Ok(known) => {
                    for code in self.languages.iter().filter(|code| !known.contains(code)) {
                        warn!("language {} not found", code);
                    }
                }
                Err(e) => warn!("cannot check language filter: {}", e),
            }
        }

        let mut touched_languages = BTreeSet::new();
        let mut enumerated = Vec::with_capacity(projects.len());
        for project in projects {
            let tps = match index.translation_projects(&project).await {
                Ok(tps) => tps,
                Err(e) => {
                    let project_path = path::project_path(&project);
                    error!("cannot enumerate {}: {}", project_path, e);
                    report.failed.push((project_path, e.to_string()));
                    continue;
                }
            };
            for (language, tp) in tps {
                if !self.wants_language(&language) {
                    continue;
                }
                let item = TreeItem::new(tp);
                let tp_path = item.cache_key();
                if !self.unfiltered() {
                    marker.advance(&tp_path).await?;
                }
                match stats.refresh_stats(&item, true, Some(self.names.as_slice())).await {
                    Ok(()) => report.refreshed.push(tp_path),
                    Err(e) => {
                        error!("stats refresh of {} failed: {}", tp_path, e);
                        report.failed.push((tp_path, e.to_string()));
                    }
                }
                _ = touched_languages.insert(language);
            }
            enumerated.push(project);
        }

        let aggregates = enumerated
            .iter()
            .map(|code| path::project_path(code))
            .chain(touched_languages.iter().map(|code| path::language_path(code)))
            .chain([PROJECTS_ROOT_PATH.to_string(), ROOT_PATH.to_string()]);
        for aggregate in aggregates {
            self.refresh_one(stats, index, &aggregate, report).await;
        }
        Ok(())
    }

    async fn refresh_one(
        &self,
        stats: &Stats,
        index: &dyn ResourceIndex,
        target: &str,
        report: &mut BatchReport,
    ) {
        let result = match index.node(target).await {
            Ok(node) => {
                stats
                    .refresh_stats(&TreeItem::new(node), false, Some(self.names.as_slice()))
                    .await
            }
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => report.refreshed.push(target.to_string()),
            Err(e) => {
                error!("stats refresh of {} failed: {}", target, e);
                report.failed.push((target.to_string(), e.to_string()));
            }
        }
    }
}
