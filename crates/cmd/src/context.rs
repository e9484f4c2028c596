// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result};
use log::debug;
use std::path::Path;
use treestats::{MemoryStats, MemoryTree, Stats, StatsConfig, TreeFixture};

/// Settings shared by every command, resolved from the config file, the
/// `PSTATS_*` environment and the global flags, in that order
#[derive(Debug, Clone)]
pub struct StatsContext {
    pub config: StatsConfig,
}

impl StatsContext {
    pub fn new(config_path: Option<&Path>, workers: Option<usize>, strict: bool) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                let mut config = StatsConfig::from_yaml_file(path)
                    .with_context(|| format!("loading config {}", path.display()))?;
                config.apply_env()?;
                config
            }
            None => StatsConfig::from_env()?,
        };

        if let Some(workers) = workers {
            config.workers = workers;
        }
        if strict {
            config.strict = true;
        }
        config.validate()?;
        debug!("resolved config: {:?}", config);
        Ok(Self { config })
    }

    /// Context with defaults only, for tests and embedding
    pub fn with_config(config: StatsConfig) -> Self {
        Self { config }
    }

    pub async fn load_tree(&self, fixture: &Path) -> Result<MemoryTree> {
        let fixture = TreeFixture::from_yaml_file(fixture)
            .with_context(|| format!("loading tree {}", fixture.display()))?;
        Ok(fixture.build().await?)
    }

    /// In-memory service; `inline` forces jobs onto the calling task
    pub fn stats(&self, inline: bool) -> MemoryStats {
        let mut config = self.config.clone();
        config.sync_jobs |= inline;
        Stats::in_memory(config)
    }
}

