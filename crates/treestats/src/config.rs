// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_STRICT: &str = "PSTATS_STRICT";
pub const ENV_WORKERS: &str = "PSTATS_WORKERS";
pub const ENV_SYNC_JOBS: &str = "PSTATS_SYNC_JOBS";

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StatsConfig {
    /// Treat every cache miss as an anomaly and cross-check each committed
    /// aggregate against its children
    pub strict: bool,

    /// Background worker count
    pub workers: usize,

    /// Run jobs inline on the submitting task instead of queueing them
    pub sync_jobs: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            strict: false,
            workers: 2,
            sync_jobs: false,
        }
    }
}

impl StatsConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: StatsConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults overlaid with `PSTATS_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overlay `PSTATS_*` environment variables onto this configuration
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    fn apply_vars<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_STRICT) {
            self.strict = parse_bool(ENV_STRICT, &value)?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            self.workers = value.trim().parse().map_err(|e| {
                Error::Config(format!("{} must be a positive integer: {}", ENV_WORKERS, e))
            })?;
        }
        if let Some(value) = lookup(ENV_SYNC_JOBS) {
            self.sync_jobs = parse_bool(ENV_SYNC_JOBS, &value)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        Ok(())
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(Error::Config(format!(
            "{} must be a boolean, got '{}'",
            name, other
        ))),
    }
}
