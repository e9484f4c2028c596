// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Named statistics and their combination rules
//!
//! Every node in the resource tree answers the same fixed set of statistics.
//! A statistic's aggregate at a node is the combination of the node's own
//! (leaf) value with the aggregates of its children:
//!
//! - word and suggestion counts are summed,
//! - timestamps (`mtime`, last action, last update) keep the newest value,
//! - quality-check failures are merged per check name, with the critical
//!   unit counter summed alongside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// One of the fixed statistics cached for every tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    Total,
    Translated,
    Fuzzy,
    Suggestions,
    Checks,
    Mtime,
    LastAction,
    LastUpdated,
}

/// How a statistic is folded up the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CombineRule {
    Sum,
    MaxByTimestamp,
    MergeChecks,
}

/// Quality-check failures: failing unit count per check plus the number of
/// units carrying at least one critical failure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckStats {
    pub checks: BTreeMap<String, u64>,
    pub critical: u64,
}

/// Most recent translation action below a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastAction {
    pub id: u64,
    /// Unix seconds
    pub mtime: i64,
    pub snippet: String,
}

/// Most recent unit creation below a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastUpdated {
    pub id: u64,
    /// Unix seconds
    pub creation_time: i64,
    pub snippet: String,
}

/// A cached statistic value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StatValue {
    Count(u64),
    Checks(CheckStats),
    Mtime(DateTime<Utc>),
    LastAction(LastAction),
    LastUpdated(LastUpdated),
}

impl StatName {
    pub const ALL: [StatName; 8] = [
        StatName::Total,
        StatName::Translated,
        StatName::Fuzzy,
        StatName::Suggestions,
        StatName::Checks,
        StatName::Mtime,
        StatName::LastAction,
        StatName::LastUpdated,
    ];

    /// Suffix used in cache keys (`<cache_key>:<name>`)
    pub fn as_str(self) -> &'static str {
        match self {
            StatName::Total => "total",
            StatName::Translated => "translated",
            StatName::Fuzzy => "fuzzy",
            StatName::Suggestions => "suggestions",
            StatName::Checks => "checks",
            StatName::Mtime => "mtime",
            StatName::LastAction => "last_action",
            StatName::LastUpdated => "last_updated",
        }
    }

    pub fn rule(self) -> CombineRule {
        match self {
            StatName::Total | StatName::Translated | StatName::Fuzzy | StatName::Suggestions => {
                CombineRule::Sum
            }
            StatName::Checks => CombineRule::MergeChecks,
            StatName::Mtime | StatName::LastAction | StatName::LastUpdated => {
                CombineRule::MaxByTimestamp
            }
        }
    }

    /// Value a node contributes when it has nothing to report
    pub fn identity(self) -> StatValue {
        match self {
            StatName::Total | StatName::Translated | StatName::Fuzzy | StatName::Suggestions => {
                StatValue::Count(0)
            }
            StatName::Checks => StatValue::Checks(CheckStats::default()),
            StatName::Mtime => StatValue::Mtime(DateTime::<Utc>::UNIX_EPOCH),
            StatName::LastAction => StatValue::LastAction(LastAction::default()),
            StatName::LastUpdated => StatValue::LastUpdated(LastUpdated::default()),
        }
    }

    /// Whether `value` has the shape this statistic stores
    pub fn accepts(self, value: &StatValue) -> bool {
        matches!(
            (self, value),
            (
                StatName::Total | StatName::Translated | StatName::Fuzzy | StatName::Suggestions,
                StatValue::Count(_)
            ) | (StatName::Checks, StatValue::Checks(_))
                | (StatName::Mtime, StatValue::Mtime(_))
                | (StatName::LastAction, StatValue::LastAction(_))
                | (StatName::LastUpdated, StatValue::LastUpdated(_))
        )
    }

    /// Fold a node's own value with its children's aggregates.
    ///
    /// Values of the wrong shape contribute nothing. For timestamp rules the
    /// own value is considered first, and the first maximal candidate wins.
    pub fn combine<I>(self, own: StatValue, children: I) -> StatValue
    where
        I: IntoIterator<Item = StatValue>,
    {
        let values = std::iter::once(own)
            .chain(children)
            .filter(|v| self.accepts(v));

        match self.rule() {
            CombineRule::Sum => StatValue::Count(values.map(|v| v.count()).sum()),
            CombineRule::MergeChecks => {
                let mut merged = CheckStats::default();
                for value in values {
                    if let StatValue::Checks(stats) = value {
                        merged.merge(&stats);
                    }
                }
                StatValue::Checks(merged)
            }
            CombineRule::MaxByTimestamp => {
                let identity = self.identity();
                let mut best: Option<(i64, StatValue)> = None;
                for value in values {
                    if value == identity {
                        continue;
                    }
                    let ts = value.timestamp();
                    match &best {
                        Some((best_ts, _)) if ts <= *best_ts => {}
                        _ => best = Some((ts, value)),
                    }
                }
                best.map(|(_, v)| v).unwrap_or(identity)
            }
        }
    }
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        StatName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| Error::Config(format!("unknown statistic '{}'", s)))
    }
}

impl CheckStats {
    pub fn merge(&mut self, other: &CheckStats) {
        for (name, count) in &other.checks {
            *self.checks.entry(name.clone()).or_insert(0) += count;
        }
        self.critical += other.critical;
    }
}

impl StatValue {
    /// Count carried by a sum-type value, zero for any other shape
    pub fn count(&self) -> u64 {
        match self {
            StatValue::Count(n) => *n,
            _ => 0,
        }
    }

    /// Embedded timestamp in unix seconds, zero for shapes without one
    pub fn timestamp(&self) -> i64 {
        match self {
            StatValue::Mtime(dt) => dt.timestamp(),
            StatValue::LastAction(action) => action.mtime,
            StatValue::LastUpdated(updated) => updated.creation_time,
            StatValue::Count(_) | StatValue::Checks(_) => 0,
        }
    }

    pub fn as_checks(&self) -> Option<&CheckStats> {
        match self {
            StatValue::Checks(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn into_checks(self) -> CheckStats {
        match self {
            StatValue::Checks(stats) => stats,
            _ => CheckStats::default(),
        }
    }

    pub fn into_last_action(self) -> LastAction {
        match self {
            StatValue::LastAction(action) => action,
            _ => LastAction::default(),
        }
    }

    pub fn into_last_updated(self) -> LastUpdated {
        match self {
            StatValue::LastUpdated(updated) => updated,
            _ => LastUpdated::default(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
