// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use std::path::Path;
use treestats::BatchRefresh;

use crate::context::StatsContext;

pub async fn stats_command(
    ctx: &StatsContext,
    tree: &Path,
    path: &str,
    include_children: bool,
) -> Result<()> {
    let output = stats_command_as_string(ctx, tree, path, include_children).await?;
    super::emit(&output)
}

/// Refresh the whole tree, then render the report of `path` as JSON
pub async fn stats_command_as_string(
    ctx: &StatsContext,
    tree: &Path,
    path: &str,
    include_children: bool,
) -> Result<String> {
    let tree = ctx.load_tree(tree).await?;
    if !tree.exists(path).await {
        return Err(anyhow!("No such path: {}", path));
    }
    let memory = ctx.stats(true);

    let report = BatchRefresh::default().run(&memory.stats, &tree).await?;
    if !report.is_success() {
        log::warn!("{} paths failed to refresh", report.failed.len());
    }

    let item = tree.item(path).await?;
    let stats = memory.stats.get_stats(&item, include_children).await;
    let mut output = serde_json::to_string_pretty(&stats)?;
    output.push('\n');
    Ok(output)
}
