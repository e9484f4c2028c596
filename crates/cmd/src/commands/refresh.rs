// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, bail};
use std::fmt::Write;
use std::path::Path;
use treestats::{BatchRefresh, BatchReport};

use crate::context::StatsContext;

pub async fn refresh_command(
    ctx: &StatsContext,
    tree: &Path,
    batch: BatchRefresh,
    no_jobs: bool,
) -> Result<()> {
    let (output, report) = run_refresh(ctx, tree, batch, no_jobs).await?;
    super::emit(&output)?;
    if !report.is_success() {
        bail!("{} paths failed to refresh", report.failed.len());
    }
    Ok(())
}

pub async fn refresh_command_as_string(
    ctx: &StatsContext,
    tree: &Path,
    batch: BatchRefresh,
    no_jobs: bool,
) -> Result<String> {
    let (output, _) = run_refresh(ctx, tree, batch, no_jobs).await?;
    Ok(output)
}

async fn run_refresh(
    ctx: &StatsContext,
    tree: &Path,
    batch: BatchRefresh,
    no_jobs: bool,
) -> Result<(String, BatchReport)> {
    let tree = ctx.load_tree(tree).await?;
    let memory = ctx.stats(no_jobs);

    let outcome = batch.run(&memory.stats, &tree).await;
    memory.shutdown().await;
    let report = outcome?;

    Ok((format_report(&report), report))
}

pub fn format_report(report: &BatchReport) -> String {
    let mut output = String::new();
    _ = writeln!(
        output,
        "Refreshed {} paths in {:.3}s",
        report.refreshed.len(),
        report.elapsed.as_secs_f64()
    );
    for path in &report.refreshed {
        _ = writeln!(output, "  {}", path);
    }
    if !report.failed.is_empty() {
        _ = writeln!(output, "Failed {} paths", report.failed.len());
        for (path, error) in &report.failed {
            _ = writeln!(output, "  {}: {}", path, error);
        }
    }
    output
}
