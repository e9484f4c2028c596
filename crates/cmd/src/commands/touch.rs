// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Result, anyhow};
use log::info;
use std::fmt::Write;
use std::path::Path;
use treestats::path::{self, PathKind};
use treestats::{BatchRefresh, StatsReport, StoreData};

use crate::context::StatsContext;

/// New own counts for a store; `None` leaves a count unchanged
#[derive(Debug, Clone, Default)]
pub struct StoreChange {
    pub total: Option<u64>,
    pub translated: Option<u64>,
    pub fuzzy: Option<u64>,
    pub suggestions: Option<u64>,
}

impl StoreChange {
    fn apply(&self, data: &mut StoreData) {
        if let Some(total) = self.total {
            data.total = total;
        }
        if let Some(translated) = self.translated {
            data.translated = translated;
        }
        if let Some(fuzzy) = self.fuzzy {
            data.fuzzy = fuzzy;
        }
        if let Some(suggestions) = self.suggestions {
            data.suggestions = suggestions;
        }
    }
}

pub async fn touch_command(
    ctx: &StatsContext,
    tree: &Path,
    store: &str,
    change: StoreChange,
) -> Result<()> {
    let output = touch_command_as_string(ctx, tree, store, change).await?;
    super::emit(&output)
}

/// Modify one store and let the background workers carry the change up
/// the tree. Reports the store's translation project before and after.
pub async fn touch_command_as_string(
    ctx: &StatsContext,
    tree: &Path,
    store: &str,
    change: StoreChange,
) -> Result<String> {
    if path::path_kind(store) != PathKind::Store {
        return Err(anyhow!("Not a store path: {}", store));
    }
    let parts = path::split_pootle_path(store);
    let (Some(language), Some(project)) = (parts.language, parts.project) else {
        return Err(anyhow!("Not a store path: {}", store));
    };
    let tp_path = path::translation_project_path(&language, &project);

    let tree = ctx.load_tree(tree).await?;
    let memory = ctx.stats(false);
    let outcome = async {
        let report = BatchRefresh::default().run(&memory.stats, &tree).await?;
        if !report.is_success() {
            log::warn!("{} paths failed to refresh", report.failed.len());
        }

        let tp = tree.item(&tp_path).await?;
        let before = memory.stats.get_stats(&tp, false).await;

        tree.update_store_data(store, |data| change.apply(data)).await?;
        let item = tree.item(store).await?;
        memory.stats.update_all_cache(&item).await?;
        memory.wait_idle().await;
        info!("{} changed, refresh jobs drained", store);

        let tp = tree.item(&tp_path).await?;
        let after = memory.stats.get_stats(&tp, false).await;
        let scores = memory.registry.scores().await;

        let mut output = String::new();
        _ = writeln!(output, "Before {}: {}", tp_path, summary(&before));
        _ = writeln!(output, "After  {}: {}", tp_path, summary(&after));
        _ = writeln!(output, "Dirty scores:");
        for (path, score) in &scores {
            _ = writeln!(output, "  {}: {}", path, score);
        }
        Ok::<_, anyhow::Error>(output)
    }
    .await;
    memory.shutdown().await;
    outcome
}

fn summary(report: &StatsReport) -> String {
    format!(
        "total {}, translated {}, fuzzy {}, suggestions {}, critical {}{}",
        report.total,
        report.translated,
        report.fuzzy,
        report.suggestions,
        report.critical,
        if report.is_dirty { " (dirty)" } else { "" }
    )
}
