// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use treestats::BatchRefresh;

use cmd::commands;
use cmd::context::StatsContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "pstats")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Engine configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Background worker count
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log every cache miss and cross-check committed aggregates
    #[arg(long, global = true)]
    strict: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args)]
struct TreeArgs {
    /// Tree fixture (YAML)
    #[arg(long)]
    tree: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Refresh cached statistics for the whole tree or a selection
    Refresh {
        #[command(flatten)]
        tree: TreeArgs,
        /// Restrict to a project (repeatable)
        #[arg(long = "project")]
        projects: Vec<String>,
        /// Restrict to a language (repeatable)
        #[arg(long = "language")]
        languages: Vec<String>,
        /// Also refresh disabled projects
        #[arg(long)]
        include_disabled: bool,
        /// Run refresh jobs inline instead of on background workers
        #[arg(long)]
        no_jobs: bool,
    },
    /// Print the statistics of one path as JSON
    Stats {
        #[command(flatten)]
        tree: TreeArgs,
        /// Path to report on, e.g. /af/tutorial/
        path: String,
        /// Include immediate children
        #[arg(long)]
        children: bool,
    },
    /// Change a store's counts and propagate the change
    Touch {
        #[command(flatten)]
        tree: TreeArgs,
        /// Store path, e.g. /af/tutorial/a.po
        store: String,
        #[arg(long)]
        total: Option<u64>,
        #[arg(long)]
        translated: Option<u64>,
        #[arg(long)]
        fuzzy: Option<u64>,
        #[arg(long)]
        suggestions: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let ctx = StatsContext::new(cli.config.as_deref(), cli.workers, cli.strict)?;

    match cli.command {
        Commands::Refresh {
            tree,
            projects,
            languages,
            include_disabled,
            no_jobs,
        } => {
            let batch = BatchRefresh {
                projects,
                languages,
                include_disabled,
                ..BatchRefresh::default()
            };
            commands::refresh_command(&ctx, &tree.tree, batch, no_jobs).await
        }
        Commands::Stats {
            tree,
            path,
            children,
        } => commands::stats_command(&ctx, &tree.tree, &path, children).await,
        Commands::Touch {
            tree,
            store,
            total,
            translated,
            fuzzy,
            suggestions,
        } => {
            let change = commands::StoreChange {
                total,
                translated,
                fuzzy,
                suggestions,
            };
            commands::touch_command(&ctx, &tree.tree, &store, change).await
        }
    }
}
