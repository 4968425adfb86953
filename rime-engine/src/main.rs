//! rime-engine - Bayesian rating inference for music catalogs
//!
//! Batch tool: connects to the external catalog, loads the shadow
//! state, and runs the requested operation as discrete checkpointed
//! passes. Every operation is available non-interactively so the
//! engine can run from cron or scripts.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rime_common::db::{libraries, ownership, ItemKind};
use rime_engine::bulk;
use rime_engine::catalog::http::HttpCatalog;
use rime_engine::catalog::CatalogReader;
use rime_engine::config::EngineConfig;
use rime_engine::engine::phase::{Phase, PhaseRunner, RunSummary};
use rime_engine::engine::{cleanup, recovery, verify};
use rime_engine::report;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rime-engine", version, about = "Bayesian rating inference for music catalogs")]
struct Cli {
    /// Path to the configuration file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Compute and classify, but write nothing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Apply writes even when the configuration says dry_run
    #[arg(long, global = true, conflicts_with = "dry_run")]
    live: bool,

    /// Proceed when the shadow state is stamped for a different library
    #[arg(long, global = true)]
    accept_library: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all processing phases, or a single one
    Run {
        /// One of: album-up, artist-up, album-down, track-down, twin-sync
        #[arg(long)]
        phase: Option<String>,
    },
    /// Compare the shadow state against the live catalog
    Verify,
    /// Undo engine-authored ratings and marker tags
    Cleanup,
    /// Rebuild the shadow state from marker tags
    Reconstruct,
    /// Print artist power rankings and library coverage
    Report,
    /// Import bulk ratings from a CSV file
    Import {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Override the configured file path
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Export current ratings with ownership classification to CSV
    Export {
        #[arg(long, value_enum)]
        kind: KindArg,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Artist,
    Album,
    Track,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Artist => ItemKind::Artist,
            KindArg::Album => ItemKind::Album,
            KindArg::Track => ItemKind::Track,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting rime-engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Invalid configuration fails fast, before any phase starts
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if cli.live {
        config.dry_run = false;
    }
    if config.dry_run {
        info!("Dry-run mode: no external writes will be made");
    }

    let db_path = config.state_db_path();
    info!("State database: {}", db_path.display());
    let pool = rime_common::db::init_state_db(&db_path).await?;

    let catalog = HttpCatalog::connect(&config.catalog)
        .await
        .context("could not connect to the catalog server")?;
    let identity = catalog.library_identity().await?;
    let library_id = libraries::ensure_library(
        &pool,
        &identity.name,
        &identity.stamp,
        cli.accept_library,
    )
    .await
    .map_err(|e| match e {
        rime_common::Error::IdentityMismatch { .. } => anyhow!(
            "{e}; re-run with --accept-library if this really is the intended library"
        ),
        other => other.into(),
    })?;

    // Cooperative cancellation: the flag is only honored at commit
    // boundaries, never mid-item
    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let flag = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; stopping at the next commit boundary");
                flag.store(true, Ordering::Relaxed);
            }
        });
    }

    match cli.command {
        Command::Run { phase } => {
            let phases: Vec<Phase> = match phase {
                Some(ref name) => vec![Phase::parse(name)
                    .ok_or_else(|| anyhow!("unknown phase '{name}'"))?],
                None => Phase::ALL.to_vec(),
            };

            if recovery::state_is_empty(&pool, library_id).await?
                && config.marker().is_some()
            {
                warn!(
                    "Shadow state is empty. If this library was processed before, \
                     run 'reconstruct' first; otherwise existing inferred ratings \
                     will be misclassified as manual."
                );
            }

            let runner = PhaseRunner::new(
                &catalog,
                &catalog,
                &pool,
                &config,
                library_id,
                interrupt.clone(),
            );
            let summary = runner.run(&phases).await?;
            print_run_summary(&summary);
        }
        Command::Verify => {
            let summary = verify::verify(&catalog, &pool, library_id).await?;
            println!(
                "Checked: {} | Overrides: {} | Orphaned: {}",
                summary.checked, summary.overrides, summary.orphaned
            );
        }
        Command::Cleanup => {
            let summary = cleanup::cleanup(
                &catalog,
                &catalog,
                &pool,
                &config,
                library_id,
                interrupt.clone(),
            )
            .await?;
            println!(
                "Reverted: {} | Kept (manual): {} | Tags swept: {}",
                summary.reverted, summary.kept_manual, summary.swept_tags
            );
            if summary.interrupted {
                println!("Cleanup was interrupted; run it again to continue.");
            }
        }
        Command::Reconstruct => {
            let summary = recovery::reconstruct(
                &catalog,
                &pool,
                library_id,
                config.marker(),
                config.dry_run,
            )
            .await?;
            println!(
                "Restored: {} | Already known: {}",
                summary.restored, summary.already_known
            );
        }
        Command::Report => {
            report::run_report(&catalog, &pool, library_id).await?;
        }
        Command::Import { kind, file } => {
            let item_kind = ItemKind::from(kind);
            let path = file.unwrap_or_else(|| bulk_path(&config, item_kind));
            let snapshot = catalog.fetch_catalog().await?;
            let summary = bulk::import(
                &path,
                item_kind,
                &snapshot,
                &catalog,
                &pool,
                &config,
                library_id,
            )
            .await?;
            println!(
                "Applied: {} | Reset: {} | Rejected: {}",
                summary.applied,
                summary.reset,
                summary.rejected.len()
            );
            for rejection in &summary.rejected {
                println!("  line {}: {}", rejection.line, rejection.reason);
            }
        }
        Command::Export { kind, file } => {
            let item_kind = ItemKind::from(kind);
            let path = file.unwrap_or_else(|| bulk_path(&config, item_kind));
            let snapshot = catalog.fetch_catalog().await?;
            let state = ownership::load_all(&pool, library_id).await?;
            let count = bulk::export(&path, item_kind, &snapshot, &state).await?;
            println!("Exported {count} rows to {}", path.display());
        }
    }

    Ok(())
}

fn bulk_path(config: &EngineConfig, kind: ItemKind) -> PathBuf {
    match kind {
        ItemKind::Artist => config.bulk.artists.clone(),
        ItemKind::Album => config.bulk.albums.clone(),
        ItemKind::Track => config.bulk.tracks.clone(),
    }
}

fn print_run_summary(summary: &RunSummary) {
    let mut updated = 0u32;
    let mut suppressed = 0u32;
    let mut hijacked = 0u32;
    for pass in &summary.passes {
        updated += pass.counts.updated;
        suppressed += pass.counts.suppressed;
        hijacked += pass.counts.hijacked;
    }

    println!("\n{}", "=".repeat(45));
    println!("RUN SUMMARY");
    println!("{}", "=".repeat(45));
    println!("Items updated:      {updated}");
    println!("Drift-suppressed:   {suppressed}");
    println!("Overrides ceded:    {hijacked}");
    println!("Start global prior: {:.3} stars", summary.prior_start);
    println!("End global prior:   {:.3} stars", summary.prior_end);
    println!(
        "Prior shift:        {:+.4} stars",
        summary.prior_end - summary.prior_start
    );
    println!(
        "Finished:           {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    println!("{}", "=".repeat(45));

    if summary.interrupted {
        let phase = summary
            .passes
            .last()
            .map(|p| p.phase.name())
            .unwrap_or("unknown");
        println!(
            "Run interrupted during the {phase} phase. The checkpoint is saved; \
             run again to resume from where it stopped."
        );
    }
}
