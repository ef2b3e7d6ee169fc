// src/bin/waddle_core.rs
// Waddle CLI: run the capture + synthesis loop, or drive backup/restore/health
// operations against an existing data directory.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use waddle_core::config::WaddleConfig;
use waddle_core::{Collaborators, Waddle};

#[derive(Parser, Debug)]
#[command(name = "waddle-core", about = "Local activity-memory engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the capture pipeline and synthesis worker until interrupted.
    Serve,
    /// Snapshot the tri-store under the data directory's `backups/` folder.
    Backup,
    /// Restore a previously taken backup over the current data directory.
    Restore {
        /// Path to a `backup-{timestamp}` directory produced by `backup`.
        path: std::path::PathBuf,
    },
    /// Print each store's health and the aggregate status.
    Health,
    /// Detect and repair relational-store corruption in place.
    Recover,
    /// Run the retention sweep (archive/delete old sessions, clean orphan blobs).
    Retention,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = WaddleConfig::from_env();
    let collaborators = Collaborators::local_defaults(config.vector.dimension, "Waddle");
    let waddle = Waddle::new(config, collaborators)
        .await
        .context("failed to assemble waddle engine")?;

    match cli.command {
        Command::Serve => run_serve(waddle).await,
        Command::Backup => run_backup(&waddle).await,
        Command::Restore { path } => run_restore(&waddle, &path).await,
        Command::Health => run_health(&waddle).await,
        Command::Recover => run_recover(&waddle).await,
        Command::Retention => run_retention(&waddle).await,
    }
}

async fn run_serve(waddle: Waddle) -> Result<()> {
    waddle.start().context("failed to start capture pipeline")?;
    tracing::info!("waddle is running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    waddle.stop().await;
    Ok(())
}

async fn run_backup(waddle: &Waddle) -> Result<()> {
    let path = waddle.backup().await.context("backup failed")?;
    println!("backup written to {}", path.display());
    Ok(())
}

async fn run_restore(waddle: &Waddle, path: &std::path::Path) -> Result<()> {
    waddle_core::backup::restore(&waddle.engine, path, &waddle.config.data_dir)
        .await
        .context("restore failed")?;
    println!(
        "restore from {} complete; restart waddle-core to reopen the relational store",
        path.display()
    );
    Ok(())
}

async fn run_health(waddle: &Waddle) -> Result<()> {
    let report = waddle.health_check().await;
    println!("aggregate: {:?}", report.aggregate);
    println!("relational: {:?} ({} ms)", report.relational.status, report.relational.latency_ms);
    println!("vector: {:?} ({} ms)", report.vector.status, report.vector.latency_ms);
    println!("blob: {:?} ({} ms)", report.blob.status, report.blob.latency_ms);
    println!("missed embedding refreshes: {}", report.missed_embedding_refresh);
    Ok(())
}

async fn run_recover(waddle: &Waddle) -> Result<()> {
    let recovered = waddle.recover_if_corrupt().await.context("recovery failed")?;
    if recovered {
        println!("relational store was corrupt and has been recreated empty");
        let embedder: Arc<dyn waddle_core::storage::Embedder> =
            Arc::new(waddle_core::storage::DeterministicEmbedder::new(waddle.config.vector.dimension));
        let rebuilt = waddle_core::recovery::rebuild_vectors(
            waddle.engine.pool(),
            waddle.engine.keystore(),
            waddle.engine.vector(),
            &embedder,
        )
        .await
        .context("vector rebuild after recovery failed")?;
        println!("re-embedded {rebuilt} sessions into the vector index");
    } else {
        println!("relational store is healthy, nothing to recover");
    }
    Ok(())
}

async fn run_retention(waddle: &Waddle) -> Result<()> {
    let report = waddle.run_retention().await.context("retention sweep failed")?;
    println!(
        "retention: archived {}, deleted {}, removed {} orphan blob subtrees",
        report.archived,
        report.deleted,
        report.orphans_removed.len()
    );
    Ok(())
}
