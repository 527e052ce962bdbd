use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "hsr-cli")]
#[command(about = "Honkai: Star Rail roster pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape the roster, tag release cohorts, and write the database and reports.
    Sync,
    /// Summarize the newest report runs as markdown.
    Report {
        #[arg(long, default_value_t = 5)]
        runs: usize,
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hsr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync) {
        Commands::Sync => {
            let summary = hsr_sync::run_sync_once_from_env().await?;
            tracing::debug!(?summary, "sync summary");
            println!(
                "sync complete: run_id={} source={} characters={} stored={} reports={}",
                summary.run_id,
                summary.source_id,
                summary.characters,
                summary.stored_rows,
                summary.reports_dir
            );
        }
        Commands::Report { runs, root } => {
            let root = root.or_else(|| std::env::var("HSR_WORKSPACE_ROOT").ok().map(PathBuf::from));
            println!("{}", hsr_sync::report_daily_markdown(runs, root)?);
        }
    }

    Ok(())
}
