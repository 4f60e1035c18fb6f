use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rankforge::cli::{self, ScrapeArgs};
use rankforge::config::BuildConfig;
use rankforge::export::ExportFormat;

#[derive(Parser)]
#[command(name = "rankforge")]
#[command(about = "Builds leakage-safe match datasets from team competitive history")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the training dataset from completed results
    Build {
        #[command(flatten)]
        scrape: ScrapeArgs,
        /// Output file
        #[arg(short, long, default_value = "data/dataset.csv")]
        output: PathBuf,
        #[arg(short, long, value_enum, default_value = "csv")]
        format: ExportFormat,
    },
    /// List upcoming tier-1 matches
    Matches {
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Show both teams' current features for one match
    Features {
        #[arg(short, long)]
        match_url: String,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
    /// Show a team's recent history and form
    Team {
        /// Team profile URL, e.g. https://www.vlr.gg/team/624/paper-rex
        #[arg(short, long)]
        url: String,
        /// Matches to list
        #[arg(long, default_value = "10")]
        show: usize,
        #[command(flatten)]
        scrape: ScrapeArgs,
    },
}

fn load_config(scrape: ScrapeArgs) -> Result<BuildConfig> {
    let mut config = BuildConfig::from_env()?;
    scrape.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// First Ctrl-C stops new fetches; in-flight requests finish or time out.
fn install_stop_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Stop requested, finishing in-flight requests...");
            token.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cancel = install_stop_signal();

    match cli.command {
        Commands::Build {
            scrape,
            output,
            format,
        } => {
            let config = load_config(scrape)?;
            tracing::info!("Building dataset into {}", output.display());
            cli::build_dataset(config, output, format, cancel).await?;
        }
        Commands::Matches { scrape } => {
            let config = load_config(scrape)?;
            tracing::info!("Listing upcoming matches...");
            cli::list_matches(config, cancel).await?;
        }
        Commands::Features { match_url, scrape } => {
            let config = load_config(scrape)?;
            tracing::info!("Computing features for {}", match_url);
            cli::show_match_features(config, &match_url, cancel).await?;
        }
        Commands::Team { url, show, scrape } => {
            let config = load_config(scrape)?;
            tracing::info!("Querying team: {}", url);
            cli::show_team(config, &url, show, cancel).await?;
        }
    }

    Ok(())
}
