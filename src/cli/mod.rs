use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::config::{split_list, BuildConfig};
use crate::export::{write_dataset, ExportFormat};
use crate::models::{FeatureSnapshot, Outcome, TeamIdentity};
use crate::services::feature_engine::compute_snapshot;
use crate::services::{DatasetAssembler, HttpFetcher, ListingKind};

/// Flags shared by every subcommand. Anything left unset keeps the value
/// from the environment (or the built-in default).
#[derive(Debug, Clone, Default, Args)]
pub struct ScrapeArgs {
    /// Listing pages to scan
    #[arg(short, long)]
    pub pages: Option<u32>,
    /// Feature window sizes, comma separated (e.g. 5,10)
    #[arg(short, long, value_delimiter = ',')]
    pub windows: Option<Vec<usize>>,
    /// Tier-1 event markers, comma separated
    #[arg(long)]
    pub markers: Option<String>,
    /// Minimum delay between requests in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,
    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
    /// Concurrent fetches
    #[arg(short, long)]
    pub concurrency: Option<usize>,
    /// History records kept per team
    #[arg(long)]
    pub history_limit: Option<usize>,
    /// Drop rows where either team used fewer past matches than this
    #[arg(long)]
    pub min_matches: Option<usize>,
    /// Site base URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl ScrapeArgs {
    pub fn apply(self, config: &mut BuildConfig) {
        if let Some(v) = self.pages {
            config.pages = v;
        }
        if let Some(v) = self.windows {
            config.windows = v;
        }
        if let Some(v) = self.markers {
            config.tier1_markers = split_list(&v);
        }
        if let Some(v) = self.delay_ms {
            config.delay_ms = v;
        }
        if let Some(v) = self.timeout_secs {
            config.timeout_secs = v;
        }
        if let Some(v) = self.concurrency {
            config.concurrency = v;
        }
        if let Some(v) = self.history_limit {
            config.history_limit = v;
        }
        if let Some(v) = self.min_matches {
            config.min_matches = v;
        }
        if let Some(v) = self.base_url {
            config.base_url = v.trim_end_matches('/').to_string();
        }
    }
}

fn pipeline(
    config: &BuildConfig,
    cancel: CancellationToken,
) -> Result<(Arc<HttpFetcher>, DatasetAssembler<HttpFetcher>)> {
    let fetcher = Arc::new(HttpFetcher::new(config, cancel.clone())?);
    let assembler = DatasetAssembler::new(fetcher.clone(), config, cancel)?;
    Ok((fetcher, assembler))
}

/// Drop the pipeline and close the fetcher it was sharing.
fn finish(fetcher: Arc<HttpFetcher>, assembler: DatasetAssembler<HttpFetcher>) {
    drop(assembler);
    match Arc::try_unwrap(fetcher) {
        Ok(fetcher) => {
            fetcher.close();
        }
        Err(shared) => shared.cancel_token().cancel(),
    }
}

pub async fn build_dataset(
    config: BuildConfig,
    output: PathBuf,
    format: ExportFormat,
    cancel: CancellationToken,
) -> Result<()> {
    let (fetcher, assembler) = pipeline(&config, cancel)?;
    let result = run_build(&assembler, config.pages, &output, format).await;
    finish(fetcher, assembler);
    result
}

async fn run_build(
    assembler: &DatasetAssembler<HttpFetcher>,
    pages: u32,
    output: &Path,
    format: ExportFormat,
) -> Result<()> {
    println!("🔎 Building dataset from {} results page(s)...", pages);
    let report = assembler.build().await;

    write_dataset(output, &report.rows, assembler.windows(), format).await?;

    println!("✅ Wrote {} rows to {}", report.rows.len(), output.display());
    println!("   Matches discovered:    {}", report.discovered);
    println!("   Skipped:               {}", report.skipped.len());
    println!("   Below min matches:     {}", report.below_threshold);
    println!("   Team histories:        {}", report.histories_fetched);
    if report.cancelled {
        println!("⚠️  Stopped early; the dataset only covers matches finished before the stop.");
    }
    for skip in report.skipped.iter().take(10) {
        println!("   • {} ({:?}): {}", skip.link, skip.stage, skip.reason);
    }
    Ok(())
}

pub async fn list_matches(config: BuildConfig, cancel: CancellationToken) -> Result<()> {
    let (fetcher, assembler) = pipeline(&config, cancel)?;

    let matches = assembler.discover(ListingKind::Upcoming).await;
    println!("📅 Found {} tier-1 matches:\n", matches.len());
    for m in &matches {
        println!("{} - {} vs {} - {}", m.event, m.teams.0, m.teams.1, m.link);
    }

    finish(fetcher, assembler);
    Ok(())
}

fn print_snapshot(label: &str, s: &FeatureSnapshot) {
    println!(
        "   {:<24} winrate {:.2} | round diff {:+.2} ({} scored) | streak {} | {}/{} matches",
        label, s.winrate, s.avg_round_diff, s.scored_matches, s.winstreak, s.matches_used, s.window
    );
}

pub async fn show_match_features(
    config: BuildConfig,
    match_url: &str,
    cancel: CancellationToken,
) -> Result<()> {
    let (fetcher, assembler) = pipeline(&config, cancel)?;
    let result = print_match_features(&assembler, match_url).await;
    finish(fetcher, assembler);
    result
}

async fn print_match_features(
    assembler: &DatasetAssembler<HttpFetcher>,
    match_url: &str,
) -> Result<()> {
    let features = assembler.match_features(match_url).await?;
    let (team_a, team_b) = &features.teams;
    println!(
        "🎯 {} vs {} (history before {})",
        team_a.name, team_b.name, features.cutoff
    );
    if let Some((a, b)) = features.score {
        println!("   Final score: {}-{}", a, b);
    }
    for wf in &features.features {
        println!("\n📊 Last {} matches:", wf.window);
        print_snapshot(&team_a.name, &wf.team_a);
        print_snapshot(&team_b.name, &wf.team_b);
    }
    Ok(())
}

pub async fn show_team(
    config: BuildConfig,
    team_url: &str,
    show: usize,
    cancel: CancellationToken,
) -> Result<()> {
    let (fetcher, assembler) = pipeline(&config, cancel)?;
    let result = print_team(&assembler, team_url, show).await;
    finish(fetcher, assembler);
    result
}

async fn print_team(
    assembler: &DatasetAssembler<HttpFetcher>,
    team_url: &str,
    show: usize,
) -> Result<()> {
    let slug = team_url.trim_end_matches('/').rsplit('/').next().unwrap_or(team_url);
    let team = TeamIdentity {
        name: slug.to_string(),
        url: team_url.to_string(),
    };

    println!("🔍 Fetching history for {}", team.name);
    let history = assembler.team_history(&team).await?;

    if history.is_empty() {
        println!("❌ No completed matches found for {}", team.url);
        return Ok(());
    }

    println!("\n📅 Recent Matches:");
    // Dated records are sorted ascending, undated ones last
    for record in history.iter().filter(|r| r.date.is_some()).rev().take(show) {
        let result = match record.outcome {
            Outcome::Win => "W",
            Outcome::Loss => "L",
            Outcome::Unknown => "?",
        };
        let score = record
            .score
            .map_or("(?-?)".to_string(), |(own, opp)| format!("({}-{})", own, opp));
        println!(
            "   {} vs {} {} {} - {}",
            record.date.map_or("????-??-??".to_string(), |d| d.to_string()),
            record.opponent.as_deref().unwrap_or("?"),
            score,
            result,
            record.event.as_deref().unwrap_or("")
        );
    }

    let cutoff = Utc::now().date_naive() + Duration::days(1);
    println!("\n📊 Current form:");
    for &window in assembler.windows() {
        let snap = compute_snapshot(&history, cutoff, window);
        print_snapshot(&format!("last {}", window), &snap);
    }
    Ok(())
}
